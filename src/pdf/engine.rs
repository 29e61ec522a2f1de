//! Document engine - owns the worker pool and the parsed document handle

use std::sync::{Arc, OnceLock, Weak};

use flume::{Receiver, Sender};
use image::RgbImage;
use log::{debug, info, warn};

use super::request::{EngineRequest, EngineResponse, OutOfRangeError, ParseError, RenderError};
use super::types::{PageSize, Viewport};
use super::worker::engine_worker;

/// Default number of render threads per document
pub const DEFAULT_WORKERS: usize = 2;

/// Parses and rasterizes documents inside a single worker thread.
///
/// Engines are created by an [`EngineFactory`] on the thread that uses them,
/// so implementations do not need to be `Send`.
pub trait RasterEngine {
    /// Parse the document bytes, returning the intrinsic size of every page
    fn open(&mut self, bytes: &[u8]) -> Result<Vec<PageSize>, ParseError>;

    /// Rasterize a page (0-indexed) at `scale` into an RGB image
    fn rasterize(&mut self, page_index: usize, scale: f32) -> Result<RgbImage, RenderError>;
}

/// Builds one engine per worker thread
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn RasterEngine> + Send + Sync>;

/// Engine used when the crate is built without a PDF backend
#[cfg(not(feature = "pdf"))]
struct UnavailableEngine;

#[cfg(not(feature = "pdf"))]
impl RasterEngine for UnavailableEngine {
    fn open(&mut self, _bytes: &[u8]) -> Result<Vec<PageSize>, ParseError> {
        Err(ParseError::EngineUnavailable(
            "built without the `pdf` feature".to_string(),
        ))
    }

    fn rasterize(&mut self, _page_index: usize, _scale: f32) -> Result<RgbImage, RenderError> {
        Err(RenderError::DocumentClosed)
    }
}

/// Factory for the engine compiled into this build
#[must_use]
pub fn default_engine_factory() -> EngineFactory {
    #[cfg(feature = "pdf")]
    {
        super::mupdf_engine::MupdfEngine::factory()
    }
    #[cfg(not(feature = "pdf"))]
    {
        Arc::new(|| Box::new(UnavailableEngine) as Box<dyn RasterEngine>)
    }
}

/// Process-wide worker pool configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    pub threads: usize,
    pub name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_WORKERS,
            name_prefix: "pagechat-render".to_string(),
        }
    }
}

static WORKER_CONFIG: OnceLock<WorkerConfig> = OnceLock::new();

/// Configure the worker pool. Returns false if it was already configured,
/// in which case the existing configuration stays in effect.
pub fn init_workers(config: WorkerConfig) -> bool {
    let accepted = WORKER_CONFIG.set(config).is_ok();
    if !accepted {
        warn!("Worker configuration already initialized, ignoring new value");
    }
    accepted
}

/// Active worker configuration; first use without `init_workers` locks in the default
pub fn worker_config() -> &'static WorkerConfig {
    WORKER_CONFIG.get_or_init(WorkerConfig::default)
}

/// A document being parsed or rendered by a pool of worker threads
pub struct DocumentEngine {
    request_tx: Sender<EngineRequest>,
    response_rx: Receiver<EngineResponse>,
    num_workers: usize,
}

impl DocumentEngine {
    /// Spawn workers that parse `bytes` and then serve render requests.
    ///
    /// The parse result arrives as the first [`EngineResponse`].
    #[must_use]
    pub fn parse(bytes: Vec<u8>, factory: &EngineFactory) -> Self {
        let config = worker_config();
        let num_workers = config.threads.max(1);
        let bytes: Arc<[u8]> = Arc::from(bytes);

        // flume for MPMC: every worker pulls from the same request queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        for worker_idx in 0..num_workers {
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let bytes = Arc::clone(&bytes);
            let factory = Arc::clone(factory);

            let spawned = std::thread::Builder::new()
                .name(format!("{}-{worker_idx}", config.name_prefix))
                .spawn(move || {
                    let engine = factory();
                    engine_worker(worker_idx, engine, &bytes, rx, tx);
                });

            if let Err(e) = spawned {
                warn!("Failed to spawn render worker {worker_idx}: {e}");
                if worker_idx == 0 {
                    let _ = response_tx.send(EngineResponse::ParseFailed(
                        ParseError::EngineUnavailable(e.to_string()),
                    ));
                }
            }
        }

        debug!("Spawned {num_workers} render workers for {} bytes", bytes.len());

        Self {
            request_tx,
            response_rx,
            num_workers,
        }
    }

    /// Drain completed responses without blocking
    pub fn poll(&self) -> Vec<EngineResponse> {
        self.response_rx.try_iter().collect()
    }

    /// Create the handle for a parsed document
    #[must_use]
    pub fn handle(&self, page_sizes: Vec<PageSize>) -> DocumentHandle {
        info!("Document ready with {} pages", page_sizes.len());
        DocumentHandle {
            shared: Arc::new(SharedDocument {
                page_sizes,
                request_tx: self.request_tx.clone(),
            }),
        }
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(EngineRequest::Shutdown);
        }
    }
}

impl Drop for DocumentEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SharedDocument {
    page_sizes: Vec<PageSize>,
    request_tx: Sender<EngineRequest>,
}

/// Parsed document, the sole owner of page state
pub struct DocumentHandle {
    shared: Arc<SharedDocument>,
}

impl DocumentHandle {
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.shared.page_sizes.len()
    }

    /// Page handle for a 1-based index
    pub fn get_page(&self, index: usize) -> Result<PageHandle, OutOfRangeError> {
        let page_count = self.page_count();
        if index == 0 || index > page_count {
            return Err(OutOfRangeError { index, page_count });
        }
        Ok(PageHandle {
            index,
            document: Arc::downgrade(&self.shared),
        })
    }
}

/// A page of an open document; never keeps the document alive
#[derive(Clone)]
pub struct PageHandle {
    index: usize,
    document: Weak<SharedDocument>,
}

impl PageHandle {
    /// Page number (1-based)
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Viewport of this page at `scale`
    pub fn viewport(&self, scale: f32) -> Result<Viewport, RenderError> {
        let document = self.document.upgrade().ok_or(RenderError::DocumentClosed)?;
        document
            .page_sizes
            .get(self.index - 1)
            .map(|size| size.viewport(scale))
            .ok_or(RenderError::DocumentClosed)
    }

    pub(crate) fn submit(&self, request: EngineRequest) -> Result<(), RenderError> {
        let document = self.document.upgrade().ok_or(RenderError::DocumentClosed)?;
        document
            .request_tx
            .send(request)
            .map_err(|_| RenderError::WorkerGone)
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("index", &self.index)
            .field("open", &(self.document.strong_count() > 0))
            .finish()
    }
}
