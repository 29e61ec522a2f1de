//! Viewer controller - drives fetch, parse and page renders for one document

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::engine::{DocumentEngine, DocumentHandle, EngineFactory};
use super::renderer::{MAX_SCALE, PageRenderer, Surface};
use super::request::{EngineResponse, ParseError, RenderError, RenderPlan, RequestId};
use super::state::{Command, Effect, ViewerState};
use super::types::RenderTarget;
use super::zoom::{InvalidZoom, Zoom};
use crate::source::{DocumentReference, DocumentSource, FetchError, MissingReferenceError};

/// A failure that ends the viewing session
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    MissingReference(#[from] MissingReferenceError),

    #[error("failed to fetch document: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to parse document: {0}")]
    Parse(#[from] ParseError),
}

/// Lifecycle of the document behind the viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not mounted yet
    Idle,
    /// Fetching and parsing
    DocumentLoading,
    /// Page handle available, renders may run
    DocumentReady,
    /// No reference was supplied; nothing was fetched
    NoDocument,
    /// Fetch or parse failed
    Failed,
    /// Torn down; late fetch and engine results are dropped
    Unmounted,
}

enum LoadEvent {
    Fetched(Result<Vec<u8>, FetchError>),
}

#[derive(Clone, Copy, Debug)]
struct PendingRender {
    id: RequestId,
    target: RenderTarget,
    plan: RenderPlan,
}

/// Owns the viewer state and orchestrates source -> engine -> renderer
pub struct ViewerController {
    reference: Option<DocumentReference>,
    state: ViewerState,
    phase: Phase,
    source: Arc<dyn DocumentSource>,
    engine_factory: EngineFactory,
    renderer: PageRenderer,
    load_tx: Sender<LoadEvent>,
    load_rx: Receiver<LoadEvent>,
    // Field order matters: the handle goes before the engine that serves it.
    handle: Option<DocumentHandle>,
    engine: Option<DocumentEngine>,
    surface: Surface,
    latest_render: Option<PendingRender>,
    next_request_id: u64,
    load_error: Option<LoadError>,
    page_error: Option<RenderError>,
    committed_renders: u64,
    discarded_renders: u64,
}

impl ViewerController {
    #[must_use]
    pub fn new(
        reference: Option<DocumentReference>,
        source: Arc<dyn DocumentSource>,
        engine_factory: EngineFactory,
        renderer: PageRenderer,
    ) -> Self {
        let (load_tx, load_rx) = flume::unbounded();
        Self {
            reference,
            state: ViewerState::default(),
            phase: Phase::Idle,
            source,
            engine_factory,
            renderer,
            load_tx,
            load_rx,
            handle: None,
            engine: None,
            surface: Surface::new(),
            latest_render: None,
            next_request_id: 1,
            load_error: None,
            page_error: None,
            committed_renders: 0,
            discarded_renders: 0,
        }
    }

    /// Start loading the document. Without a reference this settles in
    /// [`Phase::NoDocument`] and makes no calls.
    pub fn mount(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }

        let Some(reference) = self.reference.clone() else {
            warn!("Viewer mounted without a document reference");
            self.phase = Phase::NoDocument;
            self.load_error = Some(LoadError::MissingReference(MissingReferenceError));
            return;
        };

        info!("Loading document {reference}");
        self.phase = Phase::DocumentLoading;
        self.state.is_document_loading = true;

        let source = Arc::clone(&self.source);
        let tx = self.load_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("pagechat-fetch".to_string())
            .spawn(move || {
                let result = source.fetch(&reference);
                let _ = tx.send(LoadEvent::Fetched(result));
            });

        if let Err(e) = spawned {
            self.fail_load(LoadError::Fetch(FetchError::Transport(e.to_string())));
        }
    }

    /// Drop the document and its workers
    pub fn unmount(&mut self) {
        debug!("Unmounting viewer");
        self.phase = Phase::Unmounted;
        self.handle = None;
        self.engine = None;
        self.latest_render = None;
        self.state.is_document_loading = false;
        self.state.is_page_loading = false;
    }

    /// Apply completed background work. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        if self.phase == Phase::Unmounted {
            let late = self.load_rx.try_iter().count();
            if late > 0 {
                debug!("Dropping {late} load results after unmount");
            }
            return false;
        }

        let mut changed = false;

        let events: Vec<LoadEvent> = self.load_rx.try_iter().collect();
        for event in events {
            changed = true;
            match event {
                LoadEvent::Fetched(Ok(bytes)) => {
                    if self.phase == Phase::DocumentLoading {
                        self.engine = Some(DocumentEngine::parse(bytes, &self.engine_factory));
                    }
                }
                LoadEvent::Fetched(Err(e)) => self.fail_load(LoadError::Fetch(e)),
            }
        }

        let responses = self
            .engine
            .as_ref()
            .map(DocumentEngine::poll)
            .unwrap_or_default();
        for response in responses {
            changed = true;
            self.handle_response(response);
        }

        changed
    }

    fn handle_response(&mut self, response: EngineResponse) {
        match response {
            EngineResponse::DocumentInfo { page_sizes } => {
                let Some(engine) = self.engine.as_ref() else {
                    return;
                };
                let handle = engine.handle(page_sizes);
                let page_count = handle.page_count();
                self.handle = Some(handle);
                self.phase = Phase::DocumentReady;
                self.apply(Command::DocumentLoaded { page_count });
            }

            EngineResponse::ParseFailed(e) => {
                self.engine = None;
                self.fail_load(LoadError::Parse(e));
            }

            EngineResponse::Rendered { id, plan, image } => {
                if !self.is_latest(id) {
                    self.discard(id);
                    return;
                }
                self.latest_render = None;
                self.state.is_page_loading = false;
                match self.surface.commit(plan, &image) {
                    Ok(()) => {
                        self.committed_renders += 1;
                        self.page_error = None;
                        debug!("Committed render {} (page {})", id.0, plan.page);
                    }
                    Err(e) => {
                        error!("Render {} could not be committed: {e}", id.0);
                        self.page_error = Some(e);
                    }
                }
            }

            EngineResponse::RenderFailed { id, error } => {
                if !self.is_latest(id) {
                    self.discard(id);
                    return;
                }
                warn!("Render {} failed: {error}", id.0);
                self.latest_render = None;
                self.state.is_page_loading = false;
                self.surface.invalidate();
                self.page_error = Some(error);
            }
        }
    }

    /// A completion commits only if it answers the newest request and that
    /// request still matches the current target.
    fn is_latest(&self, id: RequestId) -> bool {
        self.latest_render
            .is_some_and(|pending| pending.id == id && pending.target == self.state.render_target())
    }

    fn discard(&mut self, id: RequestId) {
        self.discarded_renders += 1;
        debug!("Discarding stale render {}", id.0);
    }

    fn fail_load(&mut self, e: LoadError) {
        error!("Document load failed: {e}");
        self.phase = Phase::Failed;
        self.state.is_document_loading = false;
        self.load_error = Some(e);
    }

    fn apply(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => self.request_render(),
            }
        }
    }

    fn request_render(&mut self) {
        if self.phase != Phase::DocumentReady {
            return;
        }
        if self.state.container_width == 0 {
            // anything in flight targets a width that is gone
            self.latest_render = None;
            self.state.is_page_loading = false;
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };

        let target = self.state.render_target();
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;

        let result = handle
            .get_page(target.page)
            .map_err(RenderError::from)
            .and_then(|page| {
                self.renderer
                    .render(id, &page, target.container_width, target.zoom)
            });

        match result {
            Ok(plan) => {
                self.latest_render = Some(PendingRender { id, target, plan });
                self.state.is_page_loading = true;
            }
            Err(e) => {
                if matches!(e, RenderError::OutOfRange(_)) {
                    error!("Render target out of range: {e}");
                } else {
                    warn!("Could not start render: {e}");
                }
                self.latest_render = None;
                self.state.is_page_loading = false;
                self.surface.invalidate();
                self.page_error = Some(e);
            }
        }
    }

    pub fn next_page(&mut self) {
        self.apply(Command::NextPage);
    }

    pub fn previous_page(&mut self) {
        self.apply(Command::PreviousPage);
    }

    /// Go to a 1-based page, clamped to the document
    pub fn go_to_page(&mut self, page: usize) {
        self.apply(Command::GoToPage(page));
    }

    /// Replace the zoom factor; invalid factors leave state untouched
    pub fn set_zoom(&mut self, factor: f32) -> Result<(), InvalidZoom> {
        let zoom = Zoom::new(factor).inspect_err(|e| warn!("Rejected zoom: {e}"))?;
        self.apply(Command::SetZoom(zoom));
        Ok(())
    }

    pub fn zoom_in(&mut self) {
        if self.scale_saturated() {
            debug!("Zoom in ignored, page already at the maximum scale");
            return;
        }
        let zoom = self.state.zoom.stepped_in();
        self.apply(Command::SetZoom(zoom));
    }

    pub fn zoom_out(&mut self) {
        let zoom = self.state.zoom.stepped_out();
        self.apply(Command::SetZoom(zoom));
    }

    /// True when the current page already renders at [`MAX_SCALE`]
    fn scale_saturated(&self) -> bool {
        let Some(handle) = self.handle.as_ref() else {
            return false;
        };
        if self.state.container_width == 0 {
            return false;
        }
        handle
            .get_page(self.state.current_page)
            .map_err(RenderError::from)
            .and_then(|page| {
                self.renderer
                    .plan(&page, self.state.container_width, self.state.zoom.factor())
            })
            .is_ok_and(|plan| plan.scale >= MAX_SCALE)
    }

    pub fn reset_zoom(&mut self) {
        self.apply(Command::SetZoom(Zoom::default()));
    }

    /// Update the page container width in pixels
    pub fn set_container_width(&mut self, width: u32) {
        self.apply(Command::SetContainerWidth(width));
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn reference(&self) -> Option<&DocumentReference> {
        self.reference.as_ref()
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Error of the most recent render, if it failed
    #[must_use]
    pub fn page_error(&self) -> Option<&RenderError> {
        self.page_error.as_ref()
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&LoadError> {
        self.load_error.as_ref()
    }

    /// Plan of the render the viewer is waiting for
    #[must_use]
    pub fn pending_plan(&self) -> Option<RenderPlan> {
        self.latest_render.map(|pending| pending.plan)
    }

    #[must_use]
    pub fn committed_renders(&self) -> u64 {
        self.committed_renders
    }

    #[must_use]
    pub fn discarded_renders(&self) -> u64 {
        self.discarded_renders
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        self.unmount();
    }
}
