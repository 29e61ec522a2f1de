//! Engine worker - runs in separate thread(s)

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::engine::RasterEngine;
use super::renderer::paint;
use super::request::{EngineRequest, EngineResponse};

/// Main worker function - runs in a dedicated thread.
///
/// Every worker parses its own copy of the document; only worker 0 reports
/// the parse outcome so the controller sees exactly one.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn engine_worker(
    worker_idx: usize,
    mut engine: Box<dyn RasterEngine>,
    bytes: &[u8],
    requests: Receiver<EngineRequest>,
    responses: Sender<EngineResponse>,
) {
    match engine.open(bytes) {
        Ok(page_sizes) => {
            if worker_idx == 0 {
                let _ = responses.send(EngineResponse::DocumentInfo { page_sizes });
            }
        }
        Err(e) => {
            if worker_idx == 0 {
                let _ = responses.send(EngineResponse::ParseFailed(e));
            } else {
                debug!("Worker {worker_idx} exiting after parse failure: {e}");
            }
            return;
        }
    }

    for request in requests {
        match request {
            EngineRequest::Render { id, plan } => {
                let response = match paint(engine.as_mut(), &plan) {
                    Ok(image) => EngineResponse::Rendered { id, plan, image },
                    Err(error) => {
                        warn!("Worker {worker_idx} failed to render page {}: {error}", plan.page);
                        EngineResponse::RenderFailed { id, error }
                    }
                };
                if responses.send(response).is_err() {
                    break;
                }
            }

            EngineRequest::Shutdown => break,
        }
    }

    debug!("Worker {worker_idx} stopped");
}
