//! PDF loading and rendering infrastructure

mod controller;
mod engine;
#[cfg(feature = "pdf")]
mod mupdf_engine;
mod renderer;
mod request;
mod state;
mod types;
mod worker;
mod zoom;

pub use controller::{LoadError, Phase, ViewerController};
pub use engine::{
    DEFAULT_WORKERS, DocumentEngine, DocumentHandle, EngineFactory, PageHandle, RasterEngine,
    WorkerConfig, default_engine_factory, init_workers, worker_config,
};
#[cfg(feature = "pdf")]
pub use mupdf_engine::MupdfEngine;
pub use renderer::{DEFAULT_MARGIN_PX, MAX_SCALE, PageRenderer, Surface, effective_scale};
pub use request::{
    EngineRequest, EngineResponse, OutOfRangeError, ParseError, RenderError, RenderPlan, RequestId,
};
pub use state::{Command, Effect, ViewerState};
pub use types::*;
pub use zoom::*;
