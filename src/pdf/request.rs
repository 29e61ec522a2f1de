//! Render request and response types exchanged with engine workers

use image::RgbImage;

use super::types::PageSize;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Fully resolved instructions for painting one page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPlan {
    /// Page number (1-based)
    pub page: usize,
    /// Effective scale, already capped
    pub scale: f32,
    /// Surface width the page must be painted into
    pub width_px: u32,
    /// Surface height the page must be painted into
    pub height_px: u32,
}

/// The document bytes could not be turned into a page-addressable document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("document has no pages")]
    Empty,

    #[error("no document engine available: {0}")]
    EngineUnavailable(String),
}

/// Page index outside `[1, page_count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page {index} is out of range (document has {page_count} pages)")]
pub struct OutOfRangeError {
    pub index: usize,
    pub page_count: usize,
}

/// A single page failed to decode or draw
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("page engine: {0}")]
    Engine(String),

    #[error("document is no longer open")]
    DocumentClosed,

    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),

    #[error("render workers are gone")]
    WorkerGone,
}

impl RenderError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Request sent to engine workers
#[derive(Debug)]
pub enum EngineRequest {
    /// Paint a page according to the plan
    Render { id: RequestId, plan: RenderPlan },

    /// Stop the worker
    Shutdown,
}

/// Response from engine workers
#[derive(Debug)]
pub enum EngineResponse {
    /// Document parsed; sent once per document
    DocumentInfo { page_sizes: Vec<PageSize> },

    /// Document could not be parsed; sent once per document
    ParseFailed(ParseError),

    /// Painted page, sized exactly to the plan
    Rendered {
        id: RequestId,
        plan: RenderPlan,
        image: RgbImage,
    },

    /// Painting failed
    RenderFailed { id: RequestId, error: RenderError },
}
