//! MuPDF-backed raster engine

use std::sync::Arc;

use image::RgbImage;
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::engine::{EngineFactory, RasterEngine};
use super::request::{ParseError, RenderError};
use super::types::PageSize;

const PDF_MAGIC: &str = "application/pdf";

/// Parses PDFs from memory and rasterizes pages with MuPDF
#[derive(Default)]
pub struct MupdfEngine {
    doc: Option<Document>,
}

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that gives every worker thread its own engine
    #[must_use]
    pub fn factory() -> EngineFactory {
        Arc::new(|| Box::new(Self::new()) as Box<dyn RasterEngine>)
    }
}

impl RasterEngine for MupdfEngine {
    fn open(&mut self, bytes: &[u8]) -> Result<Vec<PageSize>, ParseError> {
        let doc = Document::from_bytes(bytes, PDF_MAGIC)
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        if page_count <= 0 {
            return Err(ParseError::Empty);
        }

        let mut sizes = Vec::with_capacity(page_count as usize);
        for idx in 0..page_count {
            let bounds = doc
                .load_page(idx)
                .and_then(|page| page.bounds())
                .map_err(|e| ParseError::Malformed(format!("page {}: {e}", idx + 1)))?;
            sizes.push(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0));
        }

        self.doc = Some(doc);
        Ok(sizes)
    }

    fn rasterize(&mut self, page_index: usize, scale: f32) -> Result<RgbImage, RenderError> {
        let doc = self.doc.as_ref().ok_or(RenderError::DocumentClosed)?;
        let page = doc
            .load_page(page_index as i32)
            .map_err(|e| RenderError::engine(e.to_string()))?;

        let transform = Matrix::new_scale(scale, scale);
        let rgb = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&transform, &rgb, false, false)
            .map_err(|e| RenderError::engine(e.to_string()))?;

        let pixels = pixmap_to_rgb(&pixmap)?;
        RgbImage::from_raw(pixmap.width(), pixmap.height(), pixels)
            .ok_or_else(|| RenderError::engine("Pixmap buffer size mismatch"))
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderError::engine(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderError::engine("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
