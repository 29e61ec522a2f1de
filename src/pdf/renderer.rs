//! Page renderer: scale computation, painting and the drawing surface

use image::{Rgb, RgbImage};
use log::debug;

use super::engine::{PageHandle, RasterEngine};
use super::request::{EngineRequest, RenderError, RenderPlan, RequestId};

/// Horizontal space kept free around the page, in pixels
pub const DEFAULT_MARGIN_PX: u32 = 40;
/// Hard ceiling on the effective render scale
pub const MAX_SCALE: f32 = 2.0;

const PAPER: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

/// Scale that fits a page of `intrinsic_width` into the container, zoomed
/// and capped at [`MAX_SCALE`]
#[must_use]
pub fn effective_scale(container_width: u32, margin: u32, intrinsic_width: f32, zoom: f32) -> f32 {
    let available = container_width.saturating_sub(margin).max(1) as f32;
    let fit_scale = available / intrinsic_width.max(f32::EPSILON);
    (fit_scale * zoom).min(MAX_SCALE)
}

/// Plans renders and hands them to the engine workers
#[derive(Clone, Copy, Debug)]
pub struct PageRenderer {
    margin: u32,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_PX)
    }
}

impl PageRenderer {
    #[must_use]
    pub const fn new(margin: u32) -> Self {
        Self { margin }
    }

    /// Compute the scaled viewport a page will be painted at
    pub fn plan(
        &self,
        page: &PageHandle,
        container_width: u32,
        zoom: f32,
    ) -> Result<RenderPlan, RenderError> {
        let natural = page.viewport(1.0)?;
        let scale = effective_scale(container_width, self.margin, natural.width, zoom);
        let (width_px, height_px) = page.viewport(scale)?.pixel_size();

        Ok(RenderPlan {
            page: page.index(),
            scale,
            width_px,
            height_px,
        })
    }

    /// Queue a render of `page`. Completion arrives on the engine response channel.
    pub fn render(
        &self,
        id: RequestId,
        page: &PageHandle,
        container_width: u32,
        zoom: f32,
    ) -> Result<RenderPlan, RenderError> {
        let plan = self.plan(page, container_width, zoom)?;
        debug!(
            "Render request {} for page {} at scale {:.3} ({}x{})",
            id.0, plan.page, plan.scale, plan.width_px, plan.height_px
        );
        page.submit(EngineRequest::Render { id, plan })?;
        Ok(plan)
    }
}

/// Paint a planned page. Runs on a worker thread.
///
/// The engine's raster is conformed to the plan so the result always has
/// exactly the scaled viewport dimensions.
pub(crate) fn paint(engine: &mut dyn RasterEngine, plan: &RenderPlan) -> Result<RgbImage, RenderError> {
    let raster = engine.rasterize(plan.page - 1, plan.scale)?;
    if raster.dimensions() == (plan.width_px, plan.height_px) {
        return Ok(raster);
    }

    let mut out = RgbImage::from_pixel(plan.width_px, plan.height_px, PAPER);
    let copy_w = raster.width().min(plan.width_px);
    let copy_h = raster.height().min(plan.height_px);
    for y in 0..copy_h {
        for x in 0..copy_w {
            out.put_pixel(x, y, *raster.get_pixel(x, y));
        }
    }
    Ok(out)
}

/// The raster a page is committed into
#[derive(Debug, Default)]
pub struct Surface {
    image: RgbImage,
    plan: Option<RenderPlan>,
    valid: bool,
}

impl Surface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to the plan's viewport and overwrite every pixel with `image`
    pub fn commit(&mut self, plan: RenderPlan, image: &RgbImage) -> Result<(), RenderError> {
        if image.dimensions() != (plan.width_px, plan.height_px) {
            self.invalidate();
            return Err(RenderError::engine(format!(
                "raster is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                plan.width_px,
                plan.height_px
            )));
        }

        if self.image.dimensions() != image.dimensions() {
            self.image = RgbImage::new(plan.width_px, plan.height_px);
        }
        self.image.copy_from_slice(image.as_raw());
        self.plan = Some(plan);
        self.valid = true;
        Ok(())
    }

    /// Mark the content unusable after a failed render
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Plan of the render currently on the surface
    #[must_use]
    pub fn plan(&self) -> Option<RenderPlan> {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::request::ParseError;
    use crate::pdf::types::PageSize;

    struct SolidEngine {
        size: (u32, u32),
    }

    impl RasterEngine for SolidEngine {
        fn open(&mut self, _bytes: &[u8]) -> Result<Vec<PageSize>, ParseError> {
            Ok(vec![PageSize::new(100.0, 100.0)])
        }

        fn rasterize(&mut self, _page_index: usize, _scale: f32) -> Result<RgbImage, RenderError> {
            Ok(RgbImage::from_pixel(self.size.0, self.size.1, Rgb([1, 2, 3])))
        }
    }

    fn plan(width_px: u32, height_px: u32) -> RenderPlan {
        RenderPlan {
            page: 1,
            scale: 1.0,
            width_px,
            height_px,
        }
    }

    #[test]
    fn fit_scale_subtracts_margin() {
        // (440 - 40) / 400 = 1.0
        assert_eq!(effective_scale(440, 40, 400.0, 1.0), 1.0);
        assert_eq!(effective_scale(440, 40, 400.0, 1.5), 1.5);
    }

    #[test]
    fn effective_scale_is_capped() {
        assert_eq!(effective_scale(2000, 40, 100.0, 1.0), MAX_SCALE);
        assert_eq!(effective_scale(440, 40, 400.0, 10.0), MAX_SCALE);
    }

    #[test]
    fn narrow_container_still_yields_positive_scale() {
        let scale = effective_scale(10, 40, 400.0, 1.0);
        assert!(scale > 0.0);
    }

    #[test]
    fn paint_conforms_raster_to_plan() {
        let mut engine = SolidEngine { size: (9, 12) };
        let image = paint(&mut engine, &plan(10, 10)).unwrap();
        assert_eq!(image.dimensions(), (10, 10));
        assert_eq!(*image.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*image.get_pixel(9, 0), PAPER);
    }

    #[test]
    fn commit_overwrites_previous_content() {
        let mut surface = Surface::new();
        let big = RgbImage::from_pixel(20, 20, Rgb([9, 9, 9]));
        surface.commit(plan(20, 20), &big).unwrap();

        let small = RgbImage::from_pixel(5, 8, Rgb([4, 4, 4]));
        surface.commit(plan(5, 8), &small).unwrap();

        assert_eq!((surface.width(), surface.height()), (5, 8));
        assert!(surface.image().pixels().all(|p| *p == Rgb([4, 4, 4])));
        assert!(surface.is_valid());
    }

    #[test]
    fn commit_rejects_mismatched_raster() {
        let mut surface = Surface::new();
        let image = RgbImage::new(3, 3);
        assert!(surface.commit(plan(4, 4), &image).is_err());
        assert!(!surface.is_valid());
    }
}
