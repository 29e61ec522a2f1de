//! Core geometry types for page rendering

/// Intrinsic page size in document units (scale 1)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Viewport of this page at the given render scale
    #[must_use]
    pub fn viewport(self, scale: f32) -> Viewport {
        Viewport {
            width: self.width * scale,
            height: self.height * scale,
            scale,
        }
    }
}

/// Geometric description of a page at a render scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    /// Whole-pixel dimensions of a drawing surface holding this viewport
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }
}

fn to_pixels(len: f32) -> u32 {
    if len.is_finite() {
        (len.floor() as u32).max(1)
    } else {
        1
    }
}

/// What a render was asked to show: the commit key for last-write-wins
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTarget {
    /// Page number (1-based)
    pub page: usize,
    pub zoom: f32,
    /// Container width in pixels
    pub container_width: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_scales_both_axes() {
        let vp = PageSize::new(612.0, 792.0).viewport(0.5);
        assert_eq!(vp.width, 306.0);
        assert_eq!(vp.height, 396.0);
        assert_eq!(vp.pixel_size(), (306, 396));
    }

    #[test]
    fn pixel_size_floors_and_never_hits_zero() {
        let vp = PageSize::new(10.0, 0.2).viewport(1.55);
        assert_eq!(vp.pixel_size(), (15, 1));
    }
}
