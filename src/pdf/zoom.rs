//! Zoom factor for page rendering

/// Rejected zoom value
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("zoom factor must be a positive number, got {0}")]
pub struct InvalidZoom(pub f32);

/// User zoom applied on top of the fit-to-width scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    factor: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Zoom {
    /// Zoom in rate multiplier per step - 10%
    pub const ZOOM_IN_RATE: f32 = 1.1;
    /// Zoom out rate divisor per step - 5%
    pub const ZOOM_OUT_RATE: f32 = 1.05;
    /// Smallest factor reachable by stepping out
    pub const MIN_STEP_FACTOR: f32 = 0.1;

    /// Validate an explicit zoom factor
    pub fn new(factor: f32) -> Result<Self, InvalidZoom> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self { factor })
        } else {
            Err(InvalidZoom(factor))
        }
    }

    /// Returns the current zoom factor
    #[must_use]
    pub fn factor(self) -> f32 {
        self.factor
    }

    /// One step in
    #[must_use]
    pub fn stepped_in(self) -> Self {
        Self {
            factor: Self::clamp_factor(self.factor * Self::ZOOM_IN_RATE),
        }
    }

    /// One step out
    #[must_use]
    pub fn stepped_out(self) -> Self {
        Self {
            factor: Self::clamp_factor(self.factor / Self::ZOOM_OUT_RATE),
        }
    }

    /// Clamp factor to valid range, handling NaN/Inf
    fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.max(Self::MIN_STEP_FACTOR)
        }
    }

    /// Factor as a whole percentage, for display
    #[must_use]
    pub fn percent(self) -> u32 {
        (self.factor * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite() {
        assert_eq!(Zoom::new(0.0), Err(InvalidZoom(0.0)));
        assert_eq!(Zoom::new(-1.0), Err(InvalidZoom(-1.0)));
        assert!(Zoom::new(f32::NAN).is_err());
        assert!(Zoom::new(f32::INFINITY).is_err());
        assert_eq!(Zoom::new(1.5).map(Zoom::factor), Ok(1.5));
    }

    #[test]
    fn stepping_out_stops_at_floor() {
        let mut zoom = Zoom::default();
        for _ in 0..200 {
            zoom = zoom.stepped_out();
        }
        assert_eq!(zoom.factor(), Zoom::MIN_STEP_FACTOR);
    }

    #[test]
    fn stepping_in_grows() {
        let zoom = Zoom::default().stepped_in();
        assert!(zoom.factor() > 1.0);
        assert_eq!(zoom.percent(), 110);
    }
}
