use bon::bon;
use thiserror::Error;

use crate::geometry::FloatType;

/// Largest image side; pixel coordinates and counts must stay exact in the f32 metadata.
pub const MAX_RESOLUTION: u32 = 1 << 14;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("Image resolution {width}x{height} is out of range (1 - {MAX_RESOLUTION})")]
    Resolution { width: u32, height: u32 },

    #[error("At least one sample per pixel is needed")]
    NoSamples,

    #[error("Path continuation probability {0} is outside of (0, 1]")]
    ContinuationProbability(FloatType),

    #[error("BVH depth {depth} is outside of 1 - {max}")]
    BvhDepth { depth: u32, max: u32 },

    #[error("BVH leaves must allow at least one object")]
    EmptyLeaves,
}

/// Per-render configuration shared by every pixel of a dispatch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    /// Russian roulette survival probability
    pub continuation_probability: FloatType,
    /// Stop every path after the first next event estimation
    pub direct_lighting_only: bool,
    /// Use the Beckmann lobe instead of Lambert for surfaces without a highlight
    pub use_microfacet: bool,
    /// Cosine weighted instead of uniform hemisphere sampling
    pub use_importance_sampling: bool,
}

#[bon]
impl RenderSettings {
    #[builder]
    pub fn new(
        width: u32,
        height: u32,
        #[builder(default = 1)] samples_per_pixel: u32,
        #[builder(default = 0.8)] continuation_probability: FloatType,
        #[builder(default)] direct_lighting_only: bool,
        #[builder(default)] use_microfacet: bool,
        #[builder(default = true)] use_importance_sampling: bool,
    ) -> Result<Self, SettingsError> {
        let valid_side = |x: u32| (1..=MAX_RESOLUTION).contains(&x);
        if !valid_side(width) || !valid_side(height) {
            return Err(SettingsError::Resolution { width, height });
        }
        if samples_per_pixel == 0 {
            return Err(SettingsError::NoSamples);
        }
        if !(continuation_probability > 0.0 && continuation_probability <= 1.0) {
            return Err(SettingsError::ContinuationProbability(
                continuation_probability,
            ));
        }

        Ok(RenderSettings {
            width,
            height,
            samples_per_pixel,
            continuation_probability,
            direct_lighting_only,
            use_microfacet,
            use_importance_sampling,
        })
    }
}

impl RenderSettings {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn aspect_ratio(&self) -> FloatType {
        self.width as FloatType / self.height as FloatType
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};
    use test_case::test_case;

    #[test]
    fn defaults() {
        let_assert!(Ok(s) = RenderSettings::builder().width(4).height(2).build());
        assert!(s.samples_per_pixel == 1);
        assert!(s.continuation_probability == 0.8);
        assert!(!s.direct_lighting_only);
        assert!(!s.use_microfacet);
        assert!(s.use_importance_sampling);
        assert!(s.pixel_count() == 8);
        assert!(s.aspect_ratio() == 2.0);
    }

    #[test_case(0, 10 ; "zero_width")]
    #[test_case(10, 0 ; "zero_height")]
    #[test_case(MAX_RESOLUTION + 1, 10 ; "too_wide")]
    fn invalid_resolution(width: u32, height: u32) {
        let_assert!(
            Err(SettingsError::Resolution { .. }) =
                RenderSettings::builder().width(width).height(height).build()
        );
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-0.5 ; "negative")]
    #[test_case(1.5 ; "above_one")]
    #[test_case(f32::NAN ; "nan")]
    fn invalid_continuation_probability(p: f32) {
        let_assert!(
            Err(SettingsError::ContinuationProbability(_)) = RenderSettings::builder()
                .width(1)
                .height(1)
                .continuation_probability(p)
                .build()
        );
    }

    #[test]
    fn probability_one_is_valid() {
        assert!(
            RenderSettings::builder()
                .width(1)
                .height(1)
                .continuation_probability(1.0)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn no_samples() {
        assert!(
            RenderSettings::builder()
                .width(1)
                .height(1)
                .samples_per_pixel(0)
                .build()
                == Err(SettingsError::NoSamples)
        );
    }
}
