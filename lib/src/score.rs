//! Importance scoring of single pixels.
//!
//! Saturation here is the distance-from-mean form ([`Color::colorfulness`]). The
//! vibrance-driven strategies (uniform vivid pass, adaptive, advanced family) use the
//! HSV form ([`Color::saturation`]) instead; each family sticks to its own.

use crate::color::Color;
use crate::params::SamplingParams;

/// Brightness above which a flat pixel starts to count as background.
const BACKGROUND_BRIGHTNESS: f32 = 0.8;

/// Saturation below which a bright pixel starts to count as background.
const BACKGROUND_SATURATION: f32 = 0.2;

const UNIQUENESS_WEIGHT: f32 = 0.3;

const PENALTY_WEIGHT: f32 = 2.0;

/// Brings the weighted sum of the default weights roughly into [0, 1].
const NORMALIZATION: f32 = 0.8;

/// Mean straight-RGB distance between `color` and its neighbors.
pub fn local_contrast(color: &Color, neighbors: &[Color]) -> f32 {
    if neighbors.is_empty() {
        return 0.0;
    }

    neighbors.iter().map(|n| color.distance(n)).sum::<f32>() / neighbors.len() as f32
}

/// Distance to the closest dominant color, or 1 when none are known.
pub fn uniqueness(color: &Color, dominant_colors: &[Color]) -> f32 {
    dominant_colors
        .iter()
        .map(|d| color.distance(d))
        .min_by(f32::total_cmp)
        .unwrap_or(1.0)
}

/// Penalty for bright, flat pixels that are most likely background.
pub fn background_penalty(brightness: f32, saturation: f32) -> f32 {
    if brightness > BACKGROUND_BRIGHTNESS && saturation < BACKGROUND_SATURATION {
        (brightness - BACKGROUND_BRIGHTNESS) / (1.0 - BACKGROUND_BRIGHTNESS) * (1.0 - saturation)
    } else {
        0.0
    }
}

/// Scores a pixel in [0, 1] from its contrast against `neighbors`, its saturation and
/// how far it sits from the dominant colors.
///
/// Pixels below the params' alpha threshold score 0.
pub fn importance(
    color: &Color,
    neighbors: &[Color],
    params: &SamplingParams,
    dominant_colors: &[Color],
) -> f32 {
    if color.a < params.alpha_threshold {
        return 0.0;
    }

    let contrast = local_contrast(color, neighbors);
    let saturation = color.colorfulness();
    let penalty = background_penalty(color.brightness(), saturation);

    let score = params.contrast_weight * contrast
        + params.saturation_weight * saturation
        + UNIQUENESS_WEIGHT * uniqueness(color, dominant_colors)
        - PENALTY_WEIGHT * penalty;

    let score = score * NORMALIZATION;

    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    const GREY: Color = Color::new(0.5, 0.5, 0.5, 1.0);

    #[test]
    fn transparent_pixels_score_zero() {
        let params = SamplingParams::default();
        let clear = Color::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(importance(&clear, &[WHITE; 8], &params, &[]), 0.0);
    }

    #[test]
    fn edges_outscore_flat_regions() {
        let params = SamplingParams::default();
        let flat = importance(&GREY, &[GREY; 8], &params, &[GREY]);
        let edge = importance(&GREY, &[WHITE; 8], &params, &[GREY]);
        assert!(edge > flat);
    }

    #[test]
    fn white_background_is_suppressed() {
        let params = SamplingParams::default();
        assert_eq!(importance(&WHITE, &[WHITE; 8], &params, &[]), 0.0);
        assert!(importance(&RED, &[RED; 8], &params, &[]) > 0.0);
    }

    #[test]
    fn uniqueness_defaults_to_one() {
        assert_eq!(uniqueness(&RED, &[]), 1.0);
        assert_eq!(uniqueness(&RED, &[RED, WHITE]), 0.0);
    }

    #[test]
    fn penalty_only_applies_to_bright_flat_pixels() {
        assert_eq!(background_penalty(0.5, 0.0), 0.0);
        assert_eq!(background_penalty(0.95, 0.5), 0.0);
        assert!((background_penalty(1.0, 0.0) - 1.0).abs() < 1e-6);
    }
}
