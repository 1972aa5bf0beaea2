use serde::{Deserialize, Serialize};
use std::fmt;

/// Alpha below which a pixel counts as fully transparent when un-premultiplying.
const MIN_ALPHA: f32 = 1.0e-6;

/// Largest possible Euclidean distance between two RGB colors in the unit cube.
pub const MAX_RGB_DISTANCE: f32 = 1.732_050_8;

/// Alpha-premultiplied RGBA color with channels in [0, 1].
#[derive(Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Color::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Builds a premultiplied color from straight (non-premultiplied) channels.
    pub fn from_straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let a = sanitize(a);
        Color::new(sanitize(r) * a, sanitize(g) * a, sanitize(b) * a, a)
    }

    /// Returns the straight RGB channels, dividing out alpha.
    ///
    /// Fully transparent pixels un-premultiply to black.
    pub fn unpremultiply(&self) -> Color {
        let a = sanitize(self.a);

        if a >= 1.0 {
            return Color::new(sanitize(self.r), sanitize(self.g), sanitize(self.b), 1.0);
        }

        if a < MIN_ALPHA {
            return Color::new(0.0, 0.0, 0.0, a);
        }

        Color::new(
            (sanitize(self.r) / a).min(1.0),
            (sanitize(self.g) / a).min(1.0),
            (sanitize(self.b) / a).min(1.0),
            a,
        )
    }

    /// Mean of the straight RGB channels.
    pub fn brightness(&self) -> f32 {
        let c = self.unpremultiply();
        (c.r + c.g + c.b) / 3.0
    }

    /// HSV-style saturation: `(max - min) / max`.
    pub fn saturation(&self) -> f32 {
        let c = self.unpremultiply();
        let max = c.r.max(c.g.max(c.b));
        let min = c.r.min(c.g.min(c.b));

        if max <= 0.0 {
            return 0.0;
        }

        (max - min) / max
    }

    /// Distance of the straight color from its own channel mean.
    pub fn colorfulness(&self) -> f32 {
        let c = self.unpremultiply();
        let mean = (c.r + c.g + c.b) / 3.0;
        let (dr, dg, db) = (c.r - mean, c.g - mean, c.b - mean);
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Brightness times saturation, the "vividness" used by the vibrance-driven strategies.
    pub fn vibrance(&self) -> f32 {
        self.brightness() * self.saturation()
    }

    /// Euclidean distance between the straight RGB channels of two colors.
    pub fn distance(&self, other: &Self) -> f32 {
        let a = self.unpremultiply();
        let b = other.unpremultiply();
        let (dr, dg, db) = (a.r - b.r, a.g - b.g, a.b - b.b);
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Color")
            .field(&self.r)
            .field(&self.g)
            .field(&self.b)
            .field(&self.a)
            .finish()
    }
}

impl From<image::Rgba<f32>> for Color {
    fn from(p: image::Rgba<f32>) -> Self {
        Color::from_straight(p[0], p[1], p[2], p[3])
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(p: image::Rgba<u8>) -> Self {
        Color::from_straight(
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        )
    }
}

/// Maps NaN to zero and clamps into [0, 1]. Also folds negative zero into zero.
pub fn sanitize(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0) + 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiply_divides_out_alpha() {
        let c = Color::new(0.25, 0.5, 0.0, 0.5).unpremultiply();
        assert!((c.r - 0.5).abs() < 1e-6);
        assert!((c.g - 1.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
    }

    #[test]
    fn transparent_unpremultiplies_to_black() {
        let c = Color::new(0.3, 0.3, 0.3, 0.0).unpremultiply();
        assert_eq!((c.r, c.g, c.b), (0.0, 0.0, 0.0));
    }

    #[test]
    fn saturation_of_grey_is_zero() {
        let grey = Color::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(grey.saturation(), 0.0);
        assert!(grey.colorfulness() < 1e-6);
        assert_eq!(Color::new(0.0, 0.0, 0.0, 1.0).saturation(), 0.0);
    }

    #[test]
    fn pure_red_is_fully_saturated() {
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        assert!((red.saturation() - 1.0).abs() < 1e-6);
        assert!(red.colorfulness() > 0.8);
    }

    #[test]
    fn sanitize_handles_nan_and_negative_zero() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert!(sanitize(-0.0).is_sign_positive());
        assert_eq!(sanitize(2.0), 1.0);
    }
}
