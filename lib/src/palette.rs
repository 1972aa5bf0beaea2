use crate::collect::scan_stride;
use crate::color::Color;
use crate::source::PixelSource;
use std::collections::HashMap;

/// Quantization levels per channel (4 bits).
const LEVELS: f32 = 15.0;

/// Pixels with less alpha do not vote.
const MIN_ALPHA: f32 = 0.5;

fn bin(color: &Color) -> u16 {
    let c = color.unpremultiply();
    let q = |v: f32| (v * LEVELS).round() as u16;
    (q(c.r) << 8) | (q(c.g) << 4) | q(c.b)
}

/// The `k` most frequent colors of `source`, as the mean of each populated
/// 4-bit-per-channel bin.
pub fn dominant_colors(source: &dyn PixelSource, k: usize) -> Vec<Color> {
    let (width, height) = (source.width(), source.height());
    let stride = scan_stride(width, height) as usize;
    let mut bins: HashMap<u16, ([f32; 3], usize)> = HashMap::new();

    for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            let color = source.color(x, y);

            if color.a < MIN_ALPHA {
                continue;
            }

            let c = color.unpremultiply();
            let entry = bins.entry(bin(&color)).or_insert(([0.0; 3], 0));
            entry.0[0] += c.r;
            entry.0[1] += c.g;
            entry.0[2] += c.b;
            entry.1 += 1;
        }
    }

    let mut ranked: Vec<_> = bins.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .1.cmp(&a.1 .1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(k)
        .map(|(_, (sum, n))| {
            let n = n as f32;
            Color::from_straight(sum[0] / n, sum[1] / n, sum[2] / n, 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PixelBuffer;

    #[test]
    fn most_common_color_comes_first() {
        let image = PixelBuffer::from_fn(10, 10, |x, _| {
            if x < 7 {
                Color::new(0.0, 0.0, 1.0, 1.0)
            } else {
                Color::new(1.0, 0.0, 0.0, 1.0)
            }
        });

        let colors = dominant_colors(&image, 3);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0], Color::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(colors[1], Color::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn transparent_pixels_do_not_vote() {
        let image = PixelBuffer::from_fn(4, 4, |_, _| Color::transparent());
        assert!(dominant_colors(&image, 4).is_empty());
    }
}
