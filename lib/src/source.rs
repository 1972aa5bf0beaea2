use crate::color::Color;

/// Read access to a decoded image, answering color-at-coordinate queries.
pub trait PixelSource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Premultiplied color at `(x, y)`. Callers keep coordinates in bounds.
    fn color(&self, x: u32, y: u32) -> Color;

    /// Pushes the in-bounds 8-connected ring at distance `radius` around `(x, y)` into `out`.
    fn neighbors_into(&self, x: u32, y: u32, radius: u32, out: &mut Vec<Color>) {
        const OFFSETS: [(i64, i64); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];

        let r = radius.max(1) as i64;

        for (dx, dy) in OFFSETS {
            let nx = x as i64 + dx * r;
            let ny = y as i64 + dy * r;

            if nx >= 0 && ny >= 0 && nx < self.width() as i64 && ny < self.height() as i64 {
                out.push(self.color(nx as u32, ny as u32));
            }
        }
    }
}

/// Flat, premultiplied pixel cache.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl PixelBuffer {
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> Color,
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);

        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }

        PixelBuffer {
            width,
            height,
            pixels,
        }
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }
}

impl PixelSource for PixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color(&self, x: u32, y: u32) -> Color {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

impl From<&image::DynamicImage> for PixelBuffer {
    fn from(img: &image::DynamicImage) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();

        PixelBuffer {
            width,
            height,
            pixels: rgba.pixels().map(|p| Color::from(*p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_are_clipped_at_the_border() {
        let buffer = PixelBuffer::from_fn(4, 4, |x, y| {
            Color::new(x as f32 / 3.0, y as f32 / 3.0, 0.0, 1.0)
        });
        let mut out = Vec::new();

        buffer.neighbors_into(0, 0, 1, &mut out);
        assert_eq!(out.len(), 3);

        out.clear();
        buffer.neighbors_into(1, 1, 1, &mut out);
        assert_eq!(out.len(), 8);

        out.clear();
        buffer.neighbors_into(1, 1, 2, &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn image_conversion_premultiplies() {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 255, 255, 0]));

        let buffer = PixelBuffer::from(&image::DynamicImage::ImageRgba8(img));
        assert_eq!(buffer.color(0, 0), Color::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(buffer.color(1, 0).a, 0.0);
        assert_eq!(buffer.color(1, 0).r, 0.0);
    }
}
