use crate::sample::Sample;
use std::path;
use svg::node::element::{Circle, Rectangle};
use svg::Document;

fn fill(sample: &Sample) -> String {
    let c = sample.color.unpremultiply();
    let to_byte = |v: f32| (v * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", to_byte(c.r), to_byte(c.g), to_byte(c.b))
}

fn draw_samples(document: Document, samples: &[Sample], radius: f64) -> Document {
    let mut document = document;

    for sample in samples {
        document = document.add(
            Circle::new()
                .set("fill", fill(sample))
                .set("fill-opacity", sample.color.a)
                .set("cx", sample.x as f64 + 0.5)
                .set("cy", sample.y as f64 + 0.5)
                .set("r", radius),
        );
    }

    document
}

/// Renders `samples` as colored dots on a dark canvas of the image's size.
pub fn document(samples: &[Sample], width: u32, height: u32) -> Document {
    let area = width as f64 * height as f64;
    let radius = (0.35 * (area / samples.len().max(1) as f64).sqrt()).clamp(0.5, 4.0);

    let background = Rectangle::new()
        .set("width", width)
        .set("height", height)
        .set("fill", "#111111");

    let document = Document::new()
        .set("viewBox", (0, 0, width, height))
        .add(background);

    draw_samples(document, samples, radius)
}

pub fn write_samples(
    filename: &path::Path,
    samples: &[Sample],
    width: u32,
    height: u32,
) -> std::io::Result<()> {
    svg::save(filename, &document(samples, width, height))
}
