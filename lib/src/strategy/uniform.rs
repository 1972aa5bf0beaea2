use super::{finish, prepare, SamplingStrategy};
use crate::color::Color;
use crate::error::Result;
use crate::params::SamplingParams;
use crate::sample::{Sample, SampleSet};
use crate::source::PixelSource;
use log::debug;

const VIVID_BRIGHTNESS: f32 = 0.6;
const VIVID_SATURATION: f32 = 0.3;

/// At most one in this many stride samples is swapped for a vivid pixel.
const VIVID_SHARE: usize = 8;

/// Evenly strided walk over the flattened pixel index.
#[derive(Copy, Clone, Debug)]
pub struct UniformSampler {
    /// Swap some stride samples for bright, saturated pixels the stride skipped.
    pub vivid_pass: bool,
}

impl Default for UniformSampler {
    fn default() -> Self {
        UniformSampler { vivid_pass: true }
    }
}

/// Every pixel in row-major order.
pub fn all_pixels(width: u32, height: u32, source: &dyn PixelSource) -> Vec<Sample> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| Sample::at(source, x, y))
        .collect()
}

/// `count` flattened indices spread evenly over `0..total`, first and last included.
pub fn stride_indices(total: usize, count: usize) -> Vec<usize> {
    if total == 0 || count == 0 {
        return Vec::new();
    }

    if count == 1 {
        return vec![0];
    }

    let step = (total - 1) as f64 / (count - 1) as f64;

    (0..count)
        .map(|i| ((i as f64 * step).round() as usize).min(total - 1))
        .collect()
}

fn is_vivid(color: &Color) -> bool {
    color.brightness() > VIVID_BRIGHTNESS && color.saturation() > VIVID_SATURATION
}

fn vivid_pass(set: &mut SampleSet, target_count: usize, source: &dyn PixelSource) -> usize {
    if target_count < 3 {
        return 0;
    }

    let (width, height) = (set.width(), set.height());
    let total = width as usize * height as usize;
    let scan_step = (total / (target_count * 4)).max(1);
    let limit = target_count / VIVID_SHARE;

    let vivid: Vec<Sample> = (0..total)
        .step_by(scan_step)
        .map(|i| Sample::at(source, (i % width as usize) as u32, (i / width as usize) as u32))
        .filter(|s| !set.contains(s.x, s.y) && is_vivid(&s.color))
        .take(limit)
        .collect();

    if vivid.is_empty() {
        return 0;
    }

    // Interior positions only, the first and last stride samples stay.
    let mut samples = std::mem::replace(set, SampleSet::new(width, height)).into_samples();
    let interior = samples.len() - 2;

    for (j, s) in vivid.iter().enumerate() {
        let position = 1 + (j * interior) / vivid.len() + interior / (2 * vivid.len());
        samples[position.min(interior)] = *s;
    }

    *set = SampleSet::from_samples(width, height, samples);
    vivid.len()
}

impl SamplingStrategy for UniformSampler {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn sample(
        &self,
        width: u32,
        height: u32,
        target_count: usize,
        params: &SamplingParams,
        source: &dyn PixelSource,
        _dominant_colors: &[Color],
    ) -> Result<Vec<Sample>> {
        if let Some(all) = prepare(width, height, target_count, params, source)? {
            return Ok(all);
        }

        let total = width as usize * height as usize;
        let mut set = SampleSet::new(width, height);

        for i in stride_indices(total, target_count) {
            set.push(Sample::at(
                source,
                (i % width as usize) as u32,
                (i / width as usize) as u32,
            ));
        }

        if self.vivid_pass {
            let swapped = vivid_pass(&mut set, target_count, source);
            debug!("Vivid pass swapped in {swapped} samples");
        }

        let mut samples = set.into_samples();
        samples.truncate(target_count);
        finish(self.name(), samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PixelBuffer;

    #[test]
    fn stride_covers_both_ends() {
        assert_eq!(stride_indices(100, 50).first(), Some(&0));
        assert_eq!(stride_indices(100, 50).last(), Some(&99));
        assert_eq!(stride_indices(10, 1), vec![0]);
        assert_eq!(stride_indices(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stride_indices_are_unique() {
        let indices = stride_indices(1000, 333);
        assert_eq!(indices.len(), 333);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn vivid_pixels_get_swapped_in() {
        // Grey everywhere except one yellow pixel the stride would miss.
        let image = PixelBuffer::from_fn(20, 20, |x, y| {
            if (x, y) == (8, 13) {
                Color::new(1.0, 1.0, 0.0, 1.0)
            } else {
                Color::new(0.4, 0.4, 0.4, 1.0)
            }
        });
        let params = SamplingParams::default();

        let plain = UniformSampler { vivid_pass: false }
            .sample(20, 20, 40, &params, &image, &[])
            .unwrap();
        assert!(!plain.iter().any(|s| (s.x, s.y) == (8, 13)));

        let vivid = UniformSampler::default()
            .sample(20, 20, 40, &params, &image, &[])
            .unwrap();
        assert_eq!(vivid.len(), 40);
        assert!(vivid.iter().any(|s| (s.x, s.y) == (8, 13)));
        assert_eq!((vivid[0].x, vivid[0].y), (0, 0));
        assert_eq!((vivid[39].x, vivid[39].y), (19, 19));
    }
}
