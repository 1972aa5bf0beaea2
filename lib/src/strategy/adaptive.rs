use super::uniform::stride_indices;
use super::{finish, prepare, SamplingStrategy};
use crate::artifact;
use crate::color::{Color, MAX_RGB_DISTANCE};
use crate::error::Result;
use crate::params::SamplingParams;
use crate::sample::{Sample, SampleSet};
use crate::source::PixelSource;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VIBRANT_SHARE: f32 = 0.4;
const UNIFORM_SHARE: f32 = 0.3;

/// Minimum `1 - distance / max_distance` for a pixel to match a dominant color.
const MIN_SIMILARITY: f32 = 0.85;

/// Multi-phase blend: vibrant pixels, a uniform stride, dominant color matches and a
/// seeded random fill.
#[derive(Copy, Clone, Debug, Default)]
pub struct AdaptiveSampler;

/// Scan step that visits roughly `4 * count` pixels.
pub(crate) fn coarse_stride(width: u32, height: u32, count: usize) -> u32 {
    let total = width as f64 * height as f64;
    (total / (count.max(1) as f64 * 4.0)).sqrt().floor().max(1.0) as u32
}

fn coarse_grid(width: u32, height: u32, stride: u32) -> impl Iterator<Item = (u32, u32)> {
    let stride = stride.max(1) as usize;
    (0..height)
        .step_by(stride)
        .flat_map(move |y| (0..width).step_by(stride).map(move |x| (x, y)))
}

fn vibrant_phase(
    set: &mut SampleSet,
    count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let stride = coarse_stride(width, height, count);

    let mut scored: Vec<(f32, Sample)> = coarse_grid(width, height, stride)
        .map(|(x, y)| Sample::at(source, x, y))
        .filter(|s| s.color.a >= params.alpha_threshold)
        .map(|s| (s.color.vibrance(), s))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let before = set.len();

    for (_, s) in scored {
        if set.len() - before >= count {
            break;
        }
        set.push(s);
    }

    set.len() - before
}

fn uniform_phase(
    set: &mut SampleSet,
    count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let width = set.width() as usize;
    let total = width * set.height() as usize;
    let before = set.len();

    for i in stride_indices(total, count) {
        let (x, y) = ((i % width) as u32, (i / width) as u32);
        let color = source.color(x, y);

        if color.a >= params.alpha_threshold {
            set.push(Sample::new(x, y, color));
        }
    }

    set.len() - before
}

fn dominant_phase(
    set: &mut SampleSet,
    count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
    dominant_colors: &[Color],
) -> usize {
    if dominant_colors.is_empty() || count == 0 {
        return 0;
    }

    let (width, height) = (set.width(), set.height());
    let stride = coarse_stride(width, height, count);
    let per_color = count / dominant_colors.len();
    let extra = count % dominant_colors.len();
    let before = set.len();

    for (n, dominant) in dominant_colors.iter().enumerate() {
        let quota = per_color + usize::from(n < extra);

        let mut matches: Vec<(f32, Sample)> = coarse_grid(width, height, stride)
            .filter(|&(x, y)| !set.contains(x, y))
            .map(|(x, y)| Sample::at(source, x, y))
            .filter(|s| s.color.a >= params.alpha_threshold)
            .map(|s| (s.color.distance(dominant), s))
            .filter(|(d, _)| 1.0 - d / MAX_RGB_DISTANCE >= MIN_SIMILARITY)
            .collect();

        matches.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, s) in matches.into_iter().take(quota) {
            set.push(s);
        }
    }

    set.len() - before
}

/// Seeded random draws of unused, visible pixels, capped at `2 * total` attempts.
fn random_phase(
    set: &mut SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
    rng: &mut StdRng,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let max_attempts = width as usize * height as usize * 2;
    let before = set.len();
    let mut attempts = 0;

    while set.len() < target_count && attempts < max_attempts {
        attempts += 1;
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);

        if set.contains(x, y) {
            continue;
        }

        let color = source.color(x, y);

        if color.a >= params.alpha_threshold {
            set.push(Sample::new(x, y, color));
        }
    }

    set.len() - before
}

impl SamplingStrategy for AdaptiveSampler {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn sample(
        &self,
        width: u32,
        height: u32,
        target_count: usize,
        params: &SamplingParams,
        source: &dyn PixelSource,
        dominant_colors: &[Color],
    ) -> Result<Vec<Sample>> {
        if let Some(all) = prepare(width, height, target_count, params, source)? {
            return Ok(all);
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut set = SampleSet::new(width, height);

        let vibrant_quota = (target_count as f32 * VIBRANT_SHARE).round() as usize;
        let uniform_quota = (target_count as f32 * UNIFORM_SHARE).round() as usize;

        let vibrant = vibrant_phase(&mut set, vibrant_quota, source, params);
        let uniform = uniform_phase(&mut set, uniform_quota, source, params);
        let remaining = target_count.saturating_sub(set.len());
        let dominant = dominant_phase(
            &mut set,
            remaining,
            source,
            params,
            dominant_colors,
        );
        let random = random_phase(&mut set, target_count, source, params, &mut rng);

        debug!(
            "Adaptive phases: {vibrant} vibrant, {uniform} uniform, {dominant} dominant, {random} random"
        );

        artifact::reconcile_count(&mut set, target_count, source, params);
        finish(self.name(), set.into_samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PixelBuffer;

    fn scene() -> PixelBuffer {
        PixelBuffer::from_fn(32, 24, |x, y| {
            if x < 8 {
                Color::new(0.9, 0.2, 0.1, 1.0)
            } else {
                let v = ((x * 3 + y * 5) % 11) as f32 / 10.0;
                Color::new(v * 0.5, v * 0.5, v * 0.6, 1.0)
            }
        })
    }

    #[test]
    fn favors_vibrant_pixels() {
        let image = scene();
        let params = SamplingParams::default();
        let samples = AdaptiveSampler
            .sample(32, 24, 60, &params, &image, &[])
            .unwrap();

        let vivid = samples.iter().filter(|s| s.x < 8).count();
        assert_eq!(samples.len(), 60);
        assert!(vivid >= 24);
    }

    #[test]
    fn matches_dominant_colors() {
        let image = scene();
        let params = SamplingParams::default();
        let mut set = SampleSet::new(32, 24);
        let red = Color::new(0.9, 0.2, 0.1, 1.0);

        let added = dominant_phase(&mut set, 10, &image, &params, &[red]);

        assert_eq!(added, 10);
        assert!(set.samples().iter().all(|s| s.x < 8));
    }

    #[test]
    fn same_seed_same_samples() {
        let image = scene();
        let params = SamplingParams::default().with_seed(42);
        let a = AdaptiveSampler.sample(32, 24, 100, &params, &image, &[]).unwrap();
        let b = AdaptiveSampler.sample(32, 24, 100, &params, &image, &[]).unwrap();
        assert_eq!(a, b);
    }
}
