use super::{finish, prepare, SamplingStrategy};
use crate::artifact;
use crate::balance;
use crate::collect;
use crate::color::Color;
use crate::error::Result;
use crate::params::SamplingParams;
use crate::sample::{Candidate, Sample, SampleSet};
use crate::source::PixelSource;
use log::debug;

const HIGH_TIER_FACTOR: f32 = 1.5;
const MIDDLE_TIER_FACTOR: f32 = 0.5;

/// Tiered importance: a strict tier above 1.5x the threshold, an equally sized relaxed
/// tier above 0.5x, then a balanced uniform fill.
#[derive(Copy, Clone, Debug, Default)]
pub struct HybridSampler;

/// Adds up to `count` unused candidates scoring strictly above `threshold`.
#[allow(clippy::too_many_arguments)]
fn draw_tier(
    set: &mut SampleSet,
    count: usize,
    threshold: f32,
    stride: u32,
    source: &dyn PixelSource,
    params: &SamplingParams,
    dominant_colors: &[Color],
    reserve: &mut Vec<Candidate>,
) -> usize {
    if count == 0 {
        return 0;
    }

    let limit = count.saturating_mul(2).saturating_add(set.len());

    let candidates: Vec<Candidate> = collect::scan_above(
        source,
        set.width(),
        set.height(),
        stride,
        threshold,
        params,
        dominant_colors,
        limit,
    )
    .into_iter()
    .filter(|c| !set.contains(c.sample.x, c.sample.y))
    .collect();

    let (selected, rest) =
        balance::select_balanced(candidates, count, set.height(), params.top_bottom_ratio);

    let before = set.len();

    for c in selected {
        set.push(c.sample);
    }

    reserve.extend(rest);
    set.len() - before
}

impl SamplingStrategy for HybridSampler {
    fn name(&self) -> &'static str {
        "hybrid"
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

        let stride = collect::scan_stride(width, height);
        let tier_count =
            ((target_count as f32 * params.important_sampling_ratio).round() as usize)
                .min(target_count);

        let mut set = SampleSet::new(width, height);
        let mut reserve = Vec::new();

        let high = draw_tier(
            &mut set,
            tier_count,
            params.importance_threshold * HIGH_TIER_FACTOR,
            stride,
            source,
            params,
            dominant_colors,
            &mut reserve,
        );

        let middle_count = tier_count.min(target_count - set.len());
        let middle = draw_tier(
            &mut set,
            middle_count,
            params.importance_threshold * MIDDLE_TIER_FACTOR,
            stride,
            source,
            params,
            dominant_colors,
            &mut reserve,
        );

        let before_fill = set.len();
        balance::balanced_uniform_fill(&mut set, target_count, source, params);

        debug!(
            "Hybrid tiers: {high} high, {middle} middle, {} uniform",
            set.len() - before_fill
        );

        let reserve: Vec<Sample> = reserve
            .into_iter()
            .map(|c| c.sample)
            .filter(|s| !set.contains(s.x, s.y))
            .collect();

        let samples = artifact::prevent_artifacts(
            set.into_samples(),
            &reserve,
            width,
            height,
            target_count,
            source,
            params,
        );

        finish(self.name(), samples)
    }
}
