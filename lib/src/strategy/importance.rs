use super::{finish, prepare, SamplingStrategy};
use crate::artifact;
use crate::balance;
use crate::collect;
use crate::color::Color;
use crate::error::Result;
use crate::params::SamplingParams;
use crate::sample::Sample;
use crate::source::PixelSource;
use log::debug;

/// Scored candidates, balanced between the image halves, then repaired.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImportanceSampler;

impl SamplingStrategy for ImportanceSampler {
    fn name(&self) -> &'static str {
        "importance"
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

        let candidates = collect::collect(
            source,
            width,
            height,
            target_count,
            params,
            dominant_colors,
        );
        debug!("Candidate pool of {} for {target_count} samples", candidates.len());

        let (selected, rest) =
            balance::select_balanced(candidates, target_count, height, params.top_bottom_ratio);

        let selected: Vec<Sample> = selected.into_iter().map(|c| c.sample).collect();
        let reserve: Vec<Sample> = rest.into_iter().map(|c| c.sample).collect();

        let samples = artifact::prevent_artifacts(
            selected,
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
