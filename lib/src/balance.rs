//! Top/bottom balanced selection of candidates.

use crate::params::SamplingParams;
use crate::sample::{Candidate, Sample, SampleSet};
use crate::source::PixelSource;
use log::debug;

/// Above this share of the pool a full sort beats quickselect plus sorting the prefix.
const FULL_SORT_SHARE: f32 = 0.75;

/// Splits `pool` into its `k` best candidates (ranked) and the rest (unordered).
pub fn select_top(mut pool: Vec<Candidate>, k: usize) -> (Vec<Candidate>, Vec<Candidate>) {
    if k == 0 {
        return (Vec::new(), pool);
    }

    if k >= pool.len() {
        pool.sort_by(Candidate::rank);
        return (pool, Vec::new());
    }

    if k as f32 >= pool.len() as f32 * FULL_SORT_SHARE {
        pool.sort_by(Candidate::rank);
    } else {
        pool.select_nth_unstable_by(k, Candidate::rank);
        pool[..k].sort_by(Candidate::rank);
    }

    let rest = pool.split_off(k);
    (pool, rest)
}

fn in_top_half(y: u32, height: u32) -> bool {
    (y as u64) * 2 < height as u64
}

/// Picks `desired` candidates, `round(desired * top_bottom_ratio)` of them from the top
/// half of the image and the remainder from the bottom half.
///
/// A half that cannot fill its quota is backfilled with the best leftovers of either
/// half. Returns the selection and the unselected candidates.
pub fn select_balanced(
    candidates: Vec<Candidate>,
    desired: usize,
    height: u32,
    top_bottom_ratio: f32,
) -> (Vec<Candidate>, Vec<Candidate>) {
    let (top, bottom): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| in_top_half(c.sample.y, height));

    let target_top = ((desired as f32 * top_bottom_ratio).round() as usize).min(desired);
    let target_bottom = desired - target_top;

    let (mut selected, top_rest) = select_top(top, target_top);
    let (bottom_selected, bottom_rest) = select_top(bottom, target_bottom);

    selected.extend(bottom_selected);

    let mut rest = top_rest;
    rest.extend(bottom_rest);

    if selected.len() < desired && !rest.is_empty() {
        debug!(
            "Balanced selection short by {}, backfilling from {} leftovers",
            desired - selected.len(),
            rest.len()
        );

        let (backfill, remaining) = select_top(rest, desired - selected.len());
        selected.extend(backfill);
        rest = remaining;
    }

    selected.truncate(desired);
    (selected, rest)
}

/// Fills `set` toward `target_count` with evenly strided pixels, honoring the
/// top/bottom ratio against what the set already holds.
pub fn balanced_uniform_fill(
    set: &mut SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) {
    let height = set.height();
    let missing = target_count.saturating_sub(set.len());

    if missing == 0 {
        return;
    }

    let have_top = set
        .samples()
        .iter()
        .filter(|s| in_top_half(s.y, height))
        .count();
    let want_top = (target_count as f32 * params.top_bottom_ratio).round() as usize;
    let need_top = want_top.saturating_sub(have_top).min(missing);
    let need_bottom = missing - need_top;

    let split = height.div_ceil(2);

    fill_rows(set, source, params, 0, split, need_top);
    fill_rows(set, source, params, split, height, need_bottom);
}

/// Adds up to `count` strided pixels from rows `y0..y1`.
fn fill_rows(
    set: &mut SampleSet,
    source: &dyn PixelSource,
    params: &SamplingParams,
    y0: u32,
    y1: u32,
    count: usize,
) {
    let width = set.width() as usize;
    let total = width * (y1.saturating_sub(y0)) as usize;

    if count == 0 || total == 0 {
        return;
    }

    let step = (total as f64 / count as f64).max(1.0);
    let mut added = 0;
    let mut position = step / 2.0;

    while added < count && (position as usize) < total {
        let i = position as usize;
        let (x, y) = ((i % width) as u32, y0 + (i / width) as u32);
        let color = source.color(x, y);

        if color.a >= params.alpha_threshold && set.push(Sample::new(x, y, color)) {
            added += 1;
        }

        position += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::source::PixelBuffer;

    fn candidate(x: u32, y: u32, importance: f32) -> Candidate {
        Candidate::new(Sample::new(x, y, Color::new(0.5, 0.5, 0.5, 1.0)), importance)
    }

    #[test]
    fn select_top_matches_full_sort() {
        let pool: Vec<_> = (0..200)
            .map(|i| candidate(i % 20, i / 20, ((i * 37) % 101) as f32 / 100.0))
            .collect();

        let mut sorted = pool.clone();
        sorted.sort_by(Candidate::rank);

        for k in [0, 1, 10, 149, 150, 199, 200, 500] {
            let (top, rest) = select_top(pool.clone(), k);
            assert_eq!(top, sorted[..k.min(200)].to_vec());
            assert_eq!(top.len() + rest.len(), 200);
        }
    }

    #[test]
    fn ratio_is_enforced() {
        let pool: Vec<_> = (0..100)
            .map(|i| candidate(i % 10, i / 10, if i < 50 { 0.9 } else { 0.2 }))
            .collect();

        let (selected, rest) = select_balanced(pool, 20, 10, 0.25);
        let top = selected.iter().filter(|c| c.sample.y < 5).count();

        assert_eq!(selected.len(), 20);
        assert_eq!(top, 5);
        assert_eq!(rest.len(), 80);
    }

    #[test]
    fn short_half_is_backfilled() {
        let mut pool: Vec<_> = (0..3).map(|x| candidate(x, 0, 0.5)).collect();
        pool.extend((0..30).map(|i| candidate(i % 10, 5 + i / 10, 0.3)));

        let (selected, _) = select_balanced(pool, 10, 10, 0.8);

        assert_eq!(selected.len(), 10);
        assert_eq!(selected.iter().filter(|c| c.sample.y < 5).count(), 3);
    }

    #[test]
    fn uniform_fill_respects_ratio() {
        let image = PixelBuffer::from_fn(10, 10, |_, _| Color::new(0.3, 0.6, 0.2, 1.0));
        let params = SamplingParams {
            top_bottom_ratio: 0.7,
            ..Default::default()
        };
        let mut set = SampleSet::new(10, 10);

        balanced_uniform_fill(&mut set, 20, &image, &params);

        assert_eq!(set.len(), 20);
        assert_eq!(set.samples().iter().filter(|s| s.y < 5).count(), 14);
    }
}
