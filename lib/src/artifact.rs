//! Detection and repair of coverage gaps, empty corners and clumping.

use crate::params::SamplingParams;
use crate::sample::{Candidate, Sample, SampleSet};
use crate::source::PixelSource;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Cells per side of the coverage grid.
pub const COVERAGE_GRID: u32 = 4;

/// Minimum fraction of occupied coverage cells.
pub const MIN_COVERAGE: f32 = 0.85;

/// Fraction of the image width/height covered by each corner box.
pub const CORNER_MARGIN: f32 = 0.1;

/// Neighbors within the clustering distance that make a sample "clustered".
pub const CLUSTER_NEIGHBORS: usize = 3;

/// Fraction of clustered samples above which the set gets resampled.
pub const MAX_CLUSTERED_FRACTION: f32 = 0.1;

/// Salt mixed into the seed for the random part of count reconciliation.
const RECONCILE_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn all() -> [Corner; 4] {
        [
            Corner::TopLeft,
            Corner::TopRight,
            Corner::BottomLeft,
            Corner::BottomRight,
        ]
    }

    /// Half-open pixel box `(x0, y0, x1, y1)` of this corner's margin.
    pub fn bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let mw = ((width as f32 * CORNER_MARGIN) as u32).clamp(1, width);
        let mh = ((height as f32 * CORNER_MARGIN) as u32).clamp(1, height);

        match self {
            Corner::TopLeft => (0, 0, mw, mh),
            Corner::TopRight => (width - mw, 0, width, mh),
            Corner::BottomLeft => (0, height - mh, mw, height),
            Corner::BottomRight => (width - mw, height - mh, width, height),
        }
    }

    pub fn contains(&self, width: u32, height: u32, x: u32, y: u32) -> bool {
        let (x0, y0, x1, y1) = self.bounds(width, height);
        x >= x0 && x < x1 && y >= y0 && y < y1
    }
}

fn grid_dims(width: u32, height: u32) -> (u32, u32) {
    (COVERAGE_GRID.min(width), COVERAGE_GRID.min(height))
}

fn cell_of(width: u32, height: u32, x: u32, y: u32) -> usize {
    let (cols, rows) = grid_dims(width, height);
    let cx = (x as u64 * cols as u64 / width as u64) as u32;
    let cy = (y as u64 * rows as u64 / height as u64) as u32;
    (cy.min(rows - 1) * cols + cx.min(cols - 1)) as usize
}

fn cell_counts(samples: &[Sample], width: u32, height: u32) -> Vec<usize> {
    let (cols, rows) = grid_dims(width, height);
    let mut counts = vec![0; (cols * rows) as usize];

    for s in samples {
        counts[cell_of(width, height, s.x, s.y)] += 1;
    }

    counts
}

/// Fraction of the 4x4 coverage cells holding at least one sample.
pub fn coverage_ratio(samples: &[Sample], width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 {
        return 0.0;
    }

    let counts = cell_counts(samples, width, height);
    counts.iter().filter(|&&n| n > 0).count() as f32 / counts.len() as f32
}

pub fn uncovered_corners(samples: &[Sample], width: u32, height: u32) -> Vec<Corner> {
    Corner::all()
        .into_iter()
        .filter(|corner| {
            !samples
                .iter()
                .any(|s| corner.contains(width, height, s.x, s.y))
        })
        .collect()
}

pub fn has_corner_coverage(samples: &[Sample], width: u32, height: u32) -> bool {
    uncovered_corners(samples, width, height).is_empty()
}

/// Neighbor distance for the clustering check when none is configured.
pub fn default_clustering_distance(width: u32, height: u32, count: usize) -> f32 {
    let area = width as f32 * height as f32;
    (0.5 * (area / count.max(1) as f32).sqrt()).max(1.0)
}

/// Spatial hash over integer positions with a fixed cell size.
struct SpatialHash {
    cell: f32,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialHash {
    fn new(cell: f32) -> Self {
        SpatialHash {
            cell: cell.max(1.0),
            cells: HashMap::new(),
        }
    }

    fn key(&self, s: &Sample) -> (i64, i64) {
        (
            (s.x as f32 / self.cell) as i64,
            (s.y as f32 / self.cell) as i64,
        )
    }

    fn insert(&mut self, s: &Sample, index: usize) {
        let key = self.key(s);
        self.cells.entry(key).or_default().push(index);
    }

    /// Indices stored in the cell of `s` and the eight cells around it.
    fn around<'a>(&'a self, s: &Sample) -> impl Iterator<Item = usize> + 'a {
        let (kx, ky) = self.key(s);

        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (kx + dx, ky + dy)))
            .filter_map(move |key| self.cells.get(&key))
            .flatten()
            .copied()
    }
}

/// Share of samples with at least [`CLUSTER_NEIGHBORS`] others closer than `distance`.
pub fn clustering_fraction(samples: &[Sample], distance: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut hash = SpatialHash::new(distance * 3.0);

    for (i, s) in samples.iter().enumerate() {
        hash.insert(s, i);
    }

    let threshold = distance * distance;
    let clustered = samples
        .iter()
        .enumerate()
        .filter(|&(i, s)| {
            hash.around(s)
                .filter(|&j| j != i && samples[j].distance_squared(s) < threshold)
                .take(CLUSTER_NEIGHBORS)
                .count()
                >= CLUSTER_NEIGHBORS
        })
        .count();

    clustered as f32 / samples.len() as f32
}

pub fn is_clustered(samples: &[Sample], distance: f32) -> bool {
    clustering_fraction(samples, distance) > MAX_CLUSTERED_FRACTION
}

/// Drops candidates that would join [`CLUSTER_NEIGHBORS`] or more stronger candidates
/// within `distance`. The result is ordered by descending importance.
pub fn thin_clusters(mut candidates: Vec<Candidate>, distance: f32) -> Vec<Candidate> {
    candidates.sort_by(Candidate::rank);

    let threshold = distance * distance;
    let mut hash = SpatialHash::new(distance);
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for c in candidates {
        let crowded = hash
            .around(&c.sample)
            .filter(|&j| kept[j].sample.distance_squared(&c.sample) < threshold)
            .take(CLUSTER_NEIGHBORS)
            .count()
            >= CLUSTER_NEIGHBORS;

        if !crowded {
            hash.insert(&c.sample, kept.len());
            kept.push(c);
        }
    }

    kept
}

fn stratum_weight(s: &Sample) -> f32 {
    let w = s.color.a * (s.color.r + s.color.g + s.color.b) / 3.0;
    if w.is_nan() {
        0.0
    } else {
        w.max(0.0)
    }
}

/// Reselects up to `target_count` samples spread over `band_count` horizontal bands.
///
/// Each band gets a quota proportional to its summed `alpha * brightness` (or its size
/// when the image is black), and inside a band the picks are spread evenly over the
/// samples ordered by that weight. Unused quota is refilled from the leftovers. The
/// output never repeats an input position and depends only on the inputs.
pub fn stratified_resample(
    samples: &[Sample],
    target_count: usize,
    image_height: u32,
    band_count: usize,
) -> Vec<Sample> {
    if samples.is_empty() || target_count == 0 || band_count == 0 || image_height == 0 {
        return Vec::new();
    }

    let band_height = image_height.div_ceil(band_count as u32).max(1);
    let mut bands: Vec<Vec<Sample>> = vec![Vec::new(); band_count];
    let mut weights = vec![0.0f32; band_count];

    let mut seen = HashSet::with_capacity(samples.len());

    for s in samples {
        if !seen.insert((s.x, s.y)) {
            continue;
        }

        let band = ((s.y / band_height) as usize).min(band_count - 1);
        weights[band] += stratum_weight(s);
        bands[band].push(*s);
    }

    let mut total: f32 = weights.iter().sum();

    if total <= 0.0 {
        for (w, band) in weights.iter_mut().zip(&bands) {
            *w = band.len() as f32;
        }
        total = weights.iter().sum();
    }

    if total <= 0.0 {
        return Vec::new();
    }

    let mut quota: Vec<usize> = weights
        .iter()
        .map(|w| (w / total * target_count as f32) as usize)
        .collect();

    let mut order: Vec<usize> = (0..band_count).filter(|&b| !bands[b].is_empty()).collect();
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]).then(a.cmp(&b)));

    let mut assigned: usize = quota.iter().sum();
    let mut next = 0;

    while assigned < target_count {
        quota[order[next % order.len()]] += 1;
        assigned += 1;
        next += 1;
    }

    for band in bands.iter_mut() {
        band.sort_by(|a, b| {
            stratum_weight(b)
                .total_cmp(&stratum_weight(a))
                .then_with(|| (a.y, a.x).cmp(&(b.y, b.x)))
        });
    }

    let limit = target_count.min(seen.len());
    let mut chosen: Vec<Vec<bool>> = bands.iter().map(|b| vec![false; b.len()]).collect();
    let mut out = Vec::with_capacity(limit);

    for (b, band) in bands.iter().enumerate() {
        if band.is_empty() || quota[b] == 0 {
            continue;
        }

        let step = (band.len() / quota[b]).max(1);
        let mut taken = 0;
        let mut j = 0;

        while j < band.len() && taken < quota[b] && out.len() < limit {
            out.push(band[j]);
            chosen[b][j] = true;
            taken += 1;
            j += step;
        }
    }

    'refill: for (b, band) in bands.iter().enumerate() {
        for (j, s) in band.iter().enumerate() {
            if out.len() >= limit {
                break 'refill;
            }

            if !chosen[b][j] {
                out.push(*s);
                chosen[b][j] = true;
            }
        }
    }

    out
}

fn eligible(source: &dyn PixelSource, x: u32, y: u32, alpha: f32) -> bool {
    source.color(x, y).a >= alpha
}

/// Removes one sample from the most crowded coverage cell, never emptying a cell or
/// the last sample of a corner box. Returns false when nothing can go.
fn evict_one(set: &mut SampleSet) -> bool {
    let (width, height) = (set.width(), set.height());
    let counts = cell_counts(set.samples(), width, height);

    let mut cells: Vec<usize> = (0..counts.len()).filter(|&c| counts[c] > 1).collect();
    cells.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

    let corner_counts: Vec<usize> = Corner::all()
        .iter()
        .map(|corner| {
            set.samples()
                .iter()
                .filter(|s| corner.contains(width, height, s.x, s.y))
                .count()
        })
        .collect();

    for cell in cells {
        let victim = set.samples().iter().rposition(|s| {
            cell_of(width, height, s.x, s.y) == cell
                && Corner::all()
                    .iter()
                    .zip(&corner_counts)
                    .all(|(corner, &n)| n > 1 || !corner.contains(width, height, s.x, s.y))
        });

        if let Some(index) = victim {
            set.remove_at(index);
            return true;
        }
    }

    false
}

/// Inserts `sample`, making room first when the set is already at `target_count`.
fn insert_with_budget(set: &mut SampleSet, sample: Sample, target_count: usize) -> bool {
    if set.contains(sample.x, sample.y) {
        return false;
    }

    if set.len() >= target_count && !evict_one(set) {
        return false;
    }

    set.push(sample)
}

/// First eligible, unused pixel of the box, starting from its center.
fn pick_in_box(
    set: &SampleSet,
    source: &dyn PixelSource,
    (x0, y0, x1, y1): (u32, u32, u32, u32),
    alpha: f32,
) -> Option<(u32, u32)> {
    let (cx, cy) = (x0 + (x1 - x0) / 2, y0 + (y1 - y0) / 2);

    if !set.contains(cx, cy) && eligible(source, cx, cy, alpha) {
        return Some((cx, cy));
    }

    (y0..y1)
        .flat_map(|y| (x0..x1).map(move |x| (x, y)))
        .find(|&(x, y)| !set.contains(x, y) && eligible(source, x, y, alpha))
}

/// Puts one sample into every empty coverage cell that has an eligible pixel.
pub fn fill_coverage(
    set: &mut SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let (cols, rows) = grid_dims(width, height);
    let counts = cell_counts(set.samples(), width, height);
    let mut added = 0;

    for cell in 0..counts.len() {
        if counts[cell] > 0 {
            continue;
        }

        let (cx, cy) = (cell as u32 % cols, cell as u32 / cols);
        let bounds = (
            (cx as u64 * width as u64).div_ceil(cols as u64) as u32,
            (cy as u64 * height as u64).div_ceil(rows as u64) as u32,
            ((cx as u64 + 1) * width as u64).div_ceil(cols as u64) as u32,
            ((cy as u64 + 1) * height as u64).div_ceil(rows as u64) as u32,
        );

        if let Some((x, y)) = pick_in_box(set, source, bounds, params.alpha_threshold) {
            if insert_with_budget(set, Sample::at(source, x, y), target_count) {
                added += 1;
            }
        }
    }

    added
}

/// Puts a sample into each corner box that has none.
pub fn fill_corners(
    set: &mut SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let mut added = 0;

    for corner in uncovered_corners(set.samples(), width, height) {
        let bounds = corner.bounds(width, height);

        if let Some((x, y)) = pick_in_box(set, source, bounds, params.alpha_threshold) {
            if insert_with_budget(set, Sample::at(source, x, y), target_count) {
                added += 1;
            }
        }
    }

    added
}

/// Brings the set to exactly `target_count` samples when the image allows it.
///
/// Truncates overshoot; fills a shortfall with a coarse grid, then bounded random
/// draws (`needed * 10` attempts), then a row-major sweep.
pub fn reconcile_count(
    set: &mut SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) {
    if set.len() > target_count {
        debug!("Truncating {} samples to {target_count}", set.len());
        set.truncate(target_count);
        return;
    }

    if set.len() == target_count {
        return;
    }

    let (width, height) = (set.width(), set.height());
    let alpha = params.alpha_threshold;
    let needed = target_count - set.len();
    let total = width as usize * height as usize;
    let step = ((total / needed.max(1)) as f64).sqrt().floor().max(1.0) as usize;

    'grid: for y in (step as u32 / 2..height).step_by(step) {
        for x in (step as u32 / 2..width).step_by(step) {
            if set.len() >= target_count {
                break 'grid;
            }

            if eligible(source, x, y, alpha) {
                set.push(Sample::at(source, x, y));
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(params.seed ^ RECONCILE_SALT);
    let needed = target_count.saturating_sub(set.len());
    let mut attempts = 0;

    while set.len() < target_count && attempts < needed * 10 {
        attempts += 1;
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);

        if !set.contains(x, y) && eligible(source, x, y, alpha) {
            set.push(Sample::at(source, x, y));
        }
    }

    'sweep: for y in 0..height {
        for x in 0..width {
            if set.len() >= target_count {
                break 'sweep;
            }

            if !set.contains(x, y) && eligible(source, x, y, alpha) {
                set.push(Sample::at(source, x, y));
            }
        }
    }

    if set.len() < target_count {
        warn!(
            "Only {} of {target_count} samples available above alpha {alpha}",
            set.len()
        );
    }
}

/// Validates `samples` and repairs clustering, coverage, corners and count.
///
/// `reserve` holds unselected candidates that stratified resampling may draw from.
pub fn prevent_artifacts(
    samples: Vec<Sample>,
    reserve: &[Sample],
    width: u32,
    height: u32,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> Vec<Sample> {
    let mut samples = samples;

    if params.apply_anti_clustering {
        let distance = params
            .clustering_distance
            .unwrap_or_else(|| default_clustering_distance(width, height, target_count));
        let fraction = clustering_fraction(&samples, distance);
        debug!("Clustered fraction {fraction:.3} at distance {distance:.2}");

        if fraction > MAX_CLUSTERED_FRACTION {
            let mut pool = samples;
            pool.extend_from_slice(reserve);
            samples = stratified_resample(&pool, target_count, height, params.band_count);
        }
    }

    let mut set = SampleSet::from_samples(width, height, samples);

    let coverage = coverage_ratio(set.samples(), width, height);
    debug!("Coverage ratio {coverage:.3}");

    if coverage < MIN_COVERAGE {
        let added = fill_coverage(&mut set, target_count, source, params);
        debug!(
            "Coverage fill added {added}, ratio now {:.3}",
            coverage_ratio(set.samples(), width, height)
        );
    }

    if !has_corner_coverage(set.samples(), width, height) {
        let added = fill_corners(&mut set, target_count, source, params);
        debug!("Corner fill added {added}");
    }

    reconcile_count(&mut set, target_count, source, params);
    set.into_samples()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::source::PixelBuffer;

    fn grey(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |_, _| Color::new(0.5, 0.5, 0.5, 1.0))
    }

    fn at(x: u32, y: u32) -> Sample {
        Sample::new(x, y, Color::new(0.5, 0.5, 0.5, 1.0))
    }

    fn unique(samples: &[Sample], width: u32, height: u32) -> bool {
        let mut set = SampleSet::new(width, height);
        samples.iter().all(|s| set.push(*s))
    }

    #[test]
    fn coverage_counts_occupied_cells() {
        assert_eq!(coverage_ratio(&[], 40, 40), 0.0);
        assert_eq!(coverage_ratio(&[at(0, 0), at(1, 1)], 40, 40), 1.0 / 16.0);

        let spread: Vec<_> = (0..4)
            .flat_map(|cy| (0..4).map(move |cx| at(cx * 10 + 5, cy * 10 + 5)))
            .collect();
        assert_eq!(coverage_ratio(&spread, 40, 40), 1.0);
    }

    #[test]
    fn corners_are_detected() {
        let samples = [at(0, 0), at(99, 0), at(0, 99)];
        assert_eq!(
            uncovered_corners(&samples, 100, 100),
            vec![Corner::BottomRight]
        );
        assert!(!has_corner_coverage(&samples, 100, 100));
        assert!(has_corner_coverage(&[at(0, 0), at(95, 5), at(2, 92), at(91, 91)], 100, 100));
    }

    #[test]
    fn dense_blob_is_clustered() {
        let blob: Vec<_> = (0..5).flat_map(|y| (0..5).map(move |x| at(x, y))).collect();
        assert!(is_clustered(&blob, 2.0));

        let sparse: Vec<_> = (0..5)
            .flat_map(|y| (0..5).map(move |x| at(x * 10, y * 10)))
            .collect();
        assert_eq!(clustering_fraction(&sparse, 2.0), 0.0);
    }

    #[test]
    fn thinning_keeps_the_strongest() {
        let candidates: Vec<_> = (0..4)
            .flat_map(|y| (0..4).map(move |x| Candidate::new(at(x, y), (x + y) as f32)))
            .collect();
        let thinned = thin_clusters(candidates, 1.5);

        assert!(thinned.len() < 16);
        assert_eq!((thinned[0].sample.x, thinned[0].sample.y), (3, 3));
    }

    #[test]
    fn stratified_resample_is_deterministic_and_unique() {
        let samples: Vec<_> = (0..64)
            .map(|i| {
                let v = (i % 7) as f32 / 7.0;
                Sample::new(i % 8, i / 8 * 4, Color::new(v, v, v, 1.0))
            })
            .collect();

        let first = stratified_resample(&samples, 20, 32, 4);
        let second = stratified_resample(&samples, 20, 32, 4);

        assert_eq!(first, second);
        assert_eq!(first.len(), 20);
        assert!(unique(&first, 8, 32));
    }

    #[test]
    fn stratified_resample_spreads_over_bands() {
        let samples: Vec<_> = (0..32)
            .map(|y| Sample::new(0, y, Color::new(1.0, 1.0, 1.0, 1.0)))
            .collect();
        let picked = stratified_resample(&samples, 4, 32, 4);

        let mut bands: Vec<_> = picked.iter().map(|s| s.y / 8).collect();
        bands.sort();
        assert_eq!(bands, vec![0, 1, 2, 3]);
    }

    #[test]
    fn stratified_resample_handles_black_and_empty_input() {
        let black: Vec<_> = (0..10)
            .map(|y| Sample::new(1, y, Color::new(0.0, 0.0, 0.0, 1.0)))
            .collect();
        assert_eq!(stratified_resample(&black, 5, 10, 16).len(), 5);
        assert!(stratified_resample(&[], 5, 10, 16).is_empty());
        assert_eq!(stratified_resample(&black, 50, 10, 2).len(), 10);
    }

    #[test]
    fn corner_fill_respects_budget() {
        let image = grey(50, 50);
        let params = SamplingParams::default();
        let mut set = SampleSet::from_samples(50, 50, vec![at(25, 25), at(26, 25), at(25, 26)]);

        fill_corners(&mut set, 3, &image, &params);

        assert_eq!(set.len(), 3);
        assert!(uncovered_corners(set.samples(), 50, 50).len() < 4);
    }

    #[test]
    fn reconcile_reaches_target() {
        let image = grey(20, 20);
        let params = SamplingParams::default();
        let mut set = SampleSet::from_samples(20, 20, vec![at(0, 0)]);

        reconcile_count(&mut set, 57, &image, &params);
        assert_eq!(set.len(), 57);
        assert!(unique(set.samples(), 20, 20));

        reconcile_count(&mut set, 10, &image, &params);
        assert_eq!(set.len(), 10);
    }

    #[test]
    fn repairs_a_clumped_corner() {
        let image = grey(64, 64);
        let params = SamplingParams::default();
        let clump: Vec<_> = (0..10).flat_map(|y| (0..10).map(move |x| at(x, y))).collect();

        let fixed = prevent_artifacts(clump, &[], 64, 64, 100, &image, &params);

        assert_eq!(fixed.len(), 100);
        assert!(unique(&fixed, 64, 64));
        assert!(coverage_ratio(&fixed, 64, 64) >= MIN_COVERAGE);
        assert!(has_corner_coverage(&fixed, 64, 64));
    }
}
