//! Spatially aware strategies: blue noise, van der Corput sequences, weighted draws
//! and a phased blend of the three.

use super::{finish, prepare, SamplingStrategy};
use crate::artifact;
use crate::color::Color;
use crate::error::Result;
use crate::params::SamplingParams;
use crate::sample::{Sample, SampleSet};
use crate::source::PixelSource;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Candidates proposed per blue-noise placement.
const PROPOSALS: usize = 32;

/// Random draws allowed per proposal before a placement gives up.
const DRAWS_PER_PROPOSAL: usize = 4;

/// Consecutive failed placements after which the blue-noise phase stops.
const MAX_STALLS: usize = 8;

/// Vibrance below which a low-discrepancy point looks for a better neighbor.
const MIN_VIBRANCE: f32 = 0.05;

const BRIGHTNESS_WEIGHT: f64 = 0.7;
const SATURATION_WEIGHT: f64 = 0.3;

fn visible(color: &Color, params: &SamplingParams) -> bool {
    color.a >= params.alpha_threshold
}

/// Uniform grid of placed samples for nearest-neighbor queries.
struct PlacementGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<(u32, u32)>>,
}

impl PlacementGrid {
    fn new(width: u32, height: u32, cell: f32) -> Self {
        let cell = cell.max(1.0);
        let cols = (width as f32 / cell).ceil().max(1.0) as usize;
        let rows = (height as f32 / cell).ceil().max(1.0) as usize;

        PlacementGrid {
            cell,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn key(&self, x: u32, y: u32) -> (usize, usize) {
        (
            ((x as f32 / self.cell) as usize).min(self.cols - 1),
            ((y as f32 / self.cell) as usize).min(self.rows - 1),
        )
    }

    fn insert(&mut self, x: u32, y: u32) {
        let (cx, cy) = self.key(x, y);
        self.cells[cy * self.cols + cx].push((x, y));
    }

    /// Distance to the closest placed sample within two cells, capped at `2 * cell`.
    fn nearest(&self, x: u32, y: u32) -> f32 {
        let cap = 2.0 * self.cell;
        let (cx, cy) = self.key(x, y);
        let mut best = cap * cap;

        for gy in cy.saturating_sub(2)..=(cy + 2).min(self.rows - 1) {
            for gx in cx.saturating_sub(2)..=(cx + 2).min(self.cols - 1) {
                for &(px, py) in &self.cells[gy * self.cols + gx] {
                    let dx = px as f32 - x as f32;
                    let dy = py as f32 - y as f32;
                    best = best.min(dx * dx + dy * dy);
                }
            }
        }

        best.sqrt()
    }
}

fn blue_noise_phase(
    set: &mut SampleSet,
    count: usize,
    spacing_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
    rng: &mut StdRng,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let area = width as f32 * height as f32;
    let spacing = (area / spacing_count.max(1) as f32).sqrt();
    let mut grid = PlacementGrid::new(width, height, spacing);

    for s in set.samples() {
        grid.insert(s.x, s.y);
    }

    let before = set.len();
    let mut stalls = 0;

    while set.len() - before < count && stalls < MAX_STALLS {
        let mut best: Option<(f32, Sample)> = None;
        let mut proposals = 0;
        let mut draws = 0;

        while proposals < PROPOSALS && draws < PROPOSALS * DRAWS_PER_PROPOSAL {
            draws += 1;
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);

            if set.contains(x, y) {
                continue;
            }

            let color = source.color(x, y);

            if !visible(&color, params) {
                continue;
            }

            // Brightness-weighted acceptance of the proposal.
            let brightness = color.brightness();
            if rng.gen::<f32>() > brightness * 0.8 + 0.2 {
                continue;
            }

            proposals += 1;
            let score = grid.nearest(x, y) * (brightness * color.saturation() * 2.0 + 0.5);

            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, Sample::new(x, y, color)));
            }
        }

        match best {
            Some((_, s)) => {
                set.push(s);
                grid.insert(s.x, s.y);
                stalls = 0;
            }
            None => stalls += 1,
        }
    }

    set.len() - before
}

/// Van der Corput radical inverse of `index` in `base`.
pub fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;

    while index > 0 {
        result += (index % base) as f64 * factor;
        index /= base;
        factor *= inv_base;
    }

    result
}

/// Most vibrant unused, visible pixel of the 3x3 block around `(x, y)`, if any
/// reaches [`MIN_VIBRANCE`].
fn vibrant_neighbor(
    set: &SampleSet,
    source: &dyn PixelSource,
    params: &SamplingParams,
    x: u32,
    y: u32,
) -> Option<Sample> {
    let (width, height) = (set.width(), set.height());
    let mut best: Option<(f32, Sample)> = None;

    for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
            if set.contains(nx, ny) {
                continue;
            }

            let color = source.color(nx, ny);
            let vibrance = color.vibrance();

            if visible(&color, params)
                && vibrance >= MIN_VIBRANCE
                && best.map_or(true, |(b, _)| vibrance > b)
            {
                best = Some((vibrance, Sample::new(nx, ny, color)));
            }
        }
    }

    best.map(|(_, s)| s)
}

/// Places samples at base-2/base-3 van der Corput points starting at sequence `start`.
fn low_discrepancy_phase(
    set: &mut SampleSet,
    count: usize,
    start: u64,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let before = set.len();
    let max_index = start + (count as u64).saturating_mul(4) + 16;
    let mut index = start;

    while set.len() - before < count && index < max_index {
        let u = radical_inverse(index, 2);
        let v = radical_inverse(index, 3);
        index += 1;

        let x = ((u * width as f64) as u32).min(width - 1);
        let y = ((v * height as f64) as u32).min(height - 1);
        let color = source.color(x, y);

        let pick = if visible(&color, params) && color.vibrance() >= MIN_VIBRANCE {
            Some(Sample::new(x, y, color))
        } else {
            vibrant_neighbor(set, source, params, x, y)
                .or_else(|| visible(&color, params).then(|| Sample::new(x, y, color)))
        };

        if let Some(s) = pick {
            set.push(s);
        }
    }

    set.len() - before
}

/// Cumulative `0.7 * brightness + 0.3 * saturation` over all visible pixels, falling back
/// to uniform weights when every pixel is (nearly) black and grey.
fn cumulative_weights(
    width: u32,
    height: u32,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> Vec<f64> {
    let mut weights: Vec<f64> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let color = source.color(x, y);

            if visible(&color, params) {
                BRIGHTNESS_WEIGHT * color.brightness() as f64
                    + SATURATION_WEIGHT * color.saturation() as f64
            } else {
                0.0
            }
        })
        .collect();

    if weights.iter().sum::<f64>() < 1e-9 {
        debug!("All draw weights vanish, using uniform weights");

        for (i, w) in weights.iter_mut().enumerate() {
            let (x, y) = ((i % width as usize) as u32, (i / width as usize) as u32);
            *w = if visible(&source.color(x, y), params) { 1.0 } else { 0.0 };
        }
    }

    let mut acc = 0.0;

    for w in weights.iter_mut() {
        acc += *w;
        *w = acc;
    }

    weights
}

/// Adds the most vibrant unused, visible pixels.
fn vibrant_fallback(
    set: &mut SampleSet,
    count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> usize {
    let (width, height) = (set.width(), set.height());

    let mut pixels: Vec<(f32, Sample)> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| !set.contains(x, y))
        .map(|(x, y)| Sample::at(source, x, y))
        .filter(|s| visible(&s.color, params))
        .map(|s| (s.color.vibrance(), s))
        .collect();

    pixels.sort_by(|a, b| b.0.total_cmp(&a.0));

    let before = set.len();

    for (_, s) in pixels.into_iter().take(count) {
        set.push(s);
    }

    set.len() - before
}

/// Weighted draws without replacement, at most `5 * count` attempts.
fn hash_weighted_phase(
    set: &mut SampleSet,
    count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
    rng: &mut StdRng,
) -> usize {
    let (width, height) = (set.width(), set.height());
    let cumulative = cumulative_weights(width, height, source, params);
    let total = cumulative.last().copied().unwrap_or(0.0);
    let before = set.len();

    if total > 0.0 {
        let max_attempts = count.saturating_mul(5);
        let mut attempts = 0;

        while set.len() - before < count && attempts < max_attempts {
            attempts += 1;
            let r = rng.gen::<f64>() * total;
            let i = cumulative
                .partition_point(|&c| c <= r)
                .min(cumulative.len() - 1);
            let (x, y) = ((i % width as usize) as u32, (i / width as usize) as u32);

            if !set.contains(x, y) {
                set.push(Sample::at(source, x, y));
            }
        }
    }

    let drawn = set.len() - before;

    if drawn < count {
        debug!("Weighted draws placed {drawn} of {count}, topping up with vibrant pixels");
        vibrant_fallback(set, count - drawn, source, params);
    }

    set.len() - before
}

fn complete(
    name: &'static str,
    mut set: SampleSet,
    target_count: usize,
    source: &dyn PixelSource,
    params: &SamplingParams,
) -> Result<Vec<Sample>> {
    if set.len() < target_count {
        warn!("{name} placed {} of {target_count} samples", set.len());
    }

    artifact::reconcile_count(&mut set, target_count, source, params);
    finish(name, set.into_samples())
}

/// Greedy best-candidate placement favoring distant, vivid pixels.
#[derive(Copy, Clone, Debug, Default)]
pub struct BlueNoiseSampler;

impl SamplingStrategy for BlueNoiseSampler {
    fn name(&self) -> &'static str {
        "blue-noise"
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

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut set = SampleSet::new(width, height);
        blue_noise_phase(&mut set, target_count, target_count, source, params, &mut rng);

        complete(self.name(), set, target_count, source, params)
    }
}

/// Deterministic base-2/base-3 van der Corput placement.
#[derive(Copy, Clone, Debug, Default)]
pub struct LowDiscrepancySampler;

impl SamplingStrategy for LowDiscrepancySampler {
    fn name(&self) -> &'static str {
        "low-discrepancy"
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

        let mut set = SampleSet::new(width, height);
        low_discrepancy_phase(&mut set, target_count, 1, source, params);

        complete(self.name(), set, target_count, source, params)
    }
}

/// Draws pixels with probability proportional to brightness and saturation.
#[derive(Copy, Clone, Debug, Default)]
pub struct HashWeightedSampler;

impl SamplingStrategy for HashWeightedSampler {
    fn name(&self) -> &'static str {
        "hash-weighted"
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

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut set = SampleSet::new(width, height);
        hash_weighted_phase(&mut set, target_count, source, params, &mut rng);

        complete(self.name(), set, target_count, source, params)
    }
}

const STRUCTURE_SHARE: f32 = 0.3;
const DECORRELATED_SHARE: f32 = 0.4;

/// Low-discrepancy structure, then blue-noise placement around it, then weighted draws.
#[derive(Copy, Clone, Debug, Default)]
pub struct PhasedAdaptiveSampler;

impl SamplingStrategy for PhasedAdaptiveSampler {
    fn name(&self) -> &'static str {
        "phased-adaptive"
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

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut set = SampleSet::new(width, height);

        let structure = (target_count as f32 * STRUCTURE_SHARE).round() as usize;
        let decorrelated = (target_count as f32 * DECORRELATED_SHARE).round() as usize;

        let placed = low_discrepancy_phase(&mut set, structure, 1, source, params);
        let spread = blue_noise_phase(
            &mut set,
            decorrelated,
            target_count,
            source,
            params,
            &mut rng,
        );
        let remaining = target_count.saturating_sub(set.len());
        let drawn = hash_weighted_phase(
            &mut set,
            remaining,
            source,
            params,
            &mut rng,
        );

        debug!("Phases placed {placed} structured, {spread} decorrelated, {drawn} weighted");
        complete(self.name(), set, target_count, source, params)
    }
}
