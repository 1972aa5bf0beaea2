//! Candidate collection: the scored pool strategies select from before balancing.

use crate::artifact;
use crate::color::Color;
use crate::params::SamplingParams;
use crate::sample::{Candidate, Occupancy, Sample};
use crate::score;
use crate::source::PixelSource;
use log::debug;

/// Importance assigned to grid fallback points.
pub const FALLBACK_IMPORTANCE: f32 = 0.1;

const BACKGROUND_BRIGHTNESS: f32 = 0.9;
const BACKGROUND_SATURATION: f32 = 0.1;

/// Scan step that keeps the number of visited pixels roughly bounded for large images.
pub fn scan_stride(width: u32, height: u32) -> u32 {
    let dimension = width.max(height);
    (dimension / 512).min(dimension / 16).max(1)
}

/// Near-white, low-saturation pixels that should never seed a candidate.
pub fn is_background(color: &Color) -> bool {
    color.brightness() > BACKGROUND_BRIGHTNESS && color.saturation() < BACKGROUND_SATURATION
}

/// Candidate count below which [`collect`] tops the pool up with fallback points.
pub fn minimum_pool(target_count: usize) -> usize {
    (target_count / 4).max(10)
}

/// Scores every `stride`-th pixel and keeps the ones above the noise floor, half the
/// params' importance threshold.
///
/// Stops early once `limit` candidates are found.
pub fn scan_candidates(
    source: &dyn PixelSource,
    width: u32,
    height: u32,
    stride: u32,
    params: &SamplingParams,
    dominant_colors: &[Color],
    limit: usize,
) -> Vec<Candidate> {
    let floor = params.importance_threshold * 0.5;
    scan_above(source, width, height, stride, floor, params, dominant_colors, limit)
}

/// Like [`scan_candidates`], but keeps only importance strictly above `floor`.
#[allow(clippy::too_many_arguments)]
pub fn scan_above(
    source: &dyn PixelSource,
    width: u32,
    height: u32,
    stride: u32,
    floor: f32,
    params: &SamplingParams,
    dominant_colors: &[Color],
    limit: usize,
) -> Vec<Candidate> {
    let stride = stride.max(1) as usize;
    let mut candidates = Vec::new();
    let mut neighbors = Vec::with_capacity(8);

    if limit == 0 {
        return candidates;
    }

    'scan: for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            let color = source.color(x, y);

            if color.a < params.alpha_threshold || is_background(&color) {
                continue;
            }

            neighbors.clear();
            source.neighbors_into(x, y, params.edge_radius, &mut neighbors);

            let importance = score::importance(&color, &neighbors, params, dominant_colors);

            if importance > floor {
                candidates.push(Candidate::new(Sample::new(x, y, color), importance));

                if candidates.len() >= limit {
                    break 'scan;
                }
            }
        }
    }

    candidates
}

/// Appends fallback points to `candidates` until it holds `minimum` entries.
///
/// First a deterministic grid sized for `needed` points, then a row-major sweep; both
/// only take pixels with at least the weak alpha. If no pixel qualifies at all the bare
/// grid is taken, so fully transparent images still yield positions.
pub fn grid_fallback(
    source: &dyn PixelSource,
    width: u32,
    height: u32,
    needed: usize,
    minimum: usize,
    params: &SamplingParams,
    candidates: &mut Vec<Candidate>,
) {
    let grid_size = ((needed.max(1) as f64).sqrt() * 1.5).ceil() as u32;
    let weak = params.weak_alpha_threshold;

    let mut taken = Occupancy::new(width, height);

    for c in candidates.iter() {
        taken.insert(c.sample.x, c.sample.y);
    }

    let points = grid_points(width, height, grid_size);
    let before = candidates.len();

    for &(x, y) in &points {
        if candidates.len() >= minimum {
            break;
        }

        let color = source.color(x, y);

        if color.a >= weak && taken.insert(x, y) {
            candidates.push(Candidate::new(Sample::new(x, y, color), FALLBACK_IMPORTANCE));
        }
    }

    'sweep: for y in 0..height {
        for x in 0..width {
            if candidates.len() >= minimum {
                break 'sweep;
            }

            let color = source.color(x, y);

            if color.a >= weak && taken.insert(x, y) {
                candidates.push(Candidate::new(Sample::new(x, y, color), FALLBACK_IMPORTANCE));
            }
        }
    }

    if candidates.is_empty() {
        debug!("No pixel passed the weak alpha, keeping the bare grid");

        for &(x, y) in &points {
            if candidates.len() >= minimum {
                break;
            }

            if taken.insert(x, y) {
                candidates.push(Candidate::new(Sample::at(source, x, y), FALLBACK_IMPORTANCE));
            }
        }
    }

    debug!(
        "Grid fallback ({grid_size}x{grid_size}) added {} candidates",
        candidates.len() - before
    );
}

fn grid_points(width: u32, height: u32, grid_size: u32) -> Vec<(u32, u32)> {
    let mut points = Vec::with_capacity(grid_size as usize * grid_size as usize);

    for gy in 0..grid_size {
        let y = ((gy as f64 + 0.5) * height as f64 / grid_size as f64) as u32;

        for gx in 0..grid_size {
            let x = ((gx as f64 + 0.5) * width as f64 / grid_size as f64) as u32;
            points.push((x.min(width - 1), y.min(height - 1)));
        }
    }

    points
}

/// Builds the candidate pool for `target_count` samples.
///
/// Scans with [`scan_stride`] and keeps at most `2 * target_count` candidates. With
/// anti-clustering the whole strided grid is scored, thinned in importance order and
/// then cut to the limit, so a lower threshold only ever appends weaker candidates
/// behind the ones a higher threshold keeps. Pools smaller than [`minimum_pool`] are
/// topped up by [`grid_fallback`].
///
/// The pool never shrinks when the importance threshold is lowered.
pub fn collect(
    source: &dyn PixelSource,
    width: u32,
    height: u32,
    target_count: usize,
    params: &SamplingParams,
    dominant_colors: &[Color],
) -> Vec<Candidate> {
    let stride = scan_stride(width, height);
    let limit = target_count.saturating_mul(2).max(1);

    let mut candidates = if params.apply_anti_clustering {
        let scanned = scan_candidates(
            source,
            width,
            height,
            stride,
            params,
            dominant_colors,
            usize::MAX,
        );
        let found = scanned.len();
        let mut thinned = artifact::thin_clusters(scanned, stride as f32 * 1.5);
        thinned.truncate(limit);
        debug!("Thinned {found} candidates to {}", thinned.len());
        thinned
    } else {
        scan_candidates(
            source,
            width,
            height,
            stride,
            params,
            dominant_colors,
            limit,
        )
    };

    debug!(
        "Found {} candidates at stride {stride}, needed {target_count}",
        candidates.len()
    );

    let minimum = minimum_pool(target_count);

    if candidates.len() < minimum {
        let needed = target_count.saturating_sub(candidates.len()).max(1);
        debug!(
            "Only {} of {minimum} required candidates, running grid fallback",
            candidates.len()
        );
        grid_fallback(source, width, height, needed, minimum, params, &mut candidates);
    }

    candidates
}
