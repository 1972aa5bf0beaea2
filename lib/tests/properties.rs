use pixel_sampler::artifact::{coverage_ratio, has_corner_coverage, MIN_COVERAGE};
use pixel_sampler::collect::{collect, minimum_pool, scan_candidates};
use pixel_sampler::sample::SampleSet;
use pixel_sampler::{sample, Color, PixelBuffer, Sample, SamplingError, SamplingParams, Strategy};

fn noise(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        let h = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663);
        let r = (h % 97) as f32 / 96.0;
        let g = ((h / 97) % 89) as f32 / 88.0;
        let b = ((h / 8633) % 83) as f32 / 82.0;
        Color::new(r, g, b, 1.0)
    })
}

fn gradient() -> PixelBuffer {
    PixelBuffer::from_fn(10, 10, |x, y| {
        Color::new(x as f32 / 9.0, y as f32 / 9.0, 0.5, 1.0)
    })
}

fn assert_valid(samples: &[Sample], width: u32, height: u32) {
    let mut seen = SampleSet::new(width, height);

    for s in samples {
        assert!(s.x < width && s.y < height, "{s:?} out of bounds");
        assert!(seen.push(*s), "duplicate {s:?}");
    }
}

fn close(a: Color, b: Color) -> bool {
    let d = a.to_array().iter().zip(b.to_array()).map(|(p, q)| (p - q).abs()).sum::<f32>();
    d < 1e-4
}

#[test]
fn every_strategy_stays_in_bounds_without_duplicates() {
    let image = noise(37, 23);
    let params = SamplingParams::default();

    for strategy in Strategy::all() {
        let samples = sample(strategy, 37, 23, 150, &params, &image, &[]).unwrap();

        assert_eq!(samples.len(), 150, "{strategy}");
        assert_valid(&samples, 37, 23);
    }
}

#[test]
fn dominant_colors_do_not_break_any_strategy() {
    let image = noise(30, 30);
    let params = SamplingParams::default();
    let dominant = [Color::new(0.5, 0.5, 0.5, 1.0), Color::new(1.0, 0.0, 0.0, 1.0)];

    for strategy in Strategy::all() {
        let samples = sample(strategy, 30, 30, 90, &params, &image, &dominant).unwrap();
        assert_eq!(samples.len(), 90, "{strategy}");
        assert_valid(&samples, 30, 30);
    }
}

#[test]
fn full_pixel_count_returns_every_pixel_in_row_major_order() {
    let image = noise(9, 7);
    let params = SamplingParams::default();
    let expected: Vec<(u32, u32)> = (0..7).flat_map(|y| (0..9).map(move |x| (x, y))).collect();

    for strategy in Strategy::all() {
        for target in [63, 500] {
            let samples = sample(strategy, 9, 7, target, &params, &image, &[]).unwrap();
            let coords: Vec<_> = samples.iter().map(|s| (s.x, s.y)).collect();
            assert_eq!(coords, expected, "{strategy}");
        }
    }
}

#[test]
fn uniform_gradient_scenario() {
    let image = gradient();
    let params = SamplingParams::default();
    let samples = sample(Strategy::Uniform, 10, 10, 50, &params, &image, &[]).unwrap();

    assert_eq!(samples.len(), 50);
    assert_valid(&samples, 10, 10);

    let first = samples.iter().find(|s| (s.x, s.y) == (0, 0)).unwrap();
    let last = samples.iter().find(|s| (s.x, s.y) == (9, 9)).unwrap();
    assert!(close(first.color, Color::new(0.0, 0.0, 0.5, 1.0)));
    assert!(close(last.color, Color::new(1.0, 1.0, 0.5, 1.0)));
}

#[test]
fn transparent_image_uses_grid_fallback() {
    let image = PixelBuffer::from_fn(20, 20, |_, _| Color::transparent());
    let params = SamplingParams::default();

    let samples = sample(Strategy::Importance, 20, 20, 50, &params, &image, &[]).unwrap();

    assert!(!samples.is_empty());
    assert!(samples.len() <= 50);
    assert_valid(&samples, 20, 20);
}

#[test]
fn transparent_image_without_fallback_is_an_error() {
    let image = PixelBuffer::from_fn(20, 20, |_, _| Color::transparent());
    let params = SamplingParams::default();

    assert_eq!(
        sample(Strategy::Adaptive, 20, 20, 50, &params, &image, &[]),
        Err(SamplingError::EmptyResult {
            strategy: "adaptive"
        })
    );
}

#[test]
fn detail_in_one_quadrant_still_covers_the_image() {
    let image = PixelBuffer::from_fn(64, 64, |x, y| {
        if x < 32 && y < 32 {
            let v = ((x * 5 + y * 3) % 7) as f32 / 6.0;
            Color::new(v, 1.0 - v, 0.5 * v, 1.0)
        } else {
            Color::new(1.0, 1.0, 1.0, 1.0)
        }
    });
    let params = SamplingParams {
        apply_anti_clustering: true,
        ..Default::default()
    };

    let samples = sample(Strategy::Importance, 64, 64, 200, &params, &image, &[]).unwrap();

    assert_valid(&samples, 64, 64);
    assert!(samples.len() <= 200);
    assert!(coverage_ratio(&samples, 64, 64) >= MIN_COVERAGE);
    assert!(has_corner_coverage(&samples, 64, 64));
}

#[test]
fn seeded_strategies_are_reproducible() {
    let image = noise(40, 40);
    let params = SamplingParams::default().with_seed(1234);

    for strategy in [
        Strategy::Adaptive,
        Strategy::BlueNoise,
        Strategy::HashWeighted,
        Strategy::PhasedAdaptive,
        Strategy::Importance,
        Strategy::Hybrid,
    ] {
        let a = sample(strategy, 40, 40, 120, &params, &image, &[]).unwrap();
        let b = sample(strategy, 40, 40, 120, &params, &image, &[]).unwrap();
        assert_eq!(a, b, "{strategy}");
    }
}

/// Grey canvas with a colored dot every fourth pixel.
fn dotted(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        if x % 4 == 1 && y % 4 == 1 {
            let v = ((x + 3 * y) % 5) as f32 / 4.0;
            Color::new(1.0, v, 0.0, 1.0)
        } else {
            Color::new(0.5, 0.5, 0.5, 1.0)
        }
    })
}

#[test]
fn lower_threshold_never_shrinks_the_pool() {
    let image = dotted(40, 40);
    let grey = [Color::new(0.5, 0.5, 0.5, 1.0)];
    let target = 200;
    let minimum = minimum_pool(target);

    for apply_anti_clustering in [false, true] {
        let params = SamplingParams {
            apply_anti_clustering,
            ..Default::default()
        };

        let mut threshold = 2.0;
        let mut previous = collect(&image, 40, 40, target, &params.with_threshold(threshold), &grey);

        // Nothing scores above 1, so the strictest pool is pure fallback.
        assert_eq!(previous.len(), minimum);

        while threshold > 0.01 {
            threshold /= 2.0;
            let pool = collect(&image, 40, 40, target, &params.with_threshold(threshold), &grey);
            assert!(
                pool.len() >= previous.len(),
                "threshold {threshold}: {} < {}",
                pool.len(),
                previous.len()
            );
            previous = pool;
        }

        assert!(previous.len() > minimum);
    }

    let params = SamplingParams::default();
    let mut previous = 0;

    for threshold in [1.6, 0.8, 0.4, 0.2, 0.1, 0.05] {
        let scanned = scan_candidates(&image, 40, 40, 1, &params.with_threshold(threshold), &grey, 10_000);
        assert!(scanned.len() >= previous);
        previous = scanned.len();
    }
}

#[test]
fn structural_misuse_is_rejected() {
    let image = noise(8, 8);
    let params = SamplingParams::default();

    assert!(matches!(
        sample(Strategy::Uniform, 0, 8, 10, &params, &image, &[]),
        Err(SamplingError::InvalidDimensions { .. })
    ));
    assert!(matches!(
        sample(Strategy::Hybrid, 8, 8, 0, &params, &image, &[]),
        Err(SamplingError::InvalidTargetCount { .. })
    ));

    let skewed = SamplingParams {
        important_sampling_ratio: 2.0,
        ..Default::default()
    };
    assert!(matches!(
        sample(Strategy::Hybrid, 8, 8, 10, &skewed, &image, &[]),
        Err(SamplingError::InvalidParameters(_))
    ));
}

#[test]
fn sub_region_sampling_stays_in_the_region() {
    let image = noise(50, 40);
    let params = SamplingParams::default();

    for strategy in Strategy::all() {
        let samples = sample(strategy, 25, 20, 60, &params, &image, &[]).unwrap();
        assert_valid(&samples, 25, 20);
    }
}
