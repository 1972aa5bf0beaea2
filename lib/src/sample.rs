use crate::color::Color;
use crate::source::PixelSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chosen pixel: position plus its premultiplied color.
#[derive(Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: u32,
    pub y: u32,
    pub color: Color,
}

impl Sample {
    pub fn new(x: u32, y: u32, color: Color) -> Self {
        Sample { x, y, color }
    }

    pub fn at(source: &dyn PixelSource, x: u32, y: u32) -> Self {
        Sample::new(x, y, source.color(x, y))
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let xs = self.x as f32 - other.x as f32;
        let ys = self.y as f32 - other.y as f32;
        (xs * xs) + (ys * ys)
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("color", &self.color)
            .finish()
    }
}

/// A sample with its importance score, only used while a strategy runs.
///
/// Public for composing custom strategies from the collector and balancer; the
/// sampling entry points only ever return plain [`Sample`]s.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate {
    pub sample: Sample,
    pub importance: f32,
}

impl Candidate {
    pub fn new(sample: Sample, importance: f32) -> Self {
        let importance = if importance.is_nan() { 0.0 } else { importance };
        Candidate { sample, importance }
    }

    /// Descending importance, ties broken by row-major position so ordering is total.
    pub fn rank(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| (a.sample.y, a.sample.x).cmp(&(b.sample.y, b.sample.x)))
    }
}

/// Fixed-size bit vector over the flattened pixel grid.
#[derive(Clone, Debug)]
pub struct Occupancy {
    width: u32,
    height: u32,
    bits: Vec<u64>,
}

impl Occupancy {
    pub fn new(width: u32, height: u32) -> Self {
        let total = width as usize * height as usize;
        Occupancy {
            width,
            height,
            bits: vec![0; total.div_ceil(64)],
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        match self.index(x, y) {
            Some(i) => self.bits[i / 64] & (1 << (i % 64)) != 0,
            None => false,
        }
    }

    /// Marks `(x, y)`; returns false if it was already set or out of bounds.
    pub fn insert(&mut self, x: u32, y: u32) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };

        let mask = 1 << (i % 64);
        let word = &mut self.bits[i / 64];

        if *word & mask != 0 {
            return false;
        }

        *word |= mask;
        true
    }

    pub fn remove(&mut self, x: u32, y: u32) {
        if let Some(i) = self.index(x, y) {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }
}

/// Output samples together with the occupancy that keeps them unique.
#[derive(Clone, Debug)]
pub struct SampleSet {
    samples: Vec<Sample>,
    occupied: Occupancy,
}

impl SampleSet {
    pub fn new(width: u32, height: u32) -> Self {
        SampleSet {
            samples: Vec::new(),
            occupied: Occupancy::new(width, height),
        }
    }

    pub fn from_samples(width: u32, height: u32, samples: Vec<Sample>) -> Self {
        let mut set = SampleSet::new(width, height);

        for s in samples {
            set.push(s);
        }

        set
    }

    pub fn width(&self) -> u32 {
        self.occupied.width
    }

    pub fn height(&self) -> u32 {
        self.occupied.height
    }

    /// Appends `sample` unless its coordinate is taken.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.occupied.insert(sample.x, sample.y) {
            self.samples.push(sample);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.occupied.contains(x, y)
    }

    pub fn remove_at(&mut self, index: usize) -> Sample {
        let removed = self.samples.remove(index);
        self.occupied.remove(removed.x, removed.y);
        removed
    }

    pub fn truncate(&mut self, len: usize) {
        while self.samples.len() > len {
            if let Some(s) = self.samples.pop() {
                self.occupied.remove(s.x, s.y);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}
