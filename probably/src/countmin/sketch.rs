// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::f64::consts::LN_2;
use std::hash::Hash;

use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::DoubleHasher;
use crate::hash::HashEncoder;
use crate::hash::ItemEncoder;

/// Largest number of counters (`depth * width`) a sketch may hold.
pub const MAX_TABLE_ENTRIES: u64 = 1 << 30;

/// Count-Min sketch for estimating item frequencies.
///
/// The table has `depth` rows of `width` counters. Every update adds to one counter per row
/// and an estimate is the smallest of those counters, so it over-counts by at most
/// `relative_error() * total_count()` with probability `confidence()`.
///
/// Two sketches can be merged when their depth, width and seed agree.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMinSketch<E = HashEncoder> {
    pub(super) hasher: DoubleHasher<E>,
    pub(super) depth: u32,
    pub(super) width: u32,
    pub(super) seed: u64,
    /// Requested epsilon, or `2 / width` for an explicit shape
    pub(super) relative_error: f64,
    /// Requested confidence, or `1 - 2^-depth` for an explicit shape
    pub(super) confidence: f64,
    pub(super) total_count: i64,
    /// Row-major, `depth * width` counters
    pub(super) counts: Vec<i64>,
    pub(super) row_multipliers: Vec<i64>,
}

impl CountMinSketch {
    /// Creates a new Count-Min sketch with the default seed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `depth` or
    /// `width` is 0, or the table would exceed [`MAX_TABLE_ENTRIES`].
    pub fn new(depth: u32, width: u32) -> Result<Self, Error> {
        Self::with_seed(depth, width, u64::from(DEFAULT_UPDATE_SEED))
    }

    /// Creates a new Count-Min sketch with the provided seed.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_seed(depth: u32, width: u32, seed: u64) -> Result<Self, Error> {
        Self::with_encoder(depth, width, seed, HashEncoder)
    }

    /// Creates a sketch whose estimates are within `epsilon * total_count` of the true count
    /// with probability `confidence`.
    ///
    /// - `width = ceil(2 / epsilon)`
    /// - `depth = ceil(-ln(1 - confidence) / ln(2))`, at least 1
    ///
    /// [`relative_error`](Self::relative_error) and [`confidence`](Self::confidence) report
    /// `epsilon` and `confidence` as given, not the values implied by the rounded shape.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `epsilon` is
    /// not positive, `confidence` is not in (0, 1), or the table would exceed
    /// [`MAX_TABLE_ENTRIES`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::countmin::CountMinSketch;
    /// let sketch = CountMinSketch::with_accuracy(0.01, 0.95, 42).unwrap();
    /// assert_eq!(sketch.width(), 200);
    /// assert_eq!(sketch.depth(), 5);
    /// assert_eq!(sketch.confidence(), 0.95);
    ///
    /// assert!(CountMinSketch::with_accuracy(-5.0, 0.95, 42).is_err());
    /// assert!(CountMinSketch::with_accuracy(0.01, 2.0, 42).is_err());
    /// ```
    pub fn with_accuracy(epsilon: f64, confidence: f64, seed: u64) -> Result<Self, Error> {
        if !(epsilon > 0.0) {
            return Err(Error::invalid_parameter("relative error must be positive")
                .with_context("epsilon", epsilon));
        }
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(Error::invalid_parameter("confidence must be in (0, 1)")
                .with_context("confidence", confidence));
        }

        let width = (2.0 / epsilon).ceil();
        if width > MAX_TABLE_ENTRIES as f64 {
            return Err(Error::invalid_parameter(format!(
                "relative error too small, width exceeds {MAX_TABLE_ENTRIES}"
            ))
            .with_context("epsilon", epsilon));
        }
        let depth = (-(1.0 - confidence).ln() / LN_2).ceil().max(1.0);

        let mut sketch = Self::with_seed(depth as u32, width as u32, seed)?;
        sketch.relative_error = epsilon;
        sketch.confidence = confidence;
        Ok(sketch)
    }
}

impl<E> CountMinSketch<E> {
    /// Creates a sketch whose items are encoded by `encoder` for the secondary hash.
    ///
    /// # Errors
    ///
    /// See [`CountMinSketch::new`].
    pub fn with_encoder(depth: u32, width: u32, seed: u64, encoder: E) -> Result<Self, Error> {
        let entries = entries_for_config(depth, width)?;

        let mut rng = XorShift64::seeded(seed);
        let row_multipliers = (0..depth).map(|_| i64::from(rng.next_u31())).collect();

        Ok(CountMinSketch {
            hasher: DoubleHasher::with_encoder(DEFAULT_UPDATE_SEED, encoder),
            depth,
            width,
            seed,
            relative_error: 2.0 / f64::from(width),
            confidence: 1.0 - 0.5f64.powf(f64::from(depth)),
            total_count: 0,
            counts: vec![0; entries],
            row_multipliers,
        })
    }

    /// Returns the number of rows.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the number of counters per row.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the seed used by the sketch.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the sum of every count added, including merged sketches.
    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    /// Returns the relative error (epsilon) passed to
    /// [`with_accuracy`](CountMinSketch::with_accuracy), or `2 / width` for a sketch created
    /// from an explicit shape.
    pub fn relative_error(&self) -> f64 {
        self.relative_error
    }

    /// Returns the confidence passed to [`with_accuracy`](CountMinSketch::with_accuracy), or
    /// `1 - 2^-depth` for a sketch created from an explicit shape.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Returns the per-row multipliers derived from the seed, each in `[0, 2^31)`.
    ///
    /// They are part of the sketch's identity but bucket selection does not consult them:
    /// row `i` uses the double-hashing index `|h1 + i * h2| mod width`.
    pub fn row_multipliers(&self) -> &[i64] {
        &self.row_multipliers
    }

    /// Returns true if the sketch has not counted anything.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0 && self.counts.iter().all(|count| *count == 0)
    }

    /// Updates the sketch with a single occurrence of the item.
    pub fn update<T>(&mut self, item: &T)
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        self.update_with_count(item, 1);
    }

    /// Adds `count` occurrences of the item.
    ///
    /// Counters wrap on `i64` overflow.
    pub fn update_with_count<T>(&mut self, item: &T, count: i64)
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        let width = u64::from(self.width);
        for row in 0..self.depth {
            let index = row as usize * self.width as usize + hashes.bucket(row, width) as usize;
            self.counts[index] = self.counts[index].wrapping_add(count);
        }
        self.total_count = self.total_count.wrapping_add(count);
    }

    /// Returns the estimated count of the item: the smallest of its counters.
    ///
    /// Never below the true count when all counts are non-negative.
    pub fn estimate<T>(&self, item: &T) -> i64
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        let width = u64::from(self.width);
        (0..self.depth)
            .map(|row| {
                self.counts[row as usize * self.width as usize + hashes.bucket(row, width) as usize]
            })
            .min()
            .unwrap_or(0)
    }

    /// Adds every counter of `other` into this sketch.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleMerge`](crate::error::ErrorKind::IncompatibleMerge) if the depth,
    /// width or seed differ. This sketch is left unchanged.
    ///
    /// The merged sketch keeps its own relative error and confidence.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::countmin::CountMinSketch;
    /// let mut left = CountMinSketch::with_seed(5, 64, 42).unwrap();
    /// let mut right = CountMinSketch::with_seed(5, 64, 42).unwrap();
    /// left.update("apple");
    /// right.update("apple");
    ///
    /// left.merge(&right).unwrap();
    /// assert!(left.estimate("apple") >= 2);
    /// assert_eq!(left.total_count(), 2);
    /// ```
    pub fn merge(&mut self, other: &CountMinSketch<E>) -> Result<&mut Self, Error> {
        if self.depth != other.depth || self.width != other.width || self.seed != other.seed {
            return Err(
                Error::incompatible_merge("count-min sketches differ in shape or seed")
                    .with_context("depth", self.depth)
                    .with_context("other_depth", other.depth)
                    .with_context("width", self.width)
                    .with_context("other_width", other.width)
                    .with_context("seed", self.seed)
                    .with_context("other_seed", other.seed),
            );
        }

        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            *count = count.wrapping_add(*other_count);
        }
        self.total_count = self.total_count.wrapping_add(other.total_count);
        tracing::debug!(
            depth = self.depth,
            width = self.width,
            total_count = self.total_count,
            "merged count-min sketch"
        );
        Ok(self)
    }
}

fn entries_for_config(depth: u32, width: u32) -> Result<usize, Error> {
    if depth == 0 {
        return Err(Error::invalid_parameter("depth must be at least 1"));
    }
    if width == 0 {
        return Err(Error::invalid_parameter("width must be at least 1"));
    }
    let entries = u64::from(depth) * u64::from(width);
    if entries > MAX_TABLE_ENTRIES {
        return Err(Error::invalid_parameter(format!(
            "depth * width must not exceed {MAX_TABLE_ENTRIES}"
        ))
        .with_context("depth", depth)
        .with_context("width", width));
    }
    Ok(entries as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_invalid_parameters() {
        let cases = [
            CountMinSketch::with_seed(0, 5, 42),
            CountMinSketch::with_seed(5, 0, 42),
            CountMinSketch::with_seed(1 << 16, 1 << 15, 42),
            CountMinSketch::with_accuracy(-5.0, 0.95, 42),
            CountMinSketch::with_accuracy(0.0, 0.95, 42),
            CountMinSketch::with_accuracy(f64::NAN, 0.95, 42),
            CountMinSketch::with_accuracy(5.0, -5.0, 42),
            CountMinSketch::with_accuracy(5.0, 2.0, 42),
            CountMinSketch::with_accuracy(5.0, 1.0, 42),
            CountMinSketch::with_accuracy(1e-12, 0.95, 42),
        ];
        for result in cases {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn test_accuracy_sizing() {
        let sketch = CountMinSketch::with_accuracy(5.0, 0.95, 42).unwrap();
        assert_eq!(sketch.width(), 1);
        assert_eq!(sketch.depth(), 5);

        // the requested accuracy is reported, not the one the rounded shape implies
        let sketch = CountMinSketch::with_accuracy(0.001, 0.4, 42).unwrap();
        assert_eq!(sketch.width(), 2000);
        assert_eq!(sketch.depth(), 1);
        assert_eq!(sketch.relative_error(), 0.001);
        assert_eq!(sketch.confidence(), 0.4);

        let sketch = CountMinSketch::with_accuracy(0.3, 0.9, 42).unwrap();
        assert_eq!(sketch.width(), 7);
        assert_eq!(sketch.depth(), 4);
        assert_eq!(sketch.relative_error(), 0.3);
        assert_eq!(sketch.confidence(), 0.9);

        let sketch = CountMinSketch::with_accuracy(0.5, 1e-300, 42).unwrap();
        assert_eq!(sketch.depth(), 1);
    }

    #[test]
    fn test_explicit_shape_accuracy() {
        let sketch = CountMinSketch::with_seed(3, 8, 42).unwrap();
        assert_eq!(sketch.relative_error(), 0.25);
        assert_eq!(sketch.confidence(), 0.875);
    }

    #[test]
    fn test_merge_keeps_receiver_accuracy() {
        let mut sketch = CountMinSketch::with_accuracy(0.3, 0.9, 42).unwrap();
        let other = CountMinSketch::with_seed(4, 7, 42).unwrap();
        sketch.merge(&other).unwrap();
        assert_eq!(sketch.relative_error(), 0.3);
        assert_eq!(sketch.confidence(), 0.9);
    }

    #[test]
    fn test_total_count_increments() {
        let mut sketch = CountMinSketch::with_accuracy(5.0, 0.95, 42).unwrap();
        assert!(sketch.is_empty());
        sketch.update(&31337);
        assert_eq!(sketch.total_count(), 1);
        assert!(!sketch.is_empty());
    }

    #[test]
    fn test_estimate_repeated_item() {
        let mut sketch = CountMinSketch::with_accuracy(5.0, 0.95, 42).unwrap();
        for _ in 0..1000 {
            sketch.update("Testing!!");
        }
        let estimate = sketch.estimate("Testing!!");
        assert!((1000..=1050).contains(&estimate));
    }

    #[test]
    fn test_never_under_counts() {
        let mut sketch = CountMinSketch::with_accuracy(0.01, 0.99, 1).unwrap();
        for i in 0..1000u64 {
            sketch.update_with_count(&i, (i % 7 + 1) as i64);
        }
        let bound = sketch.relative_error() * sketch.total_count() as f64;
        let mut within = 0;
        for i in 0..1000u64 {
            let truth = (i % 7 + 1) as i64;
            let estimate = sketch.estimate(&i);
            assert!(estimate >= truth, "item {i}: {estimate} < {truth}");
            if (estimate - truth) as f64 <= bound {
                within += 1;
            }
        }
        assert!(within >= 950, "only {within} estimates within bound");
    }

    #[test]
    fn test_unseen_item_on_empty_sketch() {
        let sketch = CountMinSketch::new(4, 100).unwrap();
        assert_eq!(sketch.estimate("nothing"), 0);
    }

    #[test]
    fn test_merge_incompatible() {
        let mut sketch = CountMinSketch::with_seed(20, 20, 42).unwrap();
        sketch.update(&1);
        let before = sketch.clone();
        let others = [
            CountMinSketch::with_seed(10, 20, 42).unwrap(),
            CountMinSketch::with_seed(20, 10, 42).unwrap(),
            CountMinSketch::with_seed(20, 20, 22).unwrap(),
        ];
        for other in &others {
            let err = sketch.merge(other).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::IncompatibleMerge);
            assert_eq!(sketch, before);
        }
    }

    #[test]
    fn test_merge_sums_totals_and_estimates() {
        let mut sketch = CountMinSketch::with_accuracy(5.0, 0.95, 42).unwrap();
        let mut other = CountMinSketch::with_accuracy(5.0, 0.95, 42).unwrap();
        for _ in 0..100 {
            sketch.update(&42);
            other.update(&42);
        }
        sketch.merge(&other).unwrap();
        assert_eq!(sketch.total_count(), 200);
        assert!((200..=210).contains(&sketch.estimate(&42)));
    }

    #[test]
    fn test_row_multipliers_follow_seed() {
        let a = CountMinSketch::with_seed(6, 32, 42).unwrap();
        let b = CountMinSketch::with_seed(6, 32, 42).unwrap();
        let c = CountMinSketch::with_seed(6, 32, 43).unwrap();
        assert_eq!(a.row_multipliers().len(), 6);
        assert_eq!(a.row_multipliers(), b.row_multipliers());
        assert_ne!(a.row_multipliers(), c.row_multipliers());
        assert!(
            a.row_multipliers()
                .iter()
                .all(|m| (0..1 << 31).contains(m))
        );
    }

    #[test]
    fn test_negative_counts() {
        let mut sketch = CountMinSketch::new(3, 16).unwrap();
        sketch.update_with_count("apple", 5);
        sketch.update_with_count("apple", -5);
        assert_eq!(sketch.total_count(), 0);
        assert!(sketch.is_empty());
    }
}
