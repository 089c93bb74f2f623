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

use crate::error::Error;

/// Smallest number of buckets (bits or counters) a filter may have.
pub const MIN_NUM_BUCKETS: u64 = 1;
/// Largest number of buckets a filter may have (32 GiB of counters).
pub const MAX_NUM_BUCKETS: u64 = 1 << 35;
/// Smallest number of hash functions.
pub const MIN_NUM_HASHES: u16 = 1;
/// Largest number of hash functions.
pub const MAX_NUM_HASHES: u16 = i16::MAX as u16;

/// Structural parameters of a Bloom-style filter: `m` buckets indexed by `k` hashes.
///
/// The parameters are fixed when a filter is created and never change afterwards.
///
/// # Examples
///
/// ```
/// use probably::common::SketchParams;
///
/// let params = SketchParams::from_accuracy(1000, 0.01).unwrap();
/// assert_eq!(params.num_buckets(), 19172);
/// assert_eq!(params.num_hashes(), 26);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchParams {
    num_buckets: u64,
    num_hashes: u16,
}

impl SketchParams {
    /// Derives the parameters that keep the false positive probability at `fpp` once
    /// `max_items` distinct items have been inserted.
    ///
    /// The closed form is computed first and then both values are doubled, which leaves the
    /// filter well under `fpp` at capacity:
    ///
    /// - `m = 2 * ceil(-n * ln(p) / ln(2)^2)`
    /// - `k = 2 * round((m / n) * ln(2))`, with `m` already doubled
    ///
    /// Use [`from_size`](Self::from_size) with [`suggest_num_buckets`](Self::suggest_num_buckets)
    /// and [`suggest_num_hashes`](Self::suggest_num_hashes) for the unscaled closed form.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_items` is
    /// 0, if `fpp` is not in (0, 1), or if the derived size exceeds [`MAX_NUM_BUCKETS`].
    pub fn from_accuracy(max_items: u64, fpp: f64) -> Result<Self, Error> {
        if max_items == 0 {
            return Err(Error::invalid_parameter("expected items must be at least 1"));
        }
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(
                Error::invalid_parameter("false positive probability must be in (0, 1)")
                    .with_context("fpp", fpp),
            );
        }

        let num_buckets = 2.0 * optimal_num_buckets(max_items, fpp);
        if num_buckets > MAX_NUM_BUCKETS as f64 {
            return Err(Error::invalid_parameter(format!(
                "derived bucket count exceeds {MAX_NUM_BUCKETS}"
            ))
            .with_context("max_items", max_items)
            .with_context("fpp", fpp));
        }
        let num_buckets = (num_buckets as u64).max(MIN_NUM_BUCKETS);
        let k = 2.0 * (num_buckets as f64 / max_items as f64 * LN_2).round_ties_even();
        let num_hashes = if k >= f64::from(MAX_NUM_HASHES) {
            MAX_NUM_HASHES
        } else {
            (k as u16).max(MIN_NUM_HASHES)
        };

        let params = Self::from_size(num_buckets, num_hashes)?;
        tracing::trace!(max_items, fpp, num_buckets, num_hashes, "derived sketch parameters");
        Ok(params)
    }

    /// Uses explicit parameters, for callers that size filters themselves.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if either value
    /// is outside `[MIN_NUM_BUCKETS, MAX_NUM_BUCKETS]` / `[MIN_NUM_HASHES, MAX_NUM_HASHES]`.
    pub fn from_size(num_buckets: u64, num_hashes: u16) -> Result<Self, Error> {
        if !(MIN_NUM_BUCKETS..=MAX_NUM_BUCKETS).contains(&num_buckets) {
            return Err(Error::invalid_parameter(format!(
                "number of buckets must be in [{MIN_NUM_BUCKETS}, {MAX_NUM_BUCKETS}]"
            ))
            .with_context("num_buckets", num_buckets));
        }
        if !(MIN_NUM_HASHES..=MAX_NUM_HASHES).contains(&num_hashes) {
            return Err(Error::invalid_parameter(format!(
                "number of hashes must be in [{MIN_NUM_HASHES}, {MAX_NUM_HASHES}]"
            ))
            .with_context("num_hashes", num_hashes));
        }
        Ok(SketchParams {
            num_buckets,
            num_hashes,
        })
    }

    /// Returns the number of buckets (`m`).
    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }

    /// Returns the number of hashes (`k`).
    pub fn num_hashes(&self) -> u16 {
        self.num_hashes
    }

    /// Suggests the number of buckets for `max_items` items at false positive probability `fpp`,
    /// using the unscaled closed form `ceil(-n * ln(p) / ln(2)^2)`.
    ///
    /// Saturates at [`MAX_NUM_BUCKETS`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::common::SketchParams;
    /// assert_eq!(SketchParams::suggest_num_buckets(100, 0.05), 624);
    /// ```
    pub fn suggest_num_buckets(max_items: u64, fpp: f64) -> u64 {
        let buckets = optimal_num_buckets(max_items, fpp);
        if buckets >= MAX_NUM_BUCKETS as f64 {
            MAX_NUM_BUCKETS
        } else {
            (buckets as u64).max(MIN_NUM_BUCKETS)
        }
    }

    /// Suggests the number of hashes for `max_items` items spread over `num_buckets` buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::common::SketchParams;
    /// assert_eq!(SketchParams::suggest_num_hashes(1000, 9586), 7); // 6.64 rounded up
    /// ```
    pub fn suggest_num_hashes(max_items: u64, num_buckets: u64) -> u16 {
        let m = num_buckets as f64;
        let n = max_items.max(1) as f64;
        let k = (m / n * LN_2).ceil();
        if k >= f64::from(MAX_NUM_HASHES) {
            MAX_NUM_HASHES
        } else {
            (k as u16).max(MIN_NUM_HASHES)
        }
    }
}

fn optimal_num_buckets(max_items: u64, fpp: f64) -> f64 {
    let n = max_items as f64;
    (-n * fpp.ln() / (LN_2 * LN_2)).ceil()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_accuracy_sizing() {
        let cases = [
            (1000, 0.01, 19172, 26),
            (100, 0.05, 1248, 18),
            (10000, 0.05, 124706, 18),
            (50, 0.02, 816, 22),
            (100, 0.2, 670, 10),
            (10, 0.1, 96, 14),
            (1, 0.5, 4, 6),
        ];
        for (n, p, m, k) in cases {
            let params = SketchParams::from_accuracy(n, p).unwrap();
            assert_eq!(params.num_buckets(), m, "m for n={n}, p={p}");
            assert_eq!(params.num_hashes(), k, "k for n={n}, p={p}");
        }
    }

    #[test]
    fn test_accuracy_doubles_closed_form() {
        for (n, p) in [(1000, 0.01), (100, 0.05), (50, 0.02), (7, 0.3)] {
            let params = SketchParams::from_accuracy(n, p).unwrap();
            let m = SketchParams::suggest_num_buckets(n, p);
            assert_eq!(params.num_buckets(), 2 * m, "m for n={n}, p={p}");
            assert_eq!(params.num_hashes() % 2, 0, "k for n={n}, p={p}");
        }
        assert_eq!(SketchParams::suggest_num_buckets(1000, 0.01), 9586);
        assert_eq!(SketchParams::suggest_num_hashes(1000, 9586), 7);
    }

    #[test]
    fn test_accuracy_keeps_one_hash() {
        let params = SketchParams::from_accuracy(1000, 0.999).unwrap();
        assert_eq!(params.num_buckets(), 2 * SketchParams::suggest_num_buckets(1000, 0.999));
        assert_eq!(params.num_hashes(), MIN_NUM_HASHES);
    }

    #[test]
    fn test_invalid_accuracy() {
        let cases = [(0, 0.01), (10, 0.0), (10, 1.0), (10, -0.5), (10, 1.5), (10, f64::NAN)];
        for (n, p) in cases {
            let err = SketchParams::from_accuracy(n, p).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "n={n}, p={p}");
        }
    }

    #[test]
    fn test_oversized_accuracy() {
        let err = SketchParams::from_accuracy(u64::MAX, 1e-9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(
            SketchParams::suggest_num_buckets(u64::MAX, 1e-9),
            MAX_NUM_BUCKETS
        );
    }

    #[test]
    fn test_invalid_size() {
        assert!(SketchParams::from_size(0, 3).is_err());
        assert!(SketchParams::from_size(MAX_NUM_BUCKETS + 1, 3).is_err());
        assert!(SketchParams::from_size(64, 0).is_err());
        assert!(SketchParams::from_size(64, MAX_NUM_HASHES + 1).is_err());
        assert!(SketchParams::from_size(64, MAX_NUM_HASHES).is_ok());
    }
}
