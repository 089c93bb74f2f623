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

//! Bloom filters for probabilistic set membership testing.
//!
//! Three variants share the same parameter derivation and [`DoubleHasher`](crate::hash::DoubleHasher):
//!
//! - [`BloomFilter`]: a fixed-size bit vector. Items cannot be removed.
//! - [`CountingBloomFilter`]: saturating 8-bit counters instead of bits, so items can be removed.
//! - [`ScalableBloomFilter`]: a chain of filters that grows as items arrive, for streams whose
//!   size is not known up front.
//!
//! None of them produces false negatives. False positives happen at a rate controlled by the
//! sizing parameters.
//!
//! # Usage
//!
//! ```rust
//! use probably::bloom::BloomFilter;
//!
//! let mut filter = BloomFilter::create(1000, 0.01).unwrap();
//! filter.insert("apple");
//!
//! assert!(filter.contains("apple"));
//! assert!(filter.fill_ratio() > 0.0);
//! ```
//!
//! # Growing without a size estimate
//!
//! ```rust
//! use probably::bloom::ScalableBloomFilter;
//!
//! let mut filter = ScalableBloomFilter::new(0.02).unwrap();
//! for i in 0..150u32 {
//!     filter.insert(&i);
//! }
//! assert_eq!(filter.num_filters(), 2);
//! assert!(filter.contains(&42u32));
//! ```
//!
//! # Generic code
//!
//! [`MembershipFilter`] is implemented by every variant, so code can accept any of them:
//!
//! ```rust
//! use probably::bloom::CountingBloomFilter;
//! use probably::bloom::MembershipFilter;
//!
//! fn seen_before<F: MembershipFilter<str>>(filter: &mut F, word: &str) -> bool {
//!     filter.contains_and_insert(word)
//! }
//!
//! let mut filter = CountingBloomFilter::create(100, 0.01).unwrap();
//! assert!(!seen_before(&mut filter, "hello"));
//! assert!(seen_before(&mut filter, "hello"));
//! ```

mod builder;
mod counting;
mod scalable;
mod sketch;

pub use self::builder::BloomFilterBuilder;
pub use self::counting::CountingBloomFilter;
pub use self::scalable::MINIMUM_CAPACITY;
pub use self::scalable::ScalableBloomFilter;
pub use self::sketch::BloomFilter;
use crate::error::Error;

/// Bucket occupancy of a filter, independent of the item type.
pub trait FilterOccupancy {
    /// Returns the number of buckets (bits or counters).
    fn num_buckets(&self) -> u64;

    /// Returns the number of buckets that are set (bits set, or counters above zero).
    fn buckets_used(&self) -> u64;

    /// Returns the fraction of buckets that are set, in `[0, 1]`.
    fn fill_ratio(&self) -> f64 {
        let num_buckets = self.num_buckets();
        if num_buckets == 0 {
            return 0.0;
        }
        self.buckets_used() as f64 / num_buckets as f64
    }
}

/// The capability shared by every membership filter: add items and ask whether they were seen.
pub trait MembershipFilter<T: ?Sized>: FilterOccupancy {
    /// Records the item.
    fn insert(&mut self, item: &T);

    /// Returns `false` if the item was definitely never inserted, `true` if it possibly was.
    fn contains(&self, item: &T) -> bool;

    /// Returns what [`contains`](Self::contains) would have returned, then inserts the item.
    fn contains_and_insert(&mut self, item: &T) -> bool {
        let was_present = self.contains(item);
        self.insert(item);
        was_present
    }
}

/// Filters that can be sized from an expected item count and a target false positive rate.
///
/// [`ScalableBloomFilter`] uses it to build each new filter in its chain.
pub trait FromAccuracy: Sized {
    /// Creates an empty filter sized for `max_items` items at false positive rate `fpp`,
    /// hashing with `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if the
    /// parameters are out of range.
    fn from_accuracy(max_items: u64, fpp: f64, seed: u32) -> Result<Self, Error>;
}
