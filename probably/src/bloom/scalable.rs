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

use super::BloomFilter;
use super::FilterOccupancy;
use super::FromAccuracy;
use super::MembershipFilter;
use crate::codec;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::family::Family;
use crate::codec::insufficient;
use crate::common::MAX_NUM_BUCKETS;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::HashEncoder;

/// Capacity of the first filter in the chain, and the floor for every later one.
pub const MINIMUM_CAPACITY: u64 = 50;

/// A chain of Bloom filters that grows as items arrive.
///
/// Items go to the newest filter until it has received as many items as it was sized for. The
/// chain then appends a filter with twice the capacity, built for the same false positive rate.
/// A lookup consults every filter, oldest first.
///
/// The false positive rate of each filter stays at `max_fpp`, but lookups can hit a false
/// positive in any of them, so the combined rate grows with the number of filters.
///
/// The child filter type `F` defaults to [`BloomFilter`]; any type implementing
/// [`MembershipFilter`] and [`FromAccuracy`] works, such as
/// [`CountingBloomFilter`](super::CountingBloomFilter).
///
/// # Examples
///
/// ```
/// use probably::bloom::ScalableBloomFilter;
///
/// let mut filter = ScalableBloomFilter::new(0.02).unwrap();
/// assert_eq!(filter.num_filters(), 0);
/// assert!(!filter.contains(&42));
///
/// filter.insert(&42);
/// assert!(filter.contains(&42));
/// assert_eq!(filter.num_filters(), 1);
/// assert_eq!(filter.capacity(), 50);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScalableBloomFilter<F = BloomFilter> {
    filters: Vec<F>,
    max_fpp: f64,
    seed: u32,
    /// Item budget of the newest filter
    capacity: u64,
    /// Items routed to the newest filter
    active_count: u64,
}

impl ScalableBloomFilter {
    /// Creates an empty chain whose filters each target false positive rate `max_fpp`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_fpp` is
    /// not in (0, 1).
    pub fn new(max_fpp: f64) -> Result<Self, Error> {
        Self::with_seed(max_fpp, DEFAULT_UPDATE_SEED)
    }

    /// Like [`new`](Self::new), with every filter hashing with `seed`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_seed(max_fpp: f64, seed: u32) -> Result<Self, Error> {
        Self::with_config(max_fpp, seed)
    }
}

impl<F> ScalableBloomFilter<F> {
    /// Creates an empty chain of `F` filters.
    ///
    /// The first filter is built on the first insert. A filter of [`MINIMUM_CAPACITY`] is also
    /// built and dropped here, so a configuration that `F` cannot build is rejected up front.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_fpp` is
    /// not in (0, 1), or the error from [`F::from_accuracy`](FromAccuracy::from_accuracy) if the
    /// first filter cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use probably::bloom::CountingBloomFilter;
    /// use probably::bloom::ScalableBloomFilter;
    ///
    /// let mut filter = ScalableBloomFilter::<CountingBloomFilter>::with_config(0.01, 7).unwrap();
    /// filter.insert("apple");
    /// assert!(filter.contains("apple"));
    /// ```
    pub fn with_config(max_fpp: f64, seed: u32) -> Result<Self, Error>
    where
        F: FromAccuracy,
    {
        let filter = Self::empty(max_fpp, seed)?;
        F::from_accuracy(MINIMUM_CAPACITY, max_fpp, seed)?;
        Ok(filter)
    }

    fn empty(max_fpp: f64, seed: u32) -> Result<Self, Error> {
        if !(max_fpp > 0.0 && max_fpp < 1.0) {
            return Err(Error::invalid_parameter(
                "maximum false positive probability must be in (0, 1)",
            )
            .with_context("max_fpp", max_fpp));
        }
        Ok(ScalableBloomFilter {
            filters: vec![],
            max_fpp,
            seed,
            capacity: 0,
            active_count: 0,
        })
    }

    /// Inserts an item into the newest filter, appending a filter first if the newest one is full.
    pub fn insert<T>(&mut self, item: &T)
    where
        T: ?Sized,
        F: MembershipFilter<T> + FromAccuracy,
    {
        if self.active_count >= self.capacity {
            self.grow();
        }
        if let Some(tail) = self.filters.last_mut() {
            tail.insert(item);
            self.active_count += 1;
        }
    }

    /// Returns `true` if any filter in the chain possibly contains the item.
    pub fn contains<T>(&self, item: &T) -> bool
    where
        T: ?Sized,
        F: MembershipFilter<T>,
    {
        self.filters.iter().any(|filter| filter.contains(item))
    }

    /// Returns whether the item was possibly present, then inserts it.
    pub fn contains_and_insert<T>(&mut self, item: &T) -> bool
    where
        T: ?Sized,
        F: MembershipFilter<T> + FromAccuracy,
    {
        let was_present = self.contains(item);
        self.insert(item);
        was_present
    }

    /// Returns the fraction of set buckets across all filters, or 0 if none exists yet.
    pub fn fill_ratio(&self) -> f64
    where
        F: FilterOccupancy,
    {
        FilterOccupancy::fill_ratio(self)
    }

    /// Returns the number of filters in the chain.
    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    /// Returns the filters, oldest first.
    pub fn filters(&self) -> &[F] {
        &self.filters
    }

    /// Returns the item budget of the newest filter, or 0 if none exists yet.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of items routed to the newest filter.
    pub fn active_count(&self) -> u64 {
        self.active_count
    }

    /// Returns the false positive rate each filter is sized for.
    pub fn max_fpp(&self) -> f64 {
        self.max_fpp
    }

    /// Returns the hash seed shared by every filter.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Returns whether no item has been inserted.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn grow(&mut self)
    where
        F: FromAccuracy,
    {
        let capacity = next_capacity(self.capacity, self.max_fpp);
        match F::from_accuracy(capacity, self.max_fpp, self.seed) {
            Ok(filter) => {
                self.filters.push(filter);
                self.capacity = capacity;
                self.active_count = 0;
                tracing::debug!(
                    num_filters = self.filters.len(),
                    capacity,
                    "appended filter to scalable bloom filter"
                );
            }
            Err(err) => {
                // keep filling the newest filter past its budget
                tracing::warn!(capacity, "cannot append filter to scalable bloom filter: {err}");
            }
        }
    }
}

/// Doubles the capacity, bounded below by [`MINIMUM_CAPACITY`] and above by the largest capacity
/// whose filter fits in [`MAX_NUM_BUCKETS`] once its closed-form size is doubled.
fn next_capacity(capacity: u64, max_fpp: f64) -> u64 {
    let closed_form_limit = (MAX_NUM_BUCKETS / 2) as f64;
    let largest = ((closed_form_limit * LN_2 * LN_2 / -max_fpp.ln()).floor() as u64)
        .saturating_sub(1);
    capacity
        .saturating_mul(2)
        .max(MINIMUM_CAPACITY)
        .min(largest.max(MINIMUM_CAPACITY))
}

impl<F: FilterOccupancy> FilterOccupancy for ScalableBloomFilter<F> {
    fn num_buckets(&self) -> u64 {
        self.filters.iter().map(FilterOccupancy::num_buckets).sum()
    }

    fn buckets_used(&self) -> u64 {
        self.filters.iter().map(FilterOccupancy::buckets_used).sum()
    }
}

impl<T, F> MembershipFilter<T> for ScalableBloomFilter<F>
where
    T: ?Sized,
    F: MembershipFilter<T> + FromAccuracy,
{
    fn insert(&mut self, item: &T) {
        ScalableBloomFilter::insert(self, item)
    }

    fn contains(&self, item: &T) -> bool {
        ScalableBloomFilter::contains(self, item)
    }
}

impl ScalableBloomFilter {
    /// Deserializes a chain from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are truncated,
    /// belong to another sketch family, or any filter in the chain is invalid.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_encoder(bytes, HashEncoder)
    }
}

impl<E> ScalableBloomFilter<BloomFilter<E>> {
    /// Serializes the chain, including every filter, to a byte vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use probably::bloom::ScalableBloomFilter;
    ///
    /// let mut filter = ScalableBloomFilter::new(0.02).unwrap();
    /// filter.insert(&42);
    ///
    /// let restored = ScalableBloomFilter::deserialize(&filter.serialize()).unwrap();
    /// assert!(restored.contains(&42));
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let children: Vec<Vec<u8>> = self.filters.iter().map(BloomFilter::serialize).collect();
        let payload: usize = children.iter().map(|child| 4 + child.len()).sum();
        let mut bytes = SketchBytes::with_capacity(
            8 * Family::SCALABLE_BLOOMFILTER.pre_longs as usize + payload,
        );

        let flags = if self.is_empty() {
            codec::FLAGS_IS_EMPTY
        } else {
            0
        };
        codec::write_preamble(&mut bytes, &Family::SCALABLE_BLOOMFILTER, flags);
        bytes.write_u32_le(0); // unused
        bytes.write_f64_le(self.max_fpp);
        bytes.write_u32_le(self.seed);
        bytes.write_u32_le(self.filters.len() as u32);
        bytes.write_u64_le(self.capacity);
        bytes.write_u64_le(self.active_count);

        for child in &children {
            bytes.write_u32_le(child.len() as u32);
            bytes.write(child);
        }

        bytes.into_bytes()
    }

    /// Deserializes a chain whose filters are fed by `encoder`.
    ///
    /// # Errors
    ///
    /// See [`ScalableBloomFilter::deserialize`].
    pub fn deserialize_with_encoder(bytes: &[u8], encoder: E) -> Result<Self, Error>
    where
        E: Clone,
    {
        let mut cursor = SketchSlice::new(bytes);
        codec::read_preamble(&mut cursor, &Family::SCALABLE_BLOOMFILTER)?;
        cursor.read_u32_le().map_err(insufficient("unused"))?;
        let max_fpp = cursor.read_f64_le().map_err(insufficient("max_fpp"))?;
        let seed = cursor.read_u32_le().map_err(insufficient("seed"))?;
        let num_filters = cursor.read_u32_le().map_err(insufficient("num_filters"))?;
        let capacity = cursor.read_u64_le().map_err(insufficient("capacity"))?;
        let active_count = cursor.read_u64_le().map_err(insufficient("active_count"))?;

        let mut filter = Self::empty(max_fpp, seed)
            .map_err(|err| Error::deserial("invalid scalable bloom filter").set_source(err))?;
        for _ in 0..num_filters {
            let len = cursor.read_u32_le().map_err(insufficient("filter_len"))?;
            let child = cursor
                .read_slice(len as usize)
                .map_err(insufficient("filter"))?;
            let child = BloomFilter::deserialize_with_encoder(child, encoder.clone())?;
            if child.seed() != seed {
                return Err(Error::deserial("filter seed differs from chain seed")
                    .with_context("seed", seed)
                    .with_context("filter_seed", child.seed()));
            }
            filter.filters.push(child);
        }
        if filter.filters.is_empty() && (capacity != 0 || active_count != 0) {
            return Err(Error::deserial("empty chain with a non-zero item budget")
                .with_context("capacity", capacity)
                .with_context("active_count", active_count));
        }
        filter.capacity = capacity;
        filter.active_count = active_count;
        Ok(filter)
    }
}
