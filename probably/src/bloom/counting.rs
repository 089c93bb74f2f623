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

use std::hash::Hash;

use super::FilterOccupancy;
use super::FromAccuracy;
use super::MembershipFilter;
use crate::codec;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::family::Family;
use crate::codec::insufficient;
use crate::common::SketchParams;
use crate::error::Error;
use crate::hash::BaseHashes;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::DoubleHasher;
use crate::hash::HashEncoder;
use crate::hash::ItemEncoder;

/// A Bloom filter over 8-bit counters, which allows items to be removed.
///
/// Each of the `m` buckets is a counter instead of a bit. Inserting increments the `k` counters
/// of an item and removing decrements them. Counters saturate at 255 and never go below 0;
/// a saturated counter no longer tracks exact multiplicity, so removing an item whose counters
/// were saturated may leave it reported as present.
///
/// # Examples
///
/// ```
/// use probably::bloom::CountingBloomFilter;
///
/// let mut filter = CountingBloomFilter::create(100, 0.01).unwrap();
/// filter.insert("apple");
/// assert!(filter.contains("apple"));
///
/// assert!(filter.remove("apple"));
/// assert!(!filter.contains("apple"));
/// assert!(!filter.remove("apple"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CountingBloomFilter<E = HashEncoder> {
    hasher: DoubleHasher<E>,
    num_hashes: u16,
    /// Number of counters above zero
    num_nonzero: u64,
    counters: Vec<u8>,
}

impl CountingBloomFilter {
    /// Creates a filter sized for `max_items` distinct items at false positive rate `fpp`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_items`
    /// is 0 or `fpp` is not in (0, 1).
    pub fn create(max_items: u64, fpp: f64) -> Result<Self, Error> {
        Self::with_seed(max_items, fpp, DEFAULT_UPDATE_SEED)
    }

    /// Like [`create`](Self::create), hashing with `seed`.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub fn with_seed(max_items: u64, fpp: f64, seed: u32) -> Result<Self, Error> {
        let params = SketchParams::from_accuracy(max_items, fpp)?;
        Ok(Self::with_params(params, DoubleHasher::new(seed)))
    }

    /// Creates a filter with exactly `num_counters` counters indexed by `num_hashes` hashes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if either value
    /// is out of range.
    pub fn with_size(num_counters: u64, num_hashes: u16) -> Result<Self, Error> {
        let params = SketchParams::from_size(num_counters, num_hashes)?;
        Ok(Self::with_params(params, DoubleHasher::default()))
    }

    /// Deserializes a filter from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are truncated,
    /// belong to another sketch family, or describe an invalid filter.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_encoder(bytes, HashEncoder)
    }
}

impl<E> CountingBloomFilter<E> {
    /// Creates an empty filter from validated parameters and a configured hasher.
    pub fn with_params(params: SketchParams, hasher: DoubleHasher<E>) -> Self {
        let num_counters = params.num_buckets();
        let num_hashes = params.num_hashes();
        tracing::trace!(
            num_counters,
            num_hashes,
            seed = hasher.seed(),
            "created counting bloom filter"
        );

        CountingBloomFilter {
            hasher,
            num_hashes,
            num_nonzero: 0,
            counters: vec![0u8; num_counters as usize],
        }
    }

    /// Increments the `k` counters of the item, saturating at 255.
    pub fn insert<T>(&mut self, item: &T)
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        self.increment(hashes);
    }

    /// Returns `true` if all `k` counters of the item are above zero.
    pub fn contains<T>(&self, item: &T) -> bool
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        self.all_nonzero(self.hasher.base_hashes(item))
    }

    /// Returns whether the item was possibly present, then inserts it.
    pub fn contains_and_insert<T>(&mut self, item: &T) -> bool
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        let was_present = self.all_nonzero(hashes);
        self.increment(hashes);
        was_present
    }

    /// Removes one occurrence of the item.
    ///
    /// Returns `false` and leaves the filter untouched if the item is not contained. Otherwise
    /// decrements each of its `k` counters and returns `true`.
    ///
    /// Removing an item that was never inserted but is reported present (a false positive)
    /// decrements counters that belong to other items, which can introduce false negatives.
    pub fn remove<T>(&mut self, item: &T) -> bool
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        if !self.all_nonzero(hashes) {
            return false;
        }
        for index in hashes.indices(self.num_hashes, self.num_counters()) {
            let counter = &mut self.counters[index as usize];
            if *counter == 1 {
                self.num_nonzero -= 1;
            }
            *counter = counter.saturating_sub(1);
        }
        true
    }

    /// Returns the smallest of the item's `k` counters.
    ///
    /// This bounds how many times the item was inserted, up to saturation at 255.
    pub fn counter_at<T>(&self, item: &T) -> u8
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        self.hasher
            .base_hashes(item)
            .indices(self.num_hashes, self.num_counters())
            .map(|index| self.counters[index as usize])
            .min()
            .unwrap_or(0)
    }

    /// Returns the fraction of counters above zero.
    pub fn fill_ratio(&self) -> f64 {
        self.num_nonzero as f64 / self.counters.len() as f64
    }

    /// Returns the number of counters (m).
    pub fn num_counters(&self) -> u64 {
        self.counters.len() as u64
    }

    /// Returns the number of hash functions used (k).
    pub fn num_hashes(&self) -> u16 {
        self.num_hashes
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u32 {
        self.hasher.seed()
    }

    /// Returns whether every counter is zero.
    pub fn is_empty(&self) -> bool {
        self.num_nonzero == 0
    }

    /// Serializes the filter to a byte vector.
    ///
    /// An empty filter omits its counters.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let payload = if is_empty { 0 } else { self.counters.len() };
        let mut bytes = SketchBytes::with_capacity(
            8 * Family::COUNTING_BLOOMFILTER.pre_longs as usize + payload,
        );

        let flags = if is_empty { codec::FLAGS_IS_EMPTY } else { 0 };
        codec::write_preamble(&mut bytes, &Family::COUNTING_BLOOMFILTER, flags);
        bytes.write_u16_le(self.num_hashes);
        bytes.write_u16_le(0); // unused
        bytes.write_u32_le(self.seed());
        bytes.write_u32_le(0); // unused
        bytes.write_u64_le(self.num_counters());

        if !is_empty {
            bytes.write(&self.counters);
        }

        bytes.into_bytes()
    }

    /// Deserializes a filter whose secondary hash is fed by `encoder`.
    ///
    /// # Errors
    ///
    /// See [`CountingBloomFilter::deserialize`].
    pub fn deserialize_with_encoder(bytes: &[u8], encoder: E) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = codec::read_preamble(&mut cursor, &Family::COUNTING_BLOOMFILTER)?;
        let is_empty = flags & codec::FLAGS_IS_EMPTY != 0;

        let num_hashes = cursor.read_u16_le().map_err(insufficient("num_hashes"))?;
        cursor.read_u16_le().map_err(insufficient("unused"))?;
        let seed = cursor.read_u32_le().map_err(insufficient("seed"))?;
        cursor.read_u32_le().map_err(insufficient("unused"))?;
        let num_counters = cursor.read_u64_le().map_err(insufficient("num_counters"))?;

        let params = SketchParams::from_size(num_counters, num_hashes).map_err(|err| {
            Error::deserial("invalid counting bloom filter shape").set_source(err)
        })?;
        if is_empty {
            return Ok(Self::with_params(
                params,
                DoubleHasher::with_encoder(seed, encoder),
            ));
        }

        let counters = cursor
            .read_slice(num_counters as usize)
            .map_err(insufficient("counters"))?;
        let num_nonzero = counters.iter().filter(|c| **c > 0).count() as u64;
        Ok(CountingBloomFilter {
            hasher: DoubleHasher::with_encoder(seed, encoder),
            num_hashes,
            num_nonzero,
            counters: counters.to_vec(),
        })
    }

    fn all_nonzero(&self, hashes: BaseHashes) -> bool {
        hashes
            .indices(self.num_hashes, self.num_counters())
            .all(|index| self.counters[index as usize] > 0)
    }

    fn increment(&mut self, hashes: BaseHashes) {
        for index in hashes.indices(self.num_hashes, self.num_counters()) {
            let counter = &mut self.counters[index as usize];
            if *counter == 0 {
                self.num_nonzero += 1;
            }
            *counter = counter.saturating_add(1);
        }
    }
}

impl<E> FilterOccupancy for CountingBloomFilter<E> {
    fn num_buckets(&self) -> u64 {
        self.num_counters()
    }

    fn buckets_used(&self) -> u64 {
        self.num_nonzero
    }
}

impl<T, E> MembershipFilter<T> for CountingBloomFilter<E>
where
    T: Hash + ?Sized,
    E: ItemEncoder<T>,
{
    fn insert(&mut self, item: &T) {
        let hashes = self.hasher.base_hashes(item);
        self.increment(hashes);
    }

    fn contains(&self, item: &T) -> bool {
        self.all_nonzero(self.hasher.base_hashes(item))
    }
}

impl<E: Default> FromAccuracy for CountingBloomFilter<E> {
    fn from_accuracy(max_items: u64, fpp: f64, seed: u32) -> Result<Self, Error> {
        let params = SketchParams::from_accuracy(max_items, fpp)?;
        Ok(CountingBloomFilter::with_params(
            params,
            DoubleHasher::with_encoder(seed, E::default()),
        ))
    }
}
