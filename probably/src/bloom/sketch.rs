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

use super::BloomFilterBuilder;
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
use crate::hash::DoubleHasher;
use crate::hash::HashEncoder;
use crate::hash::ItemEncoder;

/// A Bloom filter for probabilistic set membership testing.
///
/// Provides fast membership queries with:
/// - No false negatives (inserted items always return `true`)
/// - Tunable false positive rate
/// - Constant space usage
///
/// Create one with [`BloomFilter::create`] or, for more control, with [`BloomFilterBuilder`].
/// The encoder type `E` feeds the secondary hash and defaults to [`HashEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter<E = HashEncoder> {
    hasher: DoubleHasher<E>,
    /// Number of hash functions to use (k)
    num_hashes: u16,
    /// Total number of bits in the filter (m)
    num_bits: u64,
    /// Count of bits set to 1
    num_bits_set: u64,
    /// Bit array packed into u64 words, length = ceil(num_bits / 64)
    bit_array: Vec<u64>,
}

impl BloomFilter {
    /// Creates a filter sized for `max_items` distinct items at false positive rate `fpp`.
    ///
    /// The bit and hash counts are twice the closed form, see [`SketchParams::from_accuracy`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_items`
    /// is 0 or `fpp` is not in (0, 1).
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilter;
    /// let filter = BloomFilter::create(1000, 0.01).unwrap();
    /// assert_eq!(filter.num_bits(), 19172);
    /// assert_eq!(filter.num_hashes(), 26);
    ///
    /// assert!(BloomFilter::create(0, 0.01).is_err());
    /// ```
    pub fn create(max_items: u64, fpp: f64) -> Result<Self, Error> {
        BloomFilterBuilder::with_accuracy(max_items, fpp).build()
    }

    /// Deserializes a filter from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidData`](crate::error::ErrorKind::InvalidData) if:
    /// - The data is truncated or corrupted
    /// - The family ID doesn't match (not a Bloom filter)
    /// - The serial version is unsupported
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilter;
    /// let mut original = BloomFilter::create(100, 0.01).unwrap();
    /// original.insert("test");
    /// let bytes = original.serialize();
    ///
    /// let restored = BloomFilter::deserialize(&bytes).unwrap();
    /// assert_eq!(original, restored);
    /// assert!(restored.contains("test"));
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_encoder(bytes, HashEncoder)
    }
}

impl<E> BloomFilter<E> {
    /// Creates an empty filter from validated parameters and a configured hasher.
    pub fn with_params(params: SketchParams, hasher: DoubleHasher<E>) -> Self {
        let num_bits = params.num_buckets();
        let num_hashes = params.num_hashes();
        tracing::trace!(num_bits, num_hashes, seed = hasher.seed(), "created bloom filter");

        BloomFilter {
            hasher,
            num_hashes,
            num_bits,
            num_bits_set: 0,
            bit_array: vec![0u64; num_bits.div_ceil(64) as usize],
        }
    }

    /// Tests whether an item is possibly in the set.
    ///
    /// Returns:
    /// - `true`: Item was **possibly** inserted (or false positive)
    /// - `false`: Item was **definitely not** inserted
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilter;
    /// let mut filter = BloomFilter::create(100, 0.01).unwrap();
    /// filter.insert("apple");
    ///
    /// assert!(filter.contains("apple")); // true - was inserted
    /// ```
    pub fn contains<T>(&self, item: &T) -> bool
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        if self.is_empty() {
            return false;
        }
        self.check_bits(self.hasher.base_hashes(item))
    }

    /// Tests and inserts an item in a single operation.
    ///
    /// Returns whether the item was possibly already in the set before insertion. The item is
    /// hashed once.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilter;
    /// let mut filter = BloomFilter::create(100, 0.01).unwrap();
    ///
    /// assert!(!filter.contains_and_insert(&42u64)); // First insertion
    /// assert!(filter.contains_and_insert(&42u64)); // Now it's in the set
    /// ```
    pub fn contains_and_insert<T>(&mut self, item: &T) -> bool
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        let was_present = self.check_bits(hashes);
        self.set_bits(hashes);
        was_present
    }

    /// Inserts an item into the filter.
    ///
    /// After insertion, `contains(item)` will always return `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilter;
    /// let mut filter = BloomFilter::create(100, 0.01).unwrap();
    ///
    /// filter.insert("apple");
    /// filter.insert(&42_u64);
    /// filter.insert(&[1, 2, 3]);
    ///
    /// assert!(filter.contains("apple"));
    /// ```
    pub fn insert<T>(&mut self, item: &T)
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let hashes = self.hasher.base_hashes(item);
        self.set_bits(hashes);
    }

    /// Resets the filter to its initial empty state.
    ///
    /// Clears all bits while preserving size and configuration.
    pub fn reset(&mut self) {
        self.bit_array.fill(0);
        self.num_bits_set = 0;
    }

    /// Merges another filter into this one via bitwise OR (union).
    ///
    /// After merging, this filter will recognize items from either filter
    /// (plus any false positives from either).
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleMerge`](crate::error::ErrorKind::IncompatibleMerge) if the filters
    /// differ in size, number of hashes or seed. This filter is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilterBuilder;
    /// let mut f1 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
    /// let mut f2 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
    ///
    /// f1.insert("a");
    /// f2.insert("b");
    ///
    /// f1.union(&f2).unwrap();
    /// assert!(f1.contains("a"));
    /// assert!(f1.contains("b"));
    /// ```
    pub fn union(&mut self, other: &BloomFilter<E>) -> Result<(), Error> {
        if !self.is_compatible(other) {
            return Err(Error::incompatible_merge("bloom filters differ in shape or seed")
                .with_context("num_bits", self.num_bits)
                .with_context("other_num_bits", other.num_bits)
                .with_context("num_hashes", self.num_hashes)
                .with_context("other_num_hashes", other.num_hashes)
                .with_context("seed", self.seed())
                .with_context("other_seed", other.seed()));
        }

        for (word, other_word) in self.bit_array.iter_mut().zip(&other.bit_array) {
            *word |= *other_word;
        }
        self.num_bits_set = count_bits(&self.bit_array);
        Ok(())
    }

    /// Returns whether the filter is empty (no items inserted).
    pub fn is_empty(&self) -> bool {
        self.num_bits_set == 0
    }

    /// Returns the number of bits set to 1.
    pub fn bits_used(&self) -> u64 {
        self.num_bits_set
    }

    /// Returns the total number of bits in the filter (m).
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Returns the number of hash functions used (k).
    pub fn num_hashes(&self) -> u16 {
        self.num_hashes
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u32 {
        self.hasher.seed()
    }

    /// Returns the fraction of bits set.
    ///
    /// Never decreases as items are inserted. Values above 0.5 indicate the filter holds more
    /// items than it was sized for.
    pub fn fill_ratio(&self) -> f64 {
        self.num_bits_set as f64 / self.num_bits as f64
    }

    /// Estimates the current false positive probability.
    ///
    /// Based on the formula: `(1 - e^(-k * load))^k` where the load is the
    /// [fill ratio](Self::fill_ratio). This assumes a uniform bit distribution.
    pub fn estimated_fpp(&self) -> f64 {
        let k = f64::from(self.num_hashes);
        (1.0 - (-k * self.fill_ratio()).exp()).powf(k)
    }

    /// Checks if two filters are compatible for merging.
    ///
    /// Filters are compatible if they have the same number of bits, number of hash functions
    /// and seed.
    pub fn is_compatible(&self, other: &BloomFilter<E>) -> bool {
        self.num_bits == other.num_bits
            && self.num_hashes == other.num_hashes
            && self.seed() == other.seed()
    }

    /// Serializes the filter to a byte vector.
    ///
    /// An empty filter omits its bit array.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let payload = if is_empty {
            0
        } else {
            8 + self.bit_array.len() * 8
        };
        let mut bytes =
            SketchBytes::with_capacity(8 * Family::BLOOMFILTER.pre_longs as usize + payload);

        let flags = if is_empty { codec::FLAGS_IS_EMPTY } else { 0 };
        codec::write_preamble(&mut bytes, &Family::BLOOMFILTER, flags);
        bytes.write_u16_le(self.num_hashes);
        bytes.write_u16_le(0); // unused
        bytes.write_u32_le(self.seed());
        bytes.write_u32_le(0); // unused
        bytes.write_u64_le(self.num_bits);

        if !is_empty {
            bytes.write_u64_le(self.num_bits_set);
            for &word in &self.bit_array {
                bytes.write_u64_le(word);
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a filter whose secondary hash is fed by `encoder`.
    ///
    /// The encoder must be the one the serialized filter was built with, otherwise lookups
    /// check the wrong bits.
    ///
    /// # Errors
    ///
    /// See [`BloomFilter::deserialize`].
    pub fn deserialize_with_encoder(bytes: &[u8], encoder: E) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = codec::read_preamble(&mut cursor, &Family::BLOOMFILTER)?;
        let is_empty = flags & codec::FLAGS_IS_EMPTY != 0;

        let num_hashes = cursor.read_u16_le().map_err(insufficient("num_hashes"))?;
        cursor.read_u16_le().map_err(insufficient("unused"))?;
        let seed = cursor.read_u32_le().map_err(insufficient("seed"))?;
        cursor.read_u32_le().map_err(insufficient("unused"))?;
        let num_bits = cursor.read_u64_le().map_err(insufficient("num_bits"))?;

        let params = SketchParams::from_size(num_bits, num_hashes)
            .map_err(|err| Error::deserial("invalid bloom filter shape").set_source(err))?;
        if !is_empty {
            // bits_set plus the words
            let longs = num_bits.div_ceil(64) + 1;
            if ((cursor.remaining() / 8) as u64) < longs {
                return Err(Error::insufficient_data("bit_array")
                    .with_context("longs", longs)
                    .with_context("remaining_bytes", cursor.remaining()));
            }
        }

        let mut filter = BloomFilter::with_params(params, DoubleHasher::with_encoder(seed, encoder));
        if is_empty {
            return Ok(filter);
        }

        let num_bits_set = cursor.read_u64_le().map_err(insufficient("num_bits_set"))?;
        for word in &mut filter.bit_array {
            *word = cursor.read_u64_le().map_err(insufficient("bit_array"))?;
        }

        let excess_bits = num_bits % 64;
        if excess_bits != 0 {
            let last = filter.bit_array[filter.bit_array.len() - 1];
            if last >> excess_bits != 0 {
                return Err(Error::deserial("bits set beyond the end of the filter"));
            }
        }
        let counted = count_bits(&filter.bit_array);
        if counted != num_bits_set {
            return Err(Error::deserial("bit count does not match bit array")
                .with_context("num_bits_set", num_bits_set)
                .with_context("counted", counted));
        }
        filter.num_bits_set = counted;
        Ok(filter)
    }

    fn check_bits(&self, hashes: BaseHashes) -> bool {
        hashes
            .indices(self.num_hashes, self.num_bits)
            .all(|bit_index| self.get_bit(bit_index))
    }

    fn set_bits(&mut self, hashes: BaseHashes) {
        for bit_index in hashes.indices(self.num_hashes, self.num_bits) {
            self.set_bit(bit_index);
        }
    }

    fn get_bit(&self, bit_index: u64) -> bool {
        let word_index = (bit_index / 64) as usize;
        let mask = 1u64 << (bit_index % 64);
        (self.bit_array[word_index] & mask) != 0
    }

    /// Sets a single bit and updates the count if it wasn't already set.
    fn set_bit(&mut self, bit_index: u64) {
        let word_index = (bit_index / 64) as usize;
        let mask = 1u64 << (bit_index % 64);

        if (self.bit_array[word_index] & mask) == 0 {
            self.bit_array[word_index] |= mask;
            self.num_bits_set += 1;
        }
    }
}

fn count_bits(words: &[u64]) -> u64 {
    words.iter().map(|word| u64::from(word.count_ones())).sum()
}

impl<E> FilterOccupancy for BloomFilter<E> {
    fn num_buckets(&self) -> u64 {
        self.num_bits
    }

    fn buckets_used(&self) -> u64 {
        self.num_bits_set
    }
}

impl<T, E> MembershipFilter<T> for BloomFilter<E>
where
    T: Hash + ?Sized,
    E: ItemEncoder<T>,
{
    fn insert(&mut self, item: &T) {
        let hashes = self.hasher.base_hashes(item);
        self.set_bits(hashes);
    }

    fn contains(&self, item: &T) -> bool {
        !self.is_empty() && self.check_bits(self.hasher.base_hashes(item))
    }

    fn contains_and_insert(&mut self, item: &T) -> bool {
        let hashes = self.hasher.base_hashes(item);
        let was_present = self.check_bits(hashes);
        self.set_bits(hashes);
        was_present
    }
}

impl<E: Default> FromAccuracy for BloomFilter<E> {
    fn from_accuracy(max_items: u64, fpp: f64, seed: u32) -> Result<Self, Error> {
        let params = SketchParams::from_accuracy(max_items, fpp)?;
        Ok(BloomFilter::with_params(
            params,
            DoubleHasher::with_encoder(seed, E::default()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::DEFAULT_UPDATE_SEED;

    #[test]
    fn test_create_with_accuracy() {
        let filter = BloomFilter::create(1000, 0.01).unwrap();
        assert_eq!(filter.num_bits(), 19172);
        assert_eq!(filter.num_hashes(), 26);
        assert_eq!(filter.seed(), DEFAULT_UPDATE_SEED);
        assert!(filter.is_empty());
        assert_eq!(filter.fill_ratio(), 0.0);
    }

    #[test]
    fn test_create_rejects_invalid_parameters() {
        for (n, p) in [(0, 0.01), (100, 0.0), (100, 1.0), (100, 1.5)] {
            let err = BloomFilter::create(n, p).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn test_insert_and_contains() {
        let mut filter = BloomFilter::create(100, 0.01).unwrap();

        assert!(!filter.contains("apple"));
        filter.insert("apple");
        assert!(filter.contains("apple"));
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_contains_and_insert() {
        let mut filter = BloomFilter::create(100, 0.01).unwrap();

        assert!(!filter.contains_and_insert(&42_u64));
        assert!(filter.contains_and_insert(&42_u64));
        assert!(filter.contains(&42_u64));
    }

    #[test]
    fn test_fill_ratio_counts_distinct_bits() {
        let params = SketchParams::from_size(250, 3).unwrap();
        let hasher = DoubleHasher::new(DEFAULT_UPDATE_SEED);
        let mut filter = BloomFilter::with_params(params, hasher);
        filter.insert(&42u64);

        let expected: HashSet<u64> = DoubleHasher::new(DEFAULT_UPDATE_SEED)
            .bucket_indices(&42u64, 3, 250)
            .collect();
        assert_eq!(filter.bits_used(), expected.len() as u64);
        assert_eq!(filter.fill_ratio(), expected.len() as f64 / 250.0);
    }

    #[test]
    fn test_fill_ratio_is_monotone() {
        let mut filter = BloomFilter::create(200, 0.05).unwrap();
        let mut previous = filter.fill_ratio();
        for i in 0..400u32 {
            filter.insert(&i);
            let current = filter.fill_ratio();
            assert!(current >= previous);
            assert!(current <= 1.0);
            previous = current;
        }
    }

    #[test]
    fn test_reset() {
        let mut filter = BloomFilter::create(100, 0.01).unwrap();
        filter.insert("test");
        assert!(!filter.is_empty());

        filter.reset();
        assert!(filter.is_empty());
        assert!(!filter.contains("test"));
    }

    #[test]
    fn test_union() {
        let mut f1 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(123)
            .build()
            .unwrap();
        let mut f2 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(123)
            .build()
            .unwrap();

        f1.insert("a");
        f2.insert("b");

        f1.union(&f2).unwrap();
        assert!(f1.contains("a"));
        assert!(f1.contains("b"));
        assert!(f1.bits_used() >= f2.bits_used());
    }

    #[test]
    fn test_union_incompatible_leaves_receiver_intact() {
        let mut f1 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(123)
            .build()
            .unwrap();
        let mut f2 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(456)
            .build()
            .unwrap();
        f1.insert("a");
        f2.insert("b");
        let before = f1.clone();

        let err = f1.union(&f2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleMerge);
        assert_eq!(f1, before);
    }

    #[test]
    fn test_serialize_deserialize_empty() {
        let filter = BloomFilter::create(100, 0.01).unwrap();
        let bytes = filter.serialize();
        assert_eq!(bytes.len(), 24);

        let restored = BloomFilter::deserialize(&bytes).unwrap();
        assert_eq!(filter, restored);
    }

    #[test]
    fn test_serialize_deserialize_with_data() {
        let mut filter = BloomFilter::create(100, 0.01).unwrap();
        filter.insert("test");
        filter.insert(&42_u64);

        let bytes = filter.serialize();
        let restored = BloomFilter::deserialize(&bytes).unwrap();

        assert_eq!(filter, restored);
        assert!(restored.contains("test"));
        assert!(restored.contains(&42_u64));
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_bit_count() {
        let mut filter = BloomFilter::create(100, 0.01).unwrap();
        filter.insert("test");
        let mut bytes = filter.serialize();
        // bits_set lives right after the 24-byte preamble
        bytes[24] = bytes[24].wrapping_add(1);

        let err = BloomFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_statistics() {
        let params = SketchParams::from_size(1000, 5).unwrap();
        let hasher = DoubleHasher::new(DEFAULT_UPDATE_SEED);
        let mut filter = BloomFilter::with_params(params, hasher);
        assert_eq!(filter.bits_used(), 0);
        assert_eq!(filter.estimated_fpp(), 0.0);

        filter.insert("test");
        assert!(filter.bits_used() > 0);
        assert!(filter.fill_ratio() > 0.0);
        assert!(filter.estimated_fpp() > 0.0);
    }

    #[test]
    fn test_is_compatible() {
        let f1 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(123)
            .build()
            .unwrap();
        let f2 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(123)
            .build()
            .unwrap();
        let f3 = BloomFilterBuilder::with_accuracy(100, 0.01)
            .seed(456)
            .build()
            .unwrap();
        let f4 = BloomFilterBuilder::with_accuracy(200, 0.01)
            .seed(123)
            .build()
            .unwrap();

        assert!(f1.is_compatible(&f2));
        assert!(!f1.is_compatible(&f3));
        assert!(!f1.is_compatible(&f4));
    }

    #[test]
    fn test_trait_and_inherent_agree() {
        let mut inherent = BloomFilter::create(100, 0.01).unwrap();
        let mut generic = BloomFilter::create(100, 0.01).unwrap();
        for i in 0..50u32 {
            inherent.insert(&i);
            MembershipFilter::insert(&mut generic, &i);
        }
        assert_eq!(inherent, generic);
        assert_eq!(
            FilterOccupancy::fill_ratio(&generic),
            inherent.fill_ratio()
        );
    }
}
