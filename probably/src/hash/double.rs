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
use std::iter::FusedIterator;

use super::DEFAULT_UPDATE_SEED;
use super::HashEncoder;
use super::ItemEncoder;

/// Seed of the primary hash. Fixed so that the primary hash of an item never changes.
const PRIMARY_SEED: u32 = 293;

/// Derives any number of bucket indices from two base hashes of an item (Kirsch-Mitzenmacher).
///
/// - `h1` is the 32-bit MurmurHash3 of the item's [`Hash`] stream under a fixed seed.
/// - `h2` is the 32-bit MurmurHash3 of the bytes produced by the [`ItemEncoder`], under the
///   configurable seed.
///
/// The `i`-th index is `|h1 + i * h2| mod m`. The derived indices are not independent hash
/// functions: items whose `h1` and `h2` collide share every index. The error-rate formulas used
/// for sizing treat them as independent, which is an approximation.
///
/// # Examples
///
/// ```
/// use probably::hash::DoubleHasher;
///
/// let hasher = DoubleHasher::new(9001);
/// let indices: Vec<u64> = hasher.bucket_indices(&42u64, 3, 250).collect();
/// assert_eq!(indices.len(), 3);
/// assert!(indices.iter().all(|i| *i < 250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleHasher<E = HashEncoder> {
    seed: u32,
    encoder: E,
}

impl DoubleHasher {
    /// Creates a hasher that encodes items with [`HashEncoder`].
    pub fn new(seed: u32) -> Self {
        Self::with_encoder(seed, HashEncoder)
    }
}

impl Default for DoubleHasher {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }
}

impl<E> DoubleHasher<E> {
    /// Creates a hasher that feeds the secondary hash with `encoder`.
    pub fn with_encoder(seed: u32, encoder: E) -> Self {
        DoubleHasher { seed, encoder }
    }

    /// Returns the seed of the secondary hash.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Returns the encoder feeding the secondary hash.
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Computes the two base hashes of an item.
    pub fn base_hashes<T>(&self, item: &T) -> BaseHashes
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        let mut buf = Vec::with_capacity(32);
        HashEncoder.encode(item, &mut buf);
        let h1 = mur3::murmurhash3_x86_32(&buf, PRIMARY_SEED) as i32;

        buf.clear();
        self.encoder.encode(item, &mut buf);
        let h2 = mur3::murmurhash3_x86_32(&buf, self.seed) as i32;

        BaseHashes { h1, h2 }
    }

    /// Returns `num_hashes` indices in `[0, num_buckets)` for an item.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` is 0.
    pub fn bucket_indices<T>(&self, item: &T, num_hashes: u16, num_buckets: u64) -> BucketIndices
    where
        T: Hash + ?Sized,
        E: ItemEncoder<T>,
    {
        self.base_hashes(item).indices(num_hashes, num_buckets)
    }
}

/// The two base hashes from which every bucket index of an item is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHashes {
    h1: i32,
    h2: i32,
}

impl BaseHashes {
    /// Returns the primary hash.
    pub fn h1(&self) -> i32 {
        self.h1
    }

    /// Returns the secondary hash.
    pub fn h2(&self) -> i32 {
        self.h2
    }

    /// Returns `|h1 + i * h2| mod modulus`.
    ///
    /// # Panics
    ///
    /// Panics if `modulus` is 0.
    pub fn bucket(&self, i: u32, modulus: u64) -> u64 {
        assert!(modulus > 0, "modulus must be at least 1");
        // i128 keeps the combination exact for every (i, h2).
        let combined = i128::from(self.h1) + i128::from(i) * i128::from(self.h2);
        (combined.unsigned_abs() % u128::from(modulus)) as u64
    }

    /// Returns an iterator over the first `count` bucket indices.
    ///
    /// # Panics
    ///
    /// Panics if `modulus` is 0.
    pub fn indices(self, count: u16, modulus: u64) -> BucketIndices {
        assert!(modulus > 0, "modulus must be at least 1");
        BucketIndices {
            hashes: self,
            next: 0,
            count,
            modulus,
        }
    }
}

/// Iterator over the bucket indices of one item. See [`BaseHashes::indices`].
#[derive(Debug, Clone)]
pub struct BucketIndices {
    hashes: BaseHashes,
    next: u16,
    count: u16,
    modulus: u64,
}

impl Iterator for BucketIndices {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.count {
            return None;
        }
        let index = self.hashes.bucket(u32::from(self.next), self.modulus);
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.count - self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BucketIndices {}

impl FusedIterator for BucketIndices {}
