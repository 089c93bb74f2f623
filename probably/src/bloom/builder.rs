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

use super::BloomFilter;
use crate::common::SketchParams;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::DoubleHasher;
use crate::hash::HashEncoder;

#[derive(Debug, Clone, Copy)]
enum Sizing {
    Accuracy { max_items: u64, fpp: f64 },
    Size { num_bits: u64, num_hashes: u16 },
}

/// Builder for creating [`BloomFilter`] instances.
///
/// Provides two construction modes:
/// - [`with_accuracy()`](Self::with_accuracy): Specify target items and false positive rate
///   (recommended)
/// - [`with_size()`](Self::with_size): Specify exact bit count and hash functions (manual)
///
/// Parameters are validated by [`build()`](Self::build).
#[derive(Debug, Clone)]
pub struct BloomFilterBuilder<E = HashEncoder> {
    sizing: Sizing,
    seed: u32,
    encoder: E,
}

impl BloomFilterBuilder {
    /// Creates a builder with optimal parameters for a target accuracy.
    ///
    /// # Arguments
    ///
    /// - `max_items`: Maximum expected number of distinct items
    /// - `fpp`: Target false positive probability (e.g., 0.01 for 1%)
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilterBuilder;
    /// // Optimal for 10,000 items with 1% FPP
    /// let filter = BloomFilterBuilder::with_accuracy(10_000, 0.01)
    ///     .seed(42)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.seed(), 42);
    /// ```
    pub fn with_accuracy(max_items: u64, fpp: f64) -> Self {
        BloomFilterBuilder {
            sizing: Sizing::Accuracy { max_items, fpp },
            seed: DEFAULT_UPDATE_SEED,
            encoder: HashEncoder,
        }
    }

    /// Creates a builder with manual size specification.
    ///
    /// Use this when you want precise control over the filter size,
    /// or when working with pre-calculated parameters.
    ///
    /// [`with_accuracy()`](Self::with_accuracy) doubles the closed-form bit and hash counts. The
    /// unscaled closed form comes from [`SketchParams`]:
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::bloom::BloomFilterBuilder;
    /// use probably::common::SketchParams;
    ///
    /// let filter = BloomFilterBuilder::with_size(10_000, 7).build().unwrap();
    /// assert_eq!(filter.num_bits(), 10_000);
    ///
    /// let num_bits = SketchParams::suggest_num_buckets(1000, 0.01);
    /// let num_hashes = SketchParams::suggest_num_hashes(1000, num_bits);
    /// let filter = BloomFilterBuilder::with_size(num_bits, num_hashes).build().unwrap();
    /// assert_eq!(filter.num_bits(), 9586);
    /// assert_eq!(filter.num_hashes(), 7);
    /// ```
    pub fn with_size(num_bits: u64, num_hashes: u16) -> Self {
        BloomFilterBuilder {
            sizing: Sizing::Size {
                num_bits,
                num_hashes,
            },
            seed: DEFAULT_UPDATE_SEED,
            encoder: HashEncoder,
        }
    }
}

impl<E> BloomFilterBuilder<E> {
    /// Sets a custom hash seed (default: 9001).
    ///
    /// **Important**: Filters with different seeds cannot be merged.
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the encoder that feeds the secondary hash.
    ///
    /// # Examples
    ///
    /// ```
    /// use probably::bloom::BloomFilterBuilder;
    /// use probably::hash::ItemEncoder;
    ///
    /// #[derive(Default)]
    /// struct Lowercase;
    ///
    /// impl ItemEncoder<str> for Lowercase {
    ///     fn encode(&self, item: &str, buf: &mut Vec<u8>) {
    ///         buf.extend(item.bytes().map(|b| b.to_ascii_lowercase()));
    ///     }
    /// }
    ///
    /// let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01)
    ///     .encoder(Lowercase)
    ///     .build()
    ///     .unwrap();
    /// filter.insert("apple");
    /// assert!(filter.contains("apple"));
    /// ```
    pub fn encoder<F>(self, encoder: F) -> BloomFilterBuilder<F> {
        BloomFilterBuilder {
            sizing: self.sizing,
            seed: self.seed,
            encoder,
        }
    }

    /// Builds the Bloom filter.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `max_items` is
    /// 0, `fpp` is not in (0, 1), or the bit or hash count is out of range.
    pub fn build(self) -> Result<BloomFilter<E>, Error> {
        let params = match self.sizing {
            Sizing::Accuracy { max_items, fpp } => SketchParams::from_accuracy(max_items, fpp)?,
            Sizing::Size {
                num_bits,
                num_hashes,
            } => SketchParams::from_size(num_bits, num_hashes)?,
        };
        let hasher = DoubleHasher::with_encoder(self.seed, self.encoder);
        Ok(BloomFilter::with_params(params, hasher))
    }
}
