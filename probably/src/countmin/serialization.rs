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

use super::CountMinSketch;
use crate::codec;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::family::Family;
use crate::codec::insufficient;
use crate::error::Error;
use crate::hash::HashEncoder;

const LONG_SIZE_BYTES: usize = 8;

impl CountMinSketch {
    /// Deserializes a sketch from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are truncated,
    /// belong to another sketch family, or describe an invalid table.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probably::countmin::CountMinSketch;
    /// let mut sketch = CountMinSketch::with_seed(5, 64, 42).unwrap();
    /// sketch.update("apple");
    ///
    /// let restored = CountMinSketch::deserialize(&sketch.serialize()).unwrap();
    /// assert_eq!(restored.estimate("apple"), sketch.estimate("apple"));
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_encoder(bytes, HashEncoder)
    }
}

impl<E> CountMinSketch<E> {
    /// Serializes the sketch to a byte vector.
    ///
    /// An empty sketch omits its counters.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let payload = if is_empty {
            0
        } else {
            LONG_SIZE_BYTES * (1 + self.counts.len())
        };
        let mut bytes = SketchBytes::with_capacity(
            LONG_SIZE_BYTES * Family::COUNTMIN.pre_longs as usize + payload,
        );

        let flags = if is_empty { codec::FLAGS_IS_EMPTY } else { 0 };
        codec::write_preamble(&mut bytes, &Family::COUNTMIN, flags);
        bytes.write_u32_le(0); // unused
        bytes.write_u32_le(self.width);
        bytes.write_u32_le(self.depth);
        bytes.write_u64_le(self.seed);
        bytes.write_f64_le(self.relative_error);
        bytes.write_f64_le(self.confidence);

        if !is_empty {
            bytes.write_i64_le(self.total_count);
            for count in &self.counts {
                bytes.write_i64_le(*count);
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a sketch whose secondary hash is fed by `encoder`.
    ///
    /// # Errors
    ///
    /// See [`CountMinSketch::deserialize`].
    pub fn deserialize_with_encoder(bytes: &[u8], encoder: E) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = codec::read_preamble(&mut cursor, &Family::COUNTMIN)?;
        let is_empty = flags & codec::FLAGS_IS_EMPTY != 0;

        cursor.read_u32_le().map_err(insufficient("unused"))?;
        let width = cursor.read_u32_le().map_err(insufficient("width"))?;
        let depth = cursor.read_u32_le().map_err(insufficient("depth"))?;
        let seed = cursor.read_u64_le().map_err(insufficient("seed"))?;
        let relative_error = cursor.read_f64_le().map_err(insufficient("relative_error"))?;
        let confidence = cursor.read_f64_le().map_err(insufficient("confidence"))?;
        if !(relative_error > 0.0 && relative_error.is_finite()) {
            return Err(Error::deserial("relative error must be positive")
                .with_context("relative_error", relative_error));
        }
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(Error::deserial("confidence must be in (0, 1]")
                .with_context("confidence", confidence));
        }

        if !is_empty {
            // total_count plus one long per counter
            let longs = u64::from(depth) * u64::from(width) + 1;
            if ((cursor.remaining() / LONG_SIZE_BYTES) as u64) < longs {
                return Err(Error::insufficient_data("counts")
                    .with_context("longs", longs)
                    .with_context("remaining_bytes", cursor.remaining()));
            }
        }

        let mut sketch = Self::with_encoder(depth, width, seed, encoder)
            .map_err(|err| Error::deserial("invalid count-min table shape").set_source(err))?;
        sketch.relative_error = relative_error;
        sketch.confidence = confidence;
        if is_empty {
            return Ok(sketch);
        }

        sketch.total_count = cursor.read_i64_le().map_err(insufficient("total_count"))?;
        for count in sketch.counts.iter_mut() {
            *count = cursor.read_i64_le().map_err(insufficient("counts"))?;
        }
        Ok(sketch)
    }
}

#[cfg(test)]
mod tests {
    use crate::countmin::CountMinSketch;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_layout() {
        let sketch = CountMinSketch::with_seed(3, 17, 42).unwrap();
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 40);
        assert_eq!(bytes[..4], [5, 1, 18, 1]);
        assert_eq!(bytes[24..32], (2.0f64 / 17.0).to_le_bytes());

        let restored = CountMinSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored, sketch);
    }

    #[test]
    fn test_round_trip_with_data() {
        let mut sketch = CountMinSketch::with_accuracy(0.05, 0.95, 42).unwrap();
        for i in 0..500u32 {
            sketch.update_with_count(&i, i64::from(i % 5));
        }
        let bytes = sketch.serialize();
        let entries = sketch.depth() as usize * sketch.width() as usize;
        assert_eq!(bytes.len(), 40 + 8 + 8 * entries);

        let restored = CountMinSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored, sketch);
        assert_eq!(restored.relative_error(), 0.05);
        assert_eq!(restored.confidence(), 0.95);
        for i in 0..500u32 {
            assert_eq!(restored.estimate(&i), sketch.estimate(&i));
        }
    }

    #[test]
    fn test_truncated_counts() {
        let mut sketch = CountMinSketch::with_seed(3, 17, 42).unwrap();
        sketch.update("apple");
        let bytes = sketch.serialize();

        let err = CountMinSketch::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_invalid_accuracy() {
        let sketch = CountMinSketch::with_accuracy(0.3, 0.9, 42).unwrap();
        let cases = [(24, 0.0), (24, f64::NAN), (32, 0.0), (32, 1.5)];
        for (offset, value) in cases {
            let mut bytes = sketch.serialize();
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());

            let err = CountMinSketch::deserialize(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData, "{value} at {offset}");
        }
    }

    #[test]
    fn test_invalid_shape() {
        let sketch = CountMinSketch::with_seed(3, 17, 42).unwrap();
        let mut bytes = sketch.serialize();
        // zero the width
        bytes[8..12].copy_from_slice(&0u32.to_le_bytes());

        let err = CountMinSketch::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
