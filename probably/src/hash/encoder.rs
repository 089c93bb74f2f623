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
use std::hash::Hasher;

/// Turns an item into the bytes fed to the secondary hash.
///
/// Implementations must be deterministic: two items that compare equal must always produce
/// identical bytes, otherwise an inserted item may later be reported as absent. Any stable
/// encoding works (length-prefixed fields, canonical text, ...).
///
/// # Examples
///
/// ```
/// use probably::hash::ItemEncoder;
///
/// /// Encodes strings as their raw UTF-8 bytes.
/// struct Utf8;
///
/// impl ItemEncoder<str> for Utf8 {
///     fn encode(&self, item: &str, buf: &mut Vec<u8>) {
///         buf.extend_from_slice(item.as_bytes());
///     }
/// }
///
/// let mut buf = vec![];
/// Utf8.encode("abc", &mut buf);
/// assert_eq!(buf, b"abc");
/// ```
pub trait ItemEncoder<T: ?Sized> {
    /// Appends the encoding of `item` to `buf`.
    fn encode(&self, item: &T, buf: &mut Vec<u8>);
}

/// The default encoder: records the byte stream an item feeds to [`Hash::hash`].
///
/// The `Hash`/`Eq` contract already requires equal items to feed equal streams, so this is
/// deterministic for every well-behaved `Hash` implementation. The stream of primitive integers
/// follows native endianness and `usize` width, so snapshots are only portable between platforms
/// that agree on both.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HashEncoder;

impl<T: Hash + ?Sized> ItemEncoder<T> for HashEncoder {
    fn encode(&self, item: &T, buf: &mut Vec<u8>) {
        item.hash(&mut ByteSink { buf });
    }
}

/// A [`Hasher`] that only records what it is fed.
struct ByteSink<'a> {
    buf: &'a mut Vec<u8>,
}

impl Hasher for ByteSink<'_> {
    fn finish(&self) -> u64 {
        // never consulted; the recorded bytes are the output
        self.buf.len() as u64
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Hash + ?Sized>(item: &T) -> Vec<u8> {
        let mut buf = vec![];
        HashEncoder.encode(item, &mut buf);
        buf
    }

    #[test]
    fn test_integers_are_recorded_verbatim() {
        assert_eq!(encode(&42u64), 42u64.to_ne_bytes());
        assert_eq!(encode(&-1i32), (-1i32).to_ne_bytes());
    }

    #[test]
    fn test_str_stream_is_terminated() {
        assert_eq!(encode("ab"), vec![b'a', b'b', 0xff]);
        assert_ne!(encode("ab"), encode("abc"));
    }

    #[test]
    fn test_equal_items_encode_equally() {
        let a = String::from("Testing!!");
        let b = "Testing!!".to_string();
        assert_eq!(encode(&a), encode(&b));
        assert_eq!(encode(&(1u8, "x")), encode(&(1u8, "x")));
    }
}
