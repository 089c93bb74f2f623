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

use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::le;
use probably::bloom::BloomFilter;
use probably::bloom::BloomFilterBuilder;
use probably::error::ErrorKind;
use probably::hash::ItemEncoder;

/// Fills a filter sized for `max_items` with `1..=max_items` and counts how many of the next
/// `2 * max_items` integers it wrongly reports as present.
fn count_false_positives(max_items: u64, fpp: f64) -> u64 {
    let mut filter = BloomFilter::create(max_items, fpp).unwrap();
    for i in 1..=max_items {
        filter.insert(&i);
    }
    ((max_items + 1)..=(3 * max_items))
        .filter(|i| filter.contains(i))
        .count() as u64
}

#[test]
fn test_no_false_negatives() {
    let mut filter = BloomFilter::create(1000, 0.01).unwrap();
    for i in 0..1000u64 {
        filter.insert(&i);
    }
    for i in 0..1000u64 {
        assert!(filter.contains(&i), "missing {i}");
    }
}

#[test]
fn test_false_positives_at_capacity() {
    for max_items in [100, 1000, 10000] {
        let errors = count_false_positives(max_items, 0.05);
        assert_that!(errors as f64, le(0.05 * max_items as f64));
    }
}

#[test]
fn test_false_positives_at_other_rates() {
    for (max_items, fpp) in [(1000, 0.01), (1000, 0.1), (5000, 0.01)] {
        let errors = count_false_positives(max_items, fpp);
        assert_that!(errors as f64, le(fpp * max_items as f64));
    }
}

#[test]
fn test_strings_and_slices() {
    let mut filter = BloomFilter::create(100, 0.01).unwrap();
    filter.insert("alpha");
    filter.insert(&String::from("beta"));
    filter.insert(&[1u8, 2, 3][..]);

    assert!(filter.contains("alpha"));
    // String hashes exactly like str
    assert!(filter.contains("beta"));
    assert!(filter.contains(&vec![1u8, 2, 3][..]));
}

#[test]
fn test_contains_and_insert_reports_previous_state() {
    let mut filter = BloomFilter::create(100, 0.01).unwrap();
    assert!(!filter.contains_and_insert("x"));
    assert!(filter.contains_and_insert("x"));
    assert!(filter.contains("x"));
}

#[test]
fn test_union_error_message() {
    let mut small = BloomFilter::create(100, 0.01).unwrap();
    let large = BloomFilter::create(1000, 0.01).unwrap();

    let err = small.union(&large).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleMerge);
    let rendered = err.to_string();
    assert_that!(rendered.as_str(), contains_substring("other_num_bits: 19172"));
}

struct Utf8;

impl ItemEncoder<str> for Utf8 {
    fn encode(&self, item: &str, buf: &mut Vec<u8>) {
        buf.extend_from_slice(item.as_bytes());
    }
}

#[test]
fn test_custom_encoder_round_trip() {
    let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01)
        .encoder(Utf8)
        .seed(77)
        .build()
        .unwrap();
    for word in ["red", "green", "blue"] {
        filter.insert(word);
    }

    let restored = BloomFilter::deserialize_with_encoder(&filter.serialize(), Utf8).unwrap();
    assert_eq!(restored.seed(), 77);
    for word in ["red", "green", "blue"] {
        assert!(restored.contains(word));
    }
}
