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

use std::error::Error as _;

use googletest::assert_that;
use googletest::prelude::contains_substring;
use probably::bloom::BloomFilter;
use probably::bloom::CountingBloomFilter;
use probably::bloom::ScalableBloomFilter;
use probably::countmin::CountMinSketch;
use probably::error::ErrorKind;

#[test]
fn test_bloom_filter_round_trip() {
    let mut filter = BloomFilter::create(500, 0.01).unwrap();
    for i in 0..500u32 {
        filter.insert(&i);
    }
    let restored = BloomFilter::deserialize(&filter.serialize()).unwrap();
    assert_eq!(restored, filter);
    assert_eq!(restored.bits_used(), filter.bits_used());
    for i in 0..500u32 {
        assert!(restored.contains(&i));
    }
}

#[test]
fn test_counting_bloom_filter_round_trip() {
    let mut filter = CountingBloomFilter::with_seed(100, 0.05, 3).unwrap();
    for i in 0..100u32 {
        filter.insert(&i);
    }
    filter.remove(&0u32);

    let restored = CountingBloomFilter::deserialize(&filter.serialize()).unwrap();
    assert_eq!(restored, filter);
    assert_eq!(restored.seed(), 3);
    for i in 1..100u32 {
        assert!(restored.contains(&i));
        assert_eq!(restored.counter_at(&i), filter.counter_at(&i));
    }
}

#[test]
fn test_scalable_bloom_filter_round_trip() {
    let mut filter = ScalableBloomFilter::with_seed(0.01, 8).unwrap();
    for i in 0..400u64 {
        filter.insert(&i);
    }
    let restored = ScalableBloomFilter::deserialize(&filter.serialize()).unwrap();
    assert_eq!(restored.num_filters(), filter.num_filters());
    assert_eq!(restored.capacity(), filter.capacity());
    assert_eq!(restored.active_count(), filter.active_count());

    // the restored chain keeps growing where the original left off
    let mut restored = restored;
    for i in 400..800u64 {
        filter.insert(&i);
        restored.insert(&i);
    }
    assert_eq!(restored, filter);
}

#[test]
fn test_countmin_round_trip() {
    let mut sketch = CountMinSketch::with_seed(4, 100, 11).unwrap();
    for i in 0..300u32 {
        sketch.update_with_count(&i, i64::from(i));
    }
    let restored = CountMinSketch::deserialize(&sketch.serialize()).unwrap();
    assert_eq!(restored, sketch);
    assert_eq!(restored.row_multipliers(), sketch.row_multipliers());
    assert_eq!(restored.estimate(&299u32), sketch.estimate(&299u32));
}

#[test]
fn test_wrong_family() {
    let bloom = BloomFilter::create(10, 0.1).unwrap().serialize();
    let counting = CountingBloomFilter::create(10, 0.1).unwrap().serialize();
    let countmin = CountMinSketch::new(2, 8).unwrap().serialize();

    let errors = [
        CountingBloomFilter::deserialize(&bloom).unwrap_err(),
        BloomFilter::deserialize(&counting).unwrap_err(),
        CountMinSketch::deserialize(&bloom).unwrap_err(),
        BloomFilter::deserialize(&countmin).unwrap_err(),
        ScalableBloomFilter::deserialize(&countmin).unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_that!(err.message(), contains_substring("invalid family"));
    }
}

#[test]
fn test_truncated_input_keeps_io_source() {
    let mut filter = BloomFilter::create(100, 0.01).unwrap();
    filter.insert("apple");
    let bytes = filter.serialize();

    for len in [0, 3, 10, 23] {
        let err = BloomFilter::deserialize(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_that!(err.message(), contains_substring("insufficient data"));
        assert!(err.source().is_some(), "no source at {len}");
    }
}

#[test]
fn test_unsupported_serial_version() {
    let mut bytes = CountMinSketch::new(2, 8).unwrap().serialize();
    bytes[1] = 9;
    let err = CountMinSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert_that!(err.message(), contains_substring("unsupported serial version"));
}
