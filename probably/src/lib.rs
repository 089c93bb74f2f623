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

//! # probably
//!
//! Memory-bounded probabilistic sketches that answer two questions about unbounded streams:
//! "have I seen this item?" and "how often have I seen it?". Answers are approximate, with
//! error rates fixed when a sketch is created.
//!
//! - [`bloom`]: Bloom filters for set membership, including a counting variant that supports
//!   removal and a scalable variant that grows with the stream.
//! - [`countmin`]: the Count-Min sketch for frequency estimation.
//!
//! Every sketch derives its buckets from the same [double hashing](hash::DoubleHasher) scheme
//! and can be serialized to a compact byte format.
//!
//! Sketches are plain owned data: share them across threads behind a lock of your choosing.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod bloom;
pub mod common;
pub mod countmin;
pub mod error;
pub mod hash;

mod codec;
