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

//! Double hashing shared by every sketch in this crate.
//!
//! Every sketch touches `k` buckets per item. Rather than running `k` hash functions, the
//! buckets are derived from two base hashes with [`DoubleHasher`]. The first base hash comes from
//! the item's [`Hash`](std::hash::Hash) implementation; the second comes from the bytes written
//! by an [`ItemEncoder`], which callers can replace to control how their items are serialized.

mod double;
mod encoder;

pub use self::double::BaseHashes;
pub use self::double::BucketIndices;
pub use self::double::DoubleHasher;
pub use self::encoder::HashEncoder;
pub use self::encoder::ItemEncoder;

/// The seed 9001 used for the secondary hash unless another one is configured.
///
/// Two sketches can only be combined, or compared bucket for bucket, when they were built with
/// the same seed: the seed decides which buckets an item lands in.
pub const DEFAULT_UPDATE_SEED: u32 = 9001;
