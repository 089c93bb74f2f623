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

//! Count-Min sketch implementation for frequency estimation.
//!
//! The Count-Min sketch provides approximate frequency counts for streaming data
//! with configurable relative error and confidence bounds. Estimates never fall below
//! the true count as long as every count added is non-negative.
//!
//! # Usage
//!
//! ```rust
//! use probably::countmin::CountMinSketch;
//!
//! let mut sketch = CountMinSketch::new(5, 256).unwrap();
//!
//! sketch.update("apple");
//! sketch.update_with_count("banana", 3);
//!
//! assert!(sketch.estimate("banana") >= 3);
//! assert_eq!(sketch.total_count(), 4);
//! ```
//!
//! # Sizing from accuracy
//!
//! ```rust
//! use probably::countmin::CountMinSketch;
//!
//! // error within 1% of the total count, with probability 99%
//! let sketch = CountMinSketch::with_accuracy(0.01, 0.99, 42).unwrap();
//! assert_eq!(sketch.width(), 200);
//! assert_eq!(sketch.depth(), 7);
//! ```

mod serialization;

mod sketch;
pub use self::sketch::CountMinSketch;
pub use self::sketch::MAX_TABLE_ENTRIES;
