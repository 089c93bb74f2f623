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

use crate::error::Error;

/// Defines the families of sketches that share a snapshot layout.
pub(crate) struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
    /// The preamble size for this family in longs (8-bytes integer).
    pub pre_longs: u8,
}

impl Family {
    /// Count-Min sketch.
    pub const COUNTMIN: Family = Family {
        id: 18,
        name: "COUNTMIN",
        pre_longs: 5,
    };

    /// Bloom filter over a bit vector.
    pub const BLOOMFILTER: Family = Family {
        id: 21,
        name: "BLOOMFILTER",
        pre_longs: 3,
    };

    /// Bloom filter over saturating 8-bit counters.
    pub const COUNTING_BLOOMFILTER: Family = Family {
        id: 22,
        name: "COUNTING_BLOOMFILTER",
        pre_longs: 3,
    };

    /// Chain of Bloom filters that grows on saturation.
    pub const SCALABLE_BLOOMFILTER: Family = Family {
        id: 23,
        name: "SCALABLE_BLOOMFILTER",
        pre_longs: 5,
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }

    pub fn validate_pre_longs(&self, pre_longs: u8) -> Result<(), Error> {
        if pre_longs != self.pre_longs {
            Err(Error::invalid_preamble_longs(self.pre_longs, pre_longs))
        } else {
            Ok(())
        }
    }
}
