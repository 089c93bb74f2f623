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

//! Byte-level plumbing shared by every sketch's snapshot format.

mod decode;
mod encode;
pub(crate) mod family;

use std::io;

pub(crate) use self::decode::SketchSlice;
pub(crate) use self::encode::SketchBytes;
use crate::error::Error;

/// Serial version written by every sketch in this crate.
pub(crate) const SERIAL_VERSION: u8 = 1;
/// Bit 0 of the flags byte marks a sketch that holds no data.
pub(crate) const FLAGS_IS_EMPTY: u8 = 1 << 0;

/// Maps a failed read of the field `tag` into a deserialization error.
pub(crate) fn insufficient(tag: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

/// Writes the first four preamble bytes shared by every format.
pub(crate) fn write_preamble(bytes: &mut SketchBytes, family: &family::Family, flags: u8) {
    bytes.write_u8(family.pre_longs);
    bytes.write_u8(SERIAL_VERSION);
    bytes.write_u8(family.id);
    bytes.write_u8(flags);
}

/// Reads and validates the first four preamble bytes, returning the flags byte.
pub(crate) fn read_preamble(
    cursor: &mut SketchSlice<'_>,
    family: &family::Family,
) -> Result<u8, Error> {
    let preamble_longs = cursor.read_u8().map_err(insufficient("preamble_longs"))?;
    let serial_version = cursor.read_u8().map_err(insufficient("serial_version"))?;
    let family_id = cursor.read_u8().map_err(insufficient("family_id"))?;
    let flags = cursor.read_u8().map_err(insufficient("flags"))?;

    family.validate_id(family_id)?;
    if serial_version != SERIAL_VERSION {
        return Err(Error::unsupported_serial_version(
            SERIAL_VERSION,
            serial_version,
        ));
    }
    family.validate_pre_longs(preamble_longs)?;
    Ok(flags)
}
