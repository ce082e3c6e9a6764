// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! Packs 4 bytes into 3 for byte strings made mostly of lowercase ASCII,
//! digits, `-`, `.` and `_`.
//!
//! Every byte `b` such that `b + 1` falls in `[0x20, 0x40)` or `[0x60, 0x80)`
//! is reduced to 6 bits. The 2 spare high bits of the first 3/4 of the
//! output carry the last quarter. Remaining bytes are patched in afterwards
//! as (gap, value) exception pairs.

use crate::core::store::io::DataInput;
#[cfg(test)]
use crate::core::store::io::DataOutput;
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

/// Inputs shorter than this are never compressed.
#[cfg(test)]
const MIN_LENGTH: usize = 8;

#[cfg(test)]
#[inline]
fn is_compressible(b: u8) -> bool {
    let high_3_bits = (u32::from(b) + 1) & !0x1F;
    high_3_bits == 0x20 || high_3_bits == 0x60
}

/// Compresses `input` into `out`, using `tmp` as scratch.
///
/// Returns `false`, having written nothing, when the input is too short or
/// has more than one exception per 32 bytes. Only test indexes are written
/// with it.
#[cfg(test)]
pub fn compress<W: DataOutput + ?Sized>(
    input: &[u8],
    tmp: &mut Vec<u8>,
    out: &mut W,
) -> Result<bool> {
    let len = input.len();
    if len < MIN_LENGTH {
        return Ok(false);
    }

    let max_exceptions = len >> 5;
    let mut previous_exception_index = 0usize;
    let mut num_exceptions = 0usize;
    for (i, &b) in input.iter().enumerate() {
        if !is_compressible(b) {
            while i - previous_exception_index > 0xFF {
                num_exceptions += 1;
                previous_exception_index += 0xFF;
            }
            num_exceptions += 1;
            if num_exceptions > max_exceptions {
                return Ok(false);
            }
            previous_exception_index = i;
        }
    }

    tmp.clear();
    tmp.extend(input.iter().map(|&b| {
        let b = u32::from(b) + 1;
        ((b & 0x1F) | ((b & 0x40) >> 1)) as u8
    }));
    let saved = len >> 2;
    let compressed_len = len - saved;
    for i in 0..saved {
        let t = tmp[compressed_len + i];
        tmp[i] |= (t & 0x30) << 2;
        tmp[saved + i] |= (t & 0x0C) << 4;
        tmp[2 * saved + i] |= (t & 0x03) << 6;
    }
    out.write_bytes(tmp, 0, compressed_len)?;

    out.write_vint(num_exceptions as i32)?;
    previous_exception_index = 0;
    for (i, &b) in input.iter().enumerate() {
        if !is_compressible(b) {
            while i - previous_exception_index > 0xFF {
                out.write_byte(0xFF)?;
                previous_exception_index += 0xFF;
                out.write_byte(input[previous_exception_index])?;
            }
            out.write_byte((i - previous_exception_index) as u8)?;
            previous_exception_index = i;
            out.write_byte(b)?;
        }
    }
    Ok(true)
}

/// Restores `len` bytes into `out[..len]`.
pub fn decompress<R: DataInput + ?Sized>(input: &mut R, len: usize, out: &mut [u8]) -> Result<()> {
    if out.len() < len {
        bail!(CorruptIndex(format!(
            "lowercase ascii block of {} bytes does not fit {} byte buffer",
            len,
            out.len()
        )));
    }
    let saved = len >> 2;
    let compressed_len = len - saved;
    input.read_bytes(out, 0, compressed_len)?;
    for i in 0..saved {
        out[compressed_len + i] = ((out[i] & 0xC0) >> 2)
            | ((out[saved + i] & 0xC0) >> 4)
            | ((out[2 * saved + i] & 0xC0) >> 6);
    }
    for b in out[..len].iter_mut() {
        let v = *b;
        *b = ((v & 0x1F) | 0x20 | ((v & 0x20) << 1)).wrapping_sub(1);
    }

    let num_exceptions = input.read_vint()?;
    let mut i = 0usize;
    for _ in 0..num_exceptions {
        i += input.read_byte()? as usize;
        if i >= len {
            bail!(CorruptIndex(format!(
                "lowercase ascii exception at {} is beyond block length {}",
                i, len
            )));
        }
        out[i] = input.read_byte()?;
    }
    Ok(())
}
