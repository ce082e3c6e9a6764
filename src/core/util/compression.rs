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

use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

#[cfg(test)]
use std::cmp::min;

use crate::core::store::io::DataInput;
#[cfg(test)]
use crate::core::store::io::DataOutput;
use crate::core::util::bit_util::UnsignedShift;

#[cfg(test)]
const MEMORY_USAGE: i32 = 14;
// minimum length of a match
const MIN_MATCH: i32 = 4;
// maximum distance of a reference
#[cfg(test)]
const MAX_DISTANCE: i32 = 1 << 16;
// the last 5 bytes must be encoded as literals
#[cfg(test)]
const LAST_LITERALS: i32 = 5;

/// LZ4 compression and decompression routines.
///
/// http://code.google.com/p/lz4/
/// http://fastcompression.blogspot.fr/p/lz4.html
pub struct LZ4;

impl LZ4 {
    fn read_len<R: DataInput + ?Sized>(compressed: &mut R, mut len: i32) -> Result<i32> {
        let mut b = compressed.read_byte()?;
        while b == 0xffu8 {
            len += 0xffi32;
            b = compressed.read_byte()?;
        }
        Ok(len + i32::from(b))
    }

    /// Decompress at least `decompressed_len` bytes into dest. `dest` must be
    /// large enough to hold all decompressed data.
    ///
    /// Literal runs or back references that fall outside `dest` are reported
    /// as `CorruptIndex`.
    pub fn decompress<R: DataInput + ?Sized>(
        compressed: &mut R,
        decompressed_len: usize,
        dest: &mut [u8],
    ) -> Result<usize> {
        let dest_end = dest.len();
        let mut dest_off = 0;
        while dest_off < decompressed_len {
            let token = i32::from(compressed.read_byte()?);
            let mut literal_len = token.unsigned_shift(4);

            if literal_len != 0 {
                if literal_len == 0x0f {
                    literal_len = LZ4::read_len(compressed, literal_len)?;
                }
                let literal_len = literal_len as usize;
                if dest_off + literal_len > dest_end {
                    bail!(CorruptIndex(format!(
                        "lz4 literal run of {} bytes at {} overflows {} byte buffer",
                        literal_len, dest_off, dest_end
                    )));
                }
                compressed.read_bytes(dest, dest_off, literal_len)?;
                dest_off += literal_len;
            }

            if dest_off >= decompressed_len {
                break;
            }

            // matches
            let match_dec = i32::from(compressed.read_byte()?)
                | (i32::from(compressed.read_byte()?) << 8);
            let mut match_len = token & 0x0f;
            if match_len == 0x0f {
                match_len = LZ4::read_len(compressed, match_len)?;
            }
            match_len += MIN_MATCH;

            let match_dec = match_dec as usize;
            let match_len = match_len as usize;
            if match_dec == 0 || match_dec > dest_off || dest_off + match_len > dest_end {
                bail!(CorruptIndex(format!(
                    "lz4 match (dec {}, len {}) at {} is out of bounds for {} byte buffer",
                    match_dec, match_len, dest_off, dest_end
                )));
            }

            if match_dec < match_len {
                // overlap -> naive incremental copy
                let mut dest_cur = dest_off - match_dec;
                let end = dest_off + match_len;
                while dest_off < end {
                    dest[dest_off] = dest[dest_cur];
                    dest_off += 1;
                    dest_cur += 1;
                }
            } else {
                let ref_pos = dest_off - match_dec;
                let (lhs, rhs) = dest.split_at_mut(dest_off);
                rhs[0..match_len].copy_from_slice(&lhs[ref_pos..ref_pos + match_len]);
                dest_off += match_len;
            }
        }
        Ok(dest_off)
    }
}

// Compression is only needed to write test indexes.
#[cfg(test)]
impl LZ4 {
    fn hash(i: i32, hash_bits: i32) -> i32 {
        ((i as i64 * -1_640_531_535i64) as i32).unsigned_shift((32 - hash_bits) as usize)
    }

    fn read_int(buf: &[u8], i: usize) -> i32 {
        ((i32::from(buf[i])) << 24)
            | ((i32::from(buf[i + 1])) << 16)
            | ((i32::from(buf[i + 2])) << 8)
            | (i32::from(buf[i + 3]))
    }

    fn common_bytes(b: &[u8], o1: usize, o2: usize, limit: usize) -> i32 {
        debug_assert!(o1 < o2);
        let mut count = 0usize;
        while count < limit - o2 && b[o1 + count] == b[o2 + count] {
            count += 1;
        }
        count as i32
    }

    fn encode_len<R: DataOutput + ?Sized>(l: i32, out: &mut R) -> Result<()> {
        let mut value = l;
        while value >= 0xff {
            out.write_byte(0xffu8)?;
            value -= 0xff;
        }
        out.write_byte((value & 0xff) as u8)
    }

    fn encode_literals<R: DataOutput + ?Sized>(
        bytes: &[u8],
        token: i32,
        anchor: usize,
        literal_len: usize,
        out: &mut R,
    ) -> Result<()> {
        out.write_byte(token as u8)?;

        // encode literal length
        if literal_len >= 0x0f {
            LZ4::encode_len(literal_len as i32 - 0x0f, out)?;
        }

        // encode literals
        out.write_bytes(bytes, anchor, literal_len)
    }

    fn encode_last_literals<R: DataOutput + ?Sized>(
        bytes: &[u8],
        anchor: usize,
        literal_len: usize,
        out: &mut R,
    ) -> Result<()> {
        let token: i32 = min(literal_len as i32, 0x0fi32) << 4;
        LZ4::encode_literals(bytes, token, anchor, literal_len, out)
    }

    fn encode_sequence<R: DataOutput + ?Sized>(
        bytes: &[u8],
        anchor: usize,
        match_ref: usize,
        match_off: usize,
        match_len: usize,
        out: &mut R,
    ) -> Result<()> {
        let literal_len = match_off - anchor;
        debug_assert!(match_len >= 4);
        // encode token
        let token: i32 = (0x0f.min(literal_len as i32) << 4) | 0x0f.min(match_len as i32 - 4);
        LZ4::encode_literals(bytes, token, anchor, literal_len, out)?;

        // encode match dec
        let match_dec = match_off - match_ref;
        debug_assert!(match_dec < 1 << 16);
        out.write_byte(match_dec as u8)?;
        out.write_byte((match_dec >> 8) as u8)?;
        // encode match len
        if match_len >= (MIN_MATCH + 0x0f) as usize {
            LZ4::encode_len(match_len as i32 - 0x0f - MIN_MATCH, out)?;
        }

        Ok(())
    }

    /// Compress `bytes[off..off + len]` into `out`. `ht` must not be shared
    /// across threads but can safely be reused.
    pub fn compress<R: DataOutput + ?Sized>(
        bytes: &[u8],
        off: usize,
        len: usize,
        out: &mut R,
        ht: &mut LZ4HashTable,
    ) -> Result<()> {
        let mut off_cur = off;
        let mut anchor = off;
        let end = off + len;

        off_cur += 1;

        if len > (LAST_LITERALS + MIN_MATCH) as usize {
            let limit = end - LAST_LITERALS as usize;
            let match_limit = limit - MIN_MATCH as usize;
            ht.reset(len as i32);
            let hash_log = ht.hash_log;
            'main: while off_cur <= limit {
                let mut refer: usize;
                loop {
                    if off_cur >= match_limit {
                        break 'main;
                    }
                    let v = LZ4::read_int(bytes, off_cur);
                    let h = LZ4::hash(v, hash_log) as usize;
                    refer = off + ht.hash_table[h] as usize;
                    ht.hash_table[h] = (off_cur - off) as i32;
                    if off_cur - refer < MAX_DISTANCE as usize && LZ4::read_int(bytes, refer) == v {
                        break;
                    }
                    off_cur += 1;
                }

                // compute match length
                let match_len = (MIN_MATCH
                    + LZ4::common_bytes(
                        bytes,
                        refer + MIN_MATCH as usize,
                        off_cur + MIN_MATCH as usize,
                        limit,
                    )) as usize;

                LZ4::encode_sequence(bytes, anchor, refer, off_cur, match_len, out)?;
                off_cur += match_len;
                anchor = off_cur;
            }
        }

        // last literals
        let literal_len = end - anchor;
        debug_assert!(literal_len >= LAST_LITERALS as usize || literal_len == len);
        LZ4::encode_last_literals(bytes, anchor, literal_len, out)
    }
}

/// Scratch hash table of offsets reused across `LZ4::compress` calls.
#[cfg(test)]
#[derive(Default)]
pub struct LZ4HashTable {
    hash_log: i32,
    hash_table: Vec<i32>,
}

#[cfg(test)]
impl LZ4HashTable {
    fn reset(&mut self, len: i32) {
        let bits_per_offset = 1.max(32 - (len - LAST_LITERALS).leading_zeros() as i32);
        let bits_per_offset_log = 32 - (bits_per_offset - 1).leading_zeros() as i32;
        self.hash_log = MEMORY_USAGE + 3 - bits_per_offset_log;
        let size = 1usize << self.hash_log;
        self.hash_table.clear();
        self.hash_table.resize(size, 0);
    }
}
