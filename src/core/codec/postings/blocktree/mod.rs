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

//! Read side of the block-tree terms dictionary.
//!
//! Terms are grouped into blocks by shared prefix. A prefix FST (the terms
//! index) maps every block prefix to the block's file pointer, and floor
//! data when the block was split on the next label. Blocks live in the
//! terms file; sub-block pointers are written as backward deltas from the
//! parent block.

mod blocktree_reader;

pub use self::blocktree_reader::*;

mod term_iter_frame;

pub use self::term_iter_frame::*;

mod segment_term_iter;

pub use self::segment_term_iter::*;

mod intersect_term_iter_frame;

pub use self::intersect_term_iter_frame::*;

mod intersect_term_iter;

pub use self::intersect_term_iter::*;

#[cfg(test)]
mod blocktree_writer;

#[cfg(test)]
pub use self::blocktree_writer::*;

use crate::core::store::io::DataInput;
use crate::core::util::compression::LZ4;
use crate::core::util::lowercase_ascii_compression;
use crate::error::ErrorKind::{CorruptIndex, IllegalArgument, UnexpectedEOF};
use crate::error::Result;


pub const OUTPUT_FLAGS_NUM_BITS: usize = 2;
pub const OUTPUT_FLAGS_IS_FLOOR: i64 = 0x1;
pub const OUTPUT_FLAGS_HAS_TERMS: i64 = 0x2;

/// Auto-prefix terms have been superseded by points.
pub const VERSION_AUTO_PREFIX_TERMS_REMOVED: i32 = 3;

/// Uses the same block layout as `VERSION_AUTO_PREFIX_TERMS_REMOVED`.
pub const VERSION_MSB_VLONG_OUTPUT: i32 = 4;

/// Suffixes are stored apart from their lengths and may be compressed;
/// stats encode runs of singleton terms.
pub const VERSION_COMPRESSED_SUFFIXES: i32 = 5;

pub const VERSION_START: i32 = VERSION_AUTO_PREFIX_TERMS_REMOVED;

/// Current terms format.
pub const VERSION_CURRENT: i32 = VERSION_COMPRESSED_SUFFIXES;

pub const DEFAULT_MIN_BLOCK_SIZE: usize = 25;
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 48;
pub const DEFAULT_MAX_FRAME_DEPTH: usize = 512;

/// Packs a block file pointer and its flags into a terms index output code.
pub fn encode_output(fp: i64, has_terms: bool, is_floor: bool) -> i64 {
    debug_assert!(fp < (1i64 << 62));
    (fp << OUTPUT_FLAGS_NUM_BITS)
        | if has_terms { OUTPUT_FLAGS_HAS_TERMS } else { 0 }
        | if is_floor { OUTPUT_FLAGS_IS_FLOOR } else { 0 }
}

/// How the suffix bytes of a block are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CompressionAlgorithm {
    NoCompression,
    LowercaseAscii,
    LZ4,
}

impl CompressionAlgorithm {
    pub fn by_code(code: i32) -> Result<CompressionAlgorithm> {
        match code {
            0 => Ok(CompressionAlgorithm::NoCompression),
            1 => Ok(CompressionAlgorithm::LowercaseAscii),
            2 => Ok(CompressionAlgorithm::LZ4),
            _ => {
                warn!("illegal suffix compression code: {}", code);
                bail!(CorruptIndex(format!("Illegal compression code: {}", code)))
            }
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CompressionAlgorithm::NoCompression => 0,
            CompressionAlgorithm::LowercaseAscii => 1,
            CompressionAlgorithm::LZ4 => 2,
        }
    }

    /// Upper bound of decompressed bytes per stored byte, used to reject
    /// lengths no block of `remaining` bytes could hold.
    fn max_expansion(self) -> u64 {
        match self {
            CompressionAlgorithm::NoCompression => 1,
            CompressionAlgorithm::LowercaseAscii => 2,
            CompressionAlgorithm::LZ4 => 256,
        }
    }

    pub(crate) fn check_len(self, len: u64, remaining: u64) -> Result<()> {
        if len > remaining.saturating_mul(self.max_expansion()) + 64 {
            bail!(CorruptIndex(format!(
                "{} suffix bytes can not be stored in the {} remaining bytes",
                len, remaining
            )));
        }
        Ok(())
    }

    /// Fills `out` with `out.len()` decompressed suffix bytes.
    pub fn read<I: DataInput + ?Sized>(self, input: &mut I, out: &mut [u8]) -> Result<()> {
        let len = out.len();
        match self {
            CompressionAlgorithm::NoCompression => input.read_bytes(out, 0, len),
            CompressionAlgorithm::LowercaseAscii => {
                lowercase_ascii_compression::decompress(input, len, out)
            }
            CompressionAlgorithm::LZ4 => {
                LZ4::decompress(input, len, out)?;
                Ok(())
            }
        }
    }
}

/// Tunables of the block-tree dictionary.
///
/// `max_frame_depth` bounds the frame stack of every iterator; the block
/// sizes only matter when writing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockTreeConfig {
    pub max_frame_depth: usize,
    pub min_items_in_block: usize,
    pub max_items_in_block: usize,
}

impl Default for BlockTreeConfig {
    fn default() -> Self {
        BlockTreeConfig {
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            min_items_in_block: DEFAULT_MIN_BLOCK_SIZE,
            max_items_in_block: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl BlockTreeConfig {
    pub fn from_json(json: &str) -> Result<BlockTreeConfig> {
        let config: BlockTreeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // the root block already sits at depth 1
        if self.max_frame_depth < 2 {
            bail!(IllegalArgument(format!(
                "max_frame_depth must be >= 2; got {}",
                self.max_frame_depth
            )));
        }
        if self.min_items_in_block < 2 {
            bail!(IllegalArgument(format!(
                "min_items_in_block must be >= 2; got {}",
                self.min_items_in_block
            )));
        }
        if self.min_items_in_block > self.max_items_in_block {
            bail!(IllegalArgument(format!(
                "max_items_in_block must be >= min_items_in_block; got max={} min={}",
                self.max_items_in_block, self.min_items_in_block
            )));
        }
        if 2 * (self.min_items_in_block - 1) > self.max_items_in_block {
            bail!(IllegalArgument(format!(
                "max_items_in_block must be at least 2*(min_items_in_block-1); got max={} min={}",
                self.max_items_in_block, self.min_items_in_block
            )));
        }
        Ok(())
    }
}

/// Reports a read that ran off the end of a block as index corruption.
pub(crate) fn corrupt_on_eof<T>(fp: i64, result: Result<T>) -> Result<T> {
    match result {
        Err(e) => {
            if let UnexpectedEOF(ref msg) = *e.kind() {
                warn!("truncated block at fp {}: {}", fp, msg);
                bail!(CorruptIndex(format!("truncated block at fp {}: {}", fp, msg)));
            }
            Err(e)
        }
        ok => ok,
    }
}
