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

use std::cmp::Ordering;

use crate::core::codec::field_infos::FieldInfo;
use crate::core::codec::postings::blocktree::{corrupt_on_eof, CompressionAlgorithm};
use crate::core::codec::postings::PostingsReaderBase;
use crate::core::codec::{BlockTermState, SeekStatus};
use crate::core::store::io::{ByteBufferIndexInput, DataInput, IndexInput};
use crate::core::util::fst::{Arc, ByteSequenceOutput};
use crate::core::util::UnsignedShift;
use crate::error::ErrorKind::{CorruptIndex, IllegalState};
use crate::error::Result;

// a vint suffix code plus a vlong sub-block delta
const MAX_LENGTH_BYTES_PER_ENTRY: u64 = 14;

/// Where the entry cursor of a loaded block stands, so a speculative
/// `next` can be rolled back.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EntryCursor {
    next_ent: i32,
    suffixes_pos: usize,
    lengths_pos: usize,
    start_byte_pos: usize,
    suffix: usize,
    sub_code: i64,
    last_sub_fp: i64,
    term_block_ord: i32,
}

/// Decoder of one physical block, reused for every block visited at one
/// depth of an iterator's stack.
pub struct SegmentTermsIterFrame {
    pub ord: usize,
    pub has_terms: bool,
    pub has_terms_orig: bool,
    pub is_floor: bool,
    pub arc: Option<Arc<ByteSequenceOutput>>,
    compressed_suffixes: bool,
    // File pointer where this block was loaded from
    pub fp: i64,
    pub fp_orig: i64,
    pub fp_end: i64,
    suffixes: ByteBufferIndexInput,
    // only used when suffix lengths are stored apart from the suffixes
    suffix_lengths: ByteBufferIndexInput,
    stats: ByteBufferIndexInput,
    stats_singleton_run_length: i32,
    floor_data: ByteBufferIndexInput,
    metadata: ByteBufferIndexInput,
    // Length of prefix shared by all terms in this block
    pub prefix: usize,
    // Number of entries (term or sub-block) in this block
    pub ent_count: i32,
    // Which term we will next read, or -1 if the block isn't loaded yet
    pub next_ent: i32,
    // True if this block is either not a floor block,
    // or, it's the last sub-block of a floor block
    pub is_last_in_floor: bool,
    // True if all entries are terms
    pub is_leaf_block: bool,
    pub last_sub_fp: i64,
    pub next_floor_label: i32,
    pub num_follow_floor_blocks: i32,
    // Next term to decode metadata; we decode metadata lazily so that
    // scanning to find the matching term is fast and only if you find
    // a match and app wants the stats or docs/positions iterators,
    // will we decode the metadata
    pub metadata_upto: i32,
    pub state: BlockTermState,
    pub compression: CompressionAlgorithm,
    // bytes the suffixes took in the file, before decompression
    pub suffix_bytes_on_disk: i64,
    start_byte_pos: usize,
    suffix: usize,
    sub_code: i64,
}

impl SegmentTermsIterFrame {
    pub fn new(ord: usize, compressed_suffixes: bool, state: BlockTermState) -> Self {
        SegmentTermsIterFrame {
            ord,
            has_terms: false,
            has_terms_orig: false,
            is_floor: false,
            arc: None,
            compressed_suffixes,
            fp: -1,
            fp_orig: -1,
            fp_end: -1,
            suffixes: ByteBufferIndexInput::with_capacity(128),
            suffix_lengths: ByteBufferIndexInput::with_capacity(32),
            stats: ByteBufferIndexInput::with_capacity(64),
            stats_singleton_run_length: 0,
            floor_data: ByteBufferIndexInput::with_capacity(32),
            metadata: ByteBufferIndexInput::with_capacity(32),
            prefix: 0,
            ent_count: 0,
            next_ent: -1,
            is_last_in_floor: false,
            is_leaf_block: false,
            last_sub_fp: -1,
            next_floor_label: 256,
            num_follow_floor_blocks: 0,
            metadata_upto: 0,
            state,
            compression: CompressionAlgorithm::NoCompression,
            suffix_bytes_on_disk: 0,
            start_byte_pos: 0,
            suffix: 0,
            sub_code: 0,
        }
    }

    /// Reads the floor table that follows the block code in a terms index
    /// output.
    pub fn set_floor_data(&mut self, floor_data: &[u8]) -> Result<()> {
        self.floor_data.reload_slice(floor_data);
        self.read_floor_header()
    }

    fn read_floor_header(&mut self) -> Result<()> {
        self.num_follow_floor_blocks = self.floor_data.read_vint()?;
        if self.num_follow_floor_blocks <= 0 {
            warn!(
                "floor block at fp {} has {} followers",
                self.fp_orig, self.num_follow_floor_blocks
            );
            bail!(CorruptIndex(format!(
                "invalid floor follower count: {}",
                self.num_follow_floor_blocks
            )));
        }
        self.next_floor_label = i32::from(self.floor_data.read_byte()?);
        Ok(())
    }

    /// Consumes the next floor follower and returns its file pointer. The
    /// label of the follower after it, or 256, becomes `next_floor_label`.
    pub(crate) fn read_floor_follower(&mut self) -> Result<i64> {
        let code = self.floor_data.read_vlong()?;
        let fp = self.fp_orig + code.unsigned_shift(1);
        self.has_terms = (code & 1) != 0;
        self.num_follow_floor_blocks -= 1;
        self.next_floor_label = if self.num_follow_floor_blocks != 0 {
            i32::from(self.floor_data.read_byte()?)
        } else {
            256
        };
        Ok(fp)
    }

    pub fn term_block_ord(&self) -> i32 {
        if self.is_leaf_block {
            self.next_ent
        } else {
            self.state.term_block_ord
        }
    }

    pub fn load_next_floor_block(&mut self, input: &mut dyn IndexInput) -> Result<()> {
        // floor blocks of one prefix are written back to back
        self.fp = self.fp_end;
        self.next_ent = -1;
        self.load_block(input)
    }

    /// Does initial decode of next block of terms; this doesn't actually
    /// decode the docFreq, totalTermFreq, postings details (frq/prx offset,
    /// etc.) metadata; it just loads them as byte[] blobs which are then
    /// decoded on-demand if the metadata is ever requested for any term in
    /// this block. This enables terms-only intensive consumes (eg certain
    /// MTQs, respelling) to not pay the price of decoding metadata they
    /// won't use.
    pub fn load_block(&mut self, input: &mut dyn IndexInput) -> Result<()> {
        if self.next_ent != -1 {
            // Already loaded
            return Ok(());
        }
        self.read_block(input)
    }

    /// Unconditionally reloads the block at `fp`.
    pub(crate) fn read_block(&mut self, input: &mut dyn IndexInput) -> Result<()> {
        let fp = self.fp;
        corrupt_on_eof(fp, self.read_block_inner(input))
    }

    fn read_block_inner(&mut self, input: &mut dyn IndexInput) -> Result<()> {
        input.seek(self.fp)?;
        let code = input.read_vint()?;
        self.ent_count = code.unsigned_shift(1);
        if self.ent_count <= 0 {
            warn!("block at fp {} has no entries", self.fp);
            bail!(CorruptIndex(format!("empty block at fp {}", self.fp)));
        }
        self.is_last_in_floor = (code & 1) != 0;

        if self.compressed_suffixes {
            let code_l = input.read_vlong()?;
            self.is_leaf_block = (code_l & 0x04) != 0;
            let num_suffix_bytes = code_l.unsigned_shift(3) as u64;
            self.compression = CompressionAlgorithm::by_code((code_l & 0x03) as i32)?;
            self.compression
                .check_len(num_suffix_bytes, remaining(input))?;
            let suffix_start = input.file_pointer();
            self.compression
                .read(input, self.suffixes.prepare(num_suffix_bytes as usize))?;
            self.suffix_bytes_on_disk = input.file_pointer() - suffix_start;

            let code = input.read_vint()?;
            let all_equal = (code & 1) != 0;
            let num_length_bytes = code.unsigned_shift(1) as u64;
            if all_equal {
                if num_length_bytes > self.ent_count as u64 * MAX_LENGTH_BYTES_PER_ENTRY {
                    warn!("block at fp {} has {} length bytes", self.fp, num_length_bytes);
                    bail!(CorruptIndex(format!(
                        "{} suffix length bytes for {} entries",
                        num_length_bytes, self.ent_count
                    )));
                }
                let b = input.read_byte()?;
                for x in self.suffix_lengths.prepare(num_length_bytes as usize) {
                    *x = b;
                }
            } else {
                CompressionAlgorithm::NoCompression.check_len(num_length_bytes, remaining(input))?;
                self.suffix_lengths
                    .reload_with_len(input, num_length_bytes as usize)?;
            }
        } else {
            let code = input.read_vint()?;
            self.is_leaf_block = (code & 1) != 0;
            let num_bytes = code.unsigned_shift(1) as u64;
            CompressionAlgorithm::NoCompression.check_len(num_bytes, remaining(input))?;
            self.suffixes.reload_with_len(input, num_bytes as usize)?;
            self.compression = CompressionAlgorithm::NoCompression;
            self.suffix_bytes_on_disk = num_bytes as i64;
        }

        // stats
        reload_section(&mut self.stats, input)?;
        self.stats_singleton_run_length = 0;

        self.metadata_upto = 0;
        self.state.term_block_ord = 0;
        self.next_ent = 0;
        self.last_sub_fp = -1;
        self.start_byte_pos = 0;
        self.suffix = 0;
        self.sub_code = 0;

        // metadata
        reload_section(&mut self.metadata, input)?;

        // Sub-blocks of a single floor block are always
        // written one after another -- tail recurse:
        self.fp_end = input.file_pointer();
        trace!(
            "loaded block fp={} ent_count={} leaf={} last_in_floor={} compression={:?}",
            self.fp,
            self.ent_count,
            self.is_leaf_block,
            self.is_last_in_floor,
            self.compression
        );
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<()> {
        // Force reload:
        self.fp = self.fp_orig;
        self.next_ent = -1;
        self.has_terms = self.has_terms_orig;
        if self.is_floor {
            self.floor_data.rewind();
            self.read_floor_header()?;
        }
        Ok(())
    }

    // old layouts interleave suffix lengths with the suffix bytes
    fn lengths(&mut self) -> &mut ByteBufferIndexInput {
        if self.compressed_suffixes {
            &mut self.suffix_lengths
        } else {
            &mut self.suffixes
        }
    }

    /// Decodes the next entry and copies it into `term`; returns true if
    /// the entry is a sub-block.
    pub fn next(&mut self, input: &mut dyn IndexInput, term: &mut Vec<u8>) -> Result<bool> {
        if self.is_leaf_block {
            self.next_leaf(term)?;
            Ok(false)
        } else {
            self.next_non_leaf(input, term)
        }
    }

    fn next_leaf(&mut self, term: &mut Vec<u8>) -> Result<()> {
        debug_assert!(self.next_ent != -1 && self.next_ent < self.ent_count);
        self.next_ent += 1;
        let fp = self.fp;
        corrupt_on_eof(fp, self.read_leaf_entry())?;
        self.fill_term(term);
        Ok(())
    }

    fn next_non_leaf(&mut self, input: &mut dyn IndexInput, term: &mut Vec<u8>) -> Result<bool> {
        loop {
            if self.next_ent == self.ent_count {
                if self.is_last_in_floor {
                    bail!(IllegalState(format!(
                        "block at fp {} has no more entries",
                        self.fp
                    )));
                }
                self.load_next_floor_block(input)?;
                if self.is_leaf_block {
                    self.next_leaf(term)?;
                    return Ok(false);
                }
                continue;
            }

            debug_assert!(self.next_ent != -1 && self.next_ent < self.ent_count);
            self.next_ent += 1;
            let fp = self.fp;
            let is_sub_block = corrupt_on_eof(fp, self.read_non_leaf_entry())?;
            self.fill_term(term);
            return Ok(is_sub_block);
        }
    }

    /// Decodes the next entry without copying it; returns true if the entry
    /// is a sub-block. The caller checks there is one left in this block.
    pub(crate) fn next_entry(&mut self) -> Result<bool> {
        debug_assert!(self.next_ent != -1 && self.next_ent < self.ent_count);
        self.next_ent += 1;
        let fp = self.fp;
        if self.is_leaf_block {
            corrupt_on_eof(fp, self.read_leaf_entry())?;
            Ok(false)
        } else {
            corrupt_on_eof(fp, self.read_non_leaf_entry())
        }
    }

    fn read_leaf_entry(&mut self) -> Result<()> {
        let code = self.lengths().read_vint()?;
        if code < 0 {
            bail!(CorruptIndex(format!("negative suffix length: {}", code)));
        }
        self.suffix = code as usize;
        self.start_byte_pos = self.suffixes.position();
        self.suffixes.skip_bytes(self.suffix)?;
        self.sub_code = 0;
        Ok(())
    }

    fn read_non_leaf_entry(&mut self) -> Result<bool> {
        let code = self.lengths().read_vint()?;
        self.suffix = code.unsigned_shift(1) as usize;
        self.start_byte_pos = self.suffixes.position();
        self.suffixes.skip_bytes(self.suffix)?;
        if (code & 1) == 0 {
            // A normal term
            self.sub_code = 0;
            self.state.term_block_ord += 1;
            Ok(false)
        } else {
            // A sub-block; make sub-FP absolute:
            let sub_code = self.lengths().read_vlong()?;
            if sub_code <= 0 || sub_code > self.fp || self.suffix == 0 {
                warn!(
                    "invalid sub-block entry in block fp {}: suffix {}, sub code {}",
                    self.fp, self.suffix, sub_code
                );
                bail!(CorruptIndex(format!(
                    "sub-block entry with suffix {} and code {} in block at fp {}",
                    self.suffix, sub_code, self.fp
                )));
            }
            self.sub_code = sub_code;
            self.last_sub_fp = self.fp - sub_code;
            Ok(true)
        }
    }

    /// Whether the current entry is a term rather than a sub-block.
    pub fn entry_is_term(&self) -> bool {
        self.sub_code == 0
    }

    /// Suffix bytes of the current entry.
    pub fn suffix_bytes(&self) -> &[u8] {
        self.suffixes
            .backing()
            .get(self.start_byte_pos..self.start_byte_pos + self.suffix)
            .unwrap_or(&[])
    }

    pub fn suffix_len(&self) -> usize {
        self.suffix
    }

    /// First suffix byte of the current entry, or -1 for an empty suffix.
    pub fn suffix_lead_label(&self) -> i32 {
        self.suffix_bytes().first().map_or(-1, |&b| i32::from(b))
    }

    pub fn suffixes_len(&self) -> usize {
        self.suffixes.limit()
    }

    pub fn stats_len(&self) -> usize {
        self.stats.limit()
    }

    /// Writes the current entry after the first `prefix` bytes of `term`.
    pub fn fill_term(&self, term: &mut Vec<u8>) {
        term.resize(self.prefix, 0);
        term.extend_from_slice(self.suffix_bytes());
    }

    pub(crate) fn save_cursor(&self) -> EntryCursor {
        let lengths_pos = if self.compressed_suffixes {
            self.suffix_lengths.position()
        } else {
            self.suffixes.position()
        };
        EntryCursor {
            next_ent: self.next_ent,
            suffixes_pos: self.suffixes.position(),
            lengths_pos,
            start_byte_pos: self.start_byte_pos,
            suffix: self.suffix,
            sub_code: self.sub_code,
            last_sub_fp: self.last_sub_fp,
            term_block_ord: self.state.term_block_ord,
        }
    }

    pub(crate) fn restore_cursor(&mut self, cursor: &EntryCursor) -> Result<()> {
        self.next_ent = cursor.next_ent;
        self.suffixes.set_position(cursor.suffixes_pos)?;
        self.lengths().set_position(cursor.lengths_pos)?;
        self.start_byte_pos = cursor.start_byte_pos;
        self.suffix = cursor.suffix;
        self.sub_code = cursor.sub_code;
        self.last_sub_fp = cursor.last_sub_fp;
        self.state.term_block_ord = cursor.term_block_ord;
        Ok(())
    }

    /// Jumps to the floor block that may hold `target`, without loading it.
    pub fn scan_to_floor_frame(&mut self, target: &[u8]) -> Result<()> {
        if !self.is_floor || target.len() <= self.prefix {
            return Ok(());
        }

        let target_label = i32::from(target[self.prefix]);
        if target_label < self.next_floor_label {
            return Ok(());
        }

        debug_assert!(self.num_follow_floor_blocks != 0);
        let mut new_fp;
        loop {
            new_fp = self.read_floor_follower()?;
            self.is_last_in_floor = self.num_follow_floor_blocks == 0;
            if self.is_last_in_floor || target_label < self.next_floor_label {
                break;
            }
        }

        if new_fp != self.fp {
            // Force re-load of the block:
            self.next_ent = -1;
            self.fp = new_fp;
        }
        Ok(())
    }

    pub fn decode_metadata(
        &mut self,
        field_info: &FieldInfo,
        postings_reader: &dyn PostingsReaderBase,
    ) -> Result<()> {
        let fp = self.fp;
        corrupt_on_eof(fp, self.decode_pending_metadata(field_info, postings_reader))
    }

    fn decode_pending_metadata(
        &mut self,
        field_info: &FieldInfo,
        postings_reader: &dyn PostingsReaderBase,
    ) -> Result<()> {
        let limit = self.term_block_ord();
        let mut absolute = self.metadata_upto == 0;
        debug_assert!(limit > 0);

        // TODO: better API would be "jump straight to term=N"???
        while self.metadata_upto < limit {
            // stats
            self.decode_stats(field_info)?;
            // metadata
            postings_reader.decode_term(
                &mut self.metadata,
                field_info,
                &mut self.state,
                absolute,
            )?;
            self.metadata_upto += 1;
            absolute = false;
        }
        self.state.term_block_ord = self.metadata_upto;
        Ok(())
    }

    fn decode_stats(&mut self, field_info: &FieldInfo) -> Result<()> {
        let has_freqs = field_info.index_options.has_freqs();
        if !self.compressed_suffixes {
            self.state.doc_freq = self.stats.read_vint()?;
            self.state.total_term_freq = if has_freqs {
                i64::from(self.state.doc_freq) + self.stats.read_vlong()?
            } else {
                i64::from(self.state.doc_freq)
            };
            return Ok(());
        }

        if self.stats_singleton_run_length > 0 {
            self.state.doc_freq = 1;
            self.state.total_term_freq = 1;
            self.stats_singleton_run_length -= 1;
            return Ok(());
        }
        let token = self.stats.read_vint()?;
        if (token & 1) == 1 {
            self.state.doc_freq = 1;
            self.state.total_term_freq = 1;
            self.stats_singleton_run_length = token.unsigned_shift(1);
        } else {
            self.state.doc_freq = token.unsigned_shift(1);
            self.state.total_term_freq = if has_freqs {
                i64::from(self.state.doc_freq) + self.stats.read_vlong()?
            } else {
                i64::from(self.state.doc_freq)
            };
        }
        Ok(())
    }

    /// Positions on the sub-block entry pointing at `sub_fp`.
    pub fn scan_to_sub_block(&mut self, sub_fp: i64) -> Result<()> {
        debug_assert!(!self.is_leaf_block);
        if self.last_sub_fp == sub_fp {
            return Ok(());
        }
        debug_assert!(sub_fp < self.fp);
        let target_sub_code = self.fp - sub_fp;
        loop {
            if self.next_ent >= self.ent_count {
                warn!("block at fp {} has no sub-block at fp {}", self.fp, sub_fp);
                bail!(CorruptIndex(format!(
                    "sub-block fp {} not found in block at fp {}",
                    sub_fp, self.fp
                )));
            }
            if self.next_entry()? && self.sub_code == target_sub_code {
                return Ok(());
            }
        }
    }

    /// Scans forward to `target`. On `Found` or `NotFound` the entry reached
    /// is copied into `term`; with `exact_only` it is copied on `End` too.
    /// A `NotFound` may stop on a sub-block, which the caller descends into.
    pub fn scan_to_term(
        &mut self,
        target: &[u8],
        exact_only: bool,
        term: &mut Vec<u8>,
    ) -> Result<SeekStatus> {
        debug_assert!(self.prefix <= target.len());
        if self.next_ent == self.ent_count {
            if exact_only {
                self.fill_term(term);
            }
            return Ok(SeekStatus::End);
        }

        let target_suffix = target.get(self.prefix..).unwrap_or(&[]);
        while self.next_ent < self.ent_count {
            self.next_entry()?;
            match self.suffix_bytes().cmp(target_suffix) {
                Ordering::Less => {
                    // Current entry is still before the target;
                    // keep scanning
                }
                Ordering::Greater => {
                    self.fill_term(term);
                    return Ok(SeekStatus::NotFound);
                }
                Ordering::Equal => {
                    // Exact match!
                    self.fill_term(term);
                    return Ok(SeekStatus::Found);
                }
            }
        }

        // It is possible (and OK) that terms index pointed us
        // at this block, but, we scanned the entire block and
        // did not find the term to position to.  This happens
        // when the target is after the last term in the block
        // (but, before the next term in the index).  EG
        // target could be foozzz, and terms index pointed us
        // to the foo* block, but the last term in this block
        // was fooz (and, eg, first term in the next block will
        // bee fop).
        if exact_only {
            self.fill_term(term);
        }

        // TODO: not consistent that in the
        // not-exact case we don't next() into the next
        // frame here
        Ok(SeekStatus::End)
    }
}

fn remaining(input: &dyn IndexInput) -> u64 {
    input.len().saturating_sub(input.file_pointer().max(0) as u64)
}

// vint length followed by that many bytes
fn reload_section(section: &mut ByteBufferIndexInput, input: &mut dyn IndexInput) -> Result<()> {
    let len = input.read_vint()?;
    if len < 0 {
        bail!(CorruptIndex(format!("negative section length: {}", len)));
    }
    CompressionAlgorithm::NoCompression.check_len(len as u64, remaining(input))?;
    section.reload_with_len(input, len as usize)
}
