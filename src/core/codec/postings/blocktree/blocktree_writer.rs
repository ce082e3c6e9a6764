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

use std::cmp::min;
use std::mem;
use std::sync::Arc;

use crate::core::codec::field_infos::{FieldInfo, FieldInfos};
use crate::core::codec::postings::blocktree::{
    encode_output, BlockTreeConfig, BlockTreeTermsReader, CompressionAlgorithm,
    VERSION_COMPRESSED_SUFFIXES, VERSION_CURRENT, VERSION_START,
};
use crate::core::codec::postings::{PostingsReaderRef, StandardPostingsReader, TermMetadataWriter};
use crate::core::codec::BlockTermState;
use crate::core::index::IndexOptions;
use crate::core::store::io::{ByteBufferIndexInput, DataOutput, IndexOutput, RAMOutputStream};
use crate::core::util::compression::{LZ4HashTable, LZ4};
use crate::core::util::fst::{ByteSequenceOutput, ByteSequenceOutputFactory, FstBuilder};
use crate::core::util::lowercase_ascii_compression;
use crate::error::ErrorKind::{IllegalArgument, IllegalState};
use crate::error::Result;

use rand::Rng;

/// A prefix of the terms index and the output it maps to.
type IndexEntry = (Vec<u8>, Vec<u8>);

/// Block-based terms index and dictionary writer, kept in memory.
///
/// Writes terms dict and index, block-encoding (column
/// stride) each term's metadata for each set of terms
/// between two index terms.
///
/// - TermsDict --> Version, NodeBlock<sup>NumBlocks</sup>, FieldSummary, DirOffset
/// - NodeBlock --> (OuterNode | InnerNode)
/// - FieldSummary --> NumFields, <FieldNumber, NumTerms, RootCodeLength,
///   Byte<sup>RootCodeLength</sup>, SumTotalTermFreq?, SumDocFreq, DocCount,
///   MinTerm, MaxTerm, IndexStartFP><sup>NumFields</sup>
/// - TermsIndex --> FSTIndex<sup>NumFields</sup>
///
/// Every entry of an inner node steals one bit of its suffix length to mark
/// whether it points to a sub-block; sub-blocks carry no stats nor metadata.
pub struct BlockTreeTermsWriter {
    terms_out: RAMOutputStream,
    index_out: RAMOutputStream,
    fields: Vec<FieldMetaData>,
    version: i32,
    min_items_in_block: usize,
    max_items_in_block: usize,
    ht: LZ4HashTable,
    finished: bool,
}

impl BlockTreeTermsWriter {
    pub fn new(config: &BlockTreeConfig, version: i32) -> Result<BlockTreeTermsWriter> {
        config.validate()?;
        if version < VERSION_START || version > VERSION_CURRENT {
            bail!(IllegalArgument(format!(
                "unsupported terms dict version: {}",
                version
            )));
        }
        let mut terms_out = RAMOutputStream::new("terms.tim");
        terms_out.write_int(version)?;
        Ok(BlockTreeTermsWriter {
            terms_out,
            index_out: RAMOutputStream::new("terms.tip"),
            fields: vec![],
            version,
            min_items_in_block: config.min_items_in_block,
            max_items_in_block: config.max_items_in_block,
            ht: LZ4HashTable::default(),
            finished: false,
        })
    }

    /// Writes all terms of a field. Terms must be given in strictly
    /// ascending order; a field without terms is not recorded.
    pub fn write_field(
        &mut self,
        field_info: &FieldInfo,
        terms: &[(Vec<u8>, BlockTermState)],
    ) -> Result<()> {
        if self.finished {
            bail!(IllegalState("terms writer is already finished".into()));
        }
        if field_info.index_options == IndexOptions::Null {
            bail!(IllegalArgument(format!(
                "field '{}' is not indexed",
                field_info.name
            )));
        }
        if self
            .fields
            .iter()
            .any(|f| f.field_info.number == field_info.number)
        {
            bail!(IllegalArgument(format!(
                "field '{}' was already written",
                field_info.name
            )));
        }
        let mut writer = TermsWriter::new(field_info.clone(), self);
        for (text, state) in terms {
            writer.write(text, state)?;
        }
        writer.finish()
    }

    /// Writes the field summary and returns the terms dict and terms index
    /// bytes.
    pub fn finish(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        if self.finished {
            bail!(IllegalState("terms writer is already finished".into()));
        }
        self.finished = true;

        let dir_start = self.terms_out.file_pointer();
        self.terms_out.write_vint(self.fields.len() as i32)?;
        for field in &self.fields {
            let out = &mut self.terms_out;
            out.write_vint(field.field_info.number as i32)?;
            debug_assert!(field.num_terms > 0);
            out.write_vlong(field.num_terms)?;
            write_bytes_ref(out, &field.root_code)?;
            if field.field_info.index_options.has_freqs() {
                out.write_vlong(field.sum_total_term_freq)?;
            }
            out.write_vlong(field.sum_doc_freq)?;
            out.write_vint(field.doc_count)?;
            write_bytes_ref(out, &field.min_term)?;
            write_bytes_ref(out, &field.max_term)?;
            out.write_vlong(field.index_start_fp)?;
        }
        self.terms_out.write_long(dir_start)?;

        let terms = mem::replace(&mut self.terms_out, RAMOutputStream::new("terms.tim"));
        let index = mem::replace(&mut self.index_out, RAMOutputStream::new("terms.tip"));
        debug!(
            "wrote {} fields at version {}: {} terms bytes, {} index bytes",
            self.fields.len(),
            self.version,
            terms.file_pointer(),
            index.file_pointer()
        );
        Ok((terms.into_bytes(), index.into_bytes()))
    }
}

fn write_bytes_ref(out: &mut impl DataOutput, bytes: &[u8]) -> Result<()> {
    out.write_vint(bytes.len() as i32)?;
    out.write_bytes(bytes, 0, bytes.len())
}

impl Drop for BlockTreeTermsWriter {
    fn drop(&mut self) {
        if !self.finished && !self.fields.is_empty() {
            error!(
                "drop BlockTreeTermsWriter with {} fields never finished",
                self.fields.len()
            );
        }
    }
}

struct FieldMetaData {
    field_info: FieldInfo,
    root_code: Vec<u8>,
    num_terms: i64,
    index_start_fp: i64,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
    min_term: Vec<u8>,
    max_term: Vec<u8>,
}

/// Encodes the per-term stats of a block.
struct StatsWriter {
    out: RAMOutputStream,
    has_freqs: bool,
    // only the compressed-suffixes layout has singleton runs
    singleton_runs: bool,
    singleton_count: i32,
}

impl StatsWriter {
    fn new(has_freqs: bool, singleton_runs: bool) -> StatsWriter {
        StatsWriter {
            out: RAMOutputStream::new("stats"),
            has_freqs,
            singleton_runs,
            singleton_count: 0,
        }
    }

    fn add(&mut self, doc_freq: i32, total_term_freq: i64) -> Result<()> {
        if !self.singleton_runs {
            self.out.write_vint(doc_freq)?;
        } else if doc_freq == 1 && (!self.has_freqs || total_term_freq == 1) {
            self.singleton_count += 1;
            return Ok(());
        } else {
            self.finish()?;
            self.out.write_vint(doc_freq << 1)?;
        }
        if self.has_freqs {
            self.out
                .write_vlong(total_term_freq - i64::from(doc_freq))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.singleton_count > 0 {
            self.out
                .write_vint(((self.singleton_count - 1) << 1) | 1)?;
            self.singleton_count = 0;
        }
        Ok(())
    }
}

struct TermsWriter<'a> {
    field_info: FieldInfo,
    has_freqs: bool,
    compressed_suffixes: bool,
    num_terms: i64,
    doc_count: i32,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    last_term: Vec<u8>,
    prefix_starts: Vec<usize>,
    // Pending stack of terms and blocks.  As terms arrive (in sorted order)
    // we append to this stack, and once the top of the stack has enough
    // terms starting with a common prefix, we write a new block with
    // those terms and replace those terms in the stack with a new block:
    pending: Vec<PendingEntry>,
    // Reused in write_blocks:
    new_blocks: Vec<PendingBlock>,
    first_pending_term: Option<Vec<u8>>,
    last_pending_term: Option<Vec<u8>>,

    metadata_writer: TermMetadataWriter,
    suffix_writer: RAMOutputStream,
    suffix_lengths_writer: RAMOutputStream,
    stats_writer: StatsWriter,
    meta_writer: RAMOutputStream,
    spare_writer: RAMOutputStream,
    spare_bytes: Vec<u8>,

    block_tree_writer: &'a mut BlockTreeTermsWriter,
}

impl<'a> TermsWriter<'a> {
    fn new(field_info: FieldInfo, block_tree_writer: &'a mut BlockTreeTermsWriter) -> Self {
        let has_freqs = field_info.index_options.has_freqs();
        let compressed_suffixes = block_tree_writer.version >= VERSION_COMPRESSED_SUFFIXES;
        let metadata_writer = TermMetadataWriter::new(&field_info);
        TermsWriter {
            field_info,
            has_freqs,
            compressed_suffixes,
            num_terms: 0,
            doc_count: 0,
            sum_total_term_freq: 0,
            sum_doc_freq: 0,
            last_term: vec![],
            prefix_starts: vec![0usize; 8],
            pending: vec![],
            new_blocks: vec![],
            first_pending_term: None,
            last_pending_term: None,
            metadata_writer,
            suffix_writer: RAMOutputStream::new("suffixes"),
            suffix_lengths_writer: RAMOutputStream::new("suffix_lengths"),
            stats_writer: StatsWriter::new(has_freqs, compressed_suffixes),
            meta_writer: RAMOutputStream::new("meta"),
            spare_writer: RAMOutputStream::new("spare"),
            spare_bytes: vec![],
            block_tree_writer,
        }
    }

    // old layouts interleave suffix lengths with the suffix bytes
    fn lengths_writer(&mut self) -> &mut RAMOutputStream {
        if self.compressed_suffixes {
            &mut self.suffix_lengths_writer
        } else {
            &mut self.suffix_writer
        }
    }

    fn write_blocks(&mut self, prefix_length: usize, count: usize) -> Result<()> {
        debug_assert!(prefix_length > 0 || count == self.pending.len());

        let min_items_in_block = self.block_tree_writer.min_items_in_block;
        let max_items_in_block = self.block_tree_writer.max_items_in_block;
        let start = self.pending.len() - count;
        let mut entries = self.pending.split_off(start);
        let end = entries.len();

        let mut last_suffix_lead_label = -1;

        // True if we saw at least one term in this block (we record if a block
        // only points to sub-blocks in the terms index so we can avoid seeking
        // to it when we are looking for a term):
        let mut has_terms = false;
        let mut has_sub_blocks = false;

        let mut next_block_start = 0;
        let mut next_floor_lead_label = -1;

        for i in 0..end {
            let is_term_entry;
            let suffix_lead_label = match entries[i] {
                PendingEntry::Term(ref term) => {
                    is_term_entry = true;
                    if term.term_bytes.len() == prefix_length {
                        // Suffix is 0, i.e. prefix 'foo' and term is
                        // 'foo' so the term has empty string suffix
                        // in this block
                        debug_assert_eq!(last_suffix_lead_label, -1);
                        -1
                    } else {
                        i32::from(term.term_bytes[prefix_length])
                    }
                }
                PendingEntry::Block(ref block) => {
                    is_term_entry = false;
                    debug_assert!(block.prefix.len() > prefix_length);
                    i32::from(block.prefix[prefix_length])
                }
            };

            if suffix_lead_label != last_suffix_lead_label {
                let items_in_block = i - next_block_start;
                if items_in_block >= min_items_in_block && end - next_block_start > max_items_in_block
                {
                    // The count is too large for one block, so we must break
                    // it into "floor" blocks, where we record the leading
                    // label of the suffix of the first term in each floor
                    // block. We just use a naive greedy segmenter here: make
                    // a new floor block as soon as we have at least
                    // min_items_in_block.
                    let is_floor = items_in_block < count;
                    let new_block = self.write_block(
                        prefix_length,
                        is_floor,
                        next_floor_lead_label,
                        &mut entries[next_block_start..i],
                        false,
                        has_terms,
                        has_sub_blocks,
                    )?;
                    self.new_blocks.push(new_block);

                    has_terms = false;
                    has_sub_blocks = false;
                    next_floor_lead_label = suffix_lead_label;
                    next_block_start = i;
                }

                last_suffix_lead_label = suffix_lead_label;
            }

            if is_term_entry {
                has_terms = true;
            } else {
                has_sub_blocks = true;
            }
        }

        // Write last block, if any:
        if next_block_start < end {
            let items_in_block = end - next_block_start;
            let is_floor = items_in_block < count;
            let new_block = self.write_block(
                prefix_length,
                is_floor,
                next_floor_lead_label,
                &mut entries[next_block_start..end],
                true,
                has_terms,
                has_sub_blocks,
            )?;
            self.new_blocks.push(new_block);
        }

        debug_assert!(!self.new_blocks.is_empty());
        debug_assert!(self.new_blocks[0].is_floor || self.new_blocks.len() == 1);
        let mut first_block = self.new_blocks.remove(0);
        first_block.compile_index(&mut self.new_blocks)?;
        self.new_blocks.clear();

        // the slice we just wrote is replaced by a single block entry
        self.pending.push(PendingEntry::Block(first_block));
        Ok(())
    }

    /// Writes `entries` as a new block. If `is_floor` is true, there were
    /// too many (more than max_items_in_block) entries sharing the same
    /// prefix, and so we broke it into multiple floor blocks where we
    /// record the starting label of the suffix of each floor block.
    #[allow(clippy::too_many_arguments)]
    fn write_block(
        &mut self,
        prefix_length: usize,
        is_floor: bool,
        floor_lead_label: i32,
        entries: &mut [PendingEntry],
        is_last_in_floor: bool,
        has_terms: bool,
        has_sub_blocks: bool,
    ) -> Result<PendingBlock> {
        debug_assert!(!entries.is_empty());

        let start_fp = self.block_tree_writer.terms_out.file_pointer();
        let has_floor_lead_label = is_floor && floor_lead_label != -1;

        let mut prefix = Vec::with_capacity(prefix_length + 1);
        prefix.extend_from_slice(&self.last_term[..prefix_length]);

        let num_entries = entries.len();
        let mut code = (num_entries << 1) as i32;
        if is_last_in_floor {
            code |= 1;
        }
        self.block_tree_writer.terms_out.write_vint(code)?;

        // We optimize the leaf block case (block has only terms), writing a
        // more compact format in this case:
        let is_leaf_block = !has_sub_blocks;
        let mut sub_indices = Vec::new();
        let mut absolute = true;

        for entry in entries.iter_mut() {
            match entry {
                PendingEntry::Term(term) => {
                    debug_assert!(term.term_bytes.starts_with(&prefix));
                    let suffix = term.term_bytes.len() - prefix_length;
                    debug_assert!(
                        floor_lead_label == -1
                            || i32::from(term.term_bytes[prefix_length]) >= floor_lead_label
                    );
                    // For non-leaf block we borrow 1 bit to record
                    // if entry is term or sub-block
                    let suffix_code = if is_leaf_block { suffix } else { suffix << 1 };
                    self.lengths_writer().write_vint(suffix_code as i32)?;
                    self.suffix_writer
                        .write_bytes(&term.term_bytes, prefix_length, suffix)?;

                    // Write term stats, to separate bytes blob:
                    self.stats_writer
                        .add(term.state.doc_freq, term.state.total_term_freq)?;

                    // Write term meta data
                    self.metadata_writer
                        .encode_term(&mut self.meta_writer, &term.state, absolute)?;
                    absolute = false;
                }
                PendingEntry::Block(block) => {
                    debug_assert!(block.prefix.starts_with(&prefix));
                    let suffix = block.prefix.len() - prefix_length;
                    debug_assert!(suffix > 0);
                    debug_assert!(
                        floor_lead_label == -1
                            || i32::from(block.prefix[prefix_length]) >= floor_lead_label
                    );
                    debug_assert!(block.fp < start_fp);

                    self.lengths_writer()
                        .write_vint(((suffix << 1) | 1) as i32)?;
                    self.suffix_writer
                        .write_bytes(&block.prefix, prefix_length, suffix)?;
                    self.lengths_writer().write_vlong(start_fp - block.fp)?;
                    sub_indices.push(mem::replace(&mut block.index, vec![]));
                }
            }
        }
        self.stats_writer.finish()?;

        if self.compressed_suffixes {
            self.write_compressed_suffixes(prefix_length, num_entries, is_leaf_block)?;
        } else {
            let out = &mut self.block_tree_writer.terms_out;
            let token = ((self.suffix_writer.file_pointer() << 1) as i32)
                | if is_leaf_block { 1 } else { 0 };
            out.write_vint(token)?;
            self.suffix_writer.write_to(out)?;
            self.suffix_writer.reset();
        }

        let out = &mut self.block_tree_writer.terms_out;

        // Write term stats data bytes blob
        out.write_vint(self.stats_writer.out.file_pointer() as i32)?;
        self.stats_writer.out.write_to(out)?;
        self.stats_writer.out.reset();

        // Write term meta data bytes blob
        out.write_vint(self.meta_writer.file_pointer() as i32)?;
        self.meta_writer.write_to(out)?;
        self.meta_writer.reset();

        if has_floor_lead_label {
            prefix.push(floor_lead_label as u8);
        }
        trace!(
            "wrote block fp={} prefix={:?} entries={} leaf={} floor={}",
            start_fp,
            prefix,
            num_entries,
            is_leaf_block,
            is_floor
        );

        Ok(PendingBlock::new(
            prefix,
            start_fp,
            has_terms,
            is_floor,
            floor_lead_label,
            sub_indices,
        ))
    }

    fn write_compressed_suffixes(
        &mut self,
        prefix_length: usize,
        num_entries: usize,
        is_leaf_block: bool,
    ) -> Result<()> {
        let suffix_len = self.suffix_writer.file_pointer() as usize;
        let mut compression = CompressionAlgorithm::NoCompression;
        self.spare_writer.reset();

        // Only compress when the suffixes are long enough for it to pay off
        if suffix_len > 2 * num_entries && prefix_length > 2 {
            if suffix_len > 6 * num_entries {
                LZ4::compress(
                    self.suffix_writer.bytes(),
                    0,
                    suffix_len,
                    &mut self.spare_writer,
                    &mut self.block_tree_writer.ht,
                )?;
                // saves at least 25%
                if (self.spare_writer.file_pointer() as usize) < suffix_len - (suffix_len >> 2) {
                    compression = CompressionAlgorithm::LZ4;
                }
            }
            if compression == CompressionAlgorithm::NoCompression {
                self.spare_writer.reset();
                if lowercase_ascii_compression::compress(
                    self.suffix_writer.bytes(),
                    &mut self.spare_bytes,
                    &mut self.spare_writer,
                )? {
                    compression = CompressionAlgorithm::LowercaseAscii;
                }
            }
        }

        let mut token = (suffix_len as i64) << 3;
        if is_leaf_block {
            token |= 0x04;
        }
        token |= i64::from(compression.code());

        let out = &mut self.block_tree_writer.terms_out;
        out.write_vlong(token)?;
        if compression == CompressionAlgorithm::NoCompression {
            self.suffix_writer.write_to(out)?;
        } else {
            self.spare_writer.write_to(out)?;
        }
        self.suffix_writer.reset();
        self.spare_writer.reset();

        let lengths = self.suffix_lengths_writer.bytes();
        let num_length_bytes = lengths.len();
        if num_length_bytes > 0 && lengths.iter().all(|&b| b == lengths[0]) {
            out.write_vint(((num_length_bytes << 1) | 1) as i32)?;
            out.write_byte(lengths[0])?;
        } else {
            out.write_vint((num_length_bytes << 1) as i32)?;
            out.write_bytes(lengths, 0, num_length_bytes)?;
        }
        self.suffix_lengths_writer.reset();
        Ok(())
    }

    /// Adds one term with its decoded metadata.
    fn write(&mut self, text: &[u8], state: &BlockTermState) -> Result<()> {
        if let Some(ref last) = self.last_pending_term {
            if text <= last.as_slice() {
                bail!(IllegalArgument(format!(
                    "terms out of order: {:?} after {:?}",
                    text, last
                )));
            }
        }
        if state.doc_freq <= 0 {
            bail!(IllegalArgument(format!(
                "term {:?} has doc_freq {}",
                text, state.doc_freq
            )));
        }
        if self.has_freqs && state.total_term_freq < i64::from(state.doc_freq) {
            bail!(IllegalArgument(format!(
                "term {:?} has total_term_freq {} < doc_freq {}",
                text, state.total_term_freq, state.doc_freq
            )));
        }
        self.push_term(text)?;

        self.sum_doc_freq += i64::from(state.doc_freq);
        if self.has_freqs {
            self.sum_total_term_freq += state.total_term_freq;
        }
        // no postings here to count documents; every term's documents
        // may be the same ones
        self.doc_count = self.doc_count.max(state.doc_freq);
        self.num_terms += 1;

        self.pending
            .push(PendingEntry::Term(PendingTerm::new(text.to_vec(), state.clone())));

        if self.first_pending_term.is_none() {
            self.first_pending_term = Some(text.to_vec());
        }
        self.last_pending_term = Some(text.to_vec());
        Ok(())
    }

    /// Pushes the new term to the top of the stack, and writes new blocks.
    fn push_term(&mut self, text: &[u8]) -> Result<()> {
        let limit = min(self.last_term.len(), text.len());

        // Find common prefix between last term and current term:
        let mut pos = 0;
        while pos < limit && self.last_term[pos] == text[pos] {
            pos += 1;
        }

        // Close the "abandoned" suffix now:
        let last_term_len = self.last_term.len();
        for i in 0..last_term_len - pos {
            // How many items on top of the stack share the current suffix
            // we are closing:
            let idx = last_term_len - 1 - i;
            let prefix_top_size = self.pending.len() - self.prefix_starts[idx];
            if prefix_top_size >= self.block_tree_writer.min_items_in_block {
                self.write_blocks(idx + 1, prefix_top_size)?;
            }
        }

        if self.prefix_starts.len() < text.len() {
            self.prefix_starts.resize(text.len(), 0usize);
        }

        // Init new tail:
        let pending_len = self.pending.len();
        for start in &mut self.prefix_starts[pos..text.len()] {
            *start = pending_len;
        }

        self.last_term.clear();
        self.last_term.extend_from_slice(text);
        Ok(())
    }

    /// Finishes all terms in this field
    fn finish(mut self) -> Result<()> {
        if self.num_terms == 0 {
            return Ok(());
        }

        // Add empty term to force closing of all final blocks
        self.push_term(&[])?;
        self.push_term(&[])?;
        let length = self.pending.len();
        self.write_blocks(0, length)?;

        // We better have one final "root" block:
        debug_assert_eq!(self.pending.len(), 1);
        let root = match self.pending.pop() {
            Some(PendingEntry::Block(block)) => block,
            _ => bail!(IllegalState(format!(
                "field '{}' did not end with a root block",
                self.field_info.name
            ))),
        };
        debug_assert!(root.prefix.is_empty());
        debug_assert!(!root.index.is_empty() && root.index[0].0.is_empty());

        let root_code = root.index[0].1.clone();
        let mut index_builder = FstBuilder::new(ByteSequenceOutputFactory::new());
        for (input, output) in root.index {
            index_builder.add(&input, ByteSequenceOutput::new(output))?;
        }
        let index = index_builder.finish();

        // write fst to index
        let index_start_fp = self.block_tree_writer.index_out.file_pointer();
        index.save(&mut self.block_tree_writer.index_out)?;

        let (min_term, max_term) = match (
            self.first_pending_term.take(),
            self.last_pending_term.take(),
        ) {
            (Some(min_term), Some(max_term)) => (min_term, max_term),
            _ => bail!(IllegalState("field has terms but no min/max term".into())),
        };
        let meta = FieldMetaData {
            field_info: self.field_info.clone(),
            root_code,
            num_terms: self.num_terms,
            index_start_fp,
            sum_total_term_freq: self.sum_total_term_freq,
            sum_doc_freq: self.sum_doc_freq,
            doc_count: self.doc_count,
            min_term,
            max_term,
        };
        self.block_tree_writer.fields.push(meta);
        Ok(())
    }
}

enum PendingEntry {
    Term(PendingTerm),
    Block(PendingBlock),
}

struct PendingTerm {
    term_bytes: Vec<u8>,
    state: BlockTermState,
}

impl PendingTerm {
    fn new(term: Vec<u8>, state: BlockTermState) -> Self {
        PendingTerm {
            term_bytes: term,
            state,
        }
    }
}

struct PendingBlock {
    prefix: Vec<u8>,
    fp: i64,
    has_terms: bool,
    is_floor: bool,
    floor_lead_byte: i32,
    // sorted prefixes this block and its sub-blocks add to the terms index
    index: Vec<IndexEntry>,
    sub_indices: Vec<Vec<IndexEntry>>,
}

impl PendingBlock {
    fn new(
        prefix: Vec<u8>,
        fp: i64,
        has_terms: bool,
        is_floor: bool,
        floor_lead_byte: i32,
        sub_indices: Vec<Vec<IndexEntry>>,
    ) -> Self {
        PendingBlock {
            prefix,
            fp,
            has_terms,
            is_floor,
            floor_lead_byte,
            index: vec![],
            sub_indices,
        }
    }

    // `blocks` are the floor followers of this block
    fn compile_index(&mut self, blocks: &mut [PendingBlock]) -> Result<()> {
        debug_assert!((self.is_floor && !blocks.is_empty()) || (!self.is_floor && blocks.is_empty()));

        let mut output = Vec::new();
        output.write_vlong(encode_output(self.fp, self.has_terms, self.is_floor))?;
        if self.is_floor {
            output.write_vint(blocks.len() as i32)?;
            for block in blocks.iter() {
                debug_assert_ne!(block.floor_lead_byte, -1);
                debug_assert!(block.fp > self.fp);
                output.write_byte(block.floor_lead_byte as u8)?;
                let flag = if block.has_terms { 1 } else { 0 };
                output.write_vlong(((block.fp - self.fp) << 1) | flag)?;
            }
        }

        let mut index = vec![(self.prefix.clone(), output)];
        // Copy over index for self, then for all other floor blocks
        for sub_index in mem::replace(&mut self.sub_indices, vec![]) {
            index.extend(sub_index);
        }
        for block in blocks.iter_mut() {
            for sub_index in mem::replace(&mut block.sub_indices, vec![]) {
                index.extend(sub_index);
            }
        }
        debug_assert!(index.windows(2).all(|w| w[0].0 < w[1].0));
        self.index = index;
        Ok(())
    }
}

/// Metadata of the `ord`th term of a test field: ascending file pointers
/// and a singleton doc for every term with doc_freq 1.
pub fn test_term_state(ord: usize, has_freqs: bool) -> BlockTermState {
    let mut state = BlockTermState::new();
    state.doc_freq = (ord % 5) as i32 + 1;
    state.total_term_freq = if has_freqs {
        i64::from(state.doc_freq) + (ord % 3) as i64
    } else {
        i64::from(state.doc_freq)
    };
    state.doc_start_fp = ord as i64 * 16;
    state.pos_start_fp = ord as i64 * 8;
    state.pay_start_fp = ord as i64 * 4;
    if state.doc_freq == 1 {
        state.singleton_doc_id = ord as i32;
    }
    state
}

/// Sorts and dedups `terms`, pairing each with `test_term_state`.
pub fn test_terms<T: AsRef<[u8]>>(
    terms: &[T],
    index_options: IndexOptions,
) -> Vec<(Vec<u8>, BlockTermState)> {
    let mut terms: Vec<Vec<u8>> = terms.iter().map(|t| t.as_ref().to_vec()).collect();
    terms.sort();
    terms.dedup();
    terms
        .into_iter()
        .enumerate()
        .map(|(ord, term)| (term, test_term_state(ord, index_options.has_freqs())))
        .collect()
}

pub fn test_field_info(name: &str, number: u32, index_options: IndexOptions) -> FieldInfo {
    FieldInfo::new(name.to_string(), number, index_options, false).unwrap()
}

/// Opens a reader over in-memory terms dict and terms index bytes.
pub fn open_test_reader(
    terms: Vec<u8>,
    index: Vec<u8>,
    field_infos: Vec<FieldInfo>,
    config: &BlockTreeConfig,
) -> Result<BlockTreeTermsReader> {
    let field_infos = FieldInfos::new(field_infos)?;
    let postings_reader: PostingsReaderRef = Arc::new(StandardPostingsReader::new());
    BlockTreeTermsReader::open(
        Box::new(ByteBufferIndexInput::from(terms)),
        Box::new(ByteBufferIndexInput::from(index)),
        postings_reader,
        &field_infos,
        config.clone(),
    )
}

/// Writes `fields` and opens them again.
pub fn build_test_reader(
    fields: &[(FieldInfo, Vec<(Vec<u8>, BlockTermState)>)],
    config: &BlockTreeConfig,
    version: i32,
) -> Result<BlockTreeTermsReader> {
    let mut writer = BlockTreeTermsWriter::new(config, version)?;
    for (field_info, terms) in fields {
        writer.write_field(field_info, terms)?;
    }
    let (terms, index) = writer.finish()?;
    let infos = fields.iter().map(|(info, _)| info.clone()).collect();
    open_test_reader(terms, index, infos, config)
}

/// `count` random terms of 1 to `max_len` bytes drawn from `alphabet`,
/// sorted and deduped.
pub fn random_test_terms<R: Rng>(
    rng: &mut R,
    count: usize,
    alphabet: &[u8],
    max_len: usize,
) -> Vec<Vec<u8>> {
    let mut terms: Vec<Vec<u8>> = (0..count)
        .map(|_| random_test_term(rng, alphabet, max_len))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

pub fn random_test_term<R: Rng>(rng: &mut R, alphabet: &[u8], max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(1, max_len + 1);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0, alphabet.len())])
        .collect()
}

/// A config splitting blocks early, so a few dozen terms already produce
/// floor blocks and nested sub-blocks.
pub fn small_blocks_config() -> BlockTreeConfig {
    BlockTreeConfig {
        min_items_in_block: 4,
        max_items_in_block: 8,
        ..BlockTreeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::Terms;
    use crate::core::codec::{Fields, TermIterator};

    fn all_terms(reader: &BlockTreeTermsReader, field: &str) -> Vec<Vec<u8>> {
        let terms = reader.terms(field).unwrap().unwrap();
        let mut iter = terms.iterator().unwrap();
        let mut result = vec![];
        while let Some(term) = iter.next().unwrap() {
            result.push(term);
        }
        result
    }

    // "t" followed by two letters up to `last`
    fn letter_terms(last: u8) -> Vec<Vec<u8>> {
        let mut terms = vec![];
        for a in b'a'..=last {
            for b in b'a'..=last {
                terms.push(vec![b't', a, b]);
            }
        }
        terms
    }

    #[test]
    fn test_write_and_iterate() {
        let info = test_field_info("body", 0, IndexOptions::DocsAndFreqsAndPositions);
        let terms = test_terms(&letter_terms(b'h'), info.index_options);
        for version in VERSION_START..=VERSION_CURRENT {
            for config in &[BlockTreeConfig::default(), small_blocks_config()] {
                let reader =
                    build_test_reader(&[(info.clone(), terms.clone())], config, version).unwrap();
                assert_eq!(reader.version(), version);
                let expected: Vec<Vec<u8>> = terms.iter().map(|(t, _)| t.clone()).collect();
                assert_eq!(all_terms(&reader, "body"), expected);

                let field = reader.terms("body").unwrap().unwrap();
                assert_eq!(field.size().unwrap(), 64);
                assert_eq!(field.min().unwrap().unwrap(), b"taa".to_vec());
                assert_eq!(field.max().unwrap().unwrap(), b"thh".to_vec());
                let sum_df: i64 = terms.iter().map(|(_, s)| i64::from(s.doc_freq)).sum();
                assert_eq!(field.sum_doc_freq().unwrap(), sum_df);
            }
        }
    }

    #[test]
    fn test_small_blocks_produce_floor_blocks() {
        let info = test_field_info("body", 0, IndexOptions::DocsAndFreqs);

        let terms = test_terms(&letter_terms(b'l'), info.index_options);
        let reader =
            build_test_reader(&[(info.clone(), terms)], &small_blocks_config(), VERSION_CURRENT)
                .unwrap();
        let stats = reader
            .terms("body")
            .unwrap()
            .unwrap()
            .compute_block_stats()
            .unwrap();
        assert_eq!(stats.total_term_count, 144);
        assert!(stats.floor_block_count > 0);
        assert!(stats.total_block_count > 2);

        // 36 terms under "t" fit in one block
        let terms = test_terms(&letter_terms(b'f'), info.index_options);
        let reader =
            build_test_reader(&[(info, terms)], &BlockTreeConfig::default(), VERSION_CURRENT)
                .unwrap();
        let stats = reader
            .terms("body")
            .unwrap()
            .unwrap()
            .compute_block_stats()
            .unwrap();
        assert_eq!(stats.total_term_count, 36);
        assert_eq!(stats.floor_block_count, 0);
        assert_eq!(stats.total_block_count, 2);
        assert_eq!(stats.terms_only_block_count, 1);
        assert_eq!(stats.sub_blocks_only_block_count, 1);
    }

    #[test]
    fn test_suffix_compression() {
        let info = test_field_info("body", 0, IndexOptions::Docs);

        // long, repetitive suffixes
        let repetitive: Vec<Vec<u8>> = (0..30)
            .map(|i| format!("prefix_{:03}abcabcabcabcabcabc", i).into_bytes())
            .collect();
        let reader = build_test_reader(
            &[(info.clone(), test_terms(&repetitive, info.index_options))],
            &BlockTreeConfig::default(),
            VERSION_CURRENT,
        )
        .unwrap();
        assert_eq!(all_terms(&reader, "body"), repetitive);
        let stats = reader
            .terms("body")
            .unwrap()
            .unwrap()
            .compute_block_stats()
            .unwrap();
        assert_eq!(stats.compression_algorithms[CompressionAlgorithm::LZ4.code() as usize], 1);
        assert!(stats.total_block_suffix_bytes < stats.total_uncompressed_block_suffix_bytes);

        // six lowercase letters after a shared prefix
        let mut lowercase: Vec<Vec<u8>> = (0..30u8)
            .map(|i| vec![b'z', b'z', b'z', b'a' + i % 26, b'a' + i / 26, b'q', b'w', b'e', b'r'])
            .collect();
        lowercase.sort();
        let reader = build_test_reader(
            &[(info.clone(), test_terms(&lowercase, info.index_options))],
            &BlockTreeConfig::default(),
            VERSION_CURRENT,
        )
        .unwrap();
        assert_eq!(all_terms(&reader, "body"), lowercase);
        let stats = reader
            .terms("body")
            .unwrap()
            .unwrap()
            .compute_block_stats()
            .unwrap();
        assert_eq!(
            stats.compression_algorithms[CompressionAlgorithm::LowercaseAscii.code() as usize],
            1
        );
        assert_eq!(stats.compression_algorithms[CompressionAlgorithm::LZ4.code() as usize], 0);

        // the old layout never compresses
        let reader = build_test_reader(
            &[(info.clone(), test_terms(&repetitive, info.index_options))],
            &BlockTreeConfig::default(),
            VERSION_START,
        )
        .unwrap();
        let stats = reader
            .terms("body")
            .unwrap()
            .unwrap()
            .compute_block_stats()
            .unwrap();
        assert_eq!(stats.compression_algorithms[0], stats.total_block_count as i64);
    }

    #[test]
    fn test_multiple_fields() {
        let title = test_field_info("title", 0, IndexOptions::Docs);
        let body = test_field_info("body", 1, IndexOptions::DocsAndFreqs);
        let title_terms = test_terms(&[b"lucene".to_vec(), b"rust".to_vec()], title.index_options);
        let body_terms = test_terms(&letter_terms(b'h'), body.index_options);
        let reader = build_test_reader(
            &[(title, title_terms), (body, body_terms)],
            &BlockTreeConfig::default(),
            VERSION_CURRENT,
        )
        .unwrap();
        assert_eq!(reader.size(), 2);
        assert_eq!(reader.fields(), vec!["body".to_string(), "title".to_string()]);
        assert_eq!(all_terms(&reader, "title"), vec![b"lucene".to_vec(), b"rust".to_vec()]);
        assert_eq!(all_terms(&reader, "body").len(), 64);
        let title = reader.terms("title").unwrap().unwrap();
        assert_eq!(title.sum_total_term_freq().unwrap(), -1);
        assert!(!title.has_freqs().unwrap());
        assert!(reader.terms("missing").unwrap().is_none());
    }

    #[test]
    fn test_empty_term() {
        let info = test_field_info("body", 0, IndexOptions::DocsAndFreqs);
        let terms = test_terms(&[b"".to_vec(), b"a".to_vec(), b"ab".to_vec()], info.index_options);
        let reader =
            build_test_reader(&[(info, terms)], &BlockTreeConfig::default(), VERSION_CURRENT)
                .unwrap();
        assert_eq!(
            all_terms(&reader, "body"),
            vec![b"".to_vec(), b"a".to_vec(), b"ab".to_vec()]
        );
        let field = reader.terms("body").unwrap().unwrap();
        let mut iter = field.iterator().unwrap();
        assert!(iter.seek_exact(b"").unwrap());
        assert_eq!(iter.term().unwrap(), b"");
    }

    #[test]
    fn test_writer_rejects_bad_input() {
        let info = test_field_info("body", 0, IndexOptions::DocsAndFreqs);
        let config = BlockTreeConfig::default();
        assert!(BlockTreeTermsWriter::new(&config, VERSION_START - 1).is_err());
        assert!(BlockTreeTermsWriter::new(&config, VERSION_CURRENT + 1).is_err());

        let mut writer = BlockTreeTermsWriter::new(&config, VERSION_CURRENT).unwrap();
        let out_of_order = vec![
            (b"b".to_vec(), test_term_state(0, true)),
            (b"a".to_vec(), test_term_state(1, true)),
        ];
        assert!(writer.write_field(&info, &out_of_order).is_err());

        let mut state = test_term_state(0, true);
        state.doc_freq = 0;
        let mut writer = BlockTreeTermsWriter::new(&config, VERSION_CURRENT).unwrap();
        assert!(writer.write_field(&info, &[(b"a".to_vec(), state)]).is_err());

        let mut writer = BlockTreeTermsWriter::new(&config, VERSION_CURRENT).unwrap();
        let terms = test_terms(&[b"a".to_vec()], info.index_options);
        writer.write_field(&info, &terms).unwrap();
        assert!(writer.write_field(&info, &terms).is_err());
        writer.finish().unwrap();
        assert!(writer.finish().is_err());
        assert!(writer.write_field(&info, &terms).is_err());
    }

    #[test]
    fn test_singleton_stats_runs() {
        let mut stats = StatsWriter::new(true, true);
        stats.add(1, 1).unwrap();
        stats.add(1, 1).unwrap();
        stats.add(1, 1).unwrap();
        stats.add(3, 5).unwrap();
        stats.finish().unwrap();
        // run of three singletons, then df=3 with ttf delta 2
        assert_eq!(stats.out.bytes(), &[(2 << 1) | 1, 3 << 1, 2]);

        let mut stats = StatsWriter::new(false, false);
        stats.add(1, 1).unwrap();
        stats.add(4, 4).unwrap();
        stats.finish().unwrap();
        assert_eq!(stats.out.bytes(), &[1, 4]);
    }
}
