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

use std::collections::btree_map::Keys;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::codec::field_infos::{FieldInfo, FieldInfos};
use crate::core::codec::postings::blocktree::{
    BlockTreeConfig, CompressionAlgorithm, IntersectTermIterator, SegmentTermIterator,
    SegmentTermsIterFrame, OUTPUT_FLAGS_NUM_BITS, VERSION_COMPRESSED_SUFFIXES, VERSION_CURRENT,
    VERSION_START,
};
use crate::core::codec::postings::{PostingsReaderBase, PostingsReaderRef};
use crate::core::codec::{Fields, Terms};
use crate::core::store::io::{DataInput, IndexInput};
use crate::core::util::automaton::CompiledAutomaton;
use crate::core::util::fst::{ByteSequenceOutputFactory, FST};
use crate::core::util::UnsignedShift;
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

type IndexInputRef = Arc<dyn IndexInput>;

pub type FSTRef = Arc<FST<ByteSequenceOutputFactory>>;

/// A block-based terms index and dictionary that assigns
/// terms to variable length blocks according to how they
/// share prefixes.
///
/// The terms index is a prefix trie
/// whose leaves are term blocks.  The advantage of this
/// approach is that seek_exact is often able to
/// determine a term cannot exist without doing any IO, and
/// intersection with automata is very fast.
///
/// The data structure used by this implementation is very
/// similar to a burst trie, but with added logic to break up
/// too-large blocks of all terms sharing a given prefix into
/// smaller ones.
///
/// Use `FieldReader::compute_block_stats` to see summary statistics
/// on the blocks in the dictionary.
pub struct BlockTreeTermsReader {
    // Open input to the main terms dict file
    terms_in: IndexInputRef,

    // Reads the terms dict entries, to gather state to
    // produce postings on demand
    postings_reader: PostingsReaderRef,

    fields: BTreeMap<String, FieldReaderRef>,

    /// File offset where the directory starts in the terms file.
    dir_offset: i64,

    version: i32,

    config: BlockTreeConfig,
}

impl BlockTreeTermsReader {
    pub fn open(
        mut terms_in: Box<dyn IndexInput>,
        mut index_in: Box<dyn IndexInput>,
        postings_reader: PostingsReaderRef,
        field_infos: &FieldInfos,
        config: BlockTreeConfig,
    ) -> Result<BlockTreeTermsReader> {
        config.validate()?;

        terms_in.seek(0)?;
        let version = terms_in.read_int()?;
        if version < VERSION_START || version > VERSION_CURRENT {
            bail!(CorruptIndex(format!(
                "unsupported terms dict version {} in {}: expected {}..={}",
                version,
                terms_in.name(),
                VERSION_START,
                VERSION_CURRENT
            )));
        }

        // Read per-field details
        let dir_offset = Self::seek_dir(terms_in.as_mut())?;

        let num_fields = terms_in.read_vint()?;
        if num_fields < 0 {
            bail!(CorruptIndex(format!("invalid num_fields: {}", num_fields)));
        }

        let shared_terms_in: IndexInputRef = Arc::from(IndexInput::clone(terms_in.as_ref())?);
        let mut fields = BTreeMap::new();
        for _ in 0..num_fields {
            let field = terms_in.read_vint()?;
            let num_terms = terms_in.read_vlong()?;
            if num_terms <= 0 {
                bail!(CorruptIndex(format!(
                    "Illegal num_terms for field number: {}",
                    field
                )));
            }
            let root_code = Self::read_bytes(terms_in.as_mut())?;
            let field_info = match field_infos.by_number.get(&(field as u32)) {
                Some(info) if field >= 0 => Arc::clone(info),
                _ => bail!(CorruptIndex(format!("invalid field number: {}", field))),
            };
            let sum_total_term_freq = if field_info.index_options.has_freqs() {
                terms_in.read_vlong()?
            } else {
                -1
            };
            let sum_doc_freq = terms_in.read_vlong()?;
            let doc_count = terms_in.read_vint()?;
            let min_term = Self::read_bytes(terms_in.as_mut())?;
            let max_term = Self::read_bytes(terms_in.as_mut())?;
            if doc_count < 0 {
                bail!(CorruptIndex(format!(
                    "invalid doc_count: {} for field: {}",
                    doc_count, field_info.name
                )));
            }
            if sum_doc_freq < i64::from(doc_count) {
                // #postings must be >= #docs with field
                bail!(CorruptIndex(format!(
                    "invalid sum_doc_freq: {} doc_count: {}",
                    sum_doc_freq, doc_count
                )));
            }
            if sum_total_term_freq != -1 && sum_total_term_freq < sum_doc_freq {
                // #positions must be >= #postings
                bail!(CorruptIndex(format!(
                    "invalid sum_total_term_freq: {} sum_doc_freq: {}",
                    sum_total_term_freq, sum_doc_freq
                )));
            }
            let index_start_fp = terms_in.read_vlong()?;
            if fields.contains_key(&field_info.name) {
                bail!(CorruptIndex(format!(
                    "duplicated field: {}",
                    field_info.name
                )));
            }
            let reader = FieldReader::new(
                field_info,
                num_terms,
                root_code,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                index_start_fp,
                index_in.as_mut(),
                min_term,
                max_term,
                Arc::clone(&shared_terms_in),
                Arc::clone(&postings_reader),
                version,
                config.clone(),
            )?;
            debug!(
                "opened field {}: {} terms, root block fp {}",
                reader.field_info.name, reader.num_terms, reader.root_block_fp
            );
            fields.insert(reader.field_info.name.clone(), Arc::new(reader));
        }

        Ok(BlockTreeTermsReader {
            terms_in: shared_terms_in,
            postings_reader,
            fields,
            dir_offset,
            version,
            config,
        })
    }

    fn read_bytes(input: &mut dyn IndexInput) -> Result<Vec<u8>> {
        let len = input.read_vint()?;
        let available = input.len().saturating_sub(input.file_pointer().max(0) as u64);
        if len < 0 || len as u64 > available {
            bail!(CorruptIndex(format!(
                "invalid byte string length {} in {}",
                len,
                input.name()
            )));
        }
        let mut vec = vec![0u8; len as usize];
        input.read_bytes(&mut vec, 0, len as usize)?;
        Ok(vec)
    }

    /// Seek `input` to the directory offset, stored in the last 8 bytes.
    fn seek_dir(input: &mut dyn IndexInput) -> Result<i64> {
        if input.len() < 12 {
            bail!(CorruptIndex(format!(
                "terms dict {} is too short: {} bytes",
                input.name(),
                input.len()
            )));
        }
        input.seek(input.len() as i64 - 8)?;
        let dir_offset = input.read_long()?;
        if dir_offset < 4 || dir_offset > input.len() as i64 - 8 {
            bail!(CorruptIndex(format!(
                "invalid dir_offset {} in {}",
                dir_offset,
                input.name()
            )));
        }
        input.seek(dir_offset)?;
        Ok(dir_offset)
    }

    pub fn postings_reader(&self) -> &PostingsReaderRef {
        &self.postings_reader
    }

    pub fn terms_in(&self) -> &dyn IndexInput {
        self.terms_in.as_ref()
    }

    pub fn dir_offset(&self) -> i64 {
        self.dir_offset
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn config(&self) -> &BlockTreeConfig {
        &self.config
    }

    pub fn keys(&self) -> Keys<String, FieldReaderRef> {
        self.fields.keys()
    }
}

impl Fields for BlockTreeTermsReader {
    type Terms = FieldReaderRef;
    fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn terms(&self, field: &str) -> Result<Option<Self::Terms>> {
        Ok(self.fields.get(field).map(Arc::clone))
    }

    fn size(&self) -> usize {
        self.fields.len()
    }
}

/// BlockTree's implementation of `Terms`.
///
/// Cloning is cheap: the index, the terms input and the postings reader
/// are shared. Every iterator owns a clone.
#[derive(Clone)]
pub struct FieldReader {
    num_terms: i64,
    field_info: Arc<FieldInfo>,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
    index_start_fp: i64,
    index_num_bytes: i64,
    root_block_fp: i64,
    root_code: Arc<Vec<u8>>,
    min_term: Arc<Vec<u8>>,
    max_term: Arc<Vec<u8>>,
    index: FSTRef,
    terms_in: IndexInputRef,
    postings_reader: PostingsReaderRef,
    version: i32,
    max_frame_depth: usize,
}

pub type FieldReaderRef = Arc<FieldReader>;

impl FieldReader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        field_info: Arc<FieldInfo>,
        num_terms: i64,
        root_code: Vec<u8>,
        sum_total_term_freq: i64,
        sum_doc_freq: i64,
        doc_count: i32,
        index_start_fp: i64,
        index_in: &mut dyn IndexInput,
        min_term: Vec<u8>,
        max_term: Vec<u8>,
        terms_in: IndexInputRef,
        postings_reader: PostingsReaderRef,
        version: i32,
        config: BlockTreeConfig,
    ) -> Result<FieldReader> {
        let root_block_fp = root_code.as_slice().read_vlong()?.unsigned_shift(OUTPUT_FLAGS_NUM_BITS);
        if root_block_fp < 0 || root_block_fp as u64 >= terms_in.len() {
            bail!(CorruptIndex(format!(
                "invalid root block fp {} for field: {}",
                root_block_fp, field_info.name
            )));
        }
        index_in.seek(index_start_fp)?;
        let index = FST::from_input(index_in, ByteSequenceOutputFactory::new())?;
        let index_num_bytes = index_in.file_pointer() - index_start_fp;
        Ok(FieldReader {
            num_terms,
            field_info,
            sum_total_term_freq,
            sum_doc_freq,
            doc_count,
            index_start_fp,
            index_num_bytes,
            root_block_fp,
            root_code: Arc::new(root_code),
            min_term: Arc::new(min_term),
            max_term: Arc::new(max_term),
            index: Arc::new(index),
            terms_in,
            postings_reader,
            version,
            max_frame_depth: config.max_frame_depth,
        })
    }

    pub fn root_code(&self) -> &[u8] {
        &self.root_code
    }

    pub fn root_block_fp(&self) -> i64 {
        self.root_block_fp
    }

    pub fn field_info(&self) -> &FieldInfo {
        self.field_info.as_ref()
    }

    #[inline]
    pub fn index(&self) -> &FSTRef {
        &self.index
    }

    pub fn index_start_fp(&self) -> i64 {
        self.index_start_fp
    }

    pub fn index_num_bytes(&self) -> i64 {
        self.index_num_bytes
    }

    pub fn min_term(&self) -> &[u8] {
        &self.min_term
    }

    pub fn max_term(&self) -> &[u8] {
        &self.max_term
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn max_frame_depth(&self) -> usize {
        self.max_frame_depth
    }

    #[inline]
    pub fn postings_reader(&self) -> &dyn PostingsReaderBase {
        self.postings_reader.as_ref()
    }

    /// A private positioned handle on the terms file.
    pub(crate) fn clone_terms_in(&self) -> Result<Box<dyn IndexInput>> {
        IndexInput::clone(self.terms_in.as_ref())
    }

    pub(crate) fn new_frame(&self, ord: usize) -> SegmentTermsIterFrame {
        let mut state = self.postings_reader.new_term_state();
        state.total_term_freq = -1;
        SegmentTermsIterFrame::new(ord, self.version >= VERSION_COMPRESSED_SUFFIXES, state)
    }

    /// Walks every block of this field.
    pub fn compute_block_stats(&self) -> Result<Stats> {
        SegmentTermIterator::new(self.clone())?.compute_block_stats()
    }
}

impl Terms for FieldReader {
    type Iterator = SegmentTermIterator;
    type Intersect = IntersectTermIterator;

    fn iterator(&self) -> Result<Self::Iterator> {
        SegmentTermIterator::new(self.clone())
    }

    fn intersect(
        &self,
        compiled: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Self::Intersect> {
        IntersectTermIterator::new(self.clone(), compiled.clone(), start_term)
    }

    fn size(&self) -> Result<i64> {
        Ok(self.num_terms)
    }

    fn sum_total_term_freq(&self) -> Result<i64> {
        Ok(self.sum_total_term_freq)
    }

    fn sum_doc_freq(&self) -> Result<i64> {
        Ok(self.sum_doc_freq)
    }

    fn doc_count(&self) -> Result<i32> {
        Ok(self.doc_count)
    }

    fn has_freqs(&self) -> Result<bool> {
        Ok(self.field_info.index_options.has_freqs())
    }

    fn has_offsets(&self) -> Result<bool> {
        Ok(self.field_info.index_options.has_offsets())
    }

    fn has_positions(&self) -> Result<bool> {
        Ok(self.field_info.index_options.has_positions())
    }

    fn has_payloads(&self) -> Result<bool> {
        Ok(self.field_info.has_store_payloads)
    }

    fn min(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.min_term.to_vec()))
    }

    fn max(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.max_term.to_vec()))
    }

    fn stats(&self) -> Result<String> {
        Ok(self.compute_block_stats()?.to_string())
    }
}

/// BlockTree statistics for a single field
/// returned by `FieldReader::compute_block_stats`.
#[derive(Debug, Default, Serialize)]
pub struct Stats {
    /// Byte size of the index.
    pub index_num_bytes: i64,

    /// Total number of terms in the field.
    pub total_term_count: i64,

    /// Total number of bytes (sum of term lengths) across all terms in the field.
    pub total_term_bytes: i64,

    /// The number of normal (non-floor) blocks in the terms file.
    pub non_floor_block_count: i32,

    /// The number of floor blocks (meta-blocks larger than the
    /// allowed `max_items_in_block`) in the terms file.
    pub floor_block_count: i32,

    /// The number of sub-blocks within the floor blocks.
    pub floor_sub_block_count: i32,

    /// The number of "internal" blocks (that have both
    /// terms and sub-blocks).
    pub mixed_block_count: i32,

    /// The number of "leaf" blocks (blocks that have only
    /// terms).
    pub terms_only_block_count: i32,

    /// The number of "internal" blocks that do not contain
    /// terms (have only sub-blocks).
    pub sub_blocks_only_block_count: i32,

    /// Total number of blocks.
    pub total_block_count: i32,

    /// Number of blocks at each prefix depth.
    pub block_count_by_prefix_len: Vec<i32>,
    start_block_count: i32,
    end_block_count: i32,

    /// Total number of bytes used to store term suffixes, once decompressed.
    pub total_uncompressed_block_suffix_bytes: i64,

    /// Total number of bytes used to store term suffixes.
    pub total_block_suffix_bytes: i64,

    /// Number of blocks per suffix compression algorithm, by code.
    pub compression_algorithms: [i64; 3],

    /// Total number of bytes used to store term stats (not
    /// including what the `PostingsReaderBase` stores).
    pub total_block_stats_bytes: i64,

    /// Total bytes stored by the `PostingsReaderBase`,
    /// plus the other few vInts stored in the frame.
    pub total_block_other_bytes: i64,

    /// Field name.
    pub field: String,
}

impl Stats {
    pub fn new(field: &str) -> Stats {
        Stats {
            block_count_by_prefix_len: vec![0i32; 10],
            field: String::from(field),
            ..Default::default()
        }
    }

    pub fn start_block(&mut self, frame: &SegmentTermsIterFrame, is_floor: bool) {
        self.total_block_count += 1;
        if is_floor {
            if frame.fp == frame.fp_orig {
                self.floor_block_count += 1;
            }
            self.floor_sub_block_count += 1;
        } else {
            self.non_floor_block_count += 1;
        }
        if self.block_count_by_prefix_len.len() <= frame.prefix {
            self.block_count_by_prefix_len.resize(frame.prefix + 1, 0);
        }
        self.block_count_by_prefix_len[frame.prefix] += 1;
        self.start_block_count += 1;
        self.total_block_suffix_bytes += frame.suffix_bytes_on_disk;
        self.total_uncompressed_block_suffix_bytes += frame.suffixes_len() as i64;
        self.compression_algorithms[frame.compression.code() as usize] += 1;
        self.total_block_stats_bytes += frame.stats_len() as i64;
    }

    pub fn end_block(&mut self, frame: &SegmentTermsIterFrame) -> Result<()> {
        let term_count = if frame.is_leaf_block {
            frame.ent_count
        } else {
            frame.state.term_block_ord
        };
        let sub_block_count = frame.ent_count - term_count;
        match (term_count, sub_block_count) {
            (0, x) if x > 0 => self.sub_blocks_only_block_count += 1,
            (x, 0) if x > 0 => self.terms_only_block_count += 1,
            (x, y) if x > 0 && y > 0 => self.mixed_block_count += 1,
            (_, _) => bail!(CorruptIndex(format!(
                "block at fp {} has neither terms nor sub-blocks",
                frame.fp
            ))),
        }
        self.end_block_count += 1;
        let other_bytes = frame.fp_end
            - frame.fp
            - frame.suffix_bytes_on_disk
            - frame.stats_len() as i64;
        debug_assert!(other_bytes > 0);
        self.total_block_other_bytes += other_bytes;
        Ok(())
    }

    pub fn term(&mut self, term: &[u8]) {
        self.total_term_count += 1;
        self.total_term_bytes += term.len() as i64;
    }

    pub fn finish(&self) {
        debug_assert!(
            self.start_block_count == self.end_block_count,
            "self.start_block_count={} self.end_block_count={}",
            self.start_block_count,
            self.end_block_count
        );
        debug_assert!(
            self.total_block_count == self.floor_sub_block_count + self.non_floor_block_count,
            "self.floor_sub_block_count={} self.non_floor_block_count={} self.total_block_count={}",
            self.floor_sub_block_count,
            self.non_floor_block_count,
            self.total_block_count
        );
        debug_assert!(
            self.total_block_count
                == self.mixed_block_count
                    + self.terms_only_block_count
                    + self.sub_blocks_only_block_count,
            "self.total_block_count={} self.mixed_block_count={} \
             self.sub_blocks_only_block_count={} self.terms_only_block_count={}",
            self.total_block_count,
            self.mixed_block_count,
            self.sub_blocks_only_block_count,
            self.terms_only_block_count
        );
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "field {}:", self.field)?;
        writeln!(f, "  index FST:")?;
        writeln!(f, "    {} bytes", self.index_num_bytes)?;
        writeln!(f, "  terms:")?;
        writeln!(f, "    {} terms", self.total_term_count)?;
        let bps = if self.total_term_count != 0 {
            self.total_term_bytes as f64 / self.total_term_count as f64
        } else {
            0.0
        };
        writeln!(
            f,
            "    {} bytes {:.1} (bytes/term)",
            self.total_term_bytes, bps
        )?;
        writeln!(f, "  blocks:")?;
        writeln!(f, "    {} blocks", self.total_block_count)?;
        writeln!(f, "    {} terms-only blocks", self.terms_only_block_count)?;
        writeln!(
            f,
            "    {} sub-block-only blocks",
            self.sub_blocks_only_block_count
        )?;
        writeln!(f, "    {} mixed blocks", self.mixed_block_count)?;
        writeln!(f, "    {} floor blocks", self.floor_block_count)?;
        writeln!(
            f,
            "    {} non-floor blocks",
            self.total_block_count - self.floor_sub_block_count
        )?;
        writeln!(f, "    {} floor sub-blocks", self.floor_sub_block_count)?;
        let (bsubps, bstbps, bobps) = if self.total_block_count != 0 {
            let total_block_count = f64::from(self.total_block_count);
            (
                self.total_block_suffix_bytes as f64 / total_block_count,
                self.total_block_stats_bytes as f64 / total_block_count,
                self.total_block_other_bytes as f64 / total_block_count,
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        writeln!(
            f,
            "    {} compressed term suffix bytes {:.1} (suffix-bytes/block)",
            self.total_block_suffix_bytes, bsubps
        )?;
        writeln!(
            f,
            "    {} uncompressed term suffix bytes",
            self.total_uncompressed_block_suffix_bytes
        )?;
        let algorithms = [
            CompressionAlgorithm::NoCompression,
            CompressionAlgorithm::LowercaseAscii,
            CompressionAlgorithm::LZ4,
        ];
        for algorithm in algorithms.iter() {
            let count = self.compression_algorithms[algorithm.code() as usize];
            if count != 0 {
                writeln!(f, "      {:?}: {} blocks", algorithm, count)?;
            }
        }
        writeln!(
            f,
            "    {} term stats bytes {:.1} (stats-bytes/block)",
            self.total_block_stats_bytes, bstbps
        )?;
        writeln!(
            f,
            "    {} other bytes {:.1} (other-bytes/block)",
            self.total_block_other_bytes, bobps
        )?;
        if self.total_block_count != 0 {
            writeln!(f, "    by prefix length:")?;
            for (prefix, block_count) in self.block_count_by_prefix_len.iter().enumerate() {
                if *block_count != 0 {
                    writeln!(f, "      {}: {}", prefix, block_count)?;
                }
            }
        }
        Ok(())
    }
}
