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

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::core::codec::postings::blocktree::{
    FieldReader, SegmentTermsIterFrame, Stats, OUTPUT_FLAGS_HAS_TERMS, OUTPUT_FLAGS_IS_FLOOR,
    OUTPUT_FLAGS_NUM_BITS,
};
use crate::core::codec::postings::TermPostings;
use crate::core::codec::{BlockTermState, SeekStatus, TermIterator};
use crate::core::store::io::{DataInput, IndexInput};
use crate::core::util::fst::{
    Arc as FSTArc, ByteSequenceOutput, ByteSequenceOutputFactory, OutputFactory,
};
use crate::core::util::UnsignedShift;
use crate::error::ErrorKind::{CorruptIndex, IllegalState, UnsupportedOperation};
use crate::error::Result;

/// Iterates through terms in this field, with full seek support.
///
/// Frames live in `stack`, indexed by depth. `stack[0]` is the static frame
/// holding a term state handed to `seek_exact_state`; the root block is
/// always at depth 1.
pub struct SegmentTermIterator {
    fr: FieldReader,
    input: Box<dyn IndexInput>,
    stack: Vec<SegmentTermsIterFrame>,
    current_frame_ord: usize,
    // Lazy init:
    term_exists: bool,

    target_before_current_length: usize,
    // What prefix of the current term was present in the index
    valid_index_prefix: usize,

    eof: bool,
    fresh: bool,
    positioned: bool,
    arcs: Vec<FSTArc<ByteSequenceOutput>>,

    term: Vec<u8>,
}

impl SegmentTermIterator {
    pub fn new(fr: FieldReader) -> Result<SegmentTermIterator> {
        let input = fr.clone_terms_in()?;
        let stack = vec![fr.new_frame(0)];
        let arcs = vec![fr.index().root_arc()];
        Ok(SegmentTermIterator {
            fr,
            input,
            stack,
            current_frame_ord: 0,
            term_exists: false,
            target_before_current_length: 0,
            valid_index_prefix: 0,
            eof: false,
            fresh: true,
            positioned: false,
            arcs,
            term: Vec::new(),
        })
    }

    pub fn field_reader(&self) -> &FieldReader {
        &self.fr
    }

    /// The frame the iterator is positioned in.
    pub fn current_frame(&self) -> &SegmentTermsIterFrame {
        &self.stack[self.current_frame_ord]
    }

    /// Walks every block of the field, then leaves the iterator unpositioned.
    pub fn compute_block_stats(&mut self) -> Result<Stats> {
        let mut stats = Stats::new(&self.fr.field_info().name);
        stats.index_num_bytes = self.fr.index_num_bytes();

        self.reset();
        let arc = self.fr.index().root_arc();
        let root_code = self.fr.root_code().to_vec();
        self.current_frame_ord = self.push_frame_by_data(Some(arc), &root_code, 0)?;
        let mut cur = self.current_frame_ord;
        self.stack[cur].fp_orig = self.stack[cur].fp;
        self.stack[cur].load_block(self.input.as_mut())?;
        stats.start_block(&self.stack[cur], !self.stack[cur].is_last_in_floor);

        'all_terms: loop {
            // Pop finished blocks
            while self.stack[cur].next_ent == self.stack[cur].ent_count {
                stats.end_block(&self.stack[cur])?;
                if !self.stack[cur].is_last_in_floor {
                    // Advance to next floor block
                    self.stack[cur].load_next_floor_block(self.input.as_mut())?;
                    stats.start_block(&self.stack[cur], true);
                    break;
                }
                if cur == 1 {
                    break 'all_terms;
                }
                let last_fp = self.stack[cur].fp_orig;
                cur -= 1;
                self.current_frame_ord = cur;
                debug_assert_eq!(last_fp, self.stack[cur].last_sub_fp);
            }

            loop {
                if self.stack[cur].next(self.input.as_mut(), &mut self.term)? {
                    // Push to new block:
                    let last_sub_fp = self.stack[cur].last_sub_fp;
                    let term_len = self.term.len();
                    cur = self.push_frame_by_fp(None, last_sub_fp, term_len)?;
                    self.current_frame_ord = cur;
                    self.stack[cur].load_block(self.input.as_mut())?;
                    stats.start_block(&self.stack[cur], !self.stack[cur].is_last_in_floor);
                } else {
                    stats.term(&self.term);
                    break;
                }
            }
        }

        stats.finish();
        self.reset();
        Ok(stats)
    }

    fn reset(&mut self) {
        self.current_frame_ord = 0;
        self.target_before_current_length = 0;
        self.valid_index_prefix = 0;
        self.term_exists = false;
        self.eof = false;
        self.fresh = true;
        self.positioned = false;
        self.term.clear();
        for frame in self.stack.iter_mut().skip(1) {
            frame.next_ent = -1;
            frame.fp_orig = -1;
        }
    }

    fn get_frame(&mut self, ord: usize) -> Result<usize> {
        if ord >= self.fr.max_frame_depth() {
            warn!(
                "field {} nests blocks deeper than {}",
                self.fr.field_info().name,
                self.fr.max_frame_depth()
            );
            bail!(CorruptIndex(format!(
                "block nesting depth {} exceeds the limit of {}",
                ord,
                self.fr.max_frame_depth()
            )));
        }
        while self.stack.len() <= ord {
            let frame = self.fr.new_frame(self.stack.len());
            self.stack.push(frame);
        }
        debug_assert_eq!(self.stack[ord].ord, ord);
        Ok(ord)
    }

    fn push_frame_by_data(
        &mut self,
        arc: Option<FSTArc<ByteSequenceOutput>>,
        frame_data: &[u8],
        length: usize,
    ) -> Result<usize> {
        let mut scratch_reader = frame_data;
        let code = scratch_reader.read_vlong()?;
        let fp_seek = code.unsigned_shift(OUTPUT_FLAGS_NUM_BITS);
        let ord = self.get_frame(1 + self.current_frame_ord)?;
        let f = &mut self.stack[ord];
        f.has_terms = (code & OUTPUT_FLAGS_HAS_TERMS) != 0;
        f.has_terms_orig = f.has_terms;
        f.is_floor = (code & OUTPUT_FLAGS_IS_FLOOR) != 0;
        if f.is_floor {
            f.set_floor_data(scratch_reader)?;
        }
        self.push_frame_by_fp(arc, fp_seek, length)
    }

    // Pushes next'd frame or seek'd frame; we later
    // lazy-load the frame only when needed
    fn push_frame_by_fp(
        &mut self,
        arc: Option<FSTArc<ByteSequenceOutput>>,
        fp: i64,
        length: usize,
    ) -> Result<usize> {
        let ord = self.get_frame(1 + self.current_frame_ord)?;
        let target_before_current_length = self.target_before_current_length;
        let f = &mut self.stack[ord];
        f.arc = arc;
        if f.fp_orig == fp && f.next_ent != -1 {
            if f.ord > target_before_current_length {
                f.rewind()?;
            }
            debug_assert_eq!(length, f.prefix);
        } else {
            f.next_ent = -1;
            f.prefix = length;
            f.state.term_block_ord = 0;
            f.fp = fp;
            f.fp_orig = fp;
            f.last_sub_fp = -1;
        }
        Ok(ord)
    }

    fn set_arc(&mut self, index: usize, arc: FSTArc<ByteSequenceOutput>) {
        if index < self.arcs.len() {
            self.arcs[index] = arc;
        } else {
            debug_assert_eq!(index, self.arcs.len());
            self.arcs.push(arc);
        }
    }

    /// Reuses the frames and index arcs the current term shares with
    /// `target`. Returns how many target bytes were matched through the index
    /// and the output accumulated along them, or `None` if `target` is the
    /// current term and it exists.
    fn seek_shared_prefix(
        &mut self,
        target: &[u8],
        exact: bool,
    ) -> Result<Option<(usize, ByteSequenceOutput)>> {
        let outputs = ByteSequenceOutputFactory::new();
        self.target_before_current_length = self.current_frame_ord;

        if self.current_frame_ord == 0 {
            self.target_before_current_length = 0;
            let arc = self.fr.index().root_arc();
            // Empty string prefix must have an output (block) in the index!
            if !arc.is_final() {
                bail!(CorruptIndex(format!(
                    "field {} has no root block in its terms index",
                    self.fr.field_info().name
                )));
            }
            let output = arc.output.clone();
            let frame_data = outputs.add(&output, &arc.next_final_output);
            self.set_arc(0, arc.clone());
            self.current_frame_ord = self.push_frame_by_data(Some(arc), frame_data.inner(), 0)?;
            return Ok(Some((0, output)));
        }

        // We are already seek'd; find the common
        // prefix of new seek term vs current term and
        // re-use the corresponding seek state.  For
        // example, if app first seeks to foobar, then
        // seeks to foobaz, we can re-use the seek state
        // for the first 5 bytes.
        let mut output = self.arcs[0].output.clone();
        let mut target_upto = 0;
        let mut last_frame_idx = 1;
        debug_assert!(self.valid_index_prefix <= self.term.len());
        let target_limit = target.len().min(self.valid_index_prefix);

        let mut cmp = Ordering::Equal;

        // First compare up to valid seek frames:
        while target_upto < target_limit {
            cmp = self.term[target_upto].cmp(&target[target_upto]);
            if cmp != Ordering::Equal {
                break;
            }
            let arc = &self.arcs[target_upto + 1];
            debug_assert_eq!(arc.label, i32::from(target[target_upto]));
            output = outputs.add(&output, &arc.output);
            if arc.is_final() {
                last_frame_idx += 1;
            }
            target_upto += 1;
        }

        if cmp == Ordering::Equal {
            // Second compare the rest of the term, but
            // don't save arc/output/frame; we only do this
            // to find out if the target term is before,
            // equal or after the current term
            cmp = self.term[target_upto..].cmp(&target[target_upto..]);
        }

        match cmp {
            Ordering::Less => {
                // Common case: target term is after current
                // term, ie, app is seeking multiple terms
                // in sorted order
                self.current_frame_ord = last_frame_idx;
            }
            Ordering::Greater => {
                // Uncommon case: target term
                // is before current term; this means we can
                // keep the currentFrame but we must rewind it
                // (so we scan from the start)
                self.target_before_current_length = if exact { last_frame_idx } else { 1 };
                self.current_frame_ord = last_frame_idx;
                self.stack[last_frame_idx].rewind()?;
            }
            Ordering::Equal => {
                // Target is exactly the same as current term
                debug_assert_eq!(self.term.len(), target.len());
                if self.term_exists {
                    return Ok(None);
                }
            }
        }
        Ok(Some((target_upto, output)))
    }

    /// Continues walking the index along `target`, pushing a frame for every
    /// block prefix met. Returns the number of target bytes consumed.
    fn follow_index(
        &mut self,
        target: &[u8],
        mut target_upto: usize,
        mut output: ByteSequenceOutput,
    ) -> Result<usize> {
        let outputs = ByteSequenceOutputFactory::new();
        while target_upto < target.len() {
            let target_label = target[target_upto];
            let next_arc = match self
                .fr
                .index()
                .find_target_arc(i32::from(target_label), &self.arcs[target_upto])?
            {
                Some(arc) => arc,
                // Index is exhausted
                None => break,
            };
            self.term.truncate(target_upto);
            self.term.push(target_label);
            output = outputs.add(&output, &next_arc.output);
            target_upto += 1;
            if next_arc.is_final() {
                let frame_data = outputs.add(&output, &next_arc.next_final_output);
                self.current_frame_ord = self.push_frame_by_data(
                    Some(next_arc.clone()),
                    frame_data.inner(),
                    target_upto,
                )?;
            }
            self.set_arc(target_upto, next_arc);
        }
        debug_assert!(self.current_frame_ord > 0);
        Ok(target_upto)
    }

    fn seek_exact_inner(&mut self, target: &[u8]) -> Result<bool> {
        let (target_upto, output) = match self.seek_shared_prefix(target, true)? {
            Some(shared) => shared,
            None => return Ok(true),
        };
        let target_upto = self.follow_index(target, target_upto, output)?;

        let cur = self.current_frame_ord;
        self.valid_index_prefix = self.stack[cur].prefix;
        self.stack[cur].scan_to_floor_frame(target)?;

        if !self.stack[cur].has_terms {
            // This block has no terms, only sub-blocks, so
            // the target cannot be here
            self.term_exists = false;
            self.term.truncate(target_upto);
            if let Some(&label) = target.get(target_upto) {
                self.term.push(label);
            }
            return Ok(false);
        }

        self.stack[cur].load_block(self.input.as_mut())?;
        let status = self.stack[cur].scan_to_term(target, true, &mut self.term)?;
        self.term_exists = self.stack[cur].entry_is_term();
        if status == SeekStatus::Found && !self.term_exists {
            self.sub_block_matches_term(target)?;
        }
        Ok(status == SeekStatus::Found)
    }

    fn seek_ceil_inner(&mut self, target: &[u8]) -> Result<SeekStatus> {
        let (target_upto, output) = match self.seek_shared_prefix(target, false)? {
            Some(shared) => shared,
            None => return Ok(SeekStatus::Found),
        };
        self.follow_index(target, target_upto, output)?;

        let cur = self.current_frame_ord;
        self.valid_index_prefix = self.stack[cur].prefix;
        self.stack[cur].scan_to_floor_frame(target)?;
        self.stack[cur].load_block(self.input.as_mut())?;

        match self.stack[cur].scan_to_term(target, false, &mut self.term)? {
            SeekStatus::Found => {
                if !self.stack[cur].entry_is_term() {
                    self.sub_block_matches_term(target)?;
                }
                self.term_exists = true;
                Ok(SeekStatus::Found)
            }
            SeekStatus::NotFound => {
                if self.stack[cur].entry_is_term() {
                    self.term_exists = true;
                } else {
                    // The first term after target lives in the sub-block
                    self.push_sub_blocks()?;
                }
                Ok(SeekStatus::NotFound)
            }
            SeekStatus::End => {
                // Target is after the last term of this block; the next term
                // of the dictionary is the ceiling
                self.term.clear();
                self.term.extend_from_slice(target);
                self.term_exists = false;
                if self.advance()?.is_some() {
                    Ok(SeekStatus::NotFound)
                } else {
                    Ok(SeekStatus::End)
                }
            }
        }
    }

    // Every block prefix is in the index, so a seek would have entered
    // the sub-block instead of scanning onto it.
    fn sub_block_matches_term(&self, target: &[u8]) -> Result<()> {
        warn!(
            "block at fp {} has a sub-block entry equal to {:?}",
            self.stack[self.current_frame_ord].fp, target
        );
        bail!(CorruptIndex(format!(
            "sub-block prefix {:?} is missing from the terms index of field {}",
            target,
            self.fr.field_info().name
        )))
    }

    /// Descends through the sub-block the current entry points at, and its
    /// first sub-blocks, until the current entry is a term.
    fn push_sub_blocks(&mut self) -> Result<()> {
        loop {
            let last_sub_fp = self.stack[self.current_frame_ord].last_sub_fp;
            let term_len = self.term.len();
            self.current_frame_ord = self.push_frame_by_fp(None, last_sub_fp, term_len)?;
            let cur = self.current_frame_ord;
            // This is a "next" frame -- even if it's
            // floor'd we must pretend it isn't so we don't
            // try to scan to the right floor frame:
            self.stack[cur].load_block(self.input.as_mut())?;
            if !self.stack[cur].next(self.input.as_mut(), &mut self.term)? {
                self.term_exists = true;
                return Ok(());
            }
        }
    }

    // Decodes only the term bytes of the next term.  If caller then asks for
    // metadata, ie docFreq, totalTermFreq or pulls postings, we then (lazily)
    // decode all metadata up to the current term.
    fn advance(&mut self) -> Result<Option<Vec<u8>>> {
        self.target_before_current_length = self.current_frame_ord;

        if self.current_frame_ord == 0 {
            // seek_exact_state positioned us without touching the
            // dictionary; catch up all internal state so next() works
            let term = self.term.clone();
            if !self.seek_exact_inner(&term)? {
                bail!(IllegalState(format!(
                    "term {:?} of the given term state does not exist in field {}",
                    term,
                    self.fr.field_info().name
                )));
            }
        }

        // Pop finished blocks
        let mut cur = self.current_frame_ord;
        while self.stack[cur].next_ent == self.stack[cur].ent_count {
            if !self.stack[cur].is_last_in_floor {
                // Advance to next floor block
                self.stack[cur].load_next_floor_block(self.input.as_mut())?;
                break;
            }
            if cur == 1 {
                self.eof = true;
                self.positioned = false;
                self.term.clear();
                self.valid_index_prefix = 0;
                self.stack[1].rewind()?;
                self.term_exists = false;
                return Ok(None);
            }
            let last_fp = self.stack[cur].fp_orig;
            cur -= 1;
            self.current_frame_ord = cur;

            if self.stack[cur].next_ent == -1 || self.stack[cur].last_sub_fp != last_fp {
                // We popped into a frame that's not loaded
                // yet or not scan'd to the right entry
                self.stack[cur].scan_to_floor_frame(&self.term)?;
                self.stack[cur].load_block(self.input.as_mut())?;
                self.stack[cur].scan_to_sub_block(last_fp)?;
            }

            // Note that the seek state (last seek) has been
            // invalidated beyond this depth
            self.valid_index_prefix = self.valid_index_prefix.min(self.stack[cur].prefix);
        }

        if self.stack[cur].next(self.input.as_mut(), &mut self.term)? {
            self.push_sub_blocks()?;
        }
        self.term_exists = true;
        Ok(Some(self.term.clone()))
    }

    fn ensure_positioned(&self) -> Result<()> {
        if !self.positioned {
            bail!(IllegalState(format!(
                "terms iterator of field {} is not positioned",
                self.fr.field_info().name
            )));
        }
        Ok(())
    }

    fn decode_metadata(&mut self) -> Result<&BlockTermState> {
        self.ensure_positioned()?;
        let cur = self.current_frame_ord;
        self.stack[cur].decode_metadata(self.fr.field_info(), self.fr.postings_reader())?;
        Ok(&self.stack[cur].state)
    }
}

impl TermIterator for SegmentTermIterator {
    type Postings = TermPostings;
    type TermState = BlockTermState;

    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.fresh {
            // Fresh iterator; seek to first term
            self.fresh = false;
            self.current_frame_ord = 0;
            self.target_before_current_length = 0;
            let arc = self.fr.index().root_arc();
            let root_code = self.fr.root_code().to_vec();
            self.set_arc(0, arc.clone());
            self.current_frame_ord = self.push_frame_by_data(Some(arc), &root_code, 0)?;
            self.stack[self.current_frame_ord].load_block(self.input.as_mut())?;
        } else if self.eof {
            return Ok(None);
        } else {
            self.ensure_positioned()?;
        }

        let term = self.advance()?;
        self.positioned = term.is_some();
        Ok(term)
    }

    fn seek_exact(&mut self, target: &[u8]) -> Result<bool> {
        self.fresh = false;
        self.eof = false;
        if target < self.fr.min_term() || target > self.fr.max_term() {
            self.positioned = false;
            return Ok(false);
        }
        let found = self.seek_exact_inner(target)?;
        self.positioned = found;
        Ok(found)
    }

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus> {
        self.fresh = false;
        self.eof = false;
        let status = self.seek_ceil_inner(target)?;
        if status == SeekStatus::End {
            self.eof = true;
            self.positioned = false;
        } else {
            self.positioned = true;
        }
        Ok(status)
    }

    fn seek_exact_ord(&mut self, _ord: i64) -> Result<()> {
        bail!(UnsupportedOperation(Cow::Borrowed(
            "block tree terms have no ordinals"
        )))
    }

    fn seek_exact_state(&mut self, text: &[u8], state: &Self::TermState) -> Result<()> {
        self.fresh = false;
        self.eof = false;
        if !self.positioned || text != self.term.as_slice() || !self.term_exists {
            self.current_frame_ord = 0;
            self.stack[0].state.copy_from(state);
            self.term.clear();
            self.term.extend_from_slice(text);
            self.stack[0].metadata_upto = self.stack[0].term_block_ord();
            debug_assert!(self.stack[0].metadata_upto > 0);
            self.valid_index_prefix = 0;
        }
        self.positioned = true;
        Ok(())
    }

    fn term(&self) -> Result<&[u8]> {
        self.ensure_positioned()?;
        Ok(&self.term)
    }

    fn ord(&self) -> Result<i64> {
        bail!(UnsupportedOperation(Cow::Borrowed(
            "block tree terms have no ordinals"
        )))
    }

    fn doc_freq(&mut self) -> Result<i32> {
        Ok(self.decode_metadata()?.doc_freq)
    }

    fn total_term_freq(&mut self) -> Result<i64> {
        Ok(self.decode_metadata()?.total_term_freq)
    }

    fn postings_with_flags(&mut self, flags: u16) -> Result<Self::Postings> {
        self.decode_metadata()?;
        let state = &self.stack[self.current_frame_ord].state;
        self.fr
            .postings_reader()
            .postings(self.fr.field_info(), state, flags)
    }

    fn impacts(&mut self, flags: u16) -> Result<Self::Postings> {
        self.decode_metadata()?;
        let state = &self.stack[self.current_frame_ord].state;
        self.fr
            .postings_reader()
            .impacts(self.fr.field_info(), state, flags)
    }

    fn term_state(&mut self) -> Result<Self::TermState> {
        Ok(self.decode_metadata()?.clone())
    }
}
