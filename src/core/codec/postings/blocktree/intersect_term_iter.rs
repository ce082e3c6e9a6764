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

use crate::core::codec::postings::blocktree::{FieldReader, IntersectTermsIterFrame};
use crate::core::codec::postings::TermPostings;
use crate::core::codec::{BlockTermState, SeekStatus, TermIterator};
use crate::core::store::io::IndexInput;
use crate::core::util::automaton::CompiledAutomaton;
use crate::core::util::fst::{ByteSequenceOutputFactory, OutputFactory};
use crate::error::ErrorKind::{CorruptIndex, IllegalState, UnsupportedOperation};
use crate::error::Result;

/// What the next entry of the block stack turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Entry {
    Term,
    SubBlock,
    /// The root block has no entries left.
    Exhausted,
}

// Whether the entry is a sub-block; returns from the enclosing function
// once the block stack is exhausted.
macro_rules! is_sub_block {
    ($entry:expr) => {
        match $entry {
            Entry::Term => false,
            Entry::SubBlock => true,
            Entry::Exhausted => return Ok(false),
        }
    };
}

/// This is used to implement efficient `Terms::intersect` for block-tree.
/// Note that it cannot seek, except for the initial term on init. It just
/// "nexts" through the intersection of the automaton and the terms. It does
/// not use the terms index at all: on init, it loads the root block, and
/// scans its way to the initial term. Likewise, in next it scans until it
/// finds a term that matches the current automaton transition.
pub struct IntersectTermIterator {
    fr: FieldReader,
    input: Box<dyn IndexInput>,
    compiled: CompiledAutomaton,
    stack: Vec<IntersectTermsIterFrame>,
    current_frame_ord: usize,
    term: Vec<u8>,
    positioned: bool,
    exhausted: bool,
}

impl IntersectTermIterator {
    pub fn new(
        fr: FieldReader,
        compiled: CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<IntersectTermIterator> {
        let input = fr.clone_terms_in()?;
        let mut iter = IntersectTermIterator {
            input,
            compiled,
            stack: Vec::with_capacity(8),
            current_frame_ord: 0,
            term: Vec::new(),
            positioned: false,
            exhausted: false,
            fr,
        };
        iter.get_frame(0)?;

        let arc = iter.fr.index().root_arc();
        // Empty string prefix must have an output in the index!
        if !arc.is_final() {
            bail!(CorruptIndex(format!(
                "field {} has no root block in its terms index",
                iter.fr.field_info().name
            )));
        }

        // Special push since it's the first one:
        let root_block_fp = iter.fr.root_block_fp();
        let root_code = iter.fr.root_code().to_vec();
        {
            let f = &mut iter.stack[0];
            f.frame.fp = root_block_fp;
            f.frame.fp_orig = root_block_fp;
            f.frame.prefix = 0;
            f.set_state(0, &iter.compiled.automaton);
            f.output_prefix = arc.output.clone();
            f.frame.arc = Some(arc);
            f.load(
                Some(&root_code),
                iter.input.as_mut(),
                &iter.compiled.run_automaton,
            )?;
        }

        if let Some(start_term) = start_term {
            iter.seek_to_start_term(start_term)?;
        }
        trace!(
            "intersect on field {} from {:?}",
            iter.fr.field_info().name,
            start_term
        );
        Ok(iter)
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
            self.stack.push(IntersectTermsIterFrame::new(frame));
        }
        Ok(ord)
    }

    /// Pushes the sub-block the current entry points at, entered with the
    /// automaton in `state`.
    fn push_frame(&mut self, state: usize) -> Result<usize> {
        let cur = self.current_frame_ord;
        let ord = self.get_frame(cur + 1)?;
        let (cur_frame, rest) = self.stack.split_at_mut(ord);
        let cur_frame = &cur_frame[cur];
        let f = &mut rest[0];

        f.frame.fp = cur_frame.frame.last_sub_fp;
        f.frame.fp_orig = f.frame.fp;
        f.frame.prefix = cur_frame.frame.prefix + cur_frame.frame.suffix_len();
        f.set_state(state, &self.compiled.automaton);

        // Walk the arc through the index -- we only
        // "bother" with this so we can get the floor data
        // from the index and skip floor blocks when
        // possible:
        let outputs = ByteSequenceOutputFactory::new();
        let mut arc = match cur_frame.frame.arc {
            Some(ref arc) => arc.clone(),
            None => bail!(IllegalState(format!(
                "block at fp {} was entered without an index arc",
                cur_frame.frame.fp
            ))),
        };
        let mut output = cur_frame.output_prefix.clone();
        for &label in &self.term[cur_frame.frame.prefix..f.frame.prefix] {
            arc = match self.fr.index().find_target_arc(i32::from(label), &arc)? {
                Some(next) => next,
                None => bail!(CorruptIndex(format!(
                    "sub-block at fp {} is missing from the terms index",
                    f.frame.fp
                ))),
            };
            output = outputs.add(&output, &arc.output);
        }
        if !arc.is_final() {
            bail!(CorruptIndex(format!(
                "sub-block at fp {} has no output in the terms index",
                f.frame.fp
            )));
        }

        let frame_data = outputs.add(&output, &arc.next_final_output);
        f.output_prefix = output;
        f.frame.arc = Some(arc);
        f.load(
            Some(frame_data.inner()),
            self.input.as_mut(),
            &self.compiled.run_automaton,
        )?;
        Ok(ord)
    }

    /// The automaton state after consuming the current entry of the current
    /// frame, or `None` if the automaton rejects it.
    fn entry_state(&self) -> Option<usize> {
        let f = &self.stack[self.current_frame_ord];
        let run_automaton = &self.compiled.run_automaton;
        let mut state = f.state as i32;
        for &b in f.frame.suffix_bytes() {
            state = run_automaton.step(state, b);
            if state == -1 {
                return None;
            }
        }
        Some(state as usize)
    }

    fn copy_term(&mut self) {
        self.stack[self.current_frame_ord].frame.fill_term(&mut self.term);
    }

    // Positions on the last entry <= target, so the first next() returns
    // the first term after it.
    fn seek_to_start_term(&mut self, target: &[u8]) -> Result<()> {
        debug_assert_eq!(self.current_frame_ord, 0);
        loop {
            let cur = self.current_frame_ord;
            let saved = self.stack[cur].frame.save_cursor();
            let is_sub_block = self.stack[cur].frame.next_entry()?;
            self.copy_term();

            if is_sub_block && target.starts_with(&self.term) {
                // Recurse
                match self.entry_state() {
                    Some(state) => {
                        self.current_frame_ord = self.push_frame(state)?;
                        continue;
                    }
                    // No term under this sub-block is accepted; the
                    // first next() steps past it
                    None => return Ok(()),
                }
            }

            if self.term.as_slice() < target {
                let f = &mut self.stack[cur];
                if f.frame.next_ent == f.frame.ent_count {
                    if f.frame.is_last_in_floor {
                        return Ok(());
                    }
                    // Advance to next floor block
                    f.load_next_floor_block(self.input.as_mut(), &self.compiled.run_automaton)?;
                }
            } else if self.term.as_slice() == target {
                return Ok(());
            } else {
                // Fallback to prior entry: the semantics of
                // this method is that the first call to
                // next() will return the term after the
                // requested term
                self.stack[cur].frame.restore_cursor(&saved)?;
                self.copy_term();
                // If the last entry was a block we don't
                // need to bother recursing and pushing to
                // the last term under it because the first
                // next() will simply skip the frame anyway
                return Ok(());
            }
        }
    }

    fn pop_push_next(&mut self) -> Result<Entry> {
        // Pop finished frames
        loop {
            let f = &mut self.stack[self.current_frame_ord];
            if f.frame.next_ent != f.frame.ent_count {
                break;
            }
            if !f.frame.is_last_in_floor {
                // Advance to next floor block
                f.load_next_floor_block(self.input.as_mut(), &self.compiled.run_automaton)?;
                break;
            }
            if self.current_frame_ord == 0 {
                return Ok(Entry::Exhausted);
            }
            let last_fp = f.frame.fp_orig;
            self.current_frame_ord -= 1;
            debug_assert_eq!(
                self.stack[self.current_frame_ord].frame.last_sub_fp,
                last_fp
            );
        }
        self.next_entry()
    }

    fn next_entry(&mut self) -> Result<Entry> {
        if self.stack[self.current_frame_ord].frame.next_entry()? {
            Ok(Entry::SubBlock)
        } else {
            Ok(Entry::Term)
        }
    }

    /// Skips entries of the current frame whose lead label is below
    /// `min_label`.
    fn catch_up(&mut self, min_label: i32) -> Result<Entry> {
        let f = &mut self.stack[self.current_frame_ord].frame;
        while f.next_ent < f.ent_count {
            let is_sub_block = f.next_entry()?;
            if f.suffix_lead_label() >= min_label {
                return Ok(if is_sub_block {
                    Entry::SubBlock
                } else {
                    Entry::Term
                });
            }
        }
        // End of frame:
        self.pop_push_next()
    }

    // A term that does not end with the automaton's common suffix cannot
    // be accepted.
    fn matches_common_suffix(&self) -> bool {
        let common_suffix = match self.compiled.common_suffix {
            Some(ref suffix) => suffix.as_slice(),
            None => return true,
        };
        let f = &self.stack[self.current_frame_ord].frame;
        let suffix = f.suffix_bytes();
        if f.prefix + suffix.len() < common_suffix.len() {
            return false;
        }
        if common_suffix.len() > suffix.len() {
            // A prefix of the common suffix overlaps with
            // the suffix of the block prefix
            let len_in_prefix = common_suffix.len() - suffix.len();
            let (in_prefix, in_suffix) = common_suffix.split_at(len_in_prefix);
            &self.term[f.prefix - len_in_prefix..f.prefix] == in_prefix && suffix == in_suffix
        } else {
            suffix.ends_with(common_suffix)
        }
    }

    /// Advances to the next accepted term and copies it into `term`; false
    /// once there are no more.
    fn next_term(&mut self) -> Result<bool> {
        let mut is_sub_block = is_sub_block!(self.pop_push_next()?);

        'next_term: loop {
            let cur = self.current_frame_ord;
            let state;
            if self.stack[cur].frame.suffix_len() != 0 {
                // This is the first byte of the suffix of the term we are now on:
                let label = self.stack[cur].frame.suffix_lead_label();
                let min_trans = self.stack[cur].transition.min;
                if label < min_trans {
                    // Common case: we are scanning terms in this block to "catch up" to
                    // current transition in the automaton:
                    is_sub_block = is_sub_block!(self.catch_up(min_trans)?);
                    continue 'next_term;
                }

                // Advance where we are in the automaton to match this label:
                while label > self.stack[cur].transition.max {
                    if !self.stack[cur].next_transition(&self.compiled.automaton) {
                        // Pop this frame: no further matches are possible because
                        // we've moved beyond what the max transition will allow
                        if cur == 0 {
                            return Ok(false);
                        }
                        self.current_frame_ord = cur - 1;
                        is_sub_block = is_sub_block!(self.pop_push_next()?);
                        continue 'next_term;
                    }
                    let min_trans = self.stack[cur].transition.min;
                    if label < min_trans {
                        is_sub_block = is_sub_block!(self.catch_up(min_trans)?);
                        continue 'next_term;
                    }
                }

                if !is_sub_block && !self.matches_common_suffix() {
                    is_sub_block = is_sub_block!(self.pop_push_next()?);
                    continue 'next_term;
                }

                // See if the term suffix matches the automaton:
                //
                // We know from above that the first byte in our suffix (label) matches
                // the current transition, so we step from the 2nd byte
                // in the suffix:
                let f = &self.stack[cur];
                let run_automaton = &self.compiled.run_automaton;
                let mut s = f.transition.dest as i32;
                for &b in &f.frame.suffix_bytes()[1..] {
                    s = run_automaton.step(s, b);
                    if s == -1 {
                        break;
                    }
                }
                if s == -1 {
                    // No match
                    is_sub_block = is_sub_block!(self.pop_push_next()?);
                    continue 'next_term;
                }
                state = s as usize;
            } else {
                state = self.stack[cur].state;
            }

            if is_sub_block {
                // Match!  Recurse:
                self.copy_term();
                self.current_frame_ord = self.push_frame(state)?;
            } else if self.compiled.run_automaton.is_accept(state as i32) {
                self.copy_term();
                return Ok(true);
            }
            // Otherwise this term is a prefix of a term accepted by the
            // automaton, but is not itself accepted

            is_sub_block = is_sub_block!(self.pop_push_next()?);
        }
    }

    fn ensure_positioned(&self) -> Result<()> {
        if !self.positioned {
            bail!(IllegalState(format!(
                "intersect iterator of field {} is not positioned",
                self.fr.field_info().name
            )));
        }
        Ok(())
    }

    fn decode_metadata(&mut self) -> Result<&BlockTermState> {
        self.ensure_positioned()?;
        let f = &mut self.stack[self.current_frame_ord].frame;
        f.decode_metadata(self.fr.field_info(), self.fr.postings_reader())?;
        Ok(&f.state)
    }

    fn unsupported<T>(op: &'static str) -> Result<T> {
        bail!(UnsupportedOperation(Cow::Borrowed(op)))
    }
}

impl TermIterator for IntersectTermIterator {
    type Postings = TermPostings;
    type TermState = BlockTermState;

    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.next_term()? {
            self.positioned = true;
            Ok(Some(self.term.clone()))
        } else {
            self.exhausted = true;
            self.positioned = false;
            Ok(None)
        }
    }

    fn seek_exact(&mut self, _text: &[u8]) -> Result<bool> {
        Self::unsupported("intersect iterator cannot seek_exact")
    }

    fn seek_ceil(&mut self, _text: &[u8]) -> Result<SeekStatus> {
        Self::unsupported("intersect iterator cannot seek_ceil")
    }

    fn seek_exact_ord(&mut self, _ord: i64) -> Result<()> {
        Self::unsupported("intersect iterator cannot seek_exact_ord")
    }

    fn seek_exact_state(&mut self, _text: &[u8], _state: &Self::TermState) -> Result<()> {
        Self::unsupported("intersect iterator cannot seek_exact_state")
    }

    fn term(&self) -> Result<&[u8]> {
        self.ensure_positioned()?;
        Ok(&self.term)
    }

    fn ord(&self) -> Result<i64> {
        Self::unsupported("intersect iterator has no ordinals")
    }

    fn doc_freq(&mut self) -> Result<i32> {
        Ok(self.decode_metadata()?.doc_freq)
    }

    fn total_term_freq(&mut self) -> Result<i64> {
        Ok(self.decode_metadata()?.total_term_freq)
    }

    fn postings_with_flags(&mut self, flags: u16) -> Result<Self::Postings> {
        self.decode_metadata()?;
        let state = &self.stack[self.current_frame_ord].frame.state;
        self.fr
            .postings_reader()
            .postings(self.fr.field_info(), state, flags)
    }

    fn impacts(&mut self, flags: u16) -> Result<Self::Postings> {
        self.decode_metadata()?;
        let state = &self.stack[self.current_frame_ord].frame.state;
        self.fr
            .postings_reader()
            .impacts(self.fr.field_info(), state, flags)
    }

    fn term_state(&mut self) -> Result<Self::TermState> {
        Ok(self.decode_metadata()?.clone())
    }
}
