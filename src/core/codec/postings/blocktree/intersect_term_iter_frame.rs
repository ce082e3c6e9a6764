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

use crate::core::codec::postings::blocktree::{SegmentTermsIterFrame, OUTPUT_FLAGS_IS_FLOOR};
use crate::core::store::io::{DataInput, IndexInput};
use crate::core::util::automaton::{Automaton, ByteRunAutomaton, Transition};
use crate::core::util::fst::ByteSequenceOutput;
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

// Stands in for the transition of a state without any, so that no label is
// ever below its min and every label is above its max.
const NO_TRANSITION: Transition = Transition {
    dest: 0,
    min: -1,
    max: -1,
};

/// A block being intersected with an automaton: the plain block decoder
/// plus the automaton state reached at the block's prefix and the
/// transition out of that state currently being matched.
pub struct IntersectTermsIterFrame {
    pub frame: SegmentTermsIterFrame,
    /// Automaton state after consuming the block prefix.
    pub state: usize,
    pub transition: Transition,
    pub transition_index: usize,
    pub transition_count: usize,
    /// Index output accumulated along the block prefix, excluding the
    /// final output.
    pub output_prefix: ByteSequenceOutput,
    /// Blocks read into this frame so far, floor blocks included.
    pub blocks_loaded: usize,
}

impl IntersectTermsIterFrame {
    pub fn new(frame: SegmentTermsIterFrame) -> Self {
        IntersectTermsIterFrame {
            frame,
            state: 0,
            transition: NO_TRANSITION,
            transition_index: 0,
            transition_count: 0,
            output_prefix: ByteSequenceOutput::empty(),
            blocks_loaded: 0,
        }
    }

    pub fn ord(&self) -> usize {
        self.frame.ord
    }

    pub fn set_state(&mut self, state: usize, automaton: &Automaton) {
        self.state = state;
        self.transition_index = 0;
        self.transition_count = automaton.num_transitions(state);
        self.transition = if self.transition_count != 0 {
            automaton.get_transition(state, 0)
        } else {
            NO_TRANSITION
        };
    }

    /// Moves to the next transition out of `state`; false if this was the
    /// last one.
    pub fn next_transition(&mut self, automaton: &Automaton) -> bool {
        if self.transition_index + 1 >= self.transition_count {
            return false;
        }
        self.transition_index += 1;
        self.transition = automaton.get_transition(self.state, self.transition_index);
        true
    }

    /// Loads the block at `frame.fp`. When the index data of the block is
    /// given its floor table is read, and leading floor blocks that only
    /// hold labels below the current transition are skipped.
    pub fn load(
        &mut self,
        frame_index_data: Option<&[u8]>,
        input: &mut dyn IndexInput,
        run_automaton: &ByteRunAutomaton,
    ) -> Result<()> {
        if let Some(mut data) = frame_index_data {
            // Skip first long -- has redundant fp, hasTerms
            // flag, isFloor flag
            let code = data.read_vlong()?;
            self.frame.is_floor = (code & OUTPUT_FLAGS_IS_FLOOR) != 0;
            if self.frame.is_floor {
                self.frame.set_floor_data(data)?;

                // If current state is not accept, and has transitions, we must process
                // first block in case it has empty suffix:
                if !run_automaton.is_accept(self.state as i32) && self.transition_count != 0 {
                    // Maybe skip floor blocks:
                    debug_assert_eq!(self.transition_index, 0);
                    while self.frame.num_follow_floor_blocks != 0
                        && self.frame.next_floor_label <= self.transition.min
                    {
                        self.frame.fp = self.frame.read_floor_follower()?;
                    }
                }
            }
        }
        self.frame.next_ent = -1;
        self.blocks_loaded += 1;
        self.frame.read_block(input)
    }

    /// Loads the next floor block that may hold the current transition's
    /// min label.
    pub fn load_next_floor_block(
        &mut self,
        input: &mut dyn IndexInput,
        run_automaton: &ByteRunAutomaton,
    ) -> Result<()> {
        loop {
            if self.frame.num_follow_floor_blocks <= 0 {
                warn!(
                    "block at fp {} continues past its floor table",
                    self.frame.fp
                );
                bail!(CorruptIndex(format!(
                    "block at fp {} is not the last in its floor but has no follower",
                    self.frame.fp
                )));
            }
            self.frame.fp = self.frame.read_floor_follower()?;
            if self.frame.num_follow_floor_blocks == 0
                || self.frame.next_floor_label > self.transition.min
            {
                break;
            }
        }
        self.load(None, input, run_automaton)
    }
}
