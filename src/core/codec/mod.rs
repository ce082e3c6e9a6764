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

pub mod field_infos;
pub mod postings;

mod terms;

pub use self::terms::*;

/// Term metadata decoded from one block-tree entry: frequencies, the
/// position of the term inside its block and the postings file pointers.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockTermState {
    /// how many docs have this term
    pub doc_freq: i32,

    /// total number of occurrences of this term
    pub total_term_freq: i64,

    /// the term's ord in the current block
    pub term_block_ord: i32,

    pub doc_start_fp: i64,
    pub pos_start_fp: i64,
    pub pay_start_fp: i64,
    pub skip_offset: i64,
    pub last_pos_block_offset: i64,
    // docid when there is a single pulsed posting, otherwise -1
    // freq is always implicitly totalTermFreq in this case.
    pub singleton_doc_id: i32,
}

impl Default for BlockTermState {
    fn default() -> Self {
        BlockTermState::new()
    }
}

impl BlockTermState {
    pub fn new() -> BlockTermState {
        BlockTermState {
            doc_freq: 0,
            total_term_freq: 0,
            term_block_ord: 0,

            doc_start_fp: 0,
            pos_start_fp: 0,
            pay_start_fp: 0,
            skip_offset: -1,
            last_pos_block_offset: -1,
            singleton_doc_id: -1,
        }
    }

    pub fn copy_from(&mut self, other: &BlockTermState) {
        self.doc_freq = other.doc_freq;
        self.total_term_freq = other.total_term_freq;
        self.term_block_ord = other.term_block_ord;
        self.doc_start_fp = other.doc_start_fp;
        self.pos_start_fp = other.pos_start_fp;
        self.pay_start_fp = other.pay_start_fp;
        self.skip_offset = other.skip_offset;
        self.last_pos_block_offset = other.last_pos_block_offset;
        self.singleton_doc_id = other.singleton_doc_id;
    }
}

impl TermState for BlockTermState {}
