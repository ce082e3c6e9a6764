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

pub mod blocktree;

mod posting_reader;

pub use self::posting_reader::*;


#[cfg(test)]
pub use self::posting_writer::*;

use crate::core::codec::field_infos::FieldInfo;
use crate::core::codec::BlockTermState;
use crate::core::store::io::DataInput;
use crate::error::Result;

use std::sync::Arc;

/// Size of a packed postings block; terms with more docs (or positions)
/// carry skip data pointers in their metadata.
pub const BLOCK_SIZE: i32 = 128;

pub struct PostingIteratorFlags;

/// flags constants and helper function defined for `TermIterator::postings_with_flag()`.
impl PostingIteratorFlags {
    /// Flag to pass to `TermIterator::postings_with_flags` if you don't
    /// require per-document postings in the returned iterator.
    pub const NONE: u16 = 0;

    /// Flag to pass to `TermIterator::postings_with_flags`
    /// if you require term frequencies in the returned iterator.
    pub const FREQS: u16 = 1 << 3;

    /// Flag to pass to `TermIterator::postings_with_flags`
    /// if you require term positions in the returned iterator.
    pub const POSITIONS: u16 = Self::FREQS | 1 << 4;

    /// Flag to pass to `TermIterator::postings_with_flags`
    /// if you require offsets in the returned iterator.
    pub const OFFSETS: u16 = Self::POSITIONS | 1 << 5;

    /// Flag to pass to `TermIterator::postings_with_flags`
    /// if you require payloads in the returned iterator.
    pub const PAYLOADS: u16 = Self::POSITIONS | 1 << 6;

    /// Flag to pass to `TermIterator::postings_with_flags`
    /// to get positions, payloads and offsets in the returned iterator.
    pub const ALL: u16 = Self::OFFSETS | Self::PAYLOADS;

    pub fn feature_requested(flags: u16, feature: u16) -> bool {
        (flags & feature) == feature
    }
}

/// Which postings streams a materialized term needs to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostingsKind {
    /// Doc ids and optionally freqs, from the doc file only.
    Docs,
    /// Docs plus positions.
    Positions,
    /// Docs, positions and the payload/offset file.
    Everything,
}

/// Handle on the postings of one term, resolved against what the field
/// actually indexes. Opening the postings files themselves belongs to the
/// postings codec.
#[derive(Clone, Debug)]
pub struct TermPostings {
    pub state: BlockTermState,
    pub kind: PostingsKind,
    pub flags: u16,
    pub with_impacts: bool,
}

impl TermPostings {
    pub fn doc_freq(&self) -> i32 {
        self.state.doc_freq
    }

    /// The only document holding this term, when it is inlined in the
    /// term metadata.
    pub fn singleton_doc_id(&self) -> Option<i32> {
        if self.state.singleton_doc_id >= 0 {
            Some(self.state.singleton_doc_id)
        } else {
            None
        }
    }

    pub fn has_skip_data(&self) -> bool {
        self.state.skip_offset >= 0
    }
}

/// The postings side of the terms dictionary: owns the encoding of the
/// per-term metadata blob stored in every block.
pub trait PostingsReaderBase: Send + Sync {
    /// Return a newly created empty TermState
    fn new_term_state(&self) -> BlockTermState {
        BlockTermState::new()
    }

    /// Decodes the metadata of the next term of a block into `state`.
    /// `absolute` is set for the first term of a block, otherwise file
    /// pointers are deltas against the previous term.
    fn decode_term(
        &self,
        input: &mut dyn DataInput,
        field_info: &FieldInfo,
        state: &mut BlockTermState,
        absolute: bool,
    ) -> Result<()>;

    fn postings(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState,
        flags: u16,
    ) -> Result<TermPostings>;

    fn impacts(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState,
        flags: u16,
    ) -> Result<TermPostings>;
}

pub type PostingsReaderRef = Arc<dyn PostingsReaderBase>;
