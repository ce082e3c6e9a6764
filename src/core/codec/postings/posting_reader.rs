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

use crate::core::codec::field_infos::FieldInfo;
use crate::core::codec::postings::{
    PostingIteratorFlags, PostingsKind, PostingsReaderBase, TermPostings, BLOCK_SIZE,
};
use crate::core::codec::BlockTermState;
use crate::core::store::io::DataInput;
use crate::core::util::{UnsignedShift, ZigZagEncoding};
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

/// Reads the term metadata written by the block postings format: doc, pos
/// and pay file pointers as deltas, an inlined doc id for single-doc
/// terms, and skip/position-block offsets for long postings lists.
#[derive(Default)]
pub struct StandardPostingsReader;

impl StandardPostingsReader {
    pub fn new() -> StandardPostingsReader {
        StandardPostingsReader
    }
}

impl PostingsReaderBase for StandardPostingsReader {
    fn decode_term(
        &self,
        input: &mut dyn DataInput,
        field_info: &FieldInfo,
        state: &mut BlockTermState,
        absolute: bool,
    ) -> Result<()> {
        decode_term(input, field_info, state, absolute)
    }

    fn postings(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState,
        flags: u16,
    ) -> Result<TermPostings> {
        Ok(resolve_postings(field_info, state, flags, false))
    }

    fn impacts(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState,
        flags: u16,
    ) -> Result<TermPostings> {
        Ok(resolve_postings(field_info, state, flags, true))
    }
}

fn resolve_postings(
    field_info: &FieldInfo,
    state: &BlockTermState,
    flags: u16,
    with_impacts: bool,
) -> TermPostings {
    let options = &field_info.index_options;
    let index_has_positions = options.has_positions();
    let index_has_offsets = options.has_offsets();
    let index_has_payloads = field_info.has_store_payloads;

    let kind = if !index_has_positions
        || !PostingIteratorFlags::feature_requested(flags, PostingIteratorFlags::POSITIONS)
    {
        PostingsKind::Docs
    } else if (!index_has_offsets
        || !PostingIteratorFlags::feature_requested(flags, PostingIteratorFlags::OFFSETS))
        && (!index_has_payloads
            || !PostingIteratorFlags::feature_requested(flags, PostingIteratorFlags::PAYLOADS))
    {
        PostingsKind::Positions
    } else {
        PostingsKind::Everything
    };
    let flags = if options.has_freqs() {
        flags
    } else {
        flags & !PostingIteratorFlags::ALL
    };
    TermPostings {
        state: state.clone(),
        kind,
        flags,
        with_impacts,
    }
}

/// Actually decode metadata for next term
pub fn decode_term<T: DataInput + ?Sized>(
    input: &mut T,
    field_info: &FieldInfo,
    state: &mut BlockTermState,
    absolute: bool,
) -> Result<()> {
    let options = &field_info.index_options;
    let field_has_positions = options.has_positions();
    let field_has_offsets = options.has_offsets();
    let field_has_payloads = field_info.has_store_payloads;
    if absolute {
        state.doc_start_fp = 0;
        state.pos_start_fp = 0;
        state.pay_start_fp = 0;
    }

    let l = input.read_vlong()?;
    if l & 1 == 0 {
        state.doc_start_fp += l.unsigned_shift(1);
        state.singleton_doc_id = if state.doc_freq == 1 {
            input.read_vint()?
        } else {
            -1
        };
    } else {
        if absolute || state.singleton_doc_id == -1 {
            bail!(CorruptIndex(format!(
                "singleton doc delta without a previous singleton, field '{}'",
                &field_info.name
            )));
        }
        state.singleton_doc_id += l.unsigned_shift(1).decode() as i32;
    }

    if field_has_positions {
        state.pos_start_fp += input.read_vlong()?;
        if field_has_offsets || field_has_payloads {
            state.pay_start_fp += input.read_vlong()?;
        }
        state.last_pos_block_offset = if state.total_term_freq > i64::from(BLOCK_SIZE) {
            input.read_vlong()?
        } else {
            -1
        };
    }
    state.skip_offset = if state.doc_freq > BLOCK_SIZE {
        input.read_vlong()?
    } else {
        -1
    };
    Ok(())
}
