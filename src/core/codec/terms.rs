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

use crate::core::codec::postings::PostingIteratorFlags;
use crate::core::util::automaton::CompiledAutomaton;
use crate::error::ErrorKind::{IllegalArgument, UnsupportedOperation};
use crate::error::Result;

use std::sync::Arc;

/// Encapsulates all required internal state to position the associated
/// `TermIterator` without re-seeking
pub trait TermState: Send + Sync + Clone {}

/// Access to the fields of a terms dictionary, and their terms.
pub trait Fields {
    type Terms: Terms;
    /// Names of the indexed fields, in ascending order.
    fn fields(&self) -> Vec<String>;
    fn terms(&self, field: &str) -> Result<Option<Self::Terms>>;
    fn size(&self) -> usize;
}

/// Access to the terms in a specific field.
pub trait Terms {
    type Iterator: TermIterator;
    type Intersect: TermIterator;

    /// Returns an iterator that will step through all terms.
    fn iterator(&self) -> Result<Self::Iterator>;

    /// Returns an iterator over the terms accepted by `compiled`, in
    /// ascending order. If `start_term` is provided only terms greater than
    /// it are returned, but you still must call `next()` first to get to
    /// the first term.
    ///
    /// The returned iterator cannot seek.
    fn intersect(
        &self,
        compiled: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Self::Intersect>;

    /// Returns the number of terms for this field, or -1 if this
    /// measure isn't stored by the codec.
    fn size(&self) -> Result<i64>;

    /// Returns the sum of `TermIterator::total_term_freq` for all terms in
    /// this field, or -1 if the field omits term freqs.
    fn sum_total_term_freq(&self) -> Result<i64>;

    /// Returns the sum of `TermIterator::doc_freq` for all terms in this
    /// field.
    fn sum_doc_freq(&self) -> Result<i64>;

    /// Returns the number of documents that have at least one term for
    /// this field.
    fn doc_count(&self) -> Result<i32>;

    /// Returns true if documents in this field store per-document term
    /// frequency.
    fn has_freqs(&self) -> Result<bool>;

    /// Returns true if documents in this field store offsets.
    fn has_offsets(&self) -> Result<bool>;

    /// Returns true if documents in this field store positions.
    fn has_positions(&self) -> Result<bool>;

    /// Returns true if documents in this field store payloads.
    fn has_payloads(&self) -> Result<bool>;

    /// Returns the smallest term (in lexicographic order) in the field.
    fn min(&self) -> Result<Option<Vec<u8>>> {
        self.iterator()?.next()
    }

    /// Returns the largest term (in lexicographic order) in the field.
    fn max(&self) -> Result<Option<Vec<u8>>>;

    /// Expert: returns additional information about this Terms instance
    /// for debugging purposes.
    fn stats(&self) -> Result<String> {
        Ok(format!(
            "size={:?}, doc_count={:?}, sum_total_term_freq={:?}, sum_doc_freq={:?}",
            self.size(),
            self.doc_count(),
            self.sum_total_term_freq(),
            self.sum_doc_freq()
        ))
    }
}

impl<T: Terms> Terms for Arc<T> {
    type Iterator = T::Iterator;
    type Intersect = T::Intersect;

    fn iterator(&self) -> Result<Self::Iterator> {
        (**self).iterator()
    }

    fn intersect(
        &self,
        compiled: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Self::Intersect> {
        (**self).intersect(compiled, start_term)
    }

    fn size(&self) -> Result<i64> {
        (**self).size()
    }

    fn sum_total_term_freq(&self) -> Result<i64> {
        (**self).sum_total_term_freq()
    }

    fn sum_doc_freq(&self) -> Result<i64> {
        (**self).sum_doc_freq()
    }

    fn doc_count(&self) -> Result<i32> {
        (**self).doc_count()
    }

    fn has_freqs(&self) -> Result<bool> {
        (**self).has_freqs()
    }

    fn has_offsets(&self) -> Result<bool> {
        (**self).has_offsets()
    }

    fn has_positions(&self) -> Result<bool> {
        (**self).has_positions()
    }

    fn has_payloads(&self) -> Result<bool> {
        (**self).has_payloads()
    }

    fn min(&self) -> Result<Option<Vec<u8>>> {
        (**self).min()
    }

    fn max(&self) -> Result<Option<Vec<u8>>> {
        (**self).max()
    }

    fn stats(&self) -> Result<String> {
        (**self).stats()
    }
}

/// Represents returned result from `TermIterator::seek_ceil`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SeekStatus {
    /// The term was not found, and the end of iteration was hit.
    End,
    /// The precise term was found.
    Found,
    /// A different term was found after the requested term
    NotFound,
}

pub trait TermIterator {
    type Postings;
    type TermState: TermState;

    /// Increments the iteration to the next term, returning it, or `None`
    /// once the end of the iterator is reached.
    fn next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Attempts to seek to the exact term, returning true if the term is
    /// found. If this returns false, the iterator is unpositioned.
    fn seek_exact(&mut self, text: &[u8]) -> Result<bool> {
        Ok(self.seek_ceil(text)? == SeekStatus::Found)
    }

    /// Seeks to the specified term, if it exists, or to the next (ceiling)
    /// term. The target term may be before or after the current term. If
    /// this returns `SeekStatus::End`, the iterator is unpositioned.
    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus>;

    /// Seeks to the specified term by ordinal, as previously returned by
    /// `ord`.
    fn seek_exact_ord(&mut self, ord: i64) -> Result<()>;

    /// Positions on `text` using a state obtained from `term_state`,
    /// without consulting the dictionary when the implementation allows it.
    fn seek_exact_state(&mut self, text: &[u8], _state: &Self::TermState) -> Result<()> {
        if !self.seek_exact(text)? {
            bail!(IllegalArgument(format!("Term {:?} does not exist", text)));
        }
        Ok(())
    }

    /// Returns current term. Do not call this when the iterator is
    /// unpositioned.
    fn term(&self) -> Result<&[u8]>;

    /// Returns ordinal position for current term. This is an optional
    /// method.
    fn ord(&self) -> Result<i64>;

    /// Returns the number of documents containing the current term.
    fn doc_freq(&mut self) -> Result<i32>;

    /// Returns the total number of occurrences of this term across all
    /// documents, or -1 if the codec doesn't record it.
    fn total_term_freq(&mut self) -> Result<i64>;

    /// Get postings for the current term, with documents and frequencies.
    fn postings(&mut self) -> Result<Self::Postings> {
        self.postings_with_flags(PostingIteratorFlags::FREQS)
    }

    fn postings_with_flags(&mut self, flags: u16) -> Result<Self::Postings>;

    /// Postings carrying per-block impact data for the current term.
    fn impacts(&mut self, _flags: u16) -> Result<Self::Postings> {
        bail!(UnsupportedOperation("TermIterator::impacts unsupported".into()))
    }

    /// Expert: Returns the internal state needed to position an iterator on
    /// the current term without re-seeking the term dictionary.
    fn term_state(&mut self) -> Result<Self::TermState> {
        bail!(UnsupportedOperation(
            "TermIterator::term_state unsupported".into()
        ))
    }
}
