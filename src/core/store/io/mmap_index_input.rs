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

use crate::core::store::io::{DataInput, IndexInput};

use crate::error::ErrorKind::{IllegalArgument, IllegalState, UnexpectedEOF};
use crate::error::Result;
use memmap::{Mmap, MmapOptions};
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// A shared, read-only window over a memory mapped file.
#[derive(Clone)]
pub struct ReadOnlySource {
    map: Arc<Mmap>,
    offset: u64,
    len: u64,
}

impl ReadOnlySource {
    pub fn range(&self, offset: u64, len: u64) -> Result<ReadOnlySource> {
        if self.len < offset + len {
            bail!(IllegalArgument("Slice too big".to_owned()));
        }

        Ok(ReadOnlySource {
            map: Arc::clone(&self.map),
            offset: self.offset + offset,
            len,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the data underlying the ReadOnlySource object.
    pub fn as_slice(&self) -> &[u8] {
        let offset = self.offset as usize;
        let stop = (self.offset + self.len) as usize;
        &self.map[offset..stop]
    }

    /// Creates a ReadOnlySource that is just a view over a slice of the data.
    ///
    /// Any living slice keeps the whole mapping alive.
    pub fn slice(&self, from_offset: u64, to_offset: u64) -> Result<ReadOnlySource> {
        if from_offset > to_offset {
            bail!(IllegalArgument(format!(
                "from_offset must be <= to_offset, got: from_offset: {} > to_offset: {}",
                from_offset, to_offset
            )));
        }
        self.range(from_offset, to_offset - from_offset)
    }
}

impl From<Arc<Mmap>> for ReadOnlySource {
    fn from(mmap: Arc<Mmap>) -> ReadOnlySource {
        let len = mmap.len() as u64;
        ReadOnlySource {
            map: mmap,
            offset: 0,
            len,
        }
    }
}

/// `IndexInput` over a memory mapped file. Clones share the mapping.
#[derive(Clone)]
pub struct MmapIndexInput {
    source: ReadOnlySource,
    position: usize,
    description: String,
}

impl From<ReadOnlySource> for MmapIndexInput {
    fn from(source: ReadOnlySource) -> Self {
        MmapIndexInput {
            source,
            position: 0,
            description: String::from("MmapIndexInput"),
        }
    }
}

impl MmapIndexInput {
    pub fn new<P: AsRef<Path> + Debug>(name: P) -> Result<MmapIndexInput> {
        let mmap = MmapIndexInput::mmap(name.as_ref())?;
        Ok(mmap
            .map(ReadOnlySource::from)
            .map(MmapIndexInput::from)
            .ok_or_else(|| IllegalState(format!("Memmap empty file: {:?}", name)))?)
    }

    pub fn mmap(path: &Path) -> Result<Option<Arc<Mmap>>> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 {
            Ok(None)
        } else {
            let mmap = unsafe { MmapOptions::new().len(file_len).map(&file)? };
            debug!("mapped {:?}: {} bytes", path, file_len);
            Ok(Some(Arc::new(mmap)))
        }
    }

    fn slice_impl(&self, description: &str, offset: i64, length: i64) -> Result<Self> {
        let total_len = self.len() as i64;
        if offset < 0 || length < 0 || offset + length > total_len {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) for file of length: {}",
                offset, length, total_len
            )));
        };

        Ok(MmapIndexInput {
            source: self.source.range(offset as u64, length as u64)?,
            position: 0,
            description: description.to_string(),
        })
    }
}

impl IndexInput for MmapIndexInput {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Clone::clone(self)))
    }

    fn file_pointer(&self) -> i64 {
        self.position as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos as u64 > self.len() {
            bail!(IllegalArgument(format!(
                "seek position {} is beyond valid range of [0, {}]",
                pos,
                self.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    #[inline]
    fn len(&self) -> u64 {
        self.source.len()
    }

    fn name(&self) -> &str {
        &self.description
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        let boxed = self.slice_impl(description, offset, length)?;
        Ok(Box::new(boxed))
    }
}

impl DataInput for MmapIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        match self.source.as_slice().get(self.position) {
            Some(b) => {
                self.position += 1;
                Ok(*b)
            }
            None => bail!(UnexpectedEOF(format!(
                "read past EOF: {} at {}",
                self.description, self.position
            ))),
        }
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.position + count > self.source.len() as usize {
            bail!(UnexpectedEOF(format!(
                "skip past EOF: {} at {} + {}",
                self.description, self.position, count
            )));
        }
        self.position += count;
        Ok(())
    }
}

impl Read for MmapIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let slice = self.source.as_slice();
        let available = slice.len().saturating_sub(self.position);
        let count = buf.len().min(available);
        buf[..count].copy_from_slice(&slice[self.position..self.position + count]);

        self.position += count;
        Ok(count)
    }
}
