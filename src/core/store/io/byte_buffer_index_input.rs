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
use crate::error::ErrorKind::{IllegalArgument, UnexpectedEOF};
use crate::error::Result;

use std::io::Read;

/// A growable in-memory buffer that is refilled in place.
///
/// Block frames keep one of these per decoded section and reload it for every
/// block they visit; the allocation only ever grows. It doubles as an
/// `IndexInput` over an in-memory file.
#[derive(Default)]
pub struct ByteBufferIndexInput {
    buffer: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl ByteBufferIndexInput {
    pub fn with_capacity(capacity: usize) -> ByteBufferIndexInput {
        ByteBufferIndexInput {
            buffer: vec![0u8; capacity],
            pos: 0,
            limit: 0,
        }
    }

    /// The valid bytes of the buffer.
    pub fn backing(&self) -> &[u8] {
        &self.buffer[..self.limit]
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Grows the buffer to hold `len` bytes, rewinds, and returns the region to fill.
    pub fn prepare(&mut self, len: usize) -> &mut [u8] {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
        self.pos = 0;
        self.limit = len;
        &mut self.buffer[..len]
    }

    pub fn reload_with_len<T: DataInput + ?Sized>(
        &mut self,
        input: &mut T,
        len: usize,
    ) -> Result<()> {
        let buffer = self.prepare(len);
        input.read_bytes(buffer, 0, len)
    }

    /// Reads a vint length prefix followed by that many bytes.
    pub fn reload<T: DataInput + ?Sized>(&mut self, input: &mut T) -> Result<()> {
        let len = input.read_vint()?;
        if len < 0 {
            bail!(UnexpectedEOF(format!("negative buffer length: {}", len)));
        }
        self.reload_with_len(input, len as usize)
    }

    pub fn reload_slice(&mut self, slice: &[u8]) {
        self.prepare(slice.len()).copy_from_slice(slice);
    }

    pub fn reset(&mut self, v: Vec<u8>) {
        self.limit = v.len();
        self.pos = 0;
        self.buffer = v;
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.limit {
            bail!(IllegalArgument(format!(
                "position {} is beyond valid range of [0, {}]",
                pos, self.limit
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.limit
    }

    pub fn get_slice(&self, pos: usize, len: usize) -> Result<&[u8]> {
        if pos > self.limit || pos + len > self.limit {
            bail!(IllegalArgument(format!(
                "slice ({}, {}) is beyond valid range of (0, {})",
                pos,
                pos + len,
                self.limit
            )))
        }
        Ok(&self.buffer[pos..pos + len])
    }

    #[inline]
    fn check_available(&self, len: usize) -> Result<()> {
        if len > self.limit.saturating_sub(self.pos) {
            bail!(UnexpectedEOF(format!(
                "read past EOF: position {} + {} bytes, limit {}",
                self.pos, len, self.limit
            )));
        }
        Ok(())
    }

    fn clone_impl(&self) -> ByteBufferIndexInput {
        ByteBufferIndexInput {
            buffer: self.buffer[..self.limit].to_vec(),
            pos: self.pos,
            limit: self.limit,
        }
    }
}

impl From<Vec<u8>> for ByteBufferIndexInput {
    fn from(f: Vec<u8>) -> ByteBufferIndexInput {
        ByteBufferIndexInput {
            limit: f.len(),
            buffer: f,
            pos: 0,
        }
    }
}

impl DataInput for ByteBufferIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        self.check_available(1)?;
        let b = self.buffer[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, len: usize) -> Result<()> {
        self.check_available(len)?;
        if offset + len > b.len() {
            bail!(IllegalArgument(format!(
                "Buffer too small: writing [{}, {}) to [0, {})",
                offset,
                offset + len,
                b.len()
            )));
        }
        b[offset..offset + len].copy_from_slice(&self.buffer[self.pos..self.pos + len]);
        self.pos += len;
        Ok(())
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.check_available(count)?;
        self.pos += count;
        Ok(())
    }
}

impl IndexInput for ByteBufferIndexInput {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.clone_impl()))
    }

    fn file_pointer(&self) -> i64 {
        self.pos as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos > self.limit as i64 {
            bail!(IllegalArgument(format!(
                "position {} is beyond valid range of [0, {}]",
                pos, self.limit
            )))
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.limit as u64
    }

    fn name(&self) -> &str {
        "ByteBufferIndexInput"
    }

    fn slice(&self, _description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        if offset < 0 || length < 0 || offset + length > self.limit as i64 {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) for buffer of length: {}",
                offset, length, self.limit
            )));
        }
        let bytes = self.get_slice(offset as usize, length as usize)?.to_vec();
        Ok(Box::new(ByteBufferIndexInput::from(bytes)))
    }
}

impl Read for ByteBufferIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> ::std::io::Result<usize> {
        let read = (&self.buffer[self.pos..self.limit]).read(buf)?;
        self.pos += read;
        Ok(read)
    }
}
