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

use crate::core::store::io::{DataOutput, IndexOutput};

use crate::error::Result;

use std::io::{self, Write};

/// A memory-resident `IndexOutput` implementation.
pub struct RAMOutputStream {
    name: String,
    store: Vec<u8>,
}

impl Default for RAMOutputStream {
    fn default() -> Self {
        RAMOutputStream::new("noname")
    }
}

impl RAMOutputStream {
    pub fn new(name: &str) -> Self {
        RAMOutputStream {
            name: name.to_string(),
            store: Vec::new(),
        }
    }

    /// Copies the buffered bytes to `out`.
    pub fn write_to<T: DataOutput + ?Sized>(&self, out: &mut T) -> Result<()> {
        out.write_bytes(&self.store, 0, self.store.len())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.store
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.store
    }

    pub fn reset(&mut self) {
        self.store.clear();
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.store.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.store.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to_and_reset() {
        let mut scratch = RAMOutputStream::default();
        scratch.write_vint(300).unwrap();
        scratch.write_byte(7).unwrap();
        assert_eq!(scratch.file_pointer(), 3);

        let mut out = RAMOutputStream::new("out.tim");
        out.write_byte(1).unwrap();
        scratch.write_to(&mut out).unwrap();
        scratch.reset();
        assert_eq!(scratch.file_pointer(), 0);
        assert_eq!(out.name(), "out.tim");
        assert_eq!(out.into_bytes(), vec![1, 0xac, 0x02, 7]);
    }
}
