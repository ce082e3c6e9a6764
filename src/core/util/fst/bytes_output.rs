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

use crate::core::store::io::{DataInput, DataOutput};
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;
use std::cmp::min;

use crate::core::util::fst::{Output, OutputFactory};

#[derive(Debug, Eq, PartialEq, Hash)]
pub struct ByteSequenceOutput {
    bytes: Vec<u8>,
}

impl From<ByteSequenceOutput> for Vec<u8> {
    fn from(output: ByteSequenceOutput) -> Vec<u8> {
        output.bytes
    }
}

impl ByteSequenceOutput {
    pub fn new(bytes: Vec<u8>) -> ByteSequenceOutput {
        ByteSequenceOutput { bytes }
    }

    pub fn empty() -> ByteSequenceOutput {
        ByteSequenceOutput {
            bytes: Vec::with_capacity(0),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn starts_with(&self, other: &ByteSequenceOutput) -> bool {
        self.bytes.starts_with(&other.bytes)
    }

    #[inline]
    pub fn inner(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == 0
    }
}

impl Clone for ByteSequenceOutput {
    fn clone(&self) -> Self {
        if self.bytes.is_empty() {
            ByteSequenceOutput {
                bytes: Vec::with_capacity(1),
            }
        } else {
            ByteSequenceOutput::new(self.bytes.clone())
        }
    }
}

impl Output for ByteSequenceOutput {
    type Value = Vec<u8>;

    #[inline]
    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    fn value(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

#[derive(Copy, Clone, Default)]
pub struct ByteSequenceOutputFactory {}

impl ByteSequenceOutputFactory {
    pub fn new() -> ByteSequenceOutputFactory {
        ByteSequenceOutputFactory {}
    }
}

impl OutputFactory for ByteSequenceOutputFactory {
    type Value = ByteSequenceOutput;

    fn empty(&self) -> Self::Value {
        ByteSequenceOutput::empty()
    }

    fn common(
        &self,
        o1: &<Self as OutputFactory>::Value,
        o2: &<Self as OutputFactory>::Value,
    ) -> <Self as OutputFactory>::Value {
        let mut res = Vec::new();
        for i in 0..min(o1.len(), o2.len()) {
            if o1.bytes[i] == o2.bytes[i] {
                res.push(o1.bytes[i]);
            } else {
                break;
            }
        }
        if res.is_empty() {
            self.empty()
        } else {
            ByteSequenceOutput::new(res)
        }
    }

    fn subtract(
        &self,
        o1: &<Self as OutputFactory>::Value,
        o2: &<Self as OutputFactory>::Value,
    ) -> <Self as OutputFactory>::Value {
        if o2.is_empty() {
            o1.clone()
        } else {
            debug_assert!(o1.starts_with(o2));
            if o1.len() == o2.len() {
                self.empty()
            } else {
                ByteSequenceOutput::new((&o1.bytes[o2.len()..]).to_vec())
            }
        }
    }

    fn add(
        &self,
        prefix: &<Self as OutputFactory>::Value,
        output: &<Self as OutputFactory>::Value,
    ) -> <Self as OutputFactory>::Value {
        if prefix.is_empty() {
            output.clone()
        } else if output.is_empty() {
            prefix.clone()
        } else {
            let mut result = vec![0u8; prefix.len() + output.len()];
            result[0..prefix.len()].copy_from_slice(&prefix.bytes);
            result[prefix.len()..].copy_from_slice(&output.bytes);
            ByteSequenceOutput::new(result)
        }
    }

    fn read<T: DataInput + ?Sized>(&self, data_in: &mut T) -> Result<ByteSequenceOutput> {
        let len = data_in.read_vint()?;
        if len < 0 {
            bail!(CorruptIndex(format!("negative output length: {}", len)));
        } else if len != 0 {
            let len = len as usize;
            let mut buffer: Vec<u8> = vec![0u8; len];
            data_in.read_bytes(&mut buffer, 0, len)?;

            Ok(ByteSequenceOutput::new(buffer))
        } else {
            Ok(self.empty())
        }
    }

    fn write<T: DataOutput + ?Sized>(
        &self,
        output: &ByteSequenceOutput,
        data_out: &mut T,
    ) -> Result<()> {
        data_out.write_vint(output.bytes.len() as i32)?;
        data_out.write_bytes(&output.bytes, 0, output.bytes.len())
    }
}
