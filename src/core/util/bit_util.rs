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

pub trait ZigZagEncoding {
    fn encode(&self) -> Self;
    fn decode(&self) -> Self;
}

impl ZigZagEncoding for i32 {
    fn encode(&self) -> i32 {
        (*self >> 31) ^ (self << 1)
    }
    fn decode(&self) -> i32 {
        (*self as u32 >> 1) as i32 ^ -(self & 1)
    }
}

impl ZigZagEncoding for i64 {
    fn encode(&self) -> i64 {
        (*self >> 63) ^ (self << 1)
    }
    fn decode(&self) -> i64 {
        (*self as u64 >> 1) as i64 ^ -(self & 1)
    }
}

pub trait UnsignedShift: Sized {
    fn unsigned_shift(&self, by: usize) -> Self;
}

macro_rules! impl_unsigned_shift {
    ($type: ty, $utype: ty) => {
        impl UnsignedShift for $type {
            #[inline]
            fn unsigned_shift(&self, by: usize) -> Self {
                (*self as $utype >> by) as $type
            }
        }
    };
}

impl_unsigned_shift!(i8, u8);
impl_unsigned_shift!(i16, u16);
impl_unsigned_shift!(i32, u32);
impl_unsigned_shift!(i64, u64);
impl_unsigned_shift!(isize, usize);
