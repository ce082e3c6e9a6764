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

//! A finite state transducer over byte labels, used to map term prefixes to
//! the encoded location of the block holding them.
//!
//! Outputs are pushed toward the root: every arc carries the part of the
//! output shared by all inputs below it, so a lookup walks arcs and sums
//! outputs, then adds the final output of the node it stops on.

mod bytes_output;

pub use self::bytes_output::*;

#[cfg(test)]
mod fst_builder;

#[cfg(test)]
pub use self::fst_builder::*;

mod fst_reader;

pub use self::fst_reader::*;

use std::fmt::Debug;

use crate::core::store::io::{DataInput, DataOutput};
use crate::error::Result;

pub trait Output: Clone + Eq + Debug {
    type Value;

    fn is_empty(&self) -> bool;

    fn value(&self) -> Self::Value;
}

pub trait OutputFactory: Clone {
    type Value: Output;

    /// Return an empty Output
    fn empty(&self) -> Self::Value;

    fn common(&self, o1: &Self::Value, o2: &Self::Value) -> Self::Value;

    fn subtract(&self, o1: &Self::Value, o2: &Self::Value) -> Self::Value;

    fn add(&self, prefix: &Self::Value, output: &Self::Value) -> Self::Value;

    /// Decode an output value previously written with `write`
    fn read<T: DataInput + ?Sized>(&self, data_in: &mut T) -> Result<Self::Value>;

    /// Encode an output value into a `DataOutput`
    fn write<T: DataOutput + ?Sized>(&self, output: &Self::Value, data_out: &mut T) -> Result<()>;
}
