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

//! Finite automata over byte labels, as supplied by callers of
//! `Terms::intersect`.

mod automaton;

pub use self::automaton::*;

pub mod automata;

pub mod operations;

mod run_automaton;

pub use self::run_automaton::*;

mod compiled_automaton;

pub use self::compiled_automaton::*;

/// Largest byte label.
pub const MAX_LABEL: i32 = 0xFF;
