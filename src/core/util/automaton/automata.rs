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

//! Factories for common automata. Results may be non-deterministic but
//! never carry epsilon transitions.

use crate::core::util::automaton::{Automaton, MAX_LABEL};
use crate::error::Result;

const WILDCARD_STRING: u8 = b'*';
const WILDCARD_CHAR: u8 = b'?';
const WILDCARD_ESCAPE: u8 = b'\\';

/// Accepts nothing.
pub fn make_empty() -> Automaton {
    let mut a = Automaton::new();
    a.create_state();
    a
}

/// Accepts exactly `bytes`.
pub fn make_string(bytes: &[u8]) -> Automaton {
    let mut a = Automaton::new();
    let mut last = a.create_state();
    for &b in bytes {
        let state = a.create_state();
        push_transition(&mut a, last, state, i32::from(b), i32::from(b));
        last = state;
    }
    a.set_accept(last, true);
    a
}

/// Accepts any single byte.
pub fn make_any_byte() -> Automaton {
    make_byte_range(0, 0xFF)
}

/// Accepts any single byte in `[min, max]`.
pub fn make_byte_range(min: u8, max: u8) -> Automaton {
    let mut a = Automaton::new();
    let s0 = a.create_state();
    if min <= max {
        let s1 = a.create_state();
        a.set_accept(s1, true);
        push_transition(&mut a, s0, s1, i32::from(min), i32::from(max));
    }
    a
}

/// Accepts every string.
pub fn make_any_string() -> Automaton {
    let mut a = Automaton::new();
    let s = a.create_state();
    a.set_accept(s, true);
    push_transition(&mut a, s, s, 0, MAX_LABEL);
    a
}

/// Accepts every string starting with `prefix`.
pub fn make_prefix(prefix: &[u8]) -> Automaton {
    let mut a = make_string(prefix);
    let last = a.num_states() - 1;
    push_transition(&mut a, last, last, 0, MAX_LABEL);
    a
}

/// Wildcard pattern: `?` matches any one byte, `*` any run of bytes and `\`
/// escapes the next byte.
pub fn make_wildcard(pattern: &[u8]) -> Automaton {
    let mut a = Automaton::new();
    let mut last = a.create_state();
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            WILDCARD_STRING => {
                // stay in the same state, consuming anything
                push_transition(&mut a, last, last, 0, MAX_LABEL);
            }
            WILDCARD_CHAR => {
                let state = a.create_state();
                push_transition(&mut a, last, state, 0, MAX_LABEL);
                last = state;
            }
            c => {
                let c = if c == WILDCARD_ESCAPE && i + 1 < pattern.len() {
                    i += 1;
                    pattern[i]
                } else {
                    c
                };
                let state = a.create_state();
                push_transition(&mut a, last, state, i32::from(c), i32::from(c));
                last = state;
            }
        }
        i += 1;
    }
    a.set_accept(last, true);
    a
}

/// Accepts the strings accepted by `a1` or `a2`.
pub fn union(a1: &Automaton, a2: &Automaton) -> Result<Automaton> {
    let mut result = Automaton::new();
    let initial = result.create_state();
    let offset1 = copy_states(&mut result, a1)?;
    let offset2 = copy_states(&mut result, a2)?;

    for (a, offset) in &[(a1, offset1), (a2, offset2)] {
        if a.num_states() == 0 {
            continue;
        }
        if a.is_accept(0) {
            result.set_accept(initial, true);
        }
        for t in a.transitions(0) {
            result.add_transition(initial, t.dest + offset, t.min, t.max)?;
        }
    }
    Ok(result)
}

/// Accepts `x` followed by `y` for every `x` accepted by `a1` and `y` by `a2`.
pub fn concatenate(a1: &Automaton, a2: &Automaton) -> Result<Automaton> {
    let mut result = Automaton::new();
    if a1.num_states() == 0 || a2.num_states() == 0 {
        result.create_state();
        return Ok(result);
    }
    let offset1 = copy_states(&mut result, a1)?;
    let offset2 = copy_states(&mut result, a2)?;

    let a2_accepts_empty = a2.is_accept(0);
    for s in 0..a1.num_states() {
        if a1.is_accept(s) {
            result.set_accept(s + offset1, a2_accepts_empty);
            for t in a2.transitions(0) {
                result.add_transition(s + offset1, t.dest + offset2, t.min, t.max)?;
            }
        }
    }
    Ok(result)
}

// appends all states and transitions of `a`; returns the state offset
fn copy_states(result: &mut Automaton, a: &Automaton) -> Result<usize> {
    let offset = result.num_states();
    for s in 0..a.num_states() {
        let state = result.create_state();
        result.set_accept(state, a.is_accept(s));
    }
    for s in 0..a.num_states() {
        for t in a.transitions(s) {
            result.add_transition(s + offset, t.dest + offset, t.min, t.max)?;
        }
    }
    Ok(offset)
}

// states are always in range and labels come from bytes
fn push_transition(a: &mut Automaton, source: usize, dest: usize, min: i32, max: i32) {
    if let Err(e) = a.add_transition(source, dest, min, max) {
        error!("failed to add automaton transition: {}", e);
    }
}
