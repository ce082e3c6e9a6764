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

use crate::core::util::automaton::Automaton;
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

const ALPHABET_SIZE: usize = 256;

/// Dense transition table over a deterministic automaton, for stepping one
/// byte at a time without searching transitions.
#[derive(Clone)]
pub struct ByteRunAutomaton {
    accept: Vec<bool>,
    // num_states * 256 destinations, -1 where there is no transition
    transitions: Vec<i32>,
}

impl ByteRunAutomaton {
    pub fn new(a: &Automaton) -> Result<ByteRunAutomaton> {
        if !a.is_deterministic() {
            bail!(IllegalArgument(
                "run automaton requires a deterministic automaton".into()
            ));
        }
        let num_states = a.num_states();
        let mut transitions = vec![-1i32; num_states * ALPHABET_SIZE];
        let mut accept = Vec::with_capacity(num_states);
        for s in 0..num_states {
            accept.push(a.is_accept(s));
            let row = &mut transitions[s * ALPHABET_SIZE..(s + 1) * ALPHABET_SIZE];
            for t in a.transitions(s) {
                for label in t.min..=t.max {
                    row[label as usize] = t.dest as i32;
                }
            }
        }
        Ok(ByteRunAutomaton {
            accept,
            transitions,
        })
    }

    /// Returns the state reached from `state` on `label`, or -1 if none.
    #[inline]
    pub fn step(&self, state: i32, label: u8) -> i32 {
        debug_assert!(state >= 0);
        self.transitions[state as usize * ALPHABET_SIZE + label as usize]
    }

    #[inline]
    pub fn is_accept(&self, state: i32) -> bool {
        state >= 0 && self.accept[state as usize]
    }

    pub fn size(&self) -> usize {
        self.accept.len()
    }

    /// Whether the automaton accepts `bytes`.
    pub fn run(&self, bytes: &[u8]) -> bool {
        if self.accept.is_empty() {
            return false;
        }
        let mut state = 0;
        for &b in bytes {
            state = self.step(state, b);
            if state == -1 {
                return false;
            }
        }
        self.is_accept(state)
    }
}
