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

use std::cmp::Ordering;

use crate::core::util::automaton::MAX_LABEL;
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

/// A labeled range `[min, max]` leading to `dest`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub dest: usize,
    pub min: i32,
    pub max: i32,
}

impl Transition {
    fn sort_key(&self, other: &Transition) -> Ordering {
        self.min
            .cmp(&other.min)
            .then(self.max.cmp(&other.max))
            .then(self.dest.cmp(&other.dest))
    }
}

/// A finite automaton over bytes. State 0 is the initial state.
///
/// Transitions of every state are kept sorted by (min, max, dest). The
/// automaton may be non-deterministic; see `operations::determinize`.
#[derive(Clone, Debug, Default)]
pub struct Automaton {
    accept: Vec<bool>,
    transitions: Vec<Vec<Transition>>,
}

impl Automaton {
    pub fn new() -> Automaton {
        Automaton::default()
    }

    pub fn create_state(&mut self) -> usize {
        self.accept.push(false);
        self.transitions.push(Vec::new());
        self.accept.len() - 1
    }

    pub fn set_accept(&mut self, state: usize, accept: bool) {
        self.accept[state] = accept;
    }

    pub fn is_accept(&self, state: usize) -> bool {
        self.accept[state]
    }

    pub fn add_transition(&mut self, source: usize, dest: usize, min: i32, max: i32) -> Result<()> {
        let num_states = self.num_states();
        if source >= num_states || dest >= num_states {
            bail!(IllegalArgument(format!(
                "transition {} -> {} references a state beyond {}",
                source, dest, num_states
            )));
        }
        if min < 0 || max > MAX_LABEL || min > max {
            bail!(IllegalArgument(format!(
                "invalid transition label range [{}, {}]",
                min, max
            )));
        }
        let t = Transition { dest, min, max };
        let transitions = &mut self.transitions[source];
        if let Err(pos) = transitions.binary_search_by(|probe| probe.sort_key(&t)) {
            transitions.insert(pos, t);
        }
        Ok(())
    }

    pub fn num_states(&self) -> usize {
        self.accept.len()
    }

    pub fn num_transitions(&self, state: usize) -> usize {
        self.transitions[state].len()
    }

    pub fn get_transition(&self, state: usize, index: usize) -> Transition {
        self.transitions[state][index]
    }

    pub fn transitions(&self, state: usize) -> &[Transition] {
        &self.transitions[state]
    }

    /// True if no state has two transitions accepting the same label.
    pub fn is_deterministic(&self) -> bool {
        self.transitions
            .iter()
            .all(|ts| ts.windows(2).all(|w| w[0].max < w[1].min))
    }

    /// Follows `label` from `state`; on a non-deterministic automaton this
    /// picks the first matching transition.
    pub fn step(&self, state: usize, label: i32) -> Option<usize> {
        self.transitions[state]
            .iter()
            .find(|t| t.min <= label && label <= t.max)
            .map(|t| t.dest)
    }

    /// Whether the automaton accepts `bytes`; exact for deterministic automata.
    pub fn run(&self, bytes: &[u8]) -> bool {
        if self.num_states() == 0 {
            return false;
        }
        let mut state = 0;
        for &b in bytes {
            match self.step(state, i32::from(b)) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.is_accept(state)
    }
}
