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

use crate::core::util::automaton::{operations, Automaton, ByteRunAutomaton};
use crate::error::Result;

/// A caller supplied automaton prepared for term intersection: made
/// deterministic, stripped of dead states, with a dense run table and the
/// literal suffix every accepted term must end with.
#[derive(Clone)]
pub struct CompiledAutomaton {
    pub automaton: Automaton,
    pub run_automaton: ByteRunAutomaton,
    /// Set when non-empty and the automaton accepts more than one string.
    pub common_suffix: Option<Vec<u8>>,
    /// The accepted string, when the automaton accepts exactly one.
    pub term: Option<Vec<u8>>,
}

impl CompiledAutomaton {
    pub fn new(automaton: &Automaton) -> Result<CompiledAutomaton> {
        let automaton = operations::remove_dead_states(&operations::determinize(automaton)?)?;
        let run_automaton = ByteRunAutomaton::new(&automaton)?;
        let term = operations::single_string(&automaton);
        let common_suffix = if term.is_none() {
            let suffix = operations::common_suffix(&automaton)?;
            if suffix.is_empty() {
                None
            } else {
                Some(suffix)
            }
        } else {
            None
        };
        Ok(CompiledAutomaton {
            automaton,
            run_automaton,
            common_suffix,
            term,
        })
    }

    /// True if no string is accepted.
    pub fn is_empty(&self) -> bool {
        operations::is_empty(&self.automaton)
    }
}
