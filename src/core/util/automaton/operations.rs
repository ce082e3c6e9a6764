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

//! Automaton transformations.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::util::automaton::Automaton;
use crate::error::Result;

/// Powerset construction. The result is deterministic and only contains
/// states reachable from the initial state.
pub fn determinize(a: &Automaton) -> Result<Automaton> {
    let mut result = Automaton::new();
    let initial = result.create_state();
    if a.num_states() == 0 {
        return Ok(result);
    }

    let mut ids: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut worklist: VecDeque<Vec<usize>> = VecDeque::new();
    result.set_accept(initial, a.is_accept(0));
    ids.insert(vec![0], initial);
    worklist.push_back(vec![0]);

    let mut points: Vec<i32> = Vec::new();
    let mut dest_set: Vec<usize> = Vec::new();
    while let Some(set) = worklist.pop_front() {
        let source = ids[&set];

        points.clear();
        for &s in &set {
            for t in a.transitions(s) {
                points.push(t.min);
                points.push(t.max + 1);
            }
        }
        points.sort_unstable();
        points.dedup();

        // (dest, min, max) of the range being extended
        let mut pending: Option<(usize, i32, i32)> = None;
        for w in points.windows(2) {
            let (lo, hi) = (w[0], w[1] - 1);
            dest_set.clear();
            for &s in &set {
                for t in a.transitions(s) {
                    if t.min <= lo && lo <= t.max {
                        dest_set.push(t.dest);
                    }
                }
            }
            if dest_set.is_empty() {
                continue;
            }
            dest_set.sort_unstable();
            dest_set.dedup();

            let dest = match ids.get(dest_set.as_slice()) {
                Some(&id) => id,
                None => {
                    let id = result.create_state();
                    result.set_accept(id, dest_set.iter().any(|&s| a.is_accept(s)));
                    ids.insert(dest_set.clone(), id);
                    worklist.push_back(dest_set.clone());
                    id
                }
            };

            pending = match pending {
                Some((d, min, max)) if d == dest && max + 1 == lo => Some((d, min, hi)),
                Some((d, min, max)) => {
                    result.add_transition(source, d, min, max)?;
                    Some((dest, lo, hi))
                }
                None => Some((dest, lo, hi)),
            };
        }
        if let Some((d, min, max)) = pending {
            result.add_transition(source, d, min, max)?;
        }
    }
    debug!(
        "determinized automaton: {} states -> {} states",
        a.num_states(),
        result.num_states()
    );
    Ok(result)
}

fn reachable_from_initial(a: &Automaton) -> Vec<bool> {
    let mut seen = vec![false; a.num_states()];
    if a.num_states() == 0 {
        return seen;
    }
    let mut stack = vec![0usize];
    seen[0] = true;
    while let Some(s) = stack.pop() {
        for t in a.transitions(s) {
            if !seen[t.dest] {
                seen[t.dest] = true;
                stack.push(t.dest);
            }
        }
    }
    seen
}

fn reaching_accept(a: &Automaton) -> Vec<bool> {
    let n = a.num_states();
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    for s in 0..n {
        for t in a.transitions(s) {
            incoming[t.dest].push(s);
        }
    }
    let mut live = vec![false; n];
    let mut stack: Vec<usize> = (0..n).filter(|&s| a.is_accept(s)).collect();
    for &s in &stack {
        live[s] = true;
    }
    while let Some(s) = stack.pop() {
        for &p in &incoming[s] {
            if !live[p] {
                live[p] = true;
                stack.push(p);
            }
        }
    }
    live
}

/// Drops states that are unreachable or cannot reach an accept state,
/// renumbering the rest. Transitions into dropped states are removed.
pub fn remove_dead_states(a: &Automaton) -> Result<Automaton> {
    let reachable = reachable_from_initial(a);
    let live = reaching_accept(a);

    let mut result = Automaton::new();
    let initial = result.create_state();
    if a.num_states() == 0 || !live[0] {
        return Ok(result);
    }

    let mut map: Vec<Option<usize>> = vec![None; a.num_states()];
    map[0] = Some(initial);
    for s in 1..a.num_states() {
        if reachable[s] && live[s] {
            map[s] = Some(result.create_state());
        }
    }
    for s in 0..a.num_states() {
        if let Some(source) = map[s] {
            result.set_accept(source, a.is_accept(s));
            for t in a.transitions(s) {
                if let Some(dest) = map[t.dest] {
                    result.add_transition(source, dest, t.min, t.max)?;
                }
            }
        }
    }
    Ok(result)
}

/// Returns an automaton, without epsilon transitions, accepting the reverse
/// of every string `a` accepts.
pub fn reverse(a: &Automaton) -> Result<Automaton> {
    let mut result = Automaton::new();
    let initial = result.create_state();
    if a.num_states() == 0 {
        return Ok(result);
    }
    for _ in 0..a.num_states() {
        result.create_state();
    }
    for s in 0..a.num_states() {
        for t in a.transitions(s) {
            result.add_transition(t.dest + 1, s + 1, t.min, t.max)?;
        }
    }
    result.set_accept(1, true);

    // the new initial state stands for all old accept states at once
    for s in 0..a.num_states() {
        if a.is_accept(s) {
            let copied: Vec<_> = result.transitions(s + 1).to_vec();
            for t in copied {
                result.add_transition(initial, t.dest, t.min, t.max)?;
            }
            if s == 0 {
                result.set_accept(initial, true);
            }
        }
    }
    Ok(result)
}

/// Longest string every accepted string starts with. `a` must be
/// deterministic with dead states removed.
pub fn common_prefix(a: &Automaton) -> Vec<u8> {
    let mut prefix = Vec::new();
    if a.num_states() == 0 {
        return prefix;
    }
    let mut visited = HashSet::new();
    let mut s = 0;
    loop {
        visited.insert(s);
        if a.is_accept(s) || a.num_transitions(s) != 1 {
            break;
        }
        let t = a.get_transition(s, 0);
        if t.min != t.max || visited.contains(&t.dest) {
            break;
        }
        prefix.push(t.min as u8);
        s = t.dest;
    }
    prefix
}

/// Longest string every accepted string ends with. `a` must be
/// deterministic.
pub fn common_suffix(a: &Automaton) -> Result<Vec<u8>> {
    let reversed = remove_dead_states(&determinize(&reverse(a)?)?)?;
    let mut suffix = common_prefix(&reversed);
    suffix.reverse();
    Ok(suffix)
}

/// The only string accepted, if the language has exactly one string. `a`
/// must be deterministic with dead states removed.
pub fn single_string(a: &Automaton) -> Option<Vec<u8>> {
    if a.num_states() == 0 {
        return None;
    }
    let mut bytes = Vec::new();
    let mut visited = HashSet::new();
    let mut s = 0;
    loop {
        if !visited.insert(s) {
            return None;
        }
        if a.is_accept(s) {
            return if a.num_transitions(s) == 0 {
                Some(bytes)
            } else {
                None
            };
        }
        if a.num_transitions(s) != 1 {
            return None;
        }
        let t = a.get_transition(s, 0);
        if t.min != t.max {
            return None;
        }
        bytes.push(t.min as u8);
        s = t.dest;
    }
}

/// True if the automaton accepts no string at all.
pub fn is_empty(a: &Automaton) -> bool {
    a.num_states() == 0 || !reaching_accept(a)[0]
}
