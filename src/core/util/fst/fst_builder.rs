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

use crate::core::util::fst::fst_reader::{CompiledAddress, Node};
use crate::core::util::fst::{OutputFactory, FST};
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

/// Builds an FST from inputs added in strictly ascending byte order.
///
/// Inputs are kept as a trie while building; `finish` pushes every shared
/// output prefix as close to the root as it can go. Suffixes are not shared,
/// which is plenty for per-field prefix indexes.
pub struct FstBuilder<F: OutputFactory> {
    output_factory: F,
    outputs: Vec<Option<F::Value>>,
    children: Vec<Vec<(u8, CompiledAddress)>>,
    last_input: Option<Vec<u8>>,
}

impl<F: OutputFactory> FstBuilder<F> {
    pub fn new(output_factory: F) -> Self {
        FstBuilder {
            output_factory,
            outputs: vec![None],
            children: vec![Vec::new()],
            last_input: None,
        }
    }

    pub fn add(&mut self, input: &[u8], output: F::Value) -> Result<()> {
        if let Some(ref last) = self.last_input {
            if input <= last.as_slice() {
                bail!(IllegalArgument(format!(
                    "inputs are added out of order: {:?} after {:?}",
                    input, last
                )));
            }
        }

        let mut node = 0;
        for &label in input {
            // sorted inputs only ever extend the last arc of a node
            let existing = match self.children[node].last() {
                Some(&(l, target)) if l == label => Some(target),
                _ => None,
            };
            node = match existing {
                Some(target) => target,
                None => {
                    let target = self.outputs.len();
                    self.outputs.push(None);
                    self.children.push(Vec::new());
                    self.children[node].push((label, target));
                    target
                }
            };
        }
        self.outputs[node] = Some(output);
        self.last_input = Some(input.to_vec());
        Ok(())
    }

    pub fn finish(self) -> FST<F> {
        let FstBuilder {
            output_factory,
            outputs,
            children,
            ..
        } = self;

        // children always have larger addresses than their parent
        let num_nodes = outputs.len();
        let mut common: Vec<Option<F::Value>> = vec![None; num_nodes];
        for node in (1..num_nodes).rev() {
            let mut shared = outputs[node].clone();
            for &(_, child) in &children[node] {
                if let Some(ref child_common) = common[child] {
                    shared = Some(match shared {
                        Some(ref s) => output_factory.common(s, child_common),
                        None => child_common.clone(),
                    });
                }
            }
            common[node] = shared;
        }
        common[0] = Some(output_factory.empty());

        let empty = output_factory.empty();
        let mut nodes = Vec::with_capacity(num_nodes);
        for (node, (output, arcs)) in outputs.into_iter().zip(children.into_iter()).enumerate() {
            let node_common = common[node].as_ref().unwrap_or(&empty);
            let final_output = output.map(|o| output_factory.subtract(&o, node_common));
            let arcs = arcs
                .into_iter()
                .map(|(label, target)| {
                    let child_common = common[target].as_ref().unwrap_or(&empty);
                    (
                        label,
                        output_factory.subtract(child_common, node_common),
                        target,
                    )
                })
                .collect();
            nodes.push(Node { final_output, arcs });
        }
        FST::from_nodes(nodes, output_factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::fst::{ByteSequenceOutput, ByteSequenceOutputFactory};

    #[test]
    fn test_rejects_unsorted_input() {
        let mut builder = FstBuilder::new(ByteSequenceOutputFactory::new());
        builder.add(b"b", ByteSequenceOutput::new(vec![1])).unwrap();
        assert!(builder.add(b"a", ByteSequenceOutput::new(vec![2])).is_err());
        assert!(builder.add(b"b", ByteSequenceOutput::new(vec![3])).is_err());
    }

    #[test]
    fn test_outputs_are_pushed_up() {
        let mut builder = FstBuilder::new(ByteSequenceOutputFactory::new());
        builder.add(b"ab", ByteSequenceOutput::new(vec![7, 1, 2])).unwrap();
        builder.add(b"ac", ByteSequenceOutput::new(vec![7, 1, 3])).unwrap();
        builder.add(b"ad", ByteSequenceOutput::new(vec![7, 9])).unwrap();
        let fst = builder.finish();
        assert_eq!(fst.num_nodes(), 5);

        let root = fst.root_arc();
        assert!(!root.is_final());
        let a = fst.find_target_arc(i32::from(b'a'), &root).unwrap().unwrap();
        assert_eq!(a.output.inner(), &[7]);
        let b = fst.find_target_arc(i32::from(b'b'), &a).unwrap().unwrap();
        assert_eq!(b.output.inner(), &[1, 2]);
        assert!(b.is_final());
        assert!(b.next_final_output.is_empty());
        assert_eq!(fst.get(b"ad").unwrap().unwrap().inner(), &[7, 9]);
    }
}
