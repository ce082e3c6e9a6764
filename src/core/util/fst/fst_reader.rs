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

use crate::core::store::io::DataInput;
#[cfg(test)]
use crate::core::store::io::DataOutput;
use crate::core::util::fst::{Output, OutputFactory};
use crate::error::ErrorKind::CorruptIndex;
use crate::error::Result;

pub const END_LABEL: Label = -1;

pub type Label = i32;
pub type CompiledAddress = usize;

const NO_FINAL_OUTPUT: u8 = 0;
const HAS_FINAL_OUTPUT: u8 = 1;

/// An arc followed from one node into `target`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Arc<T: Output> {
    pub label: Label,
    pub output: T,
    /// Output to add when the input stops at `target`; empty if not final.
    pub next_final_output: T,
    /// To node
    pub target: CompiledAddress,
    is_final: bool,
}

impl<T: Output> Arc<T> {
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<T: Output> {
    pub(crate) final_output: Option<T>,
    // sorted by label
    pub(crate) arcs: Vec<(u8, T, CompiledAddress)>,
}

/// Immutable FST over byte labels. Node 0 is the start node.
pub struct FST<F: OutputFactory> {
    nodes: Vec<Node<F::Value>>,
    output_factory: F,
}

impl<F: OutputFactory> FST<F> {
    #[cfg(test)]
    pub(crate) fn from_nodes(nodes: Vec<Node<F::Value>>, output_factory: F) -> Self {
        FST {
            nodes,
            output_factory,
        }
    }

    pub fn from_input<I: DataInput + ?Sized>(data_in: &mut I, output_factory: F) -> Result<Self> {
        let num_nodes = data_in.read_vint()?;
        if num_nodes <= 0 {
            bail!(CorruptIndex(format!("invalid fst node count: {}", num_nodes)));
        }
        let num_nodes = num_nodes as usize;
        let mut nodes = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes {
            let final_output = match data_in.read_byte()? {
                NO_FINAL_OUTPUT => None,
                HAS_FINAL_OUTPUT => Some(output_factory.read(data_in)?),
                x => bail!(CorruptIndex(format!("invalid fst node flag: {}", x))),
            };
            let num_arcs = data_in.read_vint()?;
            if num_arcs < 0 || num_arcs > 256 {
                bail!(CorruptIndex(format!(
                    "invalid arc count {} for fst node {}",
                    num_arcs, node
                )));
            }
            let mut arcs = Vec::with_capacity(num_arcs as usize);
            let mut last_label = END_LABEL;
            for _ in 0..num_arcs {
                let label = data_in.read_byte()?;
                let output = output_factory.read(data_in)?;
                let target = data_in.read_vint()?;
                // targets are always created after their source node
                let out_of_order = i32::from(label) <= last_label;
                if out_of_order || target as usize <= node || target as usize >= num_nodes {
                    bail!(CorruptIndex(format!(
                        "invalid arc (label {}, target {}) from fst node {}",
                        label, target, node
                    )));
                }
                last_label = i32::from(label);
                arcs.push((label, output, target as usize));
            }
            nodes.push(Node { final_output, arcs });
        }
        Ok(FST {
            nodes,
            output_factory,
        })
    }

    #[cfg(test)]
    pub fn save<O: DataOutput + ?Sized>(&self, out: &mut O) -> Result<()> {
        out.write_vint(self.nodes.len() as i32)?;
        for node in &self.nodes {
            match node.final_output {
                Some(ref output) => {
                    out.write_byte(HAS_FINAL_OUTPUT)?;
                    self.output_factory.write(output, out)?;
                }
                None => out.write_byte(NO_FINAL_OUTPUT)?,
            }
            out.write_vint(node.arcs.len() as i32)?;
            for (label, output, target) in &node.arcs {
                out.write_byte(*label)?;
                self.output_factory.write(output, out)?;
                out.write_vint(*target as i32)?;
            }
        }
        Ok(())
    }

    pub fn outputs(&self) -> &F {
        &self.output_factory
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The virtual arc leading into the start node. It is final, with the
    /// whole empty-input output, when the FST accepts the empty input.
    pub fn root_arc(&self) -> Arc<F::Value> {
        self.arc_to(END_LABEL, self.output_factory.empty(), 0)
    }

    fn arc_to(&self, label: Label, output: F::Value, target: CompiledAddress) -> Arc<F::Value> {
        let (is_final, next_final_output) = match self.nodes[target].final_output {
            Some(ref o) => (true, o.clone()),
            None => (false, self.output_factory.empty()),
        };
        Arc {
            label,
            output,
            next_final_output,
            target,
            is_final,
        }
    }

    /// Follows the arc labeled `label` out of `incoming.target`.
    pub fn find_target_arc(
        &self,
        label: Label,
        incoming: &Arc<F::Value>,
    ) -> Result<Option<Arc<F::Value>>> {
        let node = match self.nodes.get(incoming.target) {
            Some(node) => node,
            None => bail!(CorruptIndex(format!(
                "fst arc target {} out of {} nodes",
                incoming.target,
                self.nodes.len()
            ))),
        };
        if label < 0 || label > 0xFF {
            return Ok(None);
        }
        let label = label as u8;
        Ok(node
            .arcs
            .binary_search_by(|arc| arc.0.cmp(&label))
            .ok()
            .map(|idx| {
                let (l, ref output, target) = node.arcs[idx];
                self.arc_to(Label::from(l), output.clone(), target)
            }))
    }

    /// Returns the output for `bytes`, or `None` if it is not accepted.
    pub fn get(&self, bytes: &[u8]) -> Result<Option<F::Value>> {
        let mut arc = self.root_arc();
        let mut output = self.output_factory.empty();
        for &b in bytes {
            match self.find_target_arc(Label::from(b), &arc)? {
                Some(next) => {
                    output = self.output_factory.add(&output, &next.output);
                    arc = next;
                }
                None => return Ok(None),
            }
        }
        if arc.is_final() {
            Ok(Some(self.output_factory.add(&output, &arc.next_final_output)))
        } else {
            Ok(None)
        }
    }
}
