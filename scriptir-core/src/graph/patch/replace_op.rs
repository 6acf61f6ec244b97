//! Patch replacing a node by a fresh node with a different operation.
use thiserror::Error;

use super::{Patch, PatchVerification};
use crate::ops::OpType;
use crate::{Graph, Node};

/// Replaces a node by a new node performing `op`, placed right after it.
///
/// The new node takes the inputs of the old one (optionally dropping a number
/// of leading inputs) and has as many outputs, with the metadata of the old
/// outputs copied over. All uses are rewired to the new node and the old node
/// is destroyed.
#[derive(Clone, Debug)]
pub struct ReplaceOp {
    node: Node,
    op: OpType,
    skip_inputs: usize,
}

/// Error in performing [`ReplaceOp`] patch.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ReplaceOpError {
    /// Block sentinels cannot be replaced.
    #[error("Cannot replace block sentinel {0}")]
    Sentinel(Node),
    /// The node is not in a block.
    #[error("Node {0} is not inserted in any block")]
    Detached(Node),
    /// Only nodes without nested blocks can be replaced.
    #[error("Node {0} owns nested blocks")]
    OwnsBlocks(Node),
    /// More inputs would be dropped than the node has.
    #[error("Cannot drop {skip} inputs of {node}, which has {inputs}")]
    NotEnoughInputs {
        /// The node.
        node: Node,
        /// Number of leading inputs to drop.
        skip: usize,
        /// Number of inputs of the node.
        inputs: usize,
    },
}

impl ReplaceOp {
    /// Create a new instance replacing `node` by a node performing `op`.
    pub fn new(node: Node, op: impl Into<OpType>) -> Self {
        Self {
            node,
            op: op.into(),
            skip_inputs: 0,
        }
    }

    /// Do not pass the first `count` inputs of the node to the replacement.
    pub fn skip_inputs(mut self, count: usize) -> Self {
        self.skip_inputs = count;
        self
    }
}

impl PatchVerification for ReplaceOp {
    type Error = ReplaceOpError;

    fn verify(&self, graph: &Graph) -> Result<(), Self::Error> {
        let node = self.node;
        if graph.op(node).is_sentinel() {
            return Err(ReplaceOpError::Sentinel(node));
        }
        if graph.parent_block(node).is_none() {
            return Err(ReplaceOpError::Detached(node));
        }
        if !graph.node_blocks(node).is_empty() {
            return Err(ReplaceOpError::OwnsBlocks(node));
        }
        let inputs = graph.inputs(node).len();
        if self.skip_inputs > inputs {
            return Err(ReplaceOpError::NotEnoughInputs {
                node,
                skip: self.skip_inputs,
                inputs,
            });
        }
        Ok(())
    }
}

impl Patch for ReplaceOp {
    /// The new node.
    type Outcome = Node;

    const UNCHANGED_ON_FAILURE: bool = true;

    fn apply(self, graph: &mut Graph) -> Result<Self::Outcome, Self::Error> {
        self.verify(graph)?;
        let old = self.node;
        let inputs = graph.inputs(old)[self.skip_inputs..].to_vec();
        let types = graph
            .outputs(old)
            .iter()
            .map(|&v| graph.value_type(v).clone())
            .collect::<Vec<_>>();
        let new = graph.create_node(self.op, inputs, types);
        let pairs = graph
            .outputs(new)
            .iter()
            .copied()
            .zip(graph.outputs(old).iter().copied())
            .collect::<Vec<_>>();
        for (dst, src) in pairs {
            graph.copy_metadata(dst, src);
        }
        graph.insert_after(new, old);
        graph.replace_all_node_uses_with(old, new);
        graph.destroy_node(old);
        Ok(new)
    }
}
