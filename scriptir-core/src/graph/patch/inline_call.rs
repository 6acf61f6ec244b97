//! Patch to inline a call by copying the body of the callee in place of the
//! call node.
use thiserror::Error;

use super::{Patch, PatchVerification};
use crate::ops::OpType;
use crate::{Graph, Node, Value};

/// Patch to inline a [`CallFunction`](OpType::CallFunction) or
/// [`CallMethod`](OpType::CallMethod) node, given the body of its callee.
///
/// The arguments of the call are its inputs, except for the callee reference
/// of a function call. For method calls the receiver is the first argument.
#[derive(Clone, Debug)]
pub struct InlineCall<'a> {
    call: Node,
    body: &'a Graph,
}

/// Error in performing [`InlineCall`] patch.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum InlineCallError {
    /// The specified node was not a call.
    #[error("Node to inline {0} expected to be a call but actually {1}")]
    NotCallNode(Node, OpType),
    /// The specified node is not in a block.
    #[error("Call {0} is not inserted in any block")]
    Detached(Node),
    /// The callee takes a different number of arguments.
    #[error("Call {node} passes {actual} arguments but the callee takes {expected}")]
    InputArity {
        /// The call node.
        node: Node,
        /// Number of inputs of the callee body.
        expected: usize,
        /// Number of arguments passed by the call.
        actual: usize,
    },
    /// The callee returns a different number of results.
    #[error("Call {node} expects {actual} results but the callee returns {expected}")]
    OutputArity {
        /// The call node.
        node: Node,
        /// Number of outputs of the callee body.
        expected: usize,
        /// Number of outputs of the call.
        actual: usize,
    },
}

impl<'a> InlineCall<'a> {
    /// Create a new instance that will inline `body` in place of `call`.
    pub fn new(call: Node, body: &'a Graph) -> Self {
        Self { call, body }
    }

    fn arguments(&self, graph: &Graph) -> Vec<Value> {
        let skip = usize::from(*graph.op(self.call) == OpType::CallFunction);
        graph.inputs(self.call).iter().skip(skip).copied().collect()
    }
}

impl PatchVerification for InlineCall<'_> {
    type Error = InlineCallError;

    fn verify(&self, graph: &Graph) -> Result<(), Self::Error> {
        let node = self.call;
        let op = graph.op(node);
        if !op.is_call() {
            return Err(InlineCallError::NotCallNode(node, op.clone()));
        }
        if graph.parent_block(node).is_none() {
            return Err(InlineCallError::Detached(node));
        }
        let (expected, actual) = (self.body.graph_inputs().len(), self.arguments(graph).len());
        if expected != actual {
            return Err(InlineCallError::InputArity {
                node,
                expected,
                actual,
            });
        }
        let (expected, actual) = (self.body.graph_outputs().len(), graph.outputs(node).len());
        if expected != actual {
            return Err(InlineCallError::OutputArity {
                node,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl Patch for InlineCall<'_> {
    /// The values replacing the outputs of the call.
    type Outcome = Vec<Value>;

    /// Failure only occurs if the node is not a linked call, or the arities
    /// differ. (Any later failure means an invalid graph and `panic`.)
    const UNCHANGED_ON_FAILURE: bool = true;

    fn apply(self, graph: &mut Graph) -> Result<Self::Outcome, Self::Error> {
        self.verify(graph)?;
        let args = self.arguments(graph);
        let results = graph.insert_graph(self.body, &args, self.call);
        for (old, &new) in graph.outputs(self.call).to_vec().into_iter().zip(&results) {
            graph.replace_all_uses_with(old, new);
        }
        graph.destroy_node(self.call);
        Ok(results)
    }
}
