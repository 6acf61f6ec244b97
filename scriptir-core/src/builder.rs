//! Utilities for building valid graphs.
//!
//! # Example
//!
//! ```rust
//! # use scriptir_core::builder::{BuildError, GraphBuilder};
//! use scriptir_core::ops::Symbol;
//! use scriptir_core::types::Type;
//!
//! # fn doctest() -> Result<(), BuildError> {
//! let mut b = GraphBuilder::new();
//! let x = b.add_input(Type::Tensor);
//! let y = b.add_op(Symbol::aten("relu"), [x], [Type::Tensor])[0];
//! let graph = b.finish([y])?;
//! assert_eq!(graph.node_count(), 1);
//! # Ok(())
//! # }
//! # doctest().unwrap();
//! ```

use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

use crate::callable::Callable;
use crate::graph::ValidationError;
use crate::ops::{Attribute, NAME_ATTR, OpType, VALUE_ATTR};
use crate::types::{FunctionType, Type};
use crate::{Block, Graph, Node, Value};

/// Error while building a graph.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The constructed graph is invalid.
    #[error("The constructed graph is invalid: {0}.")]
    InvalidGraph(#[from] ValidationError),
    /// A nested block returned the wrong number of values.
    #[error("Block {index} of {node} returns {actual} values, expected {expected}.")]
    BlockOutputs {
        /// The node owning the block.
        node: Node,
        /// The index of the block in the node.
        index: usize,
        /// The number of outputs of the node.
        expected: usize,
        /// The number of values returned.
        actual: usize,
    },
}

/// Builds a [`Graph`] by appending nodes to its root block, or to the nested
/// block currently under construction.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    graph: Graph,
    block: Block,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a builder for an empty graph.
    pub fn new() -> Self {
        let graph = Graph::new();
        let block = graph.root_block();
        Self { graph, block }
    }

    /// The graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Adds an input to the graph.
    pub fn add_input(&mut self, ty: Type) -> Value {
        self.graph.add_graph_input(ty)
    }

    /// Adds a named input to the graph.
    pub fn add_named_input(&mut self, name: impl Into<SmolStr>, ty: Type) -> Value {
        let v = self.add_input(ty);
        self.graph.set_debug_name(v, name);
        v
    }

    /// Appends a node to the current block.
    pub fn add_node(
        &mut self,
        op: impl Into<OpType>,
        inputs: impl IntoIterator<Item = Value>,
        output_types: impl IntoIterator<Item = Type>,
    ) -> Node {
        let node = self.graph.create_node(op, inputs, output_types);
        self.graph.append_node(self.block, node);
        node
    }

    /// Appends a node to the current block, returning its outputs.
    pub fn add_op(
        &mut self,
        op: impl Into<OpType>,
        inputs: impl IntoIterator<Item = Value>,
        output_types: impl IntoIterator<Item = Type>,
    ) -> Vec<Value> {
        let node = self.add_node(op, inputs, output_types);
        self.graph.outputs(node).to_vec()
    }

    /// Appends a literal constant.
    pub fn add_constant(&mut self, value: impl Into<Attribute>, ty: Type) -> Value {
        let node = self.add_node(OpType::Constant, [], [ty]);
        self.graph.set_attr(node, VALUE_ATTR, value);
        self.graph.outputs(node)[0]
    }

    /// Appends a constant referencing `callable`.
    pub fn add_function_constant(&mut self, callable: impl Into<Arc<Callable>>) -> Value {
        let ty: Type = FunctionType::new(callable).into();
        let node = self.add_node(OpType::Constant, [], [ty]);
        self.graph.outputs(node)[0]
    }

    /// Appends a constant referencing `callable` and a function call to it.
    pub fn call_function(
        &mut self,
        callable: impl Into<Arc<Callable>>,
        args: impl IntoIterator<Item = Value>,
        output_types: impl IntoIterator<Item = Type>,
    ) -> Vec<Value> {
        let callee = self.add_function_constant(callable);
        self.add_op(
            OpType::CallFunction,
            std::iter::once(callee).chain(args),
            output_types,
        )
    }

    /// Appends a call to the method `name` of `receiver`.
    pub fn call_method(
        &mut self,
        receiver: Value,
        name: impl Into<SmolStr>,
        args: impl IntoIterator<Item = Value>,
        output_types: impl IntoIterator<Item = Type>,
    ) -> Vec<Value> {
        let node = self.add_node(
            OpType::CallMethod,
            std::iter::once(receiver).chain(args),
            output_types,
        );
        self.graph.set_attr(node, NAME_ATTR, Attribute::Str(name.into()));
        self.graph.outputs(node).to_vec()
    }

    /// Appends a conditional on `cond`. Each branch is built by a closure
    /// returning the values the branch yields.
    ///
    /// # Errors
    ///
    /// If a branch yields a number of values different from `output_types`.
    pub fn add_if(
        &mut self,
        cond: Value,
        output_types: impl IntoIterator<Item = Type>,
        then_branch: impl FnOnce(&mut Self) -> Vec<Value>,
        else_branch: impl FnOnce(&mut Self) -> Vec<Value>,
    ) -> Result<Vec<Value>, BuildError> {
        let node = self.add_node(OpType::If, [cond], output_types);
        self.build_block(node, 0, &[], |b, _| then_branch(b))?;
        self.build_block(node, 1, &[], |b, _| else_branch(b))?;
        Ok(self.graph.outputs(node).to_vec())
    }

    /// Appends a loop running at most `max_trip_count` times while its
    /// condition holds, threading `carried` values through iterations.
    ///
    /// The body closure receives the iteration counter and the carried values,
    /// and returns the continuation condition and the new carried values.
    ///
    /// # Errors
    ///
    /// If the body yields a number of carried values different from `carried`.
    pub fn add_loop(
        &mut self,
        max_trip_count: Value,
        cond: Value,
        carried: impl IntoIterator<Item = Value>,
        body: impl FnOnce(&mut Self, Value, &[Value]) -> (Value, Vec<Value>),
    ) -> Result<Vec<Value>, BuildError> {
        let carried = carried.into_iter().collect::<Vec<_>>();
        let types = carried
            .iter()
            .map(|&v| self.graph.value_type(v).clone())
            .collect::<Vec<_>>();
        let node = self.add_node(
            OpType::Loop,
            [max_trip_count, cond].into_iter().chain(carried),
            types.clone(),
        );
        let block_inputs = std::iter::once(Type::Int).chain(types).collect::<Vec<_>>();
        self.build_block(node, 0, &block_inputs, |b, params| {
            let (cond, next) = body(b, params[0], &params[1..]);
            std::iter::once(cond).chain(next).collect()
        })?;
        Ok(self.graph.outputs(node).to_vec())
    }

    /// Registers the graph outputs and validates the result.
    ///
    /// # Errors
    ///
    /// If the graph is invalid.
    pub fn finish(mut self, outputs: impl IntoIterator<Item = Value>) -> Result<Graph, BuildError> {
        for v in outputs {
            self.graph.register_graph_output(v);
        }
        self.graph.validate()?;
        Ok(self.graph)
    }

    fn build_block(
        &mut self,
        node: Node,
        index: usize,
        input_types: &[Type],
        build: impl FnOnce(&mut Self, &[Value]) -> Vec<Value>,
    ) -> Result<(), BuildError> {
        let block = self.graph.add_block(node);
        let params = input_types
            .iter()
            .map(|ty| self.graph.add_block_input(block, ty.clone()))
            .collect::<Vec<_>>();
        let outer = std::mem::replace(&mut self.block, block);
        let outputs = build(self, &params);
        self.block = outer;

        // Loop bodies also yield their continuation condition.
        let expected = self.graph.outputs(node).len() + usize::from(!input_types.is_empty());
        if outputs.len() != expected {
            return Err(BuildError::BlockOutputs {
                node,
                index,
                expected,
                actual: outputs.len(),
            });
        }
        for v in outputs {
            self.graph.register_block_output(block, v);
        }
        Ok(())
    }
}
