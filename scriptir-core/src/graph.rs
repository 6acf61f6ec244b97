//! The graph data structure, and its low-level mutation interface.
//!
//! A [`Graph`] stores nodes, values and blocks in arenas addressed by the
//! [`Node`], [`Value`] and [`Block`] handles. Each block is a doubly-linked
//! list of nodes delimited by a [`OpType::Param`] sentinel, whose outputs are
//! the block inputs, and a [`OpType::Return`] sentinel, whose inputs are the
//! block outputs. Every value keeps an exact list of its [`Use`]s.
//!
//! Slots of destroyed nodes, values and blocks are vacated and never reused,
//! so a handle to a destroyed element stays invalid.

mod display;
pub mod patch;
pub mod validate;

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use smol_str::SmolStr;

pub use self::patch::{Patch, PatchVerification};
pub use self::validate::ValidationError;
use crate::ops::{Attribute, OpType};
use crate::types::Type;
use crate::{Block, Node, Use, Value};

/// An IR graph: a root [`Block`] and everything nested within it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Graph {
    nodes: Vec<Option<NodeData>>,
    values: Vec<Option<ValueData>>,
    blocks: Vec<Option<BlockData>>,
    root: Block,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct NodeData {
    op: OpType,
    inputs: Vec<Value>,
    outputs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<SmolStr, Attribute>,
    parent: Option<Block>,
    prev: Option<Node>,
    next: Option<Node>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct ValueData {
    producer: Node,
    offset: usize,
    ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debug_name: Option<SmolStr>,
    uses: Vec<Use>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct BlockData {
    param: Node,
    ret: Node,
    owner: Option<Node>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only queries.
impl Graph {
    /// Creates a graph with an empty root block.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            root: Block::new(0),
        };
        graph.root = graph.alloc_block(None);
        graph
    }

    /// The root block of the graph.
    #[inline]
    pub fn root_block(&self) -> Block {
        self.root
    }

    /// The inputs of the graph, i.e. of its root block.
    pub fn graph_inputs(&self) -> &[Value] {
        self.block_inputs(self.root)
    }

    /// The outputs of the graph, i.e. of its root block.
    pub fn graph_outputs(&self) -> &[Value] {
        self.block_outputs(self.root)
    }

    /// Returns whether the node is live in the graph.
    pub fn contains_node(&self, node: Node) -> bool {
        matches!(self.nodes.get(node.index()), Some(Some(_)))
    }

    /// Returns whether the value is live in the graph.
    pub fn contains_value(&self, value: Value) -> bool {
        matches!(self.values.get(value.index()), Some(Some(_)))
    }

    /// Returns whether the block is live in the graph.
    pub fn contains_block(&self, block: Block) -> bool {
        matches!(self.blocks.get(block.index()), Some(Some(_)))
    }

    /// Number of live nodes, excluding block sentinels.
    pub fn node_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter(|d| !d.op.is_sentinel())
            .count()
    }

    /// Iterates over all live nodes in allocation order, including detached
    /// nodes and block sentinels.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| Node::new(i))
    }

    /// The operation of a node.
    ///
    /// # Panics
    ///
    /// If the node is not in the graph.
    pub fn op(&self, node: Node) -> &OpType {
        &self.node_data(node).op
    }

    /// The ordered input values of a node.
    pub fn inputs(&self, node: Node) -> &[Value] {
        &self.node_data(node).inputs
    }

    /// The input value at `offset`, if any.
    pub fn input(&self, node: Node, offset: usize) -> Option<Value> {
        self.node_data(node).inputs.get(offset).copied()
    }

    /// The ordered output values of a node.
    pub fn outputs(&self, node: Node) -> &[Value] {
        &self.node_data(node).outputs
    }

    /// The blocks owned by a node.
    pub fn node_blocks(&self, node: Node) -> &[Block] {
        &self.node_data(node).blocks
    }

    /// The attribute of a node with the given name.
    pub fn attr(&self, node: Node, name: &str) -> Option<&Attribute> {
        self.node_data(node).attrs.get(name)
    }

    /// The string attribute of a node with the given name.
    pub fn attr_str(&self, node: Node, name: &str) -> Option<&str> {
        self.attr(node, name).and_then(Attribute::as_str)
    }

    /// All attributes of a node, ordered by name.
    pub fn attrs(&self, node: Node) -> impl Iterator<Item = (&str, &Attribute)> {
        self.node_data(node)
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    /// The block containing the node, or `None` if the node is detached.
    pub fn parent_block(&self, node: Node) -> Option<Block> {
        self.node_data(node).parent
    }

    /// The node following `node` in its block, excluding the return sentinel.
    pub fn next_node(&self, node: Node) -> Option<Node> {
        self.node_data(node)
            .next
            .filter(|&n| *self.op(n) != OpType::Return)
    }

    /// The node preceding `node` in its block, excluding the param sentinel.
    pub fn prev_node(&self, node: Node) -> Option<Node> {
        self.node_data(node)
            .prev
            .filter(|&n| *self.op(n) != OpType::Param)
    }

    /// The first node of a block, if it is not empty.
    pub fn first_node(&self, block: Block) -> Option<Node> {
        self.next_node(self.block_param(block))
    }

    /// Iterates over the nodes of a block in order, excluding the sentinels.
    ///
    /// See [`Graph::descendants`] to include nested blocks.
    pub fn block_nodes(&self, block: Block) -> impl Iterator<Item = Node> + '_ {
        std::iter::successors(self.first_node(block), |&n| self.next_node(n))
    }

    /// Iterates over the nodes of a block and, recursively, of all blocks
    /// nested within them, in pre-order.
    pub fn descendants(&self, block: Block) -> impl Iterator<Item = Node> + '_ {
        let mut stack = vec![self.first_node(block)];
        std::iter::from_fn(move || {
            loop {
                let top = stack.last_mut()?;
                let Some(node) = *top else {
                    stack.pop();
                    continue;
                };
                *top = self.next_node(node);
                stack.extend(
                    self.node_blocks(node)
                        .iter()
                        .rev()
                        .map(|&b| self.first_node(b)),
                );
                return Some(node);
            }
        })
    }

    /// The param sentinel of a block.
    ///
    /// # Panics
    ///
    /// If the block is not in the graph.
    pub fn block_param(&self, block: Block) -> Node {
        self.block_data(block).param
    }

    /// The return sentinel of a block.
    pub fn block_return(&self, block: Block) -> Node {
        self.block_data(block).ret
    }

    /// The inputs of a block.
    pub fn block_inputs(&self, block: Block) -> &[Value] {
        self.outputs(self.block_param(block))
    }

    /// The outputs of a block.
    pub fn block_outputs(&self, block: Block) -> &[Value] {
        self.inputs(self.block_return(block))
    }

    /// The node owning a block, or `None` for the root block.
    pub fn block_owner(&self, block: Block) -> Option<Node> {
        self.block_data(block).owner
    }

    /// The type of a value.
    ///
    /// # Panics
    ///
    /// If the value is not in the graph.
    pub fn value_type(&self, value: Value) -> &Type {
        &self.value_data(value).ty
    }

    /// The node producing a value. For block inputs this is the block's param
    /// sentinel.
    pub fn producer(&self, value: Value) -> Node {
        self.value_data(value).producer
    }

    /// The consumers of a value.
    pub fn uses(&self, value: Value) -> &[Use] {
        &self.value_data(value).uses
    }

    /// The debug name of a value, if it has one.
    pub fn debug_name(&self, value: Value) -> Option<&str> {
        self.value_data(value).debug_name.as_deref()
    }
}

/// Low-level mutation.
impl Graph {
    /// Creates a new node, not yet inserted in any block.
    ///
    /// # Panics
    ///
    /// If any of the inputs is not in the graph.
    pub fn create_node(
        &mut self,
        op: impl Into<OpType>,
        inputs: impl IntoIterator<Item = Value>,
        output_types: impl IntoIterator<Item = Type>,
    ) -> Node {
        let node = self.alloc_node(op.into());
        for value in inputs {
            self.add_input(node, value);
        }
        for ty in output_types {
            self.add_output(node, ty);
        }
        node
    }

    /// Appends an input to a node, returning its offset.
    pub fn add_input(&mut self, node: Node, value: Value) -> usize {
        let offset = self.node_data(node).inputs.len();
        self.value_data_mut(value).uses.push(Use::new(node, offset));
        self.node_data_mut(node).inputs.push(value);
        offset
    }

    /// Replaces the input at `offset`, returning the previous value.
    ///
    /// # Panics
    ///
    /// If the node has no input at `offset`.
    pub fn replace_input(&mut self, node: Node, offset: usize, value: Value) -> Value {
        let old = self.node_data(node).inputs[offset];
        self.drop_use(old, Use::new(node, offset));
        self.node_data_mut(node).inputs[offset] = value;
        self.value_data_mut(value).uses.push(Use::new(node, offset));
        old
    }

    /// Removes the input at `offset`, shifting later inputs down.
    ///
    /// # Panics
    ///
    /// If the node has no input at `offset`.
    pub fn remove_input(&mut self, node: Node, offset: usize) -> Value {
        let old = self.node_data_mut(node).inputs.remove(offset);
        self.drop_use(old, Use::new(node, offset));
        let shifted = self.node_data(node).inputs[offset..].to_vec();
        for (i, value) in shifted.into_iter().enumerate() {
            let new_offset = offset + i;
            if let Some(u) = self
                .value_data_mut(value)
                .uses
                .iter_mut()
                .find(|u| u.user == node && u.offset == new_offset + 1)
            {
                u.offset = new_offset;
            }
        }
        old
    }

    /// Removes every input of a node.
    pub fn remove_all_inputs(&mut self, node: Node) {
        let inputs = std::mem::take(&mut self.node_data_mut(node).inputs);
        for (offset, value) in inputs.into_iter().enumerate() {
            self.drop_use(value, Use::new(node, offset));
        }
    }

    /// Appends a new output value of the given type to a node.
    pub fn add_output(&mut self, node: Node, ty: Type) -> Value {
        let value = Value::new(self.values.len());
        let offset = self.node_data(node).outputs.len();
        self.values.push(Some(ValueData {
            producer: node,
            offset,
            ty,
            debug_name: None,
            uses: Vec::new(),
        }));
        self.node_data_mut(node).outputs.push(value);
        value
    }

    /// Sets an attribute, returning the previous one with that name.
    pub fn set_attr(
        &mut self,
        node: Node,
        name: impl Into<SmolStr>,
        attr: impl Into<Attribute>,
    ) -> Option<Attribute> {
        self.node_data_mut(node)
            .attrs
            .insert(name.into(), attr.into())
    }

    /// Sets the type of a value.
    pub fn set_value_type(&mut self, value: Value, ty: Type) {
        self.value_data_mut(value).ty = ty;
    }

    /// Sets the debug name of a value.
    pub fn set_debug_name(&mut self, value: Value, name: impl Into<SmolStr>) {
        self.value_data_mut(value).debug_name = Some(name.into());
    }

    /// Copies the metadata (type and debug name) of `src` onto `dst`.
    pub fn copy_metadata(&mut self, dst: Value, src: Value) {
        let src = self.value_data(src);
        let (ty, debug_name) = (src.ty.clone(), src.debug_name.clone());
        let dst = self.value_data_mut(dst);
        dst.ty = ty;
        dst.debug_name = debug_name;
    }

    /// Adds a new empty block owned by `node`.
    pub fn add_block(&mut self, node: Node) -> Block {
        let block = self.alloc_block(Some(node));
        self.node_data_mut(node).blocks.push(block);
        block
    }

    /// Appends an input of the given type to a block.
    pub fn add_block_input(&mut self, block: Block, ty: Type) -> Value {
        self.add_output(self.block_param(block), ty)
    }

    /// Appends `value` to the outputs of a block, returning its offset.
    pub fn register_block_output(&mut self, block: Block, value: Value) -> usize {
        self.add_input(self.block_return(block), value)
    }

    /// Appends an input of the given type to the graph.
    pub fn add_graph_input(&mut self, ty: Type) -> Value {
        self.add_block_input(self.root, ty)
    }

    /// Appends `value` to the outputs of the graph.
    pub fn register_graph_output(&mut self, value: Value) -> usize {
        self.register_block_output(self.root, value)
    }

    /// Inserts a detached node at the end of a block.
    ///
    /// # Panics
    ///
    /// If the node is already in a block.
    pub fn append_node(&mut self, block: Block, node: Node) {
        self.insert_before(node, self.block_return(block));
    }

    /// Inserts a detached node immediately before `anchor`.
    ///
    /// # Panics
    ///
    /// If the node is already in a block, or `anchor` is detached or a param
    /// sentinel.
    pub fn insert_before(&mut self, node: Node, anchor: Node) {
        let (parent, prev) = {
            let a = self.node_data(anchor);
            match (a.parent, a.prev) {
                (Some(parent), Some(prev)) => (parent, prev),
                _ => panic!("Cannot insert before {anchor}: not a linked, non-param node."),
            }
        };
        self.link(node, parent, prev, anchor);
    }

    /// Inserts a detached node immediately after `anchor`.
    ///
    /// # Panics
    ///
    /// If the node is already in a block, or `anchor` is detached or a return
    /// sentinel.
    pub fn insert_after(&mut self, node: Node, anchor: Node) {
        let (parent, next) = {
            let a = self.node_data(anchor);
            match (a.parent, a.next) {
                (Some(parent), Some(next)) => (parent, next),
                _ => panic!("Cannot insert after {anchor}: not a linked, non-return node."),
            }
        };
        self.link(node, parent, anchor, next);
    }

    /// Unlinks a node from its block, leaving its edges untouched.
    ///
    /// # Panics
    ///
    /// If the node is a block sentinel.
    pub fn detach_node(&mut self, node: Node) {
        assert!(
            !self.op(node).is_sentinel(),
            "Cannot detach block sentinel {node}."
        );
        let data = self.node_data_mut(node);
        let (prev, next) = (data.prev.take(), data.next.take());
        data.parent = None;
        if let Some(prev) = prev {
            self.node_data_mut(prev).next = next;
        }
        if let Some(next) = next {
            self.node_data_mut(next).prev = prev;
        }
    }

    /// Rewires every use of `from` to use `to` instead.
    pub fn replace_all_uses_with(&mut self, from: Value, to: Value) {
        if from == to {
            return;
        }
        let uses = std::mem::take(&mut self.value_data_mut(from).uses);
        for u in &uses {
            self.node_data_mut(u.user).inputs[u.offset] = to;
        }
        self.value_data_mut(to).uses.extend(uses);
    }

    /// Rewires every use of each output of `from` to the corresponding output
    /// of `to`.
    ///
    /// # Panics
    ///
    /// If the nodes have different numbers of outputs.
    pub fn replace_all_node_uses_with(&mut self, from: Node, to: Node) {
        let pairs = self
            .outputs(from)
            .iter()
            .copied()
            .zip_eq(self.outputs(to).iter().copied())
            .collect_vec();
        for (old, new) in pairs {
            self.replace_all_uses_with(old, new);
        }
    }

    /// Removes a node from the graph, together with the blocks it owns.
    ///
    /// The node is detached from its block and its inputs are removed first.
    ///
    /// # Panics
    ///
    /// If the node is a block sentinel, or any of its outputs still has uses.
    pub fn destroy_node(&mut self, node: Node) {
        if self.parent_block(node).is_some() {
            self.detach_node(node);
        }
        assert!(
            !self.op(node).is_sentinel(),
            "Cannot destroy block sentinel {node}."
        );
        self.free_node(node);
    }

    /// Copies the root block of `other` immediately before `anchor`, mapping
    /// its inputs to `inputs`. Returns the values corresponding to the outputs
    /// of `other`.
    ///
    /// # Panics
    ///
    /// If the number of inputs does not match, `anchor` is not linked in a
    /// block, or `other` uses a value outside its own scope.
    pub fn insert_graph(&mut self, other: &Graph, inputs: &[Value], anchor: Node) -> Vec<Value> {
        let src = other.root_block();
        let mut value_map: HashMap<Value, Value> = other
            .block_inputs(src)
            .iter()
            .copied()
            .zip_eq(inputs.iter().copied())
            .collect();
        self.copy_block_nodes(other, src, anchor, &mut value_map);
        other
            .block_outputs(src)
            .iter()
            .map(|v| mapped_value(&value_map, *v))
            .collect()
    }
}

/// Internal helpers.
impl Graph {
    fn node_data(&self, node: Node) -> &NodeData {
        match self.nodes.get(node.index()) {
            Some(Some(data)) => data,
            _ => panic!("Received an invalid node {node}."),
        }
    }

    fn node_data_mut(&mut self, node: Node) -> &mut NodeData {
        match self.nodes.get_mut(node.index()) {
            Some(Some(data)) => data,
            _ => panic!("Received an invalid node {node}."),
        }
    }

    fn value_data(&self, value: Value) -> &ValueData {
        match self.values.get(value.index()) {
            Some(Some(data)) => data,
            _ => panic!("Received an invalid value {value}."),
        }
    }

    fn value_data_mut(&mut self, value: Value) -> &mut ValueData {
        match self.values.get_mut(value.index()) {
            Some(Some(data)) => data,
            _ => panic!("Received an invalid value {value}."),
        }
    }

    fn block_data(&self, block: Block) -> &BlockData {
        match self.blocks.get(block.index()) {
            Some(Some(data)) => data,
            _ => panic!("Received an invalid block {block}."),
        }
    }

    fn alloc_node(&mut self, op: OpType) -> Node {
        let node = Node::new(self.nodes.len());
        self.nodes.push(Some(NodeData {
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            blocks: Vec::new(),
            attrs: BTreeMap::new(),
            parent: None,
            prev: None,
            next: None,
        }));
        node
    }

    fn alloc_block(&mut self, owner: Option<Node>) -> Block {
        let block = Block::new(self.blocks.len());
        let param = self.alloc_node(OpType::Param);
        let ret = self.alloc_node(OpType::Return);
        {
            let p = self.node_data_mut(param);
            p.parent = Some(block);
            p.next = Some(ret);
        }
        {
            let r = self.node_data_mut(ret);
            r.parent = Some(block);
            r.prev = Some(param);
        }
        self.blocks.push(Some(BlockData { param, ret, owner }));
        block
    }

    fn link(&mut self, node: Node, parent: Block, prev: Node, next: Node) {
        let data = self.node_data_mut(node);
        assert!(
            data.parent.is_none(),
            "Node {node} is already inserted in a block."
        );
        data.parent = Some(parent);
        data.prev = Some(prev);
        data.next = Some(next);
        self.node_data_mut(prev).next = Some(node);
        self.node_data_mut(next).prev = Some(node);
    }

    fn drop_use(&mut self, value: Value, u: Use) {
        let uses = &mut self.value_data_mut(value).uses;
        if let Some(pos) = uses.iter().position(|x| *x == u) {
            uses.remove(pos);
        }
    }

    /// Frees a detached node (or a sentinel of a block being destroyed).
    fn free_node(&mut self, node: Node) {
        self.remove_all_inputs(node);
        for block in std::mem::take(&mut self.node_data_mut(node).blocks) {
            self.destroy_block(block);
        }
        for value in std::mem::take(&mut self.node_data_mut(node).outputs) {
            assert!(
                self.uses(value).is_empty(),
                "Cannot destroy {node}: output {value} still has uses."
            );
            self.values[value.index()] = None;
        }
        self.nodes[node.index()] = None;
    }

    fn destroy_block(&mut self, block: Block) {
        let BlockData { param, ret, .. } = *self.block_data(block);
        self.remove_all_inputs(ret);
        for node in self.block_nodes(block).collect_vec().into_iter().rev() {
            self.free_node(node);
        }
        self.free_node(ret);
        self.free_node(param);
        self.blocks[block.index()] = None;
    }

    fn copy_block_nodes(
        &mut self,
        other: &Graph,
        src: Block,
        anchor: Node,
        value_map: &mut HashMap<Value, Value>,
    ) {
        for node in other.block_nodes(src) {
            let data = other.node_data(node);
            let inputs = data
                .inputs
                .iter()
                .map(|v| mapped_value(value_map, *v))
                .collect_vec();
            let copy = self.create_node(data.op.clone(), inputs, []);
            self.node_data_mut(copy).attrs = data.attrs.clone();
            for &value in &data.outputs {
                let new = self.add_output(copy, other.value_type(value).clone());
                self.value_data_mut(new).debug_name = other.value_data(value).debug_name.clone();
                value_map.insert(value, new);
            }
            self.insert_before(copy, anchor);
            for &block in &data.blocks {
                let new_block = self.add_block(copy);
                for &value in other.block_inputs(block) {
                    let new = self.add_block_input(new_block, other.value_type(value).clone());
                    self.value_data_mut(new).debug_name =
                        other.value_data(value).debug_name.clone();
                    value_map.insert(value, new);
                }
                let ret = self.block_return(new_block);
                self.copy_block_nodes(other, block, ret, value_map);
                for &value in other.block_outputs(block) {
                    self.register_block_output(new_block, mapped_value(value_map, value));
                }
            }
        }
    }
}

fn mapped_value(value_map: &HashMap<Value, Value>, value: Value) -> Value {
    match value_map.get(&value) {
        Some(v) => *v,
        None => panic!("Value {value} of the inserted graph is used outside its scope."),
    }
}
