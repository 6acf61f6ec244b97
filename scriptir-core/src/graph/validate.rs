//! Structural validation of a [`Graph`].

use std::collections::HashSet;

use itertools::Itertools;
use thiserror::Error;

use super::Graph;
use crate::ops::{NAME_ATTR, OpType};
use crate::{Block, Node, Use, Value};

impl Graph {
    /// Checks the structural invariants of the graph.
    ///
    /// - every block is a well-formed linked list between its sentinels, and
    ///   every live node is reachable from the root block;
    /// - every node output is a live value recording that node and offset as
    ///   its producer;
    /// - the use-list of every value matches exactly the inputs referring to it;
    /// - every input is defined earlier in the same block or in an enclosing
    ///   block before the owning node;
    /// - function calls take a function constant as their first input, and
    ///   method calls have a receiver and a method name.
    ///
    /// # Errors
    ///
    /// The first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut ctx = ValidationContext {
            graph: self,
            visited: HashSet::new(),
            in_scope: HashSet::new(),
        };
        ctx.validate_block(self.root_block(), None)?;
        if let Some(node) = self.nodes().find(|n| !ctx.visited.contains(n)) {
            return Err(ValidationError::UnreachableNode {
                node,
                op: self.op(node).clone(),
            });
        }
        ctx.validate_values()
    }
}

struct ValidationContext<'a> {
    graph: &'a Graph,
    visited: HashSet<Node>,
    in_scope: HashSet<Value>,
}

impl ValidationContext<'_> {
    fn validate_block(&mut self, block: Block, owner: Option<Node>) -> Result<(), ValidationError> {
        let graph = self.graph;
        if !graph.contains_block(block) || graph.block_owner(block) != owner {
            return Err(ValidationError::WrongBlockOwner { block, owner });
        }
        let param = graph.block_param(block);
        let ret = graph.block_return(block);
        let broken = |node| ValidationError::BrokenBlock { block, node };
        if !graph.contains_node(param) {
            return Err(broken(param));
        }

        let param_data = graph.node_data(param);
        if param_data.op != OpType::Param || param_data.parent != Some(block) || param_data.prev.is_some() {
            return Err(broken(param));
        }
        self.visited.insert(param);
        self.validate_outputs(param)?;
        let mut defined = graph.block_inputs(block).to_vec();
        self.in_scope.extend(defined.iter().copied());

        let mut prev = param;
        loop {
            let node = graph.node_data(prev).next.ok_or(broken(prev))?;
            if !graph.contains_node(node) || !self.visited.insert(node) {
                return Err(broken(node));
            }
            let data = graph.node_data(node);
            if data.parent != Some(block) || data.prev != Some(prev) {
                return Err(broken(node));
            }
            if node == ret {
                break;
            }
            if data.op.is_sentinel() {
                return Err(broken(node));
            }
            self.validate_inputs(node)?;
            self.validate_outputs(node)?;
            self.validate_call(node)?;
            for &nested in &data.blocks {
                self.validate_block(nested, Some(node))?;
            }
            self.in_scope.extend(data.outputs.iter().copied());
            defined.extend(data.outputs.iter().copied());
            prev = node;
        }

        let ret_data = graph.node_data(ret);
        if ret_data.op != OpType::Return || ret_data.next.is_some() {
            return Err(broken(ret));
        }
        self.validate_inputs(ret)?;

        for value in defined {
            self.in_scope.remove(&value);
        }
        Ok(())
    }

    fn validate_inputs(&self, node: Node) -> Result<(), ValidationError> {
        let graph = self.graph;
        for (offset, &value) in graph.inputs(node).iter().enumerate() {
            if !graph.contains_value(value) || !self.in_scope.contains(&value) {
                return Err(ValidationError::ValueNotInScope { node, value });
            }
            if !graph.uses(value).contains(&Use::new(node, offset)) {
                return Err(ValidationError::MissingUse {
                    node,
                    offset,
                    value,
                });
            }
        }
        Ok(())
    }

    fn validate_outputs(&self, node: Node) -> Result<(), ValidationError> {
        let graph = self.graph;
        for (offset, &value) in graph.outputs(node).iter().enumerate() {
            let produced = graph.values.get(value.index()).and_then(Option::as_ref).is_some_and(
                |data| data.producer == node && data.offset == offset,
            );
            if !produced {
                return Err(ValidationError::WrongProducer {
                    value,
                    node,
                    offset,
                });
            }
        }
        Ok(())
    }

    fn validate_call(&self, node: Node) -> Result<(), ValidationError> {
        let graph = self.graph;
        match graph.op(node) {
            OpType::CallFunction => {
                let is_function_constant = graph.input(node, 0).is_some_and(|callee| {
                    *graph.op(graph.producer(callee)) == OpType::Constant
                        && graph.value_type(callee).as_function().is_some()
                });
                if !is_function_constant {
                    return Err(ValidationError::CalleeNotConstant { node });
                }
            }
            OpType::CallMethod => {
                if graph.inputs(node).is_empty() || graph.attr_str(node, NAME_ATTR).is_none() {
                    return Err(ValidationError::MalformedMethodCall { node });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_values(&self) -> Result<(), ValidationError> {
        let graph = self.graph;
        for (index, data) in graph.values.iter().enumerate() {
            let Some(data) = data else { continue };
            let value = Value::new(index);
            let produced = graph.contains_node(data.producer)
                && graph.outputs(data.producer).get(data.offset) == Some(&value);
            if !produced {
                return Err(ValidationError::WrongProducer {
                    value,
                    node: data.producer,
                    offset: data.offset,
                });
            }
            if !data.uses.iter().all_unique() {
                return Err(ValidationError::DuplicateUse { value });
            }
            for u in &data.uses {
                let used = graph.contains_node(u.user) && graph.input(u.user, u.offset) == Some(value);
                if !used {
                    return Err(ValidationError::DanglingUse {
                        value,
                        node: u.user,
                        offset: u.offset,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Structural errors detected by [`Graph::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The linked list of a block is inconsistent.
    #[error("Block {block} is not a well-formed node list at {node}")]
    BrokenBlock {
        /// The block.
        block: Block,
        /// The node where the inconsistency was found.
        node: Node,
    },
    /// A block is missing or not owned by the node that lists it.
    #[error("Block {block} is not owned by {owner:?}")]
    WrongBlockOwner {
        /// The block.
        block: Block,
        /// The expected owner, `None` for the root block.
        owner: Option<Node>,
    },
    /// A live node is not contained in any block reachable from the root.
    #[error("Node {node} ({op}) is not reachable from the root block")]
    UnreachableNode {
        /// The node.
        node: Node,
        /// Its operation.
        op: OpType,
    },
    /// An input refers to a value not defined in an enclosing scope.
    #[error("Value {value} used by {node} is not defined in an enclosing scope")]
    ValueNotInScope {
        /// The consuming node.
        node: Node,
        /// The input value.
        value: Value,
    },
    /// An input is missing from the use-list of its value.
    #[error("Input {offset} of {node} is missing from the uses of {value}")]
    MissingUse {
        /// The consuming node.
        node: Node,
        /// The input offset.
        offset: usize,
        /// The input value.
        value: Value,
    },
    /// A use-list entry does not correspond to an input.
    #[error("{value} records a use by {node} at input {offset}, which does not refer to it")]
    DanglingUse {
        /// The value.
        value: Value,
        /// The recorded consumer.
        node: Node,
        /// The recorded input offset.
        offset: usize,
    },
    /// A use-list contains the same entry twice.
    #[error("{value} records the same use more than once")]
    DuplicateUse {
        /// The value.
        value: Value,
    },
    /// A value is not the output of its recorded producer.
    #[error("{value} is not output {offset} of its producer {node}")]
    WrongProducer {
        /// The value.
        value: Value,
        /// The recorded producer.
        node: Node,
        /// The recorded output offset.
        offset: usize,
    },
    /// A function call whose first input is not a function constant.
    #[error("Function call {node} does not take a function constant as its first input")]
    CalleeNotConstant {
        /// The call node.
        node: Node,
    },
    /// A method call without receiver or method name.
    #[error("Method call {node} has no receiver or no `name` attribute")]
    MalformedMethodCall {
        /// The call node.
        node: Node,
    },
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::builder::GraphBuilder;
    use crate::callable::{BuiltinFunction, Callable};
    use crate::ops::Symbol;
    use crate::types::Type;

    fn simple() -> (Graph, Node) {
        let mut g = Graph::new();
        let x = g.add_graph_input(Type::Tensor);
        let n = g.create_node(Symbol::aten("relu"), [x], [Type::Tensor]);
        g.append_node(g.root_block(), n);
        g.register_graph_output(g.outputs(n)[0]);
        (g, n)
    }

    #[test]
    fn empty_graph_is_valid() {
        assert_eq!(Graph::new().validate(), Ok(()));
        assert_eq!(simple().0.validate(), Ok(()));
    }

    #[test]
    fn detached_node() {
        let (mut g, _) = simple();
        let x = g.graph_inputs()[0];
        let orphan = g.create_node(Symbol::aten("neg"), [x], [Type::Tensor]);
        assert_matches!(
            g.validate(),
            Err(ValidationError::UnreachableNode { node, .. }) => assert_eq!(node, orphan)
        );
    }

    #[test]
    fn use_before_definition() {
        let (mut g, n) = simple();
        let y = g.outputs(n)[0];
        let early = g.create_node(Symbol::aten("neg"), [y], [Type::Tensor]);
        g.insert_before(early, n);
        assert_matches!(
            g.validate(),
            Err(ValidationError::ValueNotInScope { node, value }) => {
                assert_eq!(node, early);
                assert_eq!(value, y);
            }
        );
    }

    #[test]
    fn nested_block_sees_enclosing_values() {
        let (mut g, n) = simple();
        let x = g.graph_inputs()[0];
        let cond = g.create_node(OpType::If, [x], []);
        g.insert_after(cond, n);
        let block = g.add_block(cond);
        let inner = g.create_node(Symbol::aten("neg"), g.outputs(n).to_vec(), [Type::Tensor]);
        g.append_node(block, inner);
        assert_eq!(g.validate(), Ok(()));

        // A value defined in a nested block is not visible after it.
        let after = g.create_node(Symbol::aten("neg"), g.outputs(inner).to_vec(), []);
        g.insert_after(after, cond);
        assert_matches!(g.validate(), Err(ValidationError::ValueNotInScope { .. }));
    }

    #[test]
    fn function_call_needs_constant_callee() {
        let (mut g, n) = simple();
        let x = g.graph_inputs()[0];
        let call = g.create_node(OpType::CallFunction, [x], [Type::Tensor]);
        g.insert_after(call, n);
        assert_eq!(
            g.validate(),
            Err(ValidationError::CalleeNotConstant { node: call })
        );
    }

    /// Serializes `graph`, lets `corrupt` edit the JSON, and reads it back.
    fn corrupted(graph: &Graph, corrupt: impl FnOnce(&mut serde_json::Value)) -> Graph {
        let mut json = serde_json::to_value(graph).unwrap();
        corrupt(&mut json);
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn dangling_handles() {
        let (g, n) = simple();
        let root = g.root_block();

        let g2 = corrupted(&g, |json| json["blocks"][0]["param"] = 99.into());
        assert_eq!(
            g2.validate(),
            Err(ValidationError::BrokenBlock {
                block: root,
                node: Node::new(99)
            })
        );

        let g2 = corrupted(&g, |json| json["nodes"][n.index()]["next"] = 42.into());
        assert_eq!(
            g2.validate(),
            Err(ValidationError::BrokenBlock {
                block: root,
                node: Node::new(42)
            })
        );

        let g2 = corrupted(&g, |json| json["nodes"][n.index()]["outputs"][0] = 7.into());
        assert_matches!(
            g2.validate(),
            Err(ValidationError::WrongProducer { value, node, offset: 0 }) => {
                assert_eq!(value, Value::new(7));
                assert_eq!(node, n);
            }
        );

        let g2 = corrupted(&g, |json| json["root"] = 5.into());
        assert_matches!(g2.validate(), Err(ValidationError::WrongBlockOwner { .. }));
    }

    #[test]
    fn constant_with_wrong_producer() {
        let mut b = GraphBuilder::new();
        let len = Callable::from(BuiltinFunction::new("builtins.len".parse().unwrap()));
        let x = b.add_input(Type::Tensor);
        let n = b.call_function(len, [x], [Type::Int]);
        let g = b.finish(n).unwrap();
        let call = g.producer(g.graph_outputs()[0]);
        let callee = g.input(call, 0).unwrap();

        let g2 = corrupted(&g, |json| json["values"][callee.index()]["producer"] = 64.into());
        assert_matches!(g2.validate(), Err(ValidationError::WrongProducer { .. }));
    }

    #[test]
    fn method_call_needs_name() {
        let (mut g, n) = simple();
        let x = g.graph_inputs()[0];
        let call = g.create_node(OpType::CallMethod, [x], [Type::Tensor]);
        g.insert_after(call, n);
        assert_eq!(
            g.validate(),
            Err(ValidationError::MalformedMethodCall { node: call })
        );
        g.set_attr(call, NAME_ATTR, "forward");
        assert_eq!(g.validate(), Ok(()));
    }
}
