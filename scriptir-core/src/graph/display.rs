//! Textual rendering of a [`Graph`], in the style of TorchScript IR dumps.
//!
//! ```text
//! graph(%x.0 : Tensor):
//!   %1 : Function<__torch__.f> = prim::Constant()
//!   %2 : Tensor = prim::CallFunction(%1, %x.0)
//!   return (%2)
//! ```

use std::fmt::{self, Write};

use itertools::Itertools;

use super::Graph;
use crate::{Block, Node, Value};

impl Graph {
    /// Displays a single node, without its nested blocks.
    pub fn display_node(&self, node: Node) -> impl fmt::Display + '_ {
        NodeDisplay { graph: self, node }
    }

    /// Renders a single node, without its nested blocks.
    pub fn node_string(&self, node: Node) -> String {
        self.display_node(node).to_string()
    }

    fn value_name(&self, value: Value) -> String {
        match self.debug_name(value) {
            Some(name) => format!("%{name}.{}", value.index()),
            None => format!("%{}", value.index()),
        }
    }

    fn value_list(&self, values: &[Value]) -> String {
        values.iter().map(|&v| self.value_name(v)).join(", ")
    }

    fn typed_value_list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|&v| format!("{} : {}", self.value_name(v), self.value_type(v)))
            .join(", ")
    }

    fn fmt_node_header(&self, f: &mut impl Write, node: Node) -> fmt::Result {
        let outputs = self.outputs(node);
        if !outputs.is_empty() {
            write!(f, "{} = ", self.typed_value_list(outputs))?;
        }
        write!(f, "{}", self.op(node))?;
        let mut attrs = self.attrs(node).peekable();
        if attrs.peek().is_some() {
            write!(f, "[{}]", attrs.map(|(k, v)| format!("{k}={v}")).join(", "))?;
        }
        write!(f, "({})", self.value_list(self.inputs(node)))
    }

    fn fmt_block_body(&self, f: &mut impl Write, block: Block, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for node in self.block_nodes(block) {
            f.write_str(&indent)?;
            self.fmt_node_header(f, node)?;
            f.write_char('\n')?;
            for (i, &nested) in self.node_blocks(node).iter().enumerate() {
                writeln!(
                    f,
                    "{indent}  block{i}({}):",
                    self.typed_value_list(self.block_inputs(nested))
                )?;
                self.fmt_block_body(f, nested, depth + 2)?;
                writeln!(
                    f,
                    "{indent}    -> ({})",
                    self.value_list(self.block_outputs(nested))
                )?;
            }
        }
        Ok(())
    }
}

struct NodeDisplay<'a> {
    graph: &'a Graph,
    node: Node,
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.graph.fmt_node_header(f, self.node)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root_block();
        writeln!(f, "graph({}):", self.typed_value_list(self.block_inputs(root)))?;
        self.fmt_block_body(f, root, 1)?;
        writeln!(f, "  return ({})", self.value_list(self.block_outputs(root)))
    }
}
