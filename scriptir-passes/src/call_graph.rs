//! Data structure for the graph of inlinable calls reachable from a [`Graph`].
use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use scriptir_core::callable::{GraphFunction, QualifiedName};
use scriptir_core::graph::ValidationError;
use scriptir_core::ops::OpType;
use scriptir_core::{Graph, Node};

use crate::call_substitution::{CallSite, SubstitutionTable, resolve_call};

/// Weight for a node in a [`CallGraph`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallGraphNode {
    /// The graph the call graph was built from.
    Root,
    /// A callable with a graph body, identified by its qualified name.
    Callable(QualifiedName),
}

/// Weight for an edge in a [`CallGraph`]. The node is a call inside the body
/// of the edge source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallGraphEdge {
    /// Edge corresponds to a [`CallFunction`](OpType::CallFunction) node.
    Function(Node),
    /// Edge corresponds to a [`CallMethod`](OpType::CallMethod) node.
    Method(Node),
}

/// The body of a callable to inline failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Body of {callee} is invalid: {err}")]
pub struct InvalidCallee {
    /// The callable.
    pub callee: QualifiedName,
    /// The first violation found in its body.
    #[source]
    pub err: ValidationError,
}

/// Details the calls that a [`CallSubstitutionPass`] would inline, starting
/// from a graph and following the bodies of the callees.
///
/// Callables are identified by their qualified names: all callables sharing a
/// name are a single node, with the calls of each of their distinct bodies.
/// Calls that are substituted by an operation, calls to callables without a
/// graph body and malformed calls do not appear.
///
/// [`CallSubstitutionPass`]: crate::CallSubstitutionPass
#[derive(Debug)]
pub struct CallGraph {
    g: petgraph::Graph<CallGraphNode, CallGraphEdge>,
    node_to_g: HashMap<QualifiedName, NodeIndex<u32>>,
    root: NodeIndex<u32>,
}

type Pending<'a> = VecDeque<(NodeIndex<u32>, &'a GraphFunction)>;

impl CallGraph {
    /// Makes a new `CallGraph` for the calls in `graph` and, transitively, in
    /// the bodies of the callables it inlines according to `table`.
    ///
    /// `graph` is trusted, but every body reached is validated before its
    /// calls are followed.
    ///
    /// # Errors
    ///
    /// If the body of a callable to inline is invalid.
    pub fn new(graph: &Graph, table: &SubstitutionTable) -> Result<Self, InvalidCallee> {
        let mut g = petgraph::Graph::default();
        let root = g.add_node(CallGraphNode::Root);
        let mut node_to_g = HashMap::new();
        // Addresses of the bodies already queued.
        let mut seen = HashSet::new();
        let mut queue = Pending::new();
        traverse(graph, root, table, &mut g, &mut node_to_g, &mut seen, &mut queue);
        while let Some((enclosing, function)) = queue.pop_front() {
            function.graph().validate().map_err(|err| InvalidCallee {
                callee: function.qualname().clone(),
                err,
            })?;
            traverse(
                function.graph(),
                enclosing,
                table,
                &mut g,
                &mut node_to_g,
                &mut seen,
                &mut queue,
            );
        }

        fn traverse<'a>(
            graph: &'a Graph,
            enclosing: NodeIndex<u32>,
            table: &SubstitutionTable,
            g: &mut petgraph::Graph<CallGraphNode, CallGraphEdge>,
            node_to_g: &mut HashMap<QualifiedName, NodeIndex<u32>>,
            seen: &mut HashSet<*const GraphFunction>,
            queue: &mut Pending<'a>,
        ) {
            for node in graph.descendants(graph.root_block()) {
                let Ok(Some(CallSite::Inline(function))) = resolve_call(graph, node, table) else {
                    continue;
                };
                let weight = match graph.op(node) {
                    OpType::CallMethod => CallGraphEdge::Method(node),
                    _ => CallGraphEdge::Function(node),
                };
                let target = *node_to_g
                    .entry(function.qualname().clone())
                    .or_insert_with(|| g.add_node(CallGraphNode::Callable(function.qualname().clone())));
                if seen.insert(std::ptr::from_ref(function)) {
                    queue.push_back((target, function));
                }
                g.add_edge(enclosing, target, weight);
            }
        }

        Ok(CallGraph { g, node_to_g, root })
    }

    /// Allows access to the petgraph
    #[must_use]
    pub fn graph(&self) -> &petgraph::Graph<CallGraphNode, CallGraphEdge> {
        &self.g
    }

    /// The node of the graph the call graph was built from.
    #[must_use]
    pub fn root(&self) -> NodeIndex<u32> {
        self.root
    }

    /// Convert a qualified name to the petgraph node for that callable, if it
    /// is called.
    pub fn node_index(&self, name: &QualifiedName) -> Option<NodeIndex<u32>> {
        self.node_to_g.get(name).copied()
    }

    /// The callables called, directly or not, from the graph.
    pub fn callables(&self) -> impl Iterator<Item = &QualifiedName> + '_ {
        self.g.node_weights().filter_map(|w| match w {
            CallGraphNode::Callable(name) => Some(name),
            CallGraphNode::Root => None,
        })
    }

    /// Groups of callables calling each other recursively, including those
    /// calling themselves. Each group, and the list of groups, is sorted.
    pub fn recursive_callables(&self) -> Vec<Vec<QualifiedName>> {
        let g = &self.g;
        tarjan_scc(g)
            .into_iter()
            .filter(|scc| match scc.as_slice() {
                // Single-node SCC without a self edge is not recursive
                [n] => g.contains_edge(*n, *n),
                _ => true,
            })
            .map(|scc| {
                scc.into_iter()
                    .filter_map(|n| match &g[n] {
                        CallGraphNode::Callable(name) => Some(name.clone()),
                        CallGraphNode::Root => None,
                    })
                    .sorted()
                    .collect_vec()
            })
            .sorted()
            .collect()
    }
}
