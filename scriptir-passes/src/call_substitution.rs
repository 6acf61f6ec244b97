//! Pass replacing calls to graph functions and methods, either by a dedicated
//! operation or by the inlined body of the callee.
//!
//! This runs before export to an operator set without function calls: after
//! the pass, no call node whose callee has a graph body remains anywhere in
//! the graph, including in nested blocks.

mod table;

use itertools::Itertools;
use scriptir_core::callable::{Callable, GraphFunction, QualifiedName};
use scriptir_core::graph::patch::{InlineCall, InlineCallError, ReplaceOp, ReplaceOpError};
use scriptir_core::ops::{NAME_ATTR, OpType};
use scriptir_core::{Block, Graph, Node};
use smol_str::SmolStr;
use tracing::{debug, trace};

pub use table::{CallRule, InvalidRule, SubstitutionRule, SubstitutionTable};

use crate::call_graph::{CallGraph, InvalidCallee};
use crate::composable::ComposablePass;
use crate::validation::{ValidatePassError, ValidationLevel};

/// Replaces function and method calls by dedicated operations, or by the
/// recursively processed bodies of their callees.
///
/// Function calls whose callee matches the [`SubstitutionTable`] with a
/// [`CallRule::SubstituteOp`] are replaced by a single node of that operation.
/// Other calls to callees with a graph body are inlined, after the calls in a
/// copy of that body have been processed the same way. Calls to callees
/// without a graph body are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSubstitutionPass {
    table: SubstitutionTable,
    validation: ValidationLevel,
}

impl Default for CallSubstitutionPass {
    fn default() -> Self {
        Self {
            table: SubstitutionTable::onnx(),
            validation: ValidationLevel::default(),
        }
    }
}

/// Counts of the rewrites performed by a [`CallSubstitutionPass`], including
/// those inside callee bodies before they were inlined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
#[display("{substituted} substituted, {inlined} inlined, {opaque} left opaque")]
pub struct SubstitutionReport {
    /// Calls replaced by a dedicated operation.
    pub substituted: usize,
    /// Calls replaced by the body of their callee.
    pub inlined: usize,
    /// Calls left in place because their callee has no graph body.
    pub opaque: usize,
}

/// Error raised by [`CallSubstitutionPass`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CallSubstitutionError {
    /// A function call whose first input is not a constant function reference.
    #[error("Function call {node} does not take a constant function reference as its first input")]
    CalleeNotConstant {
        /// The call node.
        node: Node,
    },
    /// A method call without a method name.
    #[error("Method call {node} has no `name` attribute")]
    MissingMethodName {
        /// The call node.
        node: Node,
    },
    /// A method call naming a method its receiver class does not define.
    #[error("Class {class} has no method {name:?}")]
    UnknownMethod {
        /// The receiver class.
        class: QualifiedName,
        /// The method name.
        name: SmolStr,
    },
    /// The callables to inline call each other recursively.
    #[error("Recursive calls between {}", .cycle.iter().join(", "))]
    RecursiveCall {
        /// The callables forming the cycle.
        cycle: Vec<QualifiedName>,
    },
    /// The body of a callable to inline is invalid.
    #[error(transparent)]
    InvalidCallee(#[from] InvalidCallee),
    /// Inlining a call failed.
    #[error(transparent)]
    Inline(#[from] InlineCallError),
    /// Substituting a call failed.
    #[error(transparent)]
    Replace(#[from] ReplaceOpError),
    /// The graph was invalid before or after the pass.
    #[error(transparent)]
    ValidationError(#[from] ValidatePassError),
}

/// How a call node is handled by the pass.
#[derive(Debug, Clone)]
pub(crate) enum CallSite<'a> {
    /// Replace the call by the operation, dropping the callee reference.
    Substitute(OpType),
    /// Inline the body of the callee.
    Inline(&'a GraphFunction),
    /// Leave the call alone.
    Opaque(Option<&'a Callable>),
}

/// Classifies a node. Returns `None` if it is not a call.
pub(crate) fn resolve_call<'a>(
    graph: &'a Graph,
    node: Node,
    table: &SubstitutionTable,
) -> Result<Option<CallSite<'a>>, CallSubstitutionError> {
    match graph.op(node) {
        OpType::CallFunction => {
            let callable = graph
                .input(node, 0)
                .filter(|&callee| *graph.op(graph.producer(callee)) == OpType::Constant)
                .and_then(|callee| graph.value_type(callee).as_function())
                .ok_or(CallSubstitutionError::CalleeNotConstant { node })?
                .callable();
            Ok(Some(match table.lookup(callable.qualname()) {
                Some(CallRule::SubstituteOp(op)) => CallSite::Substitute(op.clone()),
                _ => body_or_opaque(callable),
            }))
        }
        OpType::CallMethod => {
            let name = graph
                .attr_str(node, NAME_ATTR)
                .ok_or(CallSubstitutionError::MissingMethodName { node })?;
            let Some(class) = graph
                .input(node, 0)
                .and_then(|receiver| graph.value_type(receiver).as_class())
            else {
                return Ok(Some(CallSite::Opaque(None)));
            };
            let method =
                class
                    .get_method(name)
                    .ok_or_else(|| CallSubstitutionError::UnknownMethod {
                        class: class.class().qualname().clone(),
                        name: name.into(),
                    })?;
            Ok(Some(body_or_opaque(method)))
        }
        _ => Ok(None),
    }
}

fn body_or_opaque(callable: &Callable) -> CallSite<'_> {
    match callable.as_graph_function() {
        Some(function) => CallSite::Inline(function),
        None => CallSite::Opaque(Some(callable)),
    }
}

impl CallSubstitutionPass {
    /// Sets the table of substitution rules. The default is
    /// [`SubstitutionTable::onnx`].
    pub fn with_table(mut self, table: SubstitutionTable) -> Self {
        self.table = table;
        self
    }

    /// Sets the validation level used to check the graph before and after
    /// the pass.
    pub fn validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation = level;
        self
    }

    /// The table of substitution rules.
    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    /// Run the pass over the whole graph.
    ///
    /// # Errors
    ///
    /// - [`CallSubstitutionError::RecursiveCall`] if the callables to inline
    ///   call each other recursively, or
    ///   [`CallSubstitutionError::InvalidCallee`] if the body of one of them
    ///   is invalid. Both are detected before the graph is modified, whatever
    ///   the validation level.
    /// - [`CallSubstitutionError::CalleeNotConstant`],
    ///   [`CallSubstitutionError::MissingMethodName`] or
    ///   [`CallSubstitutionError::UnknownMethod`] on a malformed call. The
    ///   rewrites performed before it was encountered are kept.
    /// - [`CallSubstitutionError::ValidationError`] if validation is enabled
    ///   and the graph is invalid.
    pub fn run(&self, graph: &mut Graph) -> Result<SubstitutionReport, CallSubstitutionError> {
        self.validation.run_validated_pass(graph, |graph| {
            let call_graph = CallGraph::new(graph, &self.table)?;
            if let Some(cycle) = call_graph.recursive_callables().into_iter().next() {
                return Err(CallSubstitutionError::RecursiveCall { cycle });
            }
            trace!("Before stop-inlining calls: \n{graph}");
            let mut report = SubstitutionReport::default();
            let root = graph.root_block();
            self.substitute_block(graph, root, &mut report)?;
            trace!("After stop-inlining calls: \n{graph}");
            Ok(report)
        })
    }

    fn substitute_block(
        &self,
        graph: &mut Graph,
        block: Block,
        report: &mut SubstitutionReport,
    ) -> Result<(), CallSubstitutionError> {
        let mut cursor = graph.first_node(block);
        while let Some(node) = cursor {
            // The current node may be replaced, so move on before rewriting it.
            cursor = graph.next_node(node);
            match resolve_call(graph, node, &self.table)? {
                Some(CallSite::Substitute(op)) => {
                    let call = graph.node_string(node);
                    let new_node = graph.apply_patch(ReplaceOp::new(node, op).skip_inputs(1))?;
                    debug!("Replaced {call} by {}", graph.display_node(new_node));
                    report.substituted += 1;
                }
                Some(CallSite::Inline(function)) => {
                    let callee = function.qualname().clone();
                    let body = function.graph().clone();
                    self.inline_body(graph, node, &callee, body, report)?;
                }
                Some(CallSite::Opaque(callable)) => {
                    match callable {
                        Some(c) => trace!("Keeping call to '{}': {}", c.qualname(), graph.display_node(node)),
                        None => trace!("Keeping call on a non-class receiver: {}", graph.display_node(node)),
                    }
                    report.opaque += 1;
                }
                None => {
                    for nested in graph.node_blocks(node).to_vec() {
                        self.substitute_block(graph, nested, report)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Processes `body`, a copy of the body of `callee`, then inlines it in
    /// place of the call `node`.
    fn inline_body(
        &self,
        graph: &mut Graph,
        node: Node,
        callee: &QualifiedName,
        mut body: Graph,
        report: &mut SubstitutionReport,
    ) -> Result<(), CallSubstitutionError> {
        let root = body.root_block();
        self.substitute_block(&mut body, root, report)?;
        trace!("Processed body of '{callee}': \n{body}");
        debug!("Inlining function '{callee}' to {}", graph.display_node(node));
        graph.apply_patch(InlineCall::new(node, &body))?;
        report.inlined += 1;
        Ok(())
    }
}

impl ComposablePass for CallSubstitutionPass {
    type Error = CallSubstitutionError;
    type Result = SubstitutionReport;

    fn run(&self, graph: &mut Graph) -> Result<SubstitutionReport, CallSubstitutionError> {
        self.run(graph)
    }
}

/// Replaces calls in `graph` according to the ONNX [`SubstitutionTable`],
/// with the default validation level.
///
/// # Errors
///
/// See [`CallSubstitutionPass::run`].
pub fn substitute_calls(graph: &mut Graph) -> Result<SubstitutionReport, CallSubstitutionError> {
    CallSubstitutionPass::default().run(graph)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};
    use scriptir_core::builder::GraphBuilder;
    use scriptir_core::callable::{BuiltinFunction, GraphFunction};
    use scriptir_core::ops::Symbol;
    use scriptir_core::types::{ClassDef, ClassType, Type};

    use super::*;
    use crate::validation::ValidationStage;

    fn qn(s: &str) -> QualifiedName {
        s.parse().unwrap()
    }

    fn ops(graph: &Graph, block: Block) -> Vec<String> {
        graph
            .block_nodes(block)
            .map(|n| graph.op(n).to_string())
            .collect()
    }

    fn root_ops(graph: &Graph) -> Vec<String> {
        ops(graph, graph.root_block())
    }

    /// A graph function with a unary tensor body applying `ops` in turn.
    fn unary(name: &str, ops: &[&str]) -> Arc<Callable> {
        let mut b = GraphBuilder::new();
        let mut x = b.add_input(Type::Tensor);
        for op in ops {
            x = b.add_op(Symbol::aten(*op), [x], [Type::Tensor])[0];
        }
        let body = b.finish([x]).unwrap();
        Arc::new(GraphFunction::new(qn(name), body).into())
    }

    #[fixture]
    fn interpolate() -> Arc<Callable> {
        unary("__torch__.torch.nn.functional.interpolate", &["upsample_nearest2d"])
    }

    #[fixture]
    fn model_class() -> ClassType {
        let forward = {
            let mut b = GraphBuilder::new();
            let _this = b.add_input(Type::Tensor);
            let x = b.add_input(Type::Tensor);
            let y = b.add_op(Symbol::aten("sigmoid"), [x], [Type::Tensor]);
            GraphFunction::new(qn("__torch__.Model.forward"), b.finish(y).unwrap())
        };
        let size = BuiltinFunction::new(qn("__torch__.Model.size"));
        ClassType::new(
            ClassDef::new(qn("__torch__.Model"))
                .with_method("forward", Callable::from(forward))
                .with_method("size", Callable::from(size)),
        )
    }

    #[rstest]
    fn substitute_interpolate(interpolate: Arc<Callable>) {
        let mut b = GraphBuilder::new();
        let x = b.add_named_input("x", Type::Tensor);
        let scale = b.add_constant(2.0, Type::Float);
        let y = b.call_function(interpolate, [x, scale], [Type::Tensor]);
        let mut g = b.finish(y).unwrap();
        let out = g.graph_outputs()[0];
        g.set_debug_name(out, "up");

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!(
            report,
            SubstitutionReport {
                substituted: 1,
                ..Default::default()
            }
        );
        assert_eq!(
            root_ops(&g),
            ["prim::Constant", "prim::Constant", "aten::__interpolate"]
        );
        let new_out = g.graph_outputs()[0];
        let new_node = g.producer(new_out);
        assert_eq!(g.inputs(new_node), [x, scale]);
        assert_eq!(g.outputs(new_node).len(), 1);
        assert_eq!(g.debug_name(new_out), Some("up"));
        assert_eq!(g.value_type(new_out), &Type::Tensor);
    }

    #[rstest]
    fn inline_function_and_method(model_class: ClassType) {
        let helper = unary("__torch__.helper", &["relu", "neg"]);
        let mut b = GraphBuilder::new();
        let this = b.add_named_input("self", model_class.into());
        let x = b.add_input(Type::Tensor);
        let y = b.call_function(helper, [x], [Type::Tensor]);
        let z = b.call_method(this, "forward", y, [Type::Tensor]);
        let mut g = b.finish(z).unwrap();

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!(report.inlined, 2);
        assert_eq!(
            root_ops(&g),
            ["prim::Constant", "aten::relu", "aten::neg", "aten::sigmoid"]
        );
        let last = g.producer(g.graph_outputs()[0]);
        assert_eq!(g.op(last), &OpType::Op(Symbol::aten("sigmoid")));
    }

    #[rstest]
    fn opaque_method_untouched(model_class: ClassType) {
        let mut b = GraphBuilder::new();
        let this = b.add_input(model_class.into());
        let n = b.call_method(this, "size", [], [Type::Int]);
        let mut g = b.finish(n).unwrap();
        let before = g.clone();

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!(report.opaque, 1);
        assert_eq!(g, before);
    }

    #[rstest]
    fn unknown_method(model_class: ClassType) {
        let mut b = GraphBuilder::new();
        let this = b.add_input(model_class.into());
        let n = b.call_method(this, "backward", [], [Type::Tensor]);
        let mut g = b.finish(n).unwrap();
        assert_matches!(
            CallSubstitutionPass::default().run(&mut g),
            Err(CallSubstitutionError::UnknownMethod { class, name }) => {
                assert_eq!(class.to_string(), "__torch__.Model");
                assert_eq!(name, "backward");
            }
        );
    }

    #[rstest]
    fn calls_inside_nested_blocks(interpolate: Arc<Callable>) {
        let helper = unary("__torch__.helper", &["relu"]);
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let c = b.add_constant(true, Type::Bool);
        let out = b
            .add_if(
                c,
                [Type::Tensor],
                |b| b.call_function(helper, [x], [Type::Tensor]),
                |b| b.call_function(interpolate, [x], [Type::Tensor]),
            )
            .unwrap();
        let mut g = b.finish(out).unwrap();

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!((report.inlined, report.substituted), (1, 1));
        let cond = g.producer(g.graph_outputs()[0]);
        let [then_block, else_block] = g.node_blocks(cond) else {
            panic!("expected two branches")
        };
        assert_eq!(ops(&g, *then_block), ["prim::Constant", "aten::relu"]);
        assert_eq!(ops(&g, *else_block), ["prim::Constant", "aten::__interpolate"]);
    }

    #[rstest]
    fn callee_processed_before_inlining(interpolate: Arc<Callable>) {
        let resize = {
            let mut b = GraphBuilder::new();
            let x = b.add_input(Type::Tensor);
            let y = b.call_function(interpolate, [x], [Type::Tensor]);
            let body = b.finish(y).unwrap();
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.resize"), body)))
        };
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.call_function(resize.clone(), [x], [Type::Tensor]);
        let z = b.call_function(resize.clone(), y, [Type::Tensor]);
        let mut g = b.finish(z).unwrap();

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!((report.inlined, report.substituted), (2, 2));
        assert!(g.descendants(g.root_block()).all(|n| !g.op(n).is_call()));
        // The shared callee body is not modified.
        let body = resize.as_graph_function().unwrap().graph();
        assert_eq!(ops(body, body.root_block()), ["prim::Constant", "prim::CallFunction"]);
    }

    #[test]
    fn builtin_function_call_kept() {
        let len = Callable::from(BuiltinFunction::new(qn("builtins.len")));
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let n = b.call_function(len, [x], [Type::Int]);
        let mut g = b.finish(n).unwrap();
        let before = g.clone();
        assert_eq!(substitute_calls(&mut g).unwrap().opaque, 1);
        assert_eq!(g, before);
    }

    #[rstest]
    fn empty_table_inlines_interpolate(interpolate: Arc<Callable>) {
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.call_function(interpolate, [x], [Type::Tensor]);
        let mut g = b.finish(y).unwrap();
        let pass = CallSubstitutionPass::default().with_table(SubstitutionTable::new());
        assert!(pass.table().is_empty());
        pass.run(&mut g).unwrap();
        assert_eq!(root_ops(&g), ["prim::Constant", "aten::upsample_nearest2d"]);
    }

    #[test]
    fn recursive_callables_rejected() {
        // `f` calls a function named `g`, whose body calls a function named `f`.
        let leaf_f = unary("__torch__.f", &["relu"]);
        let g_fn = {
            let mut b = GraphBuilder::new();
            let x = b.add_input(Type::Tensor);
            let y = b.call_function(leaf_f, [x], [Type::Tensor]);
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.g"), b.finish(y).unwrap())))
        };
        let f = {
            let mut b = GraphBuilder::new();
            let x = b.add_input(Type::Tensor);
            let y = b.call_function(g_fn, [x], [Type::Tensor]);
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.f"), b.finish(y).unwrap())))
        };
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.call_function(f, [x], [Type::Tensor]);
        let mut g = b.finish(y).unwrap();
        let before = g.clone();

        assert_matches!(
            CallSubstitutionPass::default().run(&mut g),
            Err(CallSubstitutionError::RecursiveCall { cycle }) => {
                assert_eq!(cycle, [qn("__torch__.f"), qn("__torch__.g")]);
            }
        );
        assert_eq!(g, before);
    }

    #[test]
    fn invalid_input_reported() {
        let mut g = Graph::new();
        let x = g.add_graph_input(Type::Tensor);
        let call = g.create_node(OpType::CallFunction, [x], [Type::Tensor]);
        g.append_node(g.root_block(), call);
        g.register_graph_output(g.outputs(call)[0]);

        assert_matches!(
            CallSubstitutionPass::default().run(&mut g),
            Err(CallSubstitutionError::ValidationError(ValidatePassError {
                stage: ValidationStage::Input,
                ..
            }))
        );
        assert_eq!(
            CallSubstitutionPass::default()
                .validation_level(ValidationLevel::None)
                .run(&mut g),
            Err(CallSubstitutionError::CalleeNotConstant { node: call })
        );
    }

    #[test]
    fn invalid_callee_body_rejected() {
        // The body returns the output of a node that is in no block.
        let mut body = Graph::new();
        let x = body.add_graph_input(Type::Tensor);
        let orphan = body.create_node(Symbol::aten("relu"), [x], [Type::Tensor]);
        body.register_graph_output(body.outputs(orphan)[0]);
        let broken = Callable::from(GraphFunction::new(qn("__torch__.broken"), body));

        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.call_function(broken, [x], [Type::Tensor]);
        let mut g = b.finish(y).unwrap();
        let before = g.clone();

        for level in [ValidationLevel::Validate, ValidationLevel::None] {
            assert_matches!(
                CallSubstitutionPass::default().validation_level(level).run(&mut g),
                Err(CallSubstitutionError::InvalidCallee(InvalidCallee { callee, .. })) => {
                    assert_eq!(callee, qn("__torch__.broken"));
                }
            );
            assert_eq!(g, before);
        }
    }

    #[test]
    fn method_calling_method_on_receiver() {
        let helper = unary("__torch__.Net.helper", &["relu", "neg"]);
        // Inside `forward`, the receiver class only needs to provide `helper`.
        let receiver =
            ClassType::new(ClassDef::new(qn("__torch__.Net")).with_method("helper", helper.clone()));
        let forward = {
            let mut b = GraphBuilder::new();
            let this = b.add_input(receiver.into());
            let x = b.add_input(Type::Tensor);
            let y = b.call_method(this, "helper", [x], [Type::Tensor]);
            let z = b.add_op(Symbol::aten("sigmoid"), y, [Type::Tensor]);
            let body = b.finish(z).unwrap();
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.Net.forward"), body)))
        };
        let class = ClassType::new(
            ClassDef::new(qn("__torch__.Net"))
                .with_method("helper", helper)
                .with_method("forward", forward.clone()),
        );

        let mut b = GraphBuilder::new();
        let this = b.add_named_input("self", class.into());
        let x = b.add_input(Type::Tensor);
        let y = b.call_method(this, "forward", [x], [Type::Tensor]);
        let mut g = b.finish(y).unwrap();

        let report = CallSubstitutionPass::default().run(&mut g).unwrap();
        assert_eq!(report.inlined, 2);
        assert_eq!(root_ops(&g), ["aten::relu", "aten::neg", "aten::sigmoid"]);
        assert!(g.uses(this).is_empty());
        let relu = g.first_node(g.root_block()).unwrap();
        assert_eq!(g.inputs(relu), [x]);

        // The shared body of `forward` still holds its own call.
        let body = forward.as_graph_function().unwrap().graph();
        assert_eq!(ops(body, body.root_block()), ["prim::CallMethod", "aten::sigmoid"]);
    }

    #[test]
    fn multi_output_calls() {
        // Substituted: two tensor outputs.
        let split = {
            let mut b = GraphBuilder::new();
            let x = b.add_input(Type::Tensor);
            let parts = b.add_op(Symbol::aten("split"), [x], [Type::Tensor, Type::Tensor]);
            let body = b.finish(parts).unwrap();
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.ops.split2"), body)))
        };
        // Inlined: returns its arguments in swapped order, one through `relu`.
        let swap = {
            let mut b = GraphBuilder::new();
            let x = b.add_input(Type::Tensor);
            let k = b.add_input(Type::Int);
            let y = b.add_op(Symbol::aten("relu"), [x], [Type::Tensor]);
            let body = b.finish([k, y[0]]).unwrap();
            Arc::new(Callable::from(GraphFunction::new(qn("__torch__.swap"), body)))
        };

        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let k = b.add_input(Type::Int);
        let parts = b.call_function(split, [x], [Type::Tensor, Type::Tensor]);
        let swapped = b.call_function(swap, [parts[1], k], [Type::Int, Type::Tensor]);
        let sum = b.add_op(Symbol::aten("add"), [parts[0], swapped[1]], [Type::Tensor]);
        let mut g = b.finish([sum[0], swapped[0]]).unwrap();
        g.set_debug_name(parts[0], "lo");
        g.set_debug_name(parts[1], "hi");

        let table = SubstitutionTable::new().with_rule(
            qn("ops"),
            "split2",
            CallRule::SubstituteOp(Symbol::aten("split2").into()),
        );
        let report = CallSubstitutionPass::default().with_table(table).run(&mut g).unwrap();
        assert_eq!((report.substituted, report.inlined), (1, 1));
        assert_eq!(
            root_ops(&g),
            ["prim::Constant", "aten::split2", "prim::Constant", "aten::relu", "aten::add"]
        );

        // The substituted node keeps both outputs, in order, with their names.
        let [out, k_out] = g.graph_outputs() else {
            panic!("expected two outputs")
        };
        assert_eq!(*k_out, k);
        let add = g.producer(*out);
        let [lo, relu_out] = g.inputs(add) else {
            panic!("expected two inputs")
        };
        let split_node = g.producer(*lo);
        assert_eq!(g.op(split_node), &OpType::from(Symbol::aten("split2")));
        assert_eq!(g.inputs(split_node), [x]);
        let [lo_new, hi_new] = g.outputs(split_node) else {
            panic!("expected two outputs")
        };
        assert_eq!(lo_new, lo);
        assert_eq!(g.debug_name(*lo_new), Some("lo"));
        assert_eq!(g.debug_name(*hi_new), Some("hi"));
        assert!(g.outputs(split_node).iter().all(|&v| g.value_type(v) == &Type::Tensor));

        // Each output of the inlined call is rewired to the matching body output.
        let relu = g.producer(*relu_out);
        assert_eq!(g.inputs(relu), [*hi_new]);
    }
}
