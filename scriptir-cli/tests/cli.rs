//! Tests for the CLI
//!
//! Miri is globally disabled for these tests because they mostly involve
//! calling the CLI binary, which Miri doesn't support.
#![cfg(all(test, not(miri)))]

use std::sync::Arc;

use assert_cmd::Command;
use assert_fs::NamedTempFile;
use assert_fs::assert::PathAssert;
use assert_fs::fixture::FileWriteStr;
use predicates::{prelude::*, str::contains};
use rstest::{fixture, rstest};
use scriptir_cli::validate::VALID_PRINT;
use scriptir_core::builder::GraphBuilder;
use scriptir_core::callable::{Callable, GraphFunction};
use scriptir_core::ops::{OpType, Symbol};
use scriptir_core::types::Type;
use scriptir_core::Graph;

#[fixture]
fn cmd() -> Command {
    Command::cargo_bin("scriptir").unwrap()
}

#[fixture]
fn val_cmd(mut cmd: Command) -> Command {
    cmd.arg("validate");
    cmd
}

#[fixture]
fn sub_cmd(mut cmd: Command) -> Command {
    cmd.arg("substitute");
    cmd
}

/// `def f(x): return interpolate(x) + helpers.scale(x)`
#[fixture]
fn test_graph() -> Graph {
    let interpolate = {
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.add_op(Symbol::aten("upsample_nearest2d"), [x], [Type::Tensor]);
        let body = b.finish(y).unwrap();
        Arc::new(Callable::from(GraphFunction::new(
            "torch.nn.functional.interpolate".parse().unwrap(),
            body,
        )))
    };
    let scale = {
        let mut b = GraphBuilder::new();
        let x = b.add_input(Type::Tensor);
        let y = b.add_op(Symbol::aten("mul"), [x, x], [Type::Tensor]);
        let body = b.finish(y).unwrap();
        Arc::new(Callable::from(GraphFunction::new(
            "helpers.scale".parse().unwrap(),
            body,
        )))
    };
    let mut b = GraphBuilder::new();
    let x = b.add_named_input("x", Type::Tensor);
    let y = b.call_function(interpolate, [x], [Type::Tensor]);
    let z = b.call_function(scale, [x], [Type::Tensor]);
    let out = b.add_op(Symbol::aten("add"), [y[0], z[0]], [Type::Tensor]);
    b.finish(out).unwrap()
}

#[fixture]
fn test_graph_string(test_graph: Graph) -> String {
    serde_json::to_string(&test_graph).unwrap()
}

#[fixture]
fn test_graph_file(test_graph_string: String) -> NamedTempFile {
    let file = NamedTempFile::new("sample.json").unwrap();
    file.write_str(&test_graph_string).unwrap();
    file
}

/// A function call whose callee is not a constant.
#[fixture]
fn bad_graph_string() -> String {
    let mut g = Graph::new();
    let x = g.add_graph_input(Type::Tensor);
    let call = g.create_node(OpType::CallFunction, [x], [Type::Tensor]);
    g.append_node(g.root_block(), call);
    g.register_graph_output(g.outputs(call)[0]);
    serde_json::to_string(&g).unwrap()
}

/// The test graph, with the parameter of its root block pointing to a node
/// that does not exist.
#[fixture]
fn dangling_graph_string(test_graph: Graph) -> String {
    let mut json = serde_json::to_value(&test_graph).unwrap();
    json["blocks"][0]["param"] = 99.into();
    json.to_string()
}

/// Counts the nodes of each operation in the root block of `graph`.
fn count_ops(graph: &Graph, op: &str) -> usize {
    graph
        .block_nodes(graph.root_block())
        .filter(|&n| graph.op(n).to_string() == op)
        .count()
}

fn parse_output(output: &[u8]) -> Graph {
    serde_json::from_slice(output).unwrap()
}

#[rstest]
fn test_doesnt_exist(mut val_cmd: Command) {
    val_cmd.arg("foobar");
    val_cmd
        .assert()
        .failure()
        .stderr(contains("No such file or directory"));
}

#[rstest]
fn test_validate(test_graph_file: NamedTempFile, mut val_cmd: Command) {
    val_cmd.arg(test_graph_file.path());
    val_cmd.assert().success().stderr(contains(VALID_PRINT));
}

#[rstest]
fn test_stdin_silent(test_graph_string: String, mut val_cmd: Command) {
    val_cmd.args(["-", "-q"]);
    val_cmd.write_stdin(test_graph_string);

    val_cmd
        .assert()
        .success()
        .stderr(contains(VALID_PRINT).not());
}

#[rstest]
fn test_bad_graph(bad_graph_string: String, mut val_cmd: Command) {
    val_cmd.write_stdin(bad_graph_string);
    val_cmd.arg("-");

    val_cmd
        .assert()
        .failure()
        .stderr(contains("Invalid graph").and(contains("function constant")));
}

#[rstest]
fn test_bad_json(mut val_cmd: Command) {
    val_cmd.write_stdin(r#"{"foo": "bar"}"#);
    val_cmd.arg("-");

    val_cmd
        .assert()
        .failure()
        .stderr(contains("Error parsing input"));
}

#[rstest]
fn test_bad_json_silent(mut val_cmd: Command) {
    val_cmd.write_stdin(r#"{"foo": "bar"}"#);
    val_cmd.args(["-", "-qqq"]);

    val_cmd
        .assert()
        .failure()
        .stderr(contains("Error parsing input").not());
}

#[rstest]
fn test_print(test_graph_string: String, mut cmd: Command) {
    cmd.arg("print");
    cmd.write_stdin(test_graph_string);

    cmd.assert()
        .success()
        .stdout(contains("graph(%x.0 : Tensor):").and(contains("prim::CallFunction")));
}

#[rstest]
fn test_substitute(test_graph_string: String, mut sub_cmd: Command) {
    sub_cmd.write_stdin(test_graph_string);

    let output = sub_cmd.assert().success().stderr(contains("1 substituted, 1 inlined"));
    let graph = parse_output(&output.get_output().stdout);
    graph.validate().unwrap();
    assert_eq!(count_ops(&graph, "aten::__interpolate"), 1);
    assert_eq!(count_ops(&graph, "aten::mul"), 1);
    assert_eq!(count_ops(&graph, "prim::CallFunction"), 0);
}

#[rstest]
fn test_substitute_text(test_graph_file: NamedTempFile, mut sub_cmd: Command) {
    let out = NamedTempFile::new("out.txt").unwrap();
    sub_cmd.arg(test_graph_file.path());
    sub_cmd.args(["--text", "-o"]).arg(out.path());

    sub_cmd.assert().success();
    out.assert(contains("aten::__interpolate(%x.0)").and(contains("aten::mul(%x.0, %x.0)")));
}

#[rstest]
fn test_no_default_rules(test_graph_string: String, mut sub_cmd: Command) {
    sub_cmd.write_stdin(test_graph_string);
    sub_cmd.args(["--no-default-rules", "-q"]);

    let output = sub_cmd.assert().success().stderr(contains("inlined").not());
    let graph = parse_output(&output.get_output().stdout);
    assert_eq!(count_ops(&graph, "aten::__interpolate"), 0);
    assert_eq!(count_ops(&graph, "aten::upsample_nearest2d"), 1);
}

#[rstest]
fn test_custom_rules(test_graph_string: String, mut sub_cmd: Command) {
    sub_cmd.write_stdin(test_graph_string);
    sub_cmd.args(["--rule", "helpers.scale=custom::scale"]);
    sub_cmd.args(["--rule", "torch.nn.functional.interpolate=inline"]);

    let output = sub_cmd.assert().success();
    let graph = parse_output(&output.get_output().stdout);
    assert_eq!(count_ops(&graph, "custom::scale"), 1);
    assert_eq!(count_ops(&graph, "aten::upsample_nearest2d"), 1);
    assert_eq!(count_ops(&graph, "aten::__interpolate"), 0);
}

#[rstest]
fn test_bad_rule(test_graph_string: String, mut sub_cmd: Command) {
    sub_cmd.write_stdin(test_graph_string);
    sub_cmd.args(["--rule", "interpolate"]);

    sub_cmd
        .assert()
        .failure()
        .stderr(contains("Invalid substitution rule"));
}

#[rstest]
fn test_substitute_bad_graph(bad_graph_string: String, mut sub_cmd: Command) {
    sub_cmd.write_stdin(bad_graph_string);

    sub_cmd
        .assert()
        .failure()
        .stderr(contains("Call substitution failed").and(contains("Failed to validate input graph")));
}

#[rstest]
#[case("validate")]
#[case("print")]
#[case("substitute")]
fn test_dangling_handle(dangling_graph_string: String, mut cmd: Command, #[case] subcommand: &str) {
    cmd.arg(subcommand);
    cmd.write_stdin(dangling_graph_string);

    cmd.assert()
        .failure()
        .stderr(contains("Block(0) is not a well-formed node list at Node(99)"))
        .stderr(contains("panicked").not());
}
