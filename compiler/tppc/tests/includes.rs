//! Multi-file parsing: include resolution and the visited-path guard.

use std::fs;
use std::path::Path;

use tpp_codegen::interp::{Interpreter, Val};
use tpp_ir::{Expr, ExprKind};
use tpp_types::CompilationSession;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("write test file");
}

fn parse_nodes(path: &Path) -> Vec<Expr> {
    let session = CompilationSession::new();
    let mut nodes = Vec::new();
    tpp_parse::parse_file(path, &session, &mut |expr| {
        nodes.push(expr);
        Ok(())
    })
    .expect("parse failed");
    nodes
}

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("lib")).expect("mkdir");
    write(dir.path(), "main.tpp", "include \"lib/util.tpp\"\ndef i32 a = 1");
    write(
        &dir.path().join("lib"),
        "util.tpp",
        "def i32 util:helper(i32 x) = x",
    );

    let nodes = parse_nodes(&dir.path().join("main.tpp"));
    assert_eq!(nodes.len(), 2);
    assert!(matches!(
        &nodes[0].kind,
        ExprKind::DefFunction { name, .. } if name.to_string() == "util:helper"
    ));
}

#[test]
fn diamond_includes_parse_the_common_file_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "common.tpp", "def i32 shared = 7");
    write(dir.path(), "a.tpp", "include \"common.tpp\"\ndef i32 a = 1");
    write(dir.path(), "b.tpp", "include \"common.tpp\"\ndef i32 b = 2");
    write(
        dir.path(),
        "main.tpp",
        "include \"a.tpp\"\ninclude \"b.tpp\"\ndef i32 m = 3",
    );

    let nodes = parse_nodes(&dir.path().join("main.tpp"));
    let shared_count = nodes
        .iter()
        .filter(|n| {
            matches!(
                &n.kind,
                ExprKind::DefVariable { name, .. } if name.to_string() == "shared"
            )
        })
        .count();
    assert_eq!(shared_count, 1, "common.tpp must be parsed exactly once");
    // shared, a, b, m
    assert_eq!(nodes.len(), 4);
}

#[test]
fn included_definitions_are_usable_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "math.tpp", "def i32 square(i32 x) = x * x");
    write(
        dir.path(),
        "main.tpp",
        "include \"math.tpp\"\ndef i32 main() = square(6)",
    );

    let module = tppc::compile_file(&dir.path().join("main.tpp")).expect("compile failed");
    let mut interp = Interpreter::new(&module).expect("init failed");
    assert_eq!(interp.call("main", vec![]), Ok(Val::Int(36)));
}

#[test]
fn missing_include_is_a_file_open_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "main.tpp", "include \"nope.tpp\"");
    let session = CompilationSession::new();
    let err = tpp_parse::parse_file(&dir.path().join("main.tpp"), &session, &mut |_| Ok(()))
        .expect_err("missing include must fail");
    assert!(matches!(err.kind, tpp_diagnostic::ErrorKind::FileOpen { .. }));
}
