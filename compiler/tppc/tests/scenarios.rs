//! End-to-end scenarios: source text through parse, lowering, and the
//! reference interpreter.

use tpp_codegen::interp::{Interpreter, Val};
use tpp_diagnostic::ErrorKind;
use tppc::compile_str;

fn run(source: &str, entry: &str, args: Vec<Val>) -> Val {
    let module = compile_str(source, "scenario.tpp").expect("compilation failed");
    let mut interp = Interpreter::new(&module).expect("module init failed");
    interp.call(entry, args).expect("execution failed")
}

#[test]
fn add_function_lowers_and_computes() {
    let source = "
        def i32 add(i32 a, i32 b) = a + b
        def i32 main() = add(2, 3)
    ";
    assert_eq!(run(source, "main", vec![]), Val::Int(5));
}

#[test]
fn declared_lvalue_accepts_assignment() {
    let source = "
        def f64 x = 1
        x = 2.5
        def f64 get() = x
    ";
    assert_eq!(run(source, "get", vec![]), Val::Float(2.5));
}

#[test]
fn assigning_to_a_computed_value_fails() {
    let err = compile_str("def f64 x = 1 (1 + 1 = 2)", "scenario.tpp")
        .expect_err("assignment to an r-value must fail");
    assert_eq!(err.kind, ErrorKind::AssignToRValue);
}

#[test]
fn redeclaring_a_completed_struct_fails() {
    let source = "
        struct Point { i32 x, i32 y }
        struct Point { i32 x }
    ";
    let err = compile_str(source, "scenario.tpp").expect_err("redefinition must fail");
    assert!(matches!(err.kind, ErrorKind::RedefinedType { .. }));
}

#[test]
fn for_loop_iterates_five_times_in_order() {
    // The counter takes 0,1,2,3,4: five iterations, ascending.
    let source = "
        def i64 sum() = (
            def i64 total = 0
            def i64 hits = 0
            for [0, 5] -> i (
                total = total * 10 + i
                hits = hits + 1
            )
            total * 10 + hits
        )
    ";
    // Digits record the visit order; the last digit is the count.
    assert_eq!(run(source, "sum", vec![]), Val::Int(12345));
}

#[test]
fn for_loop_yields_its_last_body_value() {
    assert_eq!(
        run("def i64 last() = for [0, 5] -> i i", "last", vec![]),
        Val::Int(4)
    );
}

#[test]
fn block_local_names_are_discarded_on_exit() {
    let source = "
        def i32 main() = (
            ( def i32 inner = 1 inner )
            inner
        )
    ";
    let err = compile_str(source, "scenario.tpp").expect_err("inner must be out of scope");
    assert!(matches!(err.kind, ErrorKind::UndeclaredVariable { .. }));
}

#[test]
fn outer_name_rebound_in_a_block_is_restored_on_exit() {
    let source = "
        def i32 main() = (
            def i32 x = 1
            ( def i32 x = 99 x )
            x
        )
    ";
    assert_eq!(run(source, "main", vec![]), Val::Int(1));
}

#[test]
fn overloads_resolve_by_arity_with_variadic_fallback() {
    let source = "
        def i32 f(i32 a) = 100
        def i32 f(i32 a, i32 b, ?) = 200
        def i32 one() = f(1)
        def i32 two() = f(1, 2)
        def i32 three() = f(1, 2, 3)
    ";
    assert_eq!(run(source, "one", vec![]), Val::Int(100));
    assert_eq!(run(source, "two", vec![]), Val::Int(200));
    assert_eq!(run(source, "three", vec![]), Val::Int(200));
}

#[test]
fn namespaced_definitions_resolve_by_qualified_name() {
    let source = "
        : math
        def i32 double(i32 x) = x * 2
        : math
        def i32 main() = math:double(21)
    ";
    assert_eq!(run(source, "main", vec![]), Val::Int(42));
}

#[test]
fn structs_and_arrays_compose() {
    let source = "
        struct Point { i32 x, i32 y }
        def i32 main() = (
            def Point p = { 3, 4 }
            def i32 buf[2] = 0
            buf[0] = p.x
            buf[1] = p.y
            buf[0] * buf[0] + buf[1] * buf[1]
        )
    ";
    assert_eq!(run(source, "main", vec![]), Val::Int(25));
}

#[test]
fn conditionals_pick_the_taken_branch_value() {
    let source = "
        def i32 max(i32 a, i32 b) = if [a < b] b else a
    ";
    assert_eq!(
        run(source, "max", vec![Val::Int(3), Val::Int(9)]),
        Val::Int(9)
    );
    assert_eq!(
        run(source, "max", vec![Val::Int(9), Val::Int(3)]),
        Val::Int(9)
    );
}

#[test]
fn lex_errors_abort_with_location() {
    let err = compile_str("def i32 x = \"unterminated", "scenario.tpp")
        .expect_err("unterminated literal must fail");
    assert!(matches!(err.kind, ErrorKind::Lex { .. }));
    assert_eq!(err.location.row, 1);
}

#[test]
fn verification_covers_the_module_initializer() {
    // A module with only declarations still produces a verified, empty
    // initializer.
    let module = compile_str("def i32 x = 0", "scenario.tpp").expect("compilation failed");
    assert!(module.function_by_name(tpp_codegen::INIT_SYMBOL).is_some());
}
