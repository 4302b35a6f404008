mod common;

use rox::error::LoxError;
use rox::parser::Parser;
use rox::resolver::{Locals, Resolver};
use rox::scanner::scan_all;

fn resolve(source: &str) -> Result<Locals, Vec<LoxError>> {
    let tokens = scan_all(source).unwrap();
    let statements = Parser::new(&tokens).parse().unwrap();

    Resolver::new().resolve(&statements)
}

/// Distances of every resolved local, sorted.
fn distances(source: &str) -> Vec<usize> {
    let locals = resolve(source).unwrap();
    let mut distances: Vec<usize> = locals.values().copied().collect();
    distances.sort_unstable();
    distances
}

fn resolve_errors(source: &str) -> Vec<(usize, String)> {
    match resolve(source) {
        Ok(_) => Vec::new(),
        Err(errors) => errors
            .iter()
            .map(|e| (e.line().unwrap_or(0), e.message()))
            .collect(),
    }
}

#[test]
fn test_globals_are_left_unresolved() {
    assert!(resolve("var a = 1; print a; a = 2;").unwrap().is_empty());
    assert!(resolve("fun f() { return g; }").unwrap().is_empty());
}

#[test]
fn test_block_local_distances() {
    assert_eq!(distances("{ var a = 1; print a; }"), [0]);
    assert_eq!(distances("{ var a = 1; { print a; } }"), [1]);
    assert_eq!(distances("{ var a = 1; { { a = 2; } } }"), [2]);
}

#[test]
fn test_parameters_and_closures() {
    assert_eq!(distances("fun f(x) { print x; }"), [0]);
    assert_eq!(distances("fun f() { var x = 1; fun g() { print x; } }"), [1]);
    assert_eq!(distances("fun f(x) { return fun () { return x; }; }"), [1]);
}

#[test]
fn test_recursive_local_function_sees_itself() {
    // `f` is defined in the block, then read from inside its own body.
    assert_eq!(distances("{ fun f() { f(); } }"), [1]);
}

#[test]
fn test_this_resolves_through_method_frame() {
    assert_eq!(distances("class A { m() { print this; } }"), [1]);
    assert_eq!(distances("class A { m() { { print this; } } }"), [2]);
}

#[test]
fn test_super_sits_one_frame_beyond_this() {
    let source = "class A {} class B < A { m() { super.m(); } }";

    assert_eq!(distances(source), [2]);
}

#[test]
fn test_shadowing_initializer_reads_outer_binding() {
    // Outer `a` is global, so only the inner declaration's own use is local.
    assert_eq!(distances("var a = 1; { var a = a + 1; print a; }"), [0]);

    // Both reads are local: the initializer's one frame out.
    assert_eq!(distances("{ var a = 1; { var a = a + 1; print a; } }"), [0, 1]);
}

#[test]
fn test_resolving_twice_is_idempotent() {
    let source = "
        fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }
        class A { m() { return this; } }
        class B < A { m() { { var x = super.m(); return x; } } }
        { var c = make(); print c(); }
    ";
    let tokens = scan_all(source).unwrap();
    let statements = Parser::new(&tokens).parse().unwrap();

    let first = Resolver::new().resolve(&statements).unwrap();
    let second = Resolver::new().resolve(&statements).unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_duplicate_declaration_in_same_scope() {
    assert_eq!(
        resolve_errors("{\n var a = 1;\n var a = 2;\n}"),
        [(3, "Already a variable with this name in this scope.".to_string())]
    );
    assert_eq!(
        resolve_errors("fun f(a, a) {}"),
        [(1, "Already a variable with this name in this scope.".to_string())]
    );

    // Globals may be redeclared.
    assert!(resolve_errors("var a = 1; var a = 2;").is_empty());
}

#[test]
fn test_read_in_own_initializer() {
    assert_eq!(
        resolve_errors("{ var a = a; }"),
        [(1, "Can't read local variable in its own initializer.".to_string())]
    );

    // Only globals declared before the block count as an outer binding.
    assert_eq!(
        resolve_errors("{ var b = b; }\nvar b = 1;"),
        [(1, "Can't read local variable in its own initializer.".to_string())]
    );
    assert!(resolve_errors("var b = 1; { var b = b; }").is_empty());
    assert!(resolve_errors("fun f(b) { { var b = b; } }").is_empty());
}

#[test]
fn test_misplaced_return() {
    assert_eq!(
        resolve_errors("return 1;"),
        [(1, "Can't return from top-level code.".to_string())]
    );
    assert_eq!(
        resolve_errors("class A { init() { return 1; } }"),
        [(1, "Can't return a value from an initializer.".to_string())]
    );

    assert!(resolve_errors("class A { init() { return; } }").is_empty());
}

#[test]
fn test_misplaced_loop_control() {
    assert_eq!(
        resolve_errors("break;"),
        [(1, "Can't have break outside of loop.".to_string())]
    );
    assert_eq!(
        resolve_errors("continue;"),
        [(1, "Can't have continue outside of loop.".to_string())]
    );

    // A loop around a function definition is not around its body.
    assert_eq!(
        resolve_errors("while (true) { fun f() { break; } }"),
        [(1, "Can't have break outside of loop.".to_string())]
    );

    assert!(resolve_errors("while (true) { if (true) break; else continue; }").is_empty());
}

#[test]
fn test_misplaced_this_and_super() {
    assert_eq!(
        resolve_errors("print this;"),
        [(1, "Can't use 'this' outside of a class.".to_string())]
    );
    assert_eq!(
        resolve_errors("fun f() { super.m(); }"),
        [(1, "Can't use 'super' outside of a class.".to_string())]
    );
    assert_eq!(
        resolve_errors("class A { m() { super.m(); } }"),
        [(1, "Can't use 'super' in a class with no superclass.".to_string())]
    );
}

#[test]
fn test_class_inheriting_from_itself() {
    assert_eq!(
        resolve_errors("class A < A {}"),
        [(1, "A class can't inherit from itself.".to_string())]
    );
}

#[test]
fn test_errors_accumulate_without_stopping() {
    let errors = resolve_errors("return;\nbreak;\n{ var a = 1; var a = 2; }\nprint this;");
    let lines: Vec<usize> = errors.iter().map(|(line, _)| *line).collect();

    assert_eq!(lines, [1, 2, 3, 4]);
}

#[test]
fn test_static_errors_prevent_execution() {
    let (output, errors) = common::run("print \"before\";\nreturn;");

    assert_eq!(output, "");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].to_string(),
        "[line 2] Error: Can't return from top-level code."
    );
}
