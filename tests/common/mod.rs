#![allow(dead_code)]

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::scan_all;

/// Scan, parse, resolve and interpret `source`, capturing everything the
/// program prints.  Stops at the first stage that reports errors.
pub fn run(source: &str) -> (String, Vec<LoxError>) {
    let tokens = match scan_all(source) {
        Ok(tokens) => tokens,
        Err(errors) => return (String::new(), errors),
    };

    let mut parser = Parser::new(&tokens);
    let statements = match parser.parse() {
        Ok(statements) => statements,
        Err(errors) => return (String::new(), errors),
    };

    let mut interpreter = Interpreter::with_output(Vec::new());

    let locals = match Resolver::with_globals(interpreter.global_names()).resolve(&statements) {
        Ok(locals) => locals,
        Err(errors) => return (String::new(), errors),
    };

    interpreter.resolve(locals);

    let result = interpreter.interpret(&statements);
    let output = String::from_utf8(interpreter.into_output()).expect("program output is UTF-8");

    match result {
        Ok(()) => (output, Vec::new()),
        Err(e) => (output, vec![e]),
    }
}

/// Output of a program expected to run cleanly.
pub fn output_of(source: &str) -> String {
    let (output, errors) = run(source);

    assert!(
        errors.is_empty(),
        "unexpected errors: {:?}\noutput so far:\n{}",
        errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        output
    );

    output
}

/// Printed lines of a program expected to run cleanly.
pub fn lines_of(source: &str) -> Vec<String> {
    output_of(source).lines().map(str::to_owned).collect()
}

/// Messages of every error the program produced.
pub fn messages_of(source: &str) -> Vec<String> {
    run(source).1.iter().map(LoxError::message).collect()
}
