//! Property-based tests for static resolution.
//!
//! Random programs nest blocks, immediately-called functions, methods and
//! subclass methods around declarations, assignments and prints over a small
//! pool of names.  A scope-stack model of the same program predicts what it
//! prints, so any distance the resolver gets wrong shows up either as a panic
//! in the frame lookup or as a wrong value.

mod common;

use std::collections::HashMap;
use std::fmt::Write as _;

use proptest::prelude::*;

use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::scan_all;

/// Variables are named `v0` .. `v3`.
const NAMES: usize = 4;

const PRELUDE: &str = "var v0 = 0; var v1 = 0; var v2 = 0; var v3 = 0;
class Base { describe() { return \"base\"; } }
";

#[derive(Debug, Clone)]
enum Item {
    /// `var vN = vS + value;` or `var vN = value;`
    Decl {
        name: usize,
        source: Option<usize>,
        value: i64,
    },

    /// `vN = vN + value;`
    Assign { name: usize, value: i64 },

    Print(usize),

    Block(Vec<Item>),

    /// Body of a function that is called right after its declaration.
    Function(Vec<Item>),

    /// Body of a method, called on a fresh instance.
    Method(Vec<Item>),

    /// Body of a method in a subclass of `Base`; also prints `super.describe()`.
    SubclassMethod(Vec<Item>),
}

fn item_strategy() -> impl Strategy<Value = Item> {
    let leaf = prop_oneof![
        (0..NAMES, proptest::option::of(0..NAMES), 0i64..10)
            .prop_map(|(name, source, value)| Item::Decl { name, source, value }),
        (0..NAMES, 0i64..10).prop_map(|(name, value)| Item::Assign { name, value }),
        (0..NAMES).prop_map(Item::Print),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        let body = prop::collection::vec(inner, 0..6);

        prop_oneof![
            body.clone().prop_map(Item::Block),
            body.clone().prop_map(Item::Function),
            body.clone().prop_map(Item::Method),
            body.prop_map(Item::SubclassMethod),
        ]
    })
}

/// Lox source for a list of items, plus the lines it should print.
struct Program {
    source: String,
    expected: Vec<String>,
    scopes: Vec<HashMap<usize, i64>>,
    next_label: usize,
}

impl Program {
    fn build(items: &[Item]) -> Self {
        let globals: HashMap<usize, i64> = (0..NAMES).map(|name| (name, 0)).collect();

        let mut program = Program {
            source: PRELUDE.to_string(),
            expected: Vec::new(),
            scopes: vec![globals],
            next_label: 0,
        };
        program.render(items);
        program
    }

    fn lookup(&self, name: usize) -> i64 {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
            .expect("every name has a global binding")
    }

    fn store(&mut self, name: usize, value: i64) {
        let scope = self
            .scopes
            .iter_mut()
            .rev()
            .find(|scope| scope.contains_key(&name))
            .expect("every name has a global binding");
        scope.insert(name, value);
    }

    fn label(&mut self) -> usize {
        self.next_label += 1;
        self.next_label
    }

    fn nested(&mut self, items: &[Item]) {
        self.scopes.push(HashMap::new());
        self.render(items);
        self.scopes.pop();
    }

    fn render(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Decl {
                    name,
                    source,
                    value,
                } => {
                    let (init, text) = match source {
                        Some(source) => (
                            self.lookup(*source) + value,
                            format!("v{} + {}", source, value),
                        ),
                        None => (*value, value.to_string()),
                    };

                    let is_global = self.scopes.len() == 1;
                    let redeclaration = self.scopes.last().is_some_and(|s| s.contains_key(name));

                    if redeclaration && !is_global {
                        // Locals can't be redeclared; assign instead.
                        writeln!(self.source, "v{} = {};", name, text).unwrap();
                        self.store(*name, init);
                    } else {
                        writeln!(self.source, "var v{} = {};", name, text).unwrap();
                        if let Some(scope) = self.scopes.last_mut() {
                            scope.insert(*name, init);
                        }
                    }
                }

                Item::Assign { name, value } => {
                    writeln!(self.source, "v{0} = v{0} + {1};", name, value).unwrap();
                    let updated = self.lookup(*name) + value;
                    self.store(*name, updated);
                }

                Item::Print(name) => {
                    writeln!(self.source, "print v{};", name).unwrap();
                    let value = self.lookup(*name);
                    self.expected.push(value.to_string());
                }

                Item::Block(body) => {
                    self.source.push_str("{\n");
                    self.nested(body);
                    self.source.push_str("}\n");
                }

                Item::Function(body) => {
                    let label = self.label();
                    writeln!(self.source, "fun f{}() {{", label).unwrap();
                    self.nested(body);
                    writeln!(self.source, "}}\nf{}();", label).unwrap();
                }

                Item::Method(body) => {
                    let label = self.label();
                    writeln!(self.source, "class C{} {{ m() {{", label).unwrap();
                    self.nested(body);
                    writeln!(self.source, "}} }}\nC{}().m();", label).unwrap();
                }

                Item::SubclassMethod(body) => {
                    let label = self.label();
                    writeln!(self.source, "class C{} < Base {{ m() {{", label).unwrap();
                    self.nested(body);
                    writeln!(
                        self.source,
                        "print super.describe();\n}} }}\nC{}().m();",
                        label
                    )
                    .unwrap();
                    self.expected.push("base".to_string());
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn resolved_distances_match_runtime_frames(
        items in prop::collection::vec(item_strategy(), 0..8)
    ) {
        let program = Program::build(&items);
        let (output, errors) = common::run(&program.source);

        prop_assert!(
            errors.is_empty(),
            "errors {:?} in program:\n{}",
            errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            program.source
        );

        let lines: Vec<String> = output.lines().map(str::to_owned).collect();
        prop_assert_eq!(lines, program.expected, "program:\n{}", program.source);
    }

    #[test]
    fn resolving_twice_yields_identical_tables(
        items in prop::collection::vec(item_strategy(), 0..8)
    ) {
        let program = Program::build(&items);
        let tokens = scan_all(&program.source).unwrap();
        let statements = Parser::new(&tokens).parse().unwrap();

        let first = Resolver::new().resolve(&statements).unwrap();
        let second = Resolver::new().resolve(&statements).unwrap();

        prop_assert_eq!(first, second);
    }
}
