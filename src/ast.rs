//! **Abstract syntax tree** produced by the [`Parser`](crate::parser::Parser).
//!
//! Nodes borrow their tokens (`&'a Token<'a>`) from the token buffer, so the
//! tree lives exactly as long as the source it was parsed from.  The tree is
//! never mutated after parsing; the resolver and the interpreter only read it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

/// Identity of an expression node that takes part in variable resolution.
///
/// Two syntactically identical `x` references at different positions get
/// different ids, so the resolver's distance table can be keyed by id rather
/// than by node address or structural equality.  Ids are drawn from one
/// process-wide counter, so trees from separate parses never share an id and
/// one interpreter can take in the distance tables of several programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    /// An id no other node has been given.
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies the value out of the token so evaluation never has to
/// look at token payloads again.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// Parameters and body shared by named functions, anonymous function literals
/// and class methods.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl<'a> {
    /// `None` for an anonymous `fun (…) { … }` literal.
    pub name: Option<&'a Token<'a>>,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<&'a Token<'a>>,

    pub body: Vec<Stmt<'a>>,
}

impl<'a> FunctionDecl<'a> {
    /// Name used when the function value is printed.
    pub fn display_name(&self) -> &'a str {
        self.name.map_or("anonymous", |t| t.lexeme)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Every kind of *expression* in Lox.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr<'a>>),

    /// Prefix unary operator expression, e.g. `!isReady` or `-42`.
    Unary {
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Infix arithmetic / comparison / equality expression.
    Binary {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// `condition ? then_branch : else_branch`
    Ternary {
        condition: Box<Expr<'a>>,
        then_branch: Box<Expr<'a>>,
        else_branch: Box<Expr<'a>>,
    },

    /// Variable access.
    Variable { id: ExprId, name: &'a Token<'a> },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Function‑, method‑ or constructor‑call expression.
    Call {
        callee: Box<Expr<'a>>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: &'a Token<'a>,
        arguments: Vec<Expr<'a>>,
    },

    /// object.property
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// object.property = value
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: &'a Token<'a> },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    },

    /// Anonymous function literal `fun (params) { body }`.
    Function(FunctionDecl<'a>),
}

/// Complete executable constructs.  A program is a sequence of these nodes
/// returned by [`Parser::parse`](crate::parser::Parser::parse).
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr<'a>),

    /// `print` statement used for output.
    Print(Expr<'a>),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt<'a>>),

    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// `while` loop.  `increment` is only set by the `for` desugaring and runs
    /// after every iteration, including one cut short by `continue`.
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
        increment: Option<Expr<'a>>,
    },

    Break(&'a Token<'a>),

    Continue(&'a Token<'a>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for diagnostics).
        keyword: &'a Token<'a>,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr<'a>>,
    },

    /// Named function declaration; `name` is always `Some`.
    Function(FunctionDecl<'a>),

    Class {
        name: &'a Token<'a>,

        /// Always an [`Expr::Variable`] when present.
        superclass: Option<Expr<'a>>,

        methods: Vec<FunctionDecl<'a>>,
    },
}
