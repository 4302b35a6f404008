//! Tree‑walking evaluator.
//!
//! Statements execute against the current frame (`environment`); variable
//! references the resolver recorded in [`Locals`] are read at an exact frame
//! distance, everything else goes to `globals`.  Non‑local control transfer
//! (`return`, `break`, `continue`) travels back up as a [`Flow`] value next to
//! the `Result`, so it can never be confused with a runtime error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

use log::{debug, info, trace};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{Env, Environment};
use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{Callable, NativeFn, NativeFunction, Value};

/// How a statement finished.
#[derive(Debug)]
pub enum Flow<'a> {
    /// Ran to completion; continue with the next statement.
    Normal,

    /// A `return` is unwinding towards the nearest call.
    Return(Value<'a>),

    /// A `break` is unwinding towards the nearest loop.
    Break,

    /// A `continue` is unwinding towards the nearest loop.
    Continue,
}

pub struct Interpreter<'a, W = io::Stdout> {
    globals: Env<'a>,
    environment: Env<'a>,
    locals: Locals,
    output: W,
}

impl<'a> Interpreter<'a, io::Stdout> {
    /// Creates an Interpreter printing to stdout, with native functions such
    /// as `clock` already defined.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<'a> Default for Interpreter<'a, io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, W: Write> Interpreter<'a, W> {
    /// Creates an Interpreter whose `print` statements write to `output`.
    pub fn with_output(output: W) -> Self {
        info!("Initializing Interpreter");

        let globals: Env<'a> = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        };

        interpreter.define_native("clock", 0, clock);

        interpreter
    }

    /// Register a host function in the global frame.
    pub fn define_native(&mut self, name: &str, arity: usize, func: NativeFn<'a>) {
        debug!("Defining native function '{}' with arity {}", name, arity);

        let native = NativeFunction {
            name: name.to_string(),
            arity,
            func,
        };

        self.globals
            .borrow_mut()
            .define(name, Value::Callable(Callable::Native(Rc::new(native))));
    }

    /// Take in the resolver's distance table.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Noting {} resolved local reference(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Names currently bound in the global frame.
    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().names().map(str::to_string).collect()
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Interprets a resolved program.  Stops at the first runtime error.
    ///
    /// # Panics
    ///
    /// If a `return`, `break` or `continue` reaches the top level, which the
    /// resolver rules out for any program it accepted.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>]) -> Result<()> {
        info!("Interpreting {} statements", statements.len());

        let result: Result<()> = self.run_all(statements);
        self.output.flush()?;

        match &result {
            Ok(()) => info!("Interpretation completed successfully"),
            Err(e) => info!("Interpretation aborted: {}", e),
        }

        result
    }

    fn run_all(&mut self, statements: &'a [Stmt<'a>]) -> Result<()> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => unreachable!("{:?} signal escaped to top level", flow),
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value<'a> = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                trace!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value<'a> = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let frame: Env<'a> = Environment::child_of(&self.environment);
                self.execute_block(statements, frame)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }

                    if let Some(inc) = increment {
                        self.evaluate(inc)?;
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Continue(_) => Ok(Flow::Continue),

            Stmt::Return { value, .. } => {
                let value: Value<'a> = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.display_name());

                let function = LoxFunction::new(decl, Rc::clone(&self.environment), false);
                self.environment.borrow_mut().define(
                    decl.display_name(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `environment` as the current frame, restoring
    /// the previous frame afterwards whatever the outcome.
    pub fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: Env<'a>,
    ) -> Result<Flow<'a>> {
        let previous: Env<'a> = mem::replace(&mut self.environment, environment);

        let mut outcome: Result<Flow<'a>> = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;
        outcome
    }

    fn execute_class(
        &mut self,
        name: &'a Token<'a>,
        superclass: Option<&'a Expr<'a>>,
        methods: &'a [FunctionDecl<'a>],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass<'a>>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    let line: usize = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };
                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // declared first so methods can refer to their own class
        self.environment.borrow_mut().define(name.lexeme, Value::Nil);

        let method_env: Env<'a> = match &superclass {
            Some(parent) => {
                let frame: Env<'a> = Environment::child_of(&self.environment);
                frame
                    .borrow_mut()
                    .define("super", Value::Callable(Callable::Class(Rc::clone(parent))));
                frame
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<LoxFunction<'a>>> = methods
            .iter()
            .map(|method| {
                let is_initializer: bool = method.display_name() == INITIALIZER;
                let function = LoxFunction::new(method, Rc::clone(&method_env), is_initializer);
                (method.display_name().to_string(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(name.lexeme, superclass, methods);

        self.environment
            .borrow_mut()
            .assign(name, Value::Callable(Callable::Class(Rc::new(class))))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value<'a> = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value<'a> = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        self.environment
                            .borrow_mut()
                            .assign_at(distance, name.lexeme, value.clone());
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value<'a> = self.evaluate(callee)?;

                let mut arg_values: Vec<Value<'a>> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                let Value::Callable(callable) = callee_val else {
                    return Err(LoxError::runtime(
                        paren.line,
                        "Can only call functions and classes.",
                    ));
                };

                if arg_values.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        paren.line,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            arg_values.len()
                        ),
                    ));
                }

                self.call(&callable, arg_values, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields."));
                };

                let value: Value<'a> = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Function(decl) => {
                let function = LoxFunction::new(decl, Rc::clone(&self.environment), false);
                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }
        }
    }

    fn evaluate_unary(&mut self, op: &Token<'_>, right: &'a Expr<'a>) -> Result<Value<'a>> {
        let right_val: Value<'a> = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(op.line, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

            _ => unreachable!("parser only builds '-' and '!' unary expressions"),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &'a Expr<'a>,
        op: &Token<'_>,
        right: &'a Expr<'a>,
    ) -> Result<Value<'a>> {
        let left_val: Value<'a> = self.evaluate(left)?;
        let right_val: Value<'a> = self.evaluate(right)?;

        trace!(
            "Binary '{}' on {} and {}",
            op.lexeme,
            left_val.type_name(),
            right_val.type_name()
        );

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    op.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::COMMA => Ok(right_val),

            _ => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;

                match op.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH => {
                        if b == 0.0 {
                            Err(LoxError::runtime(op.line, "Division by zero."))
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    _ => unreachable!("parser never builds binary '{}'", op.lexeme),
                }
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token<'_>) -> Result<Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => {
                trace!("Looking up '{}' at distance {}", name.lexeme, distance);
                Ok(self.environment.borrow().get_at(distance, name.lexeme))
            }
            None => {
                trace!("Looking up '{}' in globals", name.lexeme);
                self.globals.borrow().get(name)
            }
        }
    }

    /// `super.method`: the superclass lives `distance` frames out, the bound
    /// `this` one frame closer.
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token<'_>,
        method: &Token<'_>,
    ) -> Result<Value<'a>> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(LoxError::runtime(
                keyword.line,
                "Can't use 'super' outside of a class.",
            ));
        };

        let superclass: Value<'a> = self.environment.borrow().get_at(distance, "super");
        let object: Value<'a> = self.environment.borrow().get_at(distance - 1, "this");

        let (Value::Callable(Callable::Class(superclass)), Value::Instance(instance)) =
            (superclass, object)
        else {
            unreachable!("'super' and 'this' frames hold a class and an instance");
        };

        match superclass.find_method(method.lexeme) {
            Some(found) => {
                let bound: LoxFunction<'a> = found.bind(instance);
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    /// Invoke a callable whose arity has already been checked.
    fn call(
        &mut self,
        callable: &Callable<'a>,
        args: Vec<Value<'a>>,
        paren: &Token<'_>,
    ) -> Result<Value<'a>> {
        debug!("Calling '{}' with {} argument(s)", callable.name(), args.len());

        match callable {
            Callable::Native(native) => {
                (native.func)(&args).map_err(|message| LoxError::runtime(paren.line, message))
            }

            Callable::Function(function) => self.call_function(function, args),

            Callable::Class(class) => {
                let instance: Rc<LoxInstance<'a>> = Rc::new(LoxInstance::new(Rc::clone(class)));

                if let Some(initializer) = class.find_method(INITIALIZER) {
                    let bound: LoxFunction<'a> = initializer.bind(Rc::clone(&instance));
                    self.call_function(&bound, args)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    /// One new frame under the closure, parameters bound positionally, body
    /// run as a block.  A `return` stops here and becomes the result.
    fn call_function(
        &mut self,
        function: &LoxFunction<'a>,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        let declaration: &'a FunctionDecl<'a> = function.declaration();
        let frame: Env<'a> = Environment::child_of(function.closure());

        {
            let mut bindings = frame.borrow_mut();
            for (param, arg) in declaration.params.iter().zip(args) {
                bindings.define(param.lexeme, arg);
            }
        }

        let flow: Flow<'a> = self.execute_block(&declaration.body, frame)?;

        if function.is_initializer() {
            return Ok(function.bound_this());
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
            Flow::Break | Flow::Continue => {
                unreachable!("loop signal escaped function '{}'", function.name())
            }
        }
    }
}

/// Both operands as numbers, or the shared "Operands must be numbers." error.
fn number_operands(op: &Token<'_>, left: &Value<'_>, right: &Value<'_>) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(op.line, "Operands must be numbers.")),
    }
}

/// `clock()`: seconds since the Unix epoch.
fn clock<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    let millis: i64 = chrono::Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}
