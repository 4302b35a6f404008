//! User-defined functions and closures.

use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{Env, Environment};
use crate::value::Value;

/// A function value: a declaration paired with the frame chain that was live
/// where it was defined.
pub struct LoxFunction<'a> {
    declaration: &'a FunctionDecl<'a>,
    closure: Env<'a>,
    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(declaration: &'a FunctionDecl<'a>, closure: Env<'a>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn declaration(&self) -> &'a FunctionDecl<'a> {
        self.declaration
    }

    pub fn closure(&self) -> &Env<'a> {
        &self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    pub fn arity(&self) -> usize {
        self.declaration.arity()
    }

    pub fn name(&self) -> &'a str {
        self.declaration.display_name()
    }

    /// A new function sharing this declaration whose closure gains one frame
    /// binding `this` to `instance`.  `self` is left untouched.
    pub fn bind(&self, instance: Rc<LoxInstance<'a>>) -> LoxFunction<'a> {
        debug!("Binding method '{}' to an instance", self.name());

        let environment: Env<'a> = Environment::child_of(&self.closure);
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration,
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    /// The instance an initializer returns: `this` in its own closure.
    pub fn bound_this(&self) -> Value<'a> {
        self.closure.borrow().get_at(0, "this")
    }
}

// Closures usually reach back to the frame that stores them, so the derived
// impl would recurse forever.
impl fmt::Debug for LoxFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
