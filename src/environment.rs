//! Runtime scope chain.
//!
//! A frame maps names to values and points at its enclosing frame.  Frames are
//! shared (`Rc<RefCell<_>>`) and only ever point from child to parent, so the
//! graph is a tree: a closure keeps its defining frames alive by holding one
//! more share of the innermost one, and mutation through any share is visible
//! to every other holder.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to a frame.
pub type Env<'a> = Rc<RefCell<Environment<'a>>>;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<String, Value<'a>>,
    enclosing: Option<Env<'a>>,
}

impl<'a> Environment<'a> {
    /// A root (global) frame.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Env<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Fresh shared frame whose parent is `enclosing`.
    pub fn child_of(enclosing: &Env<'a>) -> Env<'a> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Names bound directly in this frame.
    pub fn names(&self) -> impl Iterator<Item = &str> + use<'_, 'a> {
        self.values.keys().map(String::as_str)
    }

    /// Bind `name` in this frame, overwriting any previous binding here.
    pub fn define(&mut self, name: &str, value: Value<'a>) {
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up from this frame outwards.
    pub fn get(&self, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrite the innermost existing binding of `name`.
    pub fn assign(&mut self, name: &Token<'_>, value: Value<'a>) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Read `name` from the frame exactly `distance` parents up.
    ///
    /// # Panics
    ///
    /// If the chain is shorter than `distance` or the frame lacks `name`: the
    /// resolver computed a distance that does not match the runtime frames.
    pub fn get_at(&self, distance: usize, name: &str) -> Value<'a> {
        if distance == 0 {
            trace!("get_at: '{}' found in current frame", name);

            return match self.values.get(name) {
                Some(value) => value.clone(),
                None => panic!("resolved variable '{}' missing from its frame", name),
            };
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name),
            None => panic!(
                "scope chain too short resolving '{}' ({} frame(s) left)",
                name, distance
            ),
        }
    }

    /// Write `name` in the frame exactly `distance` parents up.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Self::get_at`].
    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value<'a>) {
        if distance == 0 {
            match self.values.get_mut(name) {
                Some(slot) => *slot = value,
                None => panic!("resolved variable '{}' missing from its frame", name),
            }
            return;
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_at(distance - 1, name, value),
            None => panic!(
                "scope chain too short assigning '{}' ({} frame(s) left)",
                name, distance
            ),
        }
    }

    /// Number of frames between this one and the root, inclusive of neither.
    pub fn depth(&self) -> usize {
        match &self.enclosing {
            Some(enclosing) => 1 + enclosing.borrow().depth(),
            None => 0,
        }
    }
}

fn undefined(name: &Token<'_>) -> LoxError {
    LoxError::runtime(name.line, format!("Undefined variable '{}'.", name.lexeme))
}
