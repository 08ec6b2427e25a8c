// ABOUTME: Environment chain for scoped symbol resolution

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A scope's bindings plus an optional parent, forming a cactus stack.
/// Lookup walks outward; binding writes only to the innermost scope.
#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new top-level environment with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment with a parent
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Binds a name in THIS scope, shadowing any parent binding
    pub fn bind(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up a symbol in THIS scope and parent scopes recursively
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }

        if let Some(ref parent) = self.parent {
            return parent.lookup(name);
        }

        None
    }

    /// Returns the scope that owns a name, walking the parent chain
    pub fn reference(self: &Rc<Self>, name: &str) -> Option<Rc<Environment>> {
        if self.bindings.borrow().contains_key(name) {
            return Some(self.clone());
        }

        if let Some(ref parent) = self.parent {
            return parent.reference(name);
        }

        None
    }
}
