// ABOUTME: Compile-time values occupying the bound-value slot of an environment

use crate::env::Environment;
use crate::inst::{CondId, SeqId};
use crate::ops::Builtin;
use crate::sexpr::Sexpr;
use std::fmt;
use std::rc::Rc;

/// A lambda abstraction: formal parameter names, body expression and the
/// environment captured at the point of its definition. Immutable; every
/// call site gets its own activation.
#[derive(Debug)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Sexpr,
    pub env: Rc<Environment>,
}

/// A handle to one argument slot of a lambda activation.
///
/// Parameters store no value of their own; the slot is addressed through
/// the owning activation, so two activations of the same lambda yield
/// distinct parameters and references stay unambiguous across nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub owner: SeqId,
    pub slot: usize,
    pub symbol: String,
}

/// Everything a symbol can be bound to at compile time.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    /// A literal expression produced by quote, kept unevaluated.
    Quoted(Sexpr),
    /// Nothing, or a result that already sits on the runtime stack.
    Nil,
    Lambda(Rc<Lambda>),
    /// A stored sub-program in the compilation unit's arena.
    Seq(SeqId),
    Param(Parameter),
    Builtin(Builtin),
    /// A deferred two-way choice.
    Cond(CondId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Quoted(_) => "quoted expression",
            Value::Nil => "nil",
            Value::Lambda(_) => "lambda",
            Value::Seq(_) => "sequence",
            Value::Param(_) => "parameter",
            Value::Builtin(_) => "operator",
            Value::Cond(_) => "conditional",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Quoted(sexpr) => write!(f, "'{}", sexpr),
            Value::Nil => write!(f, "nil"),
            Value::Lambda(lambda) => write!(f, "#<lambda/{}>", lambda.params.len()),
            Value::Seq(id) => write!(f, "#<sequence @{}>", id.0),
            Value::Param(p) => write!(f, "{}", p.symbol),
            Value::Builtin(b) => write!(f, "#<operator {}>", b.name()),
            Value::Cond(id) => write!(f, "#<conditional @{}>", id.0),
        }
    }
}
