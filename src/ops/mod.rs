//! # Intrinsic Operators
//!
//! The operators pre-populated into every top-level environment, organized
//! by the opcode patterns they lower to:
//!
//! - **[arithmetic]**: +, -, *, /, modulo, negate
//! - **[comparison]**: eq, neq, >, <, >=, <=
//! - **[logic]**: not, and, or
//! - **[conditional]**: if - the deferred two-way branch
//!
//! Operands are pushed by the evaluator before an operator applies, so a
//! lowering only ever appends opcodes (plus the occasional swap) to the
//! current sequence.

pub mod arithmetic;
pub mod comparison;
pub mod conditional;
pub mod logic;

use crate::env::Environment;
use crate::error::Error;
use crate::inst::SeqId;
use crate::program::Program;
use crate::value::Value;
use std::rc::Rc;

/// Argument discipline of an intrinsic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one argument.
    Unary,
    /// Exactly two arguments.
    Binary,
    /// Two or more arguments, folded left: `(- a b c)` is `(- (- a b) c)`.
    Associative,
    /// Raw branch expressions, dispatched by the evaluator before
    /// argument evaluation.
    Special,
}

/// The closed set of built-in operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    If,
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Modulo,
    Eq,
    Neq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    Not,
    And,
    Or,
}

const ALL: [Builtin; 16] = [
    Builtin::If,
    Builtin::Add,
    Builtin::Subtract,
    Builtin::Multiply,
    Builtin::Divide,
    Builtin::Negate,
    Builtin::Modulo,
    Builtin::Eq,
    Builtin::Neq,
    Builtin::Greater,
    Builtin::Less,
    Builtin::GreaterEq,
    Builtin::LessEq,
    Builtin::Not,
    Builtin::And,
    Builtin::Or,
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::If => "if",
            Builtin::Add => "+",
            Builtin::Subtract => "-",
            Builtin::Multiply => "*",
            Builtin::Divide => "/",
            Builtin::Negate => "negate",
            Builtin::Modulo => "modulo",
            Builtin::Eq => "eq",
            Builtin::Neq => "neq",
            Builtin::Greater => ">",
            Builtin::Less => "<",
            Builtin::GreaterEq => ">=",
            Builtin::LessEq => "<=",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Builtin::If => Arity::Special,
            Builtin::Add
            | Builtin::Subtract
            | Builtin::Multiply
            | Builtin::Divide
            | Builtin::And
            | Builtin::Or => Arity::Associative,
            Builtin::Negate | Builtin::Not => Arity::Unary,
            Builtin::Modulo
            | Builtin::Eq
            | Builtin::Neq
            | Builtin::Greater
            | Builtin::Less
            | Builtin::GreaterEq
            | Builtin::LessEq => Arity::Binary,
        }
    }

    /// Append this operator's opcode pattern after its `argc` operands.
    pub fn emit(self, prog: &mut Program, seq: SeqId, argc: usize) -> Result<Value, Error> {
        match self {
            Builtin::If => Err(Error::bad_form(
                "if",
                "conditional operator has no direct lowering",
            )),
            Builtin::Add => Ok(arithmetic::add(prog, seq, argc)),
            Builtin::Subtract => Ok(arithmetic::subtract(prog, seq, argc)),
            Builtin::Multiply => Ok(arithmetic::multiply(prog, seq, argc)),
            Builtin::Divide => Ok(arithmetic::divide(prog, seq, argc)),
            Builtin::Negate => Ok(arithmetic::negate(prog, seq)),
            Builtin::Modulo => Ok(arithmetic::modulo(prog, seq)),
            Builtin::Eq => Ok(comparison::equal(prog, seq)),
            Builtin::Neq => Ok(comparison::not_equal(prog, seq)),
            Builtin::Greater => Ok(comparison::greater(prog, seq)),
            Builtin::Less => Ok(comparison::less(prog, seq)),
            Builtin::GreaterEq => Ok(comparison::greater_or_equal(prog, seq)),
            Builtin::LessEq => Ok(comparison::less_or_equal(prog, seq)),
            Builtin::Not => Ok(logic::not(prog, seq)),
            Builtin::And => Ok(logic::and(prog, seq, argc)),
            Builtin::Or => Ok(logic::or(prog, seq, argc)),
        }
    }
}

/// Swap the top two stack slots: `1 1 roll`.
pub(crate) fn swap(prog: &mut Program, seq: SeqId) {
    prog.emit_push(seq, 1);
    prog.emit_push(seq, 1);
    prog.emit(seq, crate::inst::Inst::Roll);
}

/// Register every intrinsic operator in an environment.
pub fn register(env: &Rc<Environment>) {
    for builtin in ALL {
        env.bind(builtin.name().to_string(), Value::Builtin(builtin));
    }
}

/// The bindings every compilation unit starts from.
pub fn default_environment() -> Rc<Environment> {
    let env = Environment::new();
    register(&env);
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_environment_has_every_operator() {
        let env = default_environment();
        for name in [
            "if", "+", "-", "*", "/", "negate", "modulo", "eq", "neq", ">", "<", ">=", "<=",
            "not", "or", "and",
        ] {
            match env.lookup(name) {
                Some(Value::Builtin(_)) => {}
                other => panic!("Expected {} to be an operator, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_arity_disciplines() {
        assert_eq!(Builtin::Negate.arity(), Arity::Unary);
        assert_eq!(Builtin::Modulo.arity(), Arity::Binary);
        assert_eq!(Builtin::Add.arity(), Arity::Associative);
        assert_eq!(Builtin::And.arity(), Arity::Associative);
        assert_eq!(Builtin::If.arity(), Arity::Special);
    }
}
