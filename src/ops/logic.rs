//! Logic lowerings: not, and, or.
//!
//! On an integer machine with 0 as false, conjunction is multiplication
//! and disjunction is addition, both folded like the other associative
//! operators.

use crate::inst::{Inst, SeqId};
use crate::program::Program;
use crate::value::Value;

pub(crate) fn not(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit(seq, Inst::Not);
    Value::Nil
}

pub(crate) fn and(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    for _ in 1..argc {
        prog.emit(seq, Inst::Multiply);
    }
    Value::Nil
}

pub(crate) fn or(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    for _ in 1..argc {
        prog.emit(seq, Inst::Add);
    }
    Value::Nil
}
