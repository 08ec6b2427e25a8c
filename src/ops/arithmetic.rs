//! Arithmetic lowerings: +, -, *, /, modulo, negate.

use crate::inst::{Inst, SeqId};
use crate::program::Program;
use crate::value::Value;

/// N operands on the stack become one result through N-1 copies of the
/// opcode. The evaluator has already left-folded longer forms into binary
/// ones, so `argc` is normally 2.
fn fold(prog: &mut Program, seq: SeqId, op: Inst, argc: usize) -> Value {
    for _ in 1..argc {
        prog.emit(seq, op);
    }
    Value::Nil
}

pub(crate) fn add(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    fold(prog, seq, Inst::Add, argc)
}

pub(crate) fn subtract(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    fold(prog, seq, Inst::Subtract, argc)
}

pub(crate) fn multiply(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    fold(prog, seq, Inst::Multiply, argc)
}

pub(crate) fn divide(prog: &mut Program, seq: SeqId, argc: usize) -> Value {
    fold(prog, seq, Inst::Divide, argc)
}

/// `(modulo a b)` is the machine's own mod opcode.
pub(crate) fn modulo(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit(seq, Inst::Mod);
    Value::Nil
}

/// `(negate x)` computes 0 - x: push the zero, swap it under the operand,
/// subtract.
pub(crate) fn negate(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit_push(seq, 0);
    super::swap(prog, seq);
    prog.emit(seq, Inst::Subtract);
    Value::Nil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_emits_one_opcode_per_extra_operand() {
        let mut prog = Program::new();
        let top = prog.top;
        fold(&mut prog, top, Inst::Add, 4);
        assert_eq!(prog.code(), &[Inst::Add, Inst::Add, Inst::Add]);
    }

    #[test]
    fn test_negate_swaps_zero_under_operand() {
        let mut prog = Program::new();
        let top = prog.top;
        negate(&mut prog, top);
        assert_eq!(
            prog.code(),
            &[
                Inst::Push(0),
                Inst::Push(1),
                Inst::Push(1),
                Inst::Roll,
                Inst::Subtract,
            ]
        );
    }
}
