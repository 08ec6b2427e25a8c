//! Comparison lowerings: eq, neq, >, <, >=, <=.
//!
//! The machine only has `greater`, so everything else is built from it
//! plus `subtract` and `not`. Results are 1 or 0, except `neq`, which
//! leaves the raw difference (non-zero exactly when the operands differ).

use crate::inst::{Inst, SeqId};
use crate::program::Program;
use crate::value::Value;

/// `(eq a b)`: a - b, then collapse to a boolean.
pub(crate) fn equal(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit(seq, Inst::Subtract);
    prog.emit(seq, Inst::Not);
    Value::Nil
}

/// `(neq a b)`: the bare difference.
pub(crate) fn not_equal(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit(seq, Inst::Subtract);
    Value::Nil
}

pub(crate) fn greater(prog: &mut Program, seq: SeqId) -> Value {
    prog.emit(seq, Inst::Greater);
    Value::Nil
}

/// `(< a b)` is b > a: swap, then greater.
pub(crate) fn less(prog: &mut Program, seq: SeqId) -> Value {
    super::swap(prog, seq);
    prog.emit(seq, Inst::Greater);
    Value::Nil
}

/// `(>= a b)` is not (a < b).
pub(crate) fn greater_or_equal(prog: &mut Program, seq: SeqId) -> Value {
    less(prog, seq);
    prog.emit(seq, Inst::Not);
    Value::Nil
}

/// `(<= a b)` is not (a > b).
pub(crate) fn less_or_equal(prog: &mut Program, seq: SeqId) -> Value {
    greater(prog, seq);
    prog.emit(seq, Inst::Not);
    Value::Nil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_is_subtract_not() {
        let mut prog = Program::new();
        let top = prog.top;
        equal(&mut prog, top);
        assert_eq!(prog.code(), &[Inst::Subtract, Inst::Not]);
    }

    #[test]
    fn test_less_swaps_before_greater() {
        let mut prog = Program::new();
        let top = prog.top;
        less(&mut prog, top);
        assert_eq!(
            prog.code(),
            &[Inst::Push(1), Inst::Push(1), Inst::Roll, Inst::Greater]
        );
    }
}
