// ABOUTME: The Piet instruction set and the entries of an emitted stream

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Index of a sequence in the compilation unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeqId(pub usize);

/// Index of a deferred conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CondId(pub usize);

/// Index of a deferred conditional applied to captured arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BranchId(pub usize);

/// One entry of an emitted instruction stream.
///
/// The first seventeen variants are the Piet commands; `Push` is the only
/// one carrying a payload. The remaining three are compile-time references
/// that a downstream painter rewrites into 2D jumps: a stored sequence, a
/// deferred conditional, and a conditional applied to captured arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inst {
    Push(i64),
    Pop,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Not,
    Greater,
    Pointer,
    Switch,
    Duplicate,
    Roll,
    InNum,
    InChar,
    OutNum,
    OutChar,
    Seq(SeqId),
    Cond(CondId),
    Branch(BranchId),
}

impl Inst {
    /// Colour differential (hue shift, lightness shift) between two codel
    /// blocks that encodes this command. Consumed by the painter only;
    /// reference entries have no colour of their own.
    pub fn shifts(&self) -> Option<(u8, u8)> {
        let pair = match self {
            Inst::Push(_) => (0, 1),
            Inst::Pop => (0, 2),
            Inst::Add => (1, 0),
            Inst::Subtract => (1, 1),
            Inst::Multiply => (1, 2),
            Inst::Divide => (2, 0),
            Inst::Mod => (2, 1),
            Inst::Not => (2, 2),
            Inst::Greater => (3, 0),
            Inst::Pointer => (3, 1),
            Inst::Switch => (3, 2),
            Inst::Duplicate => (4, 0),
            Inst::Roll => (4, 1),
            Inst::InNum => (4, 2),
            Inst::InChar => (5, 0),
            Inst::OutNum => (5, 1),
            Inst::OutChar => (5, 2),
            Inst::Seq(_) | Inst::Cond(_) | Inst::Branch(_) => return None,
        };
        Some(pair)
    }

    /// Net change this instruction makes to the runtime stack depth.
    /// Reference entries account for themselves during expansion.
    pub fn stack_delta(&self) -> i64 {
        match self {
            Inst::Push(_) | Inst::Duplicate | Inst::InNum | Inst::InChar => 1,
            Inst::Not => 0,
            Inst::Pop
            | Inst::Add
            | Inst::Subtract
            | Inst::Multiply
            | Inst::Divide
            | Inst::Mod
            | Inst::Greater
            | Inst::Pointer
            | Inst::Switch
            | Inst::OutNum
            | Inst::OutChar => -1,
            Inst::Roll => -2,
            Inst::Seq(_) | Inst::Cond(_) | Inst::Branch(_) => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Inst::Push(_) => "push",
            Inst::Pop => "pop",
            Inst::Add => "add",
            Inst::Subtract => "subtract",
            Inst::Multiply => "multiply",
            Inst::Divide => "divide",
            Inst::Mod => "mod",
            Inst::Not => "not",
            Inst::Greater => "greater",
            Inst::Pointer => "pointer",
            Inst::Switch => "switch",
            Inst::Duplicate => "duplicate",
            Inst::Roll => "roll",
            Inst::InNum => "in_num",
            Inst::InChar => "in_char",
            Inst::OutNum => "out_num",
            Inst::OutChar => "out_char",
            Inst::Seq(_) => "seq",
            Inst::Cond(_) => "cond",
            Inst::Branch(_) => "branch",
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Push(n) => write!(f, "push {}", n),
            Inst::Seq(id) => write!(f, "seq @{}", id.0),
            Inst::Cond(id) => write!(f, "cond @{}", id.0),
            Inst::Branch(id) => write!(f, "branch @{}", id.0),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for Inst {
    type Err = Error;

    /// Resolve a nullary command by name. `push` carries a payload and the
    /// references are compile-time constructs, so none of them has a name
    /// here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inst = match s {
            "pop" => Inst::Pop,
            "add" => Inst::Add,
            "subtract" => Inst::Subtract,
            "multiply" => Inst::Multiply,
            "divide" => Inst::Divide,
            "mod" => Inst::Mod,
            "not" => Inst::Not,
            "greater" => Inst::Greater,
            "pointer" => Inst::Pointer,
            "switch" => Inst::Switch,
            "duplicate" => Inst::Duplicate,
            "roll" => Inst::Roll,
            "in_num" => Inst::InNum,
            "in_char" => Inst::InChar,
            "out_num" => Inst::OutNum,
            "out_char" => Inst::OutChar,
            other => return Err(Error::UnknownInstruction(other.to_string())),
        };
        Ok(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_shifts() {
        // Spot checks against the Piet colour cycle.
        assert_eq!(Inst::Push(3).shifts(), Some((0, 1)));
        assert_eq!(Inst::Add.shifts(), Some((1, 0)));
        assert_eq!(Inst::Roll.shifts(), Some((4, 1)));
        assert_eq!(Inst::OutChar.shifts(), Some((5, 2)));
        assert_eq!(Inst::Seq(SeqId(0)).shifts(), None);
    }

    #[test]
    fn test_stack_deltas() {
        assert_eq!(Inst::Push(1).stack_delta(), 1);
        assert_eq!(Inst::Duplicate.stack_delta(), 1);
        assert_eq!(Inst::Not.stack_delta(), 0);
        assert_eq!(Inst::Add.stack_delta(), -1);
        assert_eq!(Inst::Roll.stack_delta(), -2);
    }

    #[test]
    fn test_from_name() {
        assert_eq!("roll".parse::<Inst>().unwrap(), Inst::Roll);
        assert_eq!("out_char".parse::<Inst>().unwrap(), Inst::OutChar);
        assert!(matches!(
            "teleport".parse::<Inst>(),
            Err(Error::UnknownInstruction(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Inst::Push(-1)), "push -1");
        assert_eq!(format!("{}", Inst::Duplicate), "duplicate");
        assert_eq!(format!("{}", Inst::Seq(SeqId(3))), "seq @3");
    }
}
