// ABOUTME: Error types shared by the reader, the lowering pipeline and the simulator

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Lookup walked the whole environment chain without a match.
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    /// A special form, operator or lambda was given the wrong number of
    /// arguments.
    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    Arity {
        function: String,
        expected: String, // "1", "2", "2-3", "at least 2"
        actual: usize,
    },

    /// A special form did not match its schema.
    #[error("{form}: {message}")]
    BadForm { form: String, message: String },

    #[error("value is not callable")]
    NotCallable,

    /// A value classified as pushable reached the emitter without a
    /// lowering for it.
    #[error("cannot push a {0} onto the stack")]
    NotPushable(String),

    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("roll out of range: depth {depth} on a stack of {size}")]
    RollOutOfRange { depth: i64, size: usize },

    #[error("pop from an empty stack")]
    StackUnderflow,

    #[error("{0} is not a character code")]
    BadCharacter(i64),

    /// The instruction needs 2D program flow or an input source and cannot
    /// execute in a linear stream.
    #[error("{0} cannot execute in a linear stream")]
    Unsimulable(String),

    /// A lambda activation finished with fewer stack slots than it started
    /// with.
    #[error("unbalanced frame: stack offset {0} at lambda return")]
    UnbalancedFrame(i64),

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create an arity error with expected and actual counts.
    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        Error::Arity {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a bad-form error for a special form that missed its schema.
    pub fn bad_form(form: &str, message: impl Into<String>) -> Self {
        Error::BadForm {
            form: form.to_string(),
            message: message.into(),
        }
    }
}
