// ABOUTME: Library surface: the lowering pipeline and its simulator

pub mod env;
pub mod error;
pub mod eval;
pub mod inst;
pub mod ops;
pub mod parser;
pub mod program;
pub mod sexpr;
pub mod sim;
pub mod value;

pub use error::Error;

use program::Program;

/// Parse a whole source text and lower every top-level form into a fresh
/// compilation unit.
pub fn compile(source: &str) -> Result<Program, Error> {
    let forms = parser::parse(source)?;
    let mut prog = Program::new();
    let env = prog.env.clone();
    let top = prog.top;
    for form in &forms {
        eval::evaluate(&mut prog, form, &env, top)?;
    }
    Ok(prog)
}
