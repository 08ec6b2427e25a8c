//! The deferred conditional.
//!
//! `if` is the one operator that cannot commit at emission time: the
//! machine has no compile-time predicate, so the test is lowered eagerly
//! while both branches stay unexpanded expressions. Whoever learns the
//! predicate later (the simulator here, a painter's pointer/switch
//! dispatch in a 2D backend) fixes the write-once choice, and only then
//! does the chosen branch expand. A divergent unchosen branch therefore
//! never blocks compilation.

use crate::env::Environment;
use crate::error::Error;
use crate::eval;
use crate::inst::{BranchId, CondId, Inst, SeqId};
use crate::program::Program;
use crate::sexpr::Sexpr;
use crate::value::Value;
use std::rc::Rc;

/// Lower an `if` form: expand the test into its own sequence now, defer
/// both branches behind a conditional entry in the stream.
pub(crate) fn condition(
    prog: &mut Program,
    env: &Rc<Environment>,
    seq: SeqId,
    args: &[Sexpr],
) -> Result<Value, Error> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::arity("if", "2-3", args.len()));
    }
    let test = prog.new_sequence(args[0].clone(), env.clone(), false);
    eval::expand(prog, test)?;

    let else_sexpr = args.get(2).cloned().unwrap_or(Sexpr::Nil);
    let id = prog.new_conditional(args[1].clone(), else_sexpr, env.clone(), test);
    prog.emit_ref(seq, Inst::Cond(id));
    log::debug!("deferred conditional @{}", id.0);
    Ok(Value::Cond(id))
}

/// A conditional in operator position. Once resolved it applies like any
/// callable; while pending, the whole call is captured behind a branch
/// entry, arguments included.
pub(crate) fn apply_conditional(
    prog: &mut Program,
    id: CondId,
    seq: SeqId,
    args: Vec<Value>,
) -> Result<Value, Error> {
    if let Some(chosen) = prog.conditional(id).choice {
        let func = eval::expand(prog, chosen)?;
        return eval::apply(prog, func, seq, args);
    }
    let branch = prog.new_branch(id, args);
    prog.emit_ref(seq, Inst::Branch(branch));
    Ok(Value::Nil)
}

/// Expand the chosen branch inside the emission context captured when the
/// conditional was created, with the predicate slot accounted as consumed.
pub(crate) fn expand_choice(prog: &mut Program, id: CondId) -> Result<Value, Error> {
    let (chosen, context) = {
        let cond = prog.conditional(id);
        let chosen = cond
            .choice
            .ok_or_else(|| Error::bad_form("if", "branch expanded before a choice was made"))?;
        (chosen, cond.context.clone())
    };
    if prog.sequence(chosen).expanded {
        return eval::expand(prog, chosen);
    }
    prog.enter_context(&context);
    let result = eval::expand(prog, chosen);
    prog.leave_context();
    result
}

/// Apply the chosen callee of a pending branch call into the branch's own
/// buffer. Runs at most once; later encounters reuse the emitted code.
pub(crate) fn apply_branch(prog: &mut Program, id: BranchId) -> Result<(), Error> {
    let (cond, body, args, context, applied) = {
        let branch = prog.branch(id);
        (
            branch.cond,
            branch.body,
            branch.args.clone(),
            branch.context.clone(),
            branch.applied,
        )
    };
    if applied {
        return Ok(());
    }
    let chosen = prog
        .conditional(cond)
        .choice
        .ok_or_else(|| Error::bad_form("if", "branch applied before a choice was made"))?;

    prog.enter_context(&context);
    let result = match eval::expand(prog, chosen) {
        Ok(func) => eval::apply(prog, func, body, args),
        Err(e) => Err(e),
    };
    prog.leave_context();
    result?;

    prog.branch_mut(id).applied = true;
    Ok(())
}
