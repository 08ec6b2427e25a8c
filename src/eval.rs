// ABOUTME: The evaluator: recursive descent over s-expressions, lowering each
// ABOUTME: form into stack-machine emissions on the current sequence

use crate::env::Environment;
use crate::error::Error;
use crate::inst::{Inst, SeqId};
use crate::ops::{self, Arity, Builtin};
use crate::program::Program;
use crate::sexpr::Sexpr;
use crate::value::{Lambda, Parameter, Value};
use std::rc::Rc;

/// Evaluate an s-expression within a scope, emitting into `seq`.
///
/// Atoms resolve through the environment and emit a push when the result
/// occupies a stack slot. List forms dispatch to the special forms first
/// (`quote`, `define`, `lambda` and the deferred `if`), then fall through
/// to application: every element evaluates left to right, and the head,
/// which must come out callable, decides which opcodes to append.
pub fn evaluate(
    prog: &mut Program,
    sexpr: &Sexpr,
    env: &Rc<Environment>,
    seq: SeqId,
) -> Result<Value, Error> {
    log::trace!("evaluating {}", sexpr);
    let items = match sexpr {
        Sexpr::List(items) => items,
        Sexpr::Integer(n) => return push_and_return(prog, seq, Value::Integer(*n)),
        Sexpr::Nil => return Ok(Value::Nil),
        Sexpr::Symbol(name) => {
            let val = env
                .lookup(name)
                .ok_or_else(|| Error::UndefinedSymbol(name.clone()))?;
            return push_and_return(prog, seq, val);
        }
    };

    if items.is_empty() {
        return Err(Error::bad_form("()", "empty application"));
    }

    if let Some(name) = items[0].as_symbol() {
        match name {
            "quote" => return special_quote(&items[1..]),
            "define" => return special_define(prog, env, &items[1..]),
            "lambda" => return special_lambda(env, &items[1..]),
            "if" => {
                return match env.lookup(name) {
                    Some(Value::Builtin(Builtin::If)) => {
                        ops::conditional::condition(prog, env, seq, &items[1..])
                    }
                    Some(_) => Err(Error::bad_form(
                        "if",
                        "`if` is no longer bound to the conditional operator",
                    )),
                    None => Err(Error::UndefinedSymbol(name.to_string())),
                };
            }
            _ => {}
        }

        // Associative operators left-fold before any operand is pushed, so
        // (- 10 3 2) lowers as (- (- 10 3) 2).
        if items.len() > 3 {
            if let Some(Value::Builtin(b)) = env.lookup(name) {
                if b.arity() == Arity::Associative {
                    let folded = fold_left(name, &items[1..]);
                    return evaluate(prog, &folded, env, seq);
                }
            }
        }
    }

    let func = evaluate(prog, &items[0], env, seq)?;
    let mut args = Vec::with_capacity(items.len() - 1);
    for item in &items[1..] {
        args.push(evaluate(prog, item, env, seq)?);
    }
    log::trace!("applying {} to {} argument(s)", func, args.len());
    apply(prog, func, seq, args)
}

fn push_and_return(prog: &mut Program, seq: SeqId, val: Value) -> Result<Value, Error> {
    if is_pushable(prog, &val)? {
        push_value(prog, seq, &val)?;
    }
    Ok(val)
}

fn fold_left(name: &str, operands: &[Sexpr]) -> Sexpr {
    let op = Sexpr::symbol(name);
    let mut acc = Sexpr::List(vec![op.clone(), operands[0].clone(), operands[1].clone()]);
    for rest in &operands[2..] {
        acc = Sexpr::List(vec![op.clone(), acc, rest.clone()]);
    }
    acc
}

// ============================================================================
// Special forms
// ============================================================================

fn special_quote(args: &[Sexpr]) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity("quote", "1", args.len()));
    }
    Ok(quote_value(&args[0]))
}

fn quote_value(sexpr: &Sexpr) -> Value {
    match sexpr {
        Sexpr::Integer(n) => Value::Integer(*n),
        Sexpr::Nil => Value::Nil,
        other => Value::Quoted(other.clone()),
    }
}

/// `(define name expr)` binds in the current scope. The bound expression
/// goes through `peek` so that lambdas and atoms collapse at binding time,
/// while anything with side-effect timing of its own stays a thunk.
fn special_define(
    prog: &mut Program,
    env: &Rc<Environment>,
    args: &[Sexpr],
) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity("define", "2", args.len()));
    }
    let name = match &args[0] {
        Sexpr::Symbol(s) => s.clone(),
        other => {
            return Err(Error::bad_form(
                "define",
                format!("binding target must be a symbol, got {}", other),
            ));
        }
    };
    let value = peek(prog, env, &args[1])?;
    env.bind(name, value);
    Ok(Value::Nil)
}

/// The peephole applied to a definition's right-hand side: simplify when
/// the simplification has no emission of its own. A nested `define` must
/// keep its side-effect timing, so it stays a re-expandable thunk.
fn peek(prog: &mut Program, env: &Rc<Environment>, sexpr: &Sexpr) -> Result<Value, Error> {
    match sexpr {
        Sexpr::Nil => Ok(Value::Nil),
        Sexpr::Integer(n) => Ok(Value::Integer(*n)),
        Sexpr::Symbol(name) => env
            .lookup(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.clone())),
        Sexpr::List(items) if items.is_empty() => Ok(Value::Nil),
        Sexpr::List(items) => match items[0].as_symbol() {
            Some("quote") => special_quote(&items[1..]),
            Some("lambda") => special_lambda(env, &items[1..]),
            _ => Ok(Value::Seq(prog.new_sequence(
                sexpr.clone(),
                env.clone(),
                true,
            ))),
        },
    }
}

fn special_lambda(env: &Rc<Environment>, args: &[Sexpr]) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity("lambda", "2", args.len()));
    }
    let params = match &args[0] {
        // () reads as nil, so a zero-parameter lambda lands here.
        Sexpr::Nil => Vec::new(),
        Sexpr::List(items) => items
            .iter()
            .map(|p| match p {
                Sexpr::Symbol(s) => Ok(s.clone()),
                other => Err(Error::bad_form(
                    "lambda",
                    format!("parameter must be a symbol, got {}", other),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(Error::bad_form(
                "lambda",
                format!("parameters must be a list, got {}", other),
            ));
        }
    };
    Ok(Value::Lambda(Rc::new(Lambda {
        params,
        body: args[1].clone(),
        env: env.clone(),
    })))
}

// ============================================================================
// Expansion
// ============================================================================

/// Expand a stored sequence once: evaluate its expression with itself as
/// the emission target. Idempotent; the result is cached.
pub fn expand(prog: &mut Program, id: SeqId) -> Result<Value, Error> {
    {
        let seq = prog.sequence(id);
        if seq.expanded {
            return Ok(seq.result.clone().unwrap_or(Value::Nil));
        }
    }
    let (sexpr, env, is_activation) = {
        let seq = prog.sequence(id);
        (seq.sexpr.clone(), seq.env.clone(), seq.frame.is_some())
    };
    if is_activation {
        prog.open_activation(id);
    }
    let result = evaluate(prog, &sexpr, &env, id);
    if is_activation {
        prog.close_activation();
    }
    let result = result?;
    let seq = prog.sequence_mut(id);
    seq.expanded = true;
    seq.result = Some(result.clone());
    Ok(result)
}

// ============================================================================
// Pushing
// ============================================================================

/// Whether a reference to this value occupies a runtime stack slot.
/// Sequences expand first; an empty expansion produced no value.
pub fn is_pushable(prog: &mut Program, val: &Value) -> Result<bool, Error> {
    match val {
        Value::Integer(_) | Value::Nil => Ok(true),
        Value::Param(param) => {
            let inner = prog.parameter_arg(param);
            is_pushable(prog, &inner)
        }
        Value::Seq(id) => {
            expand(prog, *id)?;
            Ok(!prog.sequence(*id).code.is_empty())
        }
        Value::Lambda(_) | Value::Builtin(_) | Value::Cond(_) | Value::Quoted(_) => Ok(false),
    }
}

/// Emit the push pattern for one classified value. Anything else reaching
/// here is rejected loudly.
pub fn push_value(prog: &mut Program, seq: SeqId, val: &Value) -> Result<(), Error> {
    match val {
        Value::Integer(n) => {
            prog.emit_push(seq, *n);
            Ok(())
        }
        // A nil result already sits on the stack; nothing to emit.
        Value::Nil => Ok(()),
        Value::Seq(id) => {
            prog.emit_ref(seq, Inst::Seq(*id));
            Ok(())
        }
        Value::Cond(id) => {
            prog.emit_ref(seq, Inst::Cond(*id));
            Ok(())
        }
        Value::Param(param) => push_parameter(prog, seq, param),
        other => Err(Error::NotPushable(other.type_name().to_string())),
    }
}

/// Duplicate a parameter's slot onto the top of the stack without
/// disturbing the frame: bring the slot up with `depth -1 roll`, copy it,
/// and bury the original back with `depth+1 1 roll`.
fn push_parameter(prog: &mut Program, seq: SeqId, param: &Parameter) -> Result<(), Error> {
    let depth = prog.param_depth(param);
    if depth < 0 {
        return Err(Error::UnbalancedFrame(depth));
    }
    if depth != 0 {
        prog.emit_push(seq, depth);
        prog.emit_push(seq, -1);
        prog.emit(seq, Inst::Roll);
    }
    prog.emit(seq, Inst::Duplicate);
    if depth != 0 {
        prog.emit_push(seq, depth + 1);
        prog.emit_push(seq, 1);
        prog.emit(seq, Inst::Roll);
    }
    Ok(())
}

// ============================================================================
// Application
// ============================================================================

/// Apply a callable to already-evaluated arguments, emitting into `seq`.
pub fn apply(prog: &mut Program, func: Value, seq: SeqId, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::Builtin(b) => {
            check_arity(b, args.len())?;
            b.emit(prog, seq, args.len())
        }
        Value::Lambda(lambda) => apply_lambda(prog, lambda, seq, args),
        Value::Seq(id) => {
            let f = expand(prog, id)?;
            apply(prog, f, seq, args)
        }
        Value::Param(param) => {
            let f = prog.parameter_arg(&param);
            apply(prog, f, seq, args)
        }
        Value::Cond(id) => ops::conditional::apply_conditional(prog, id, seq, args),
        Value::Integer(_) | Value::Nil | Value::Quoted(_) => Err(Error::NotCallable),
    }
}

fn check_arity(b: Builtin, argc: usize) -> Result<(), Error> {
    match b.arity() {
        Arity::Unary if argc != 1 => Err(Error::arity(b.name(), "1", argc)),
        Arity::Binary if argc != 2 => Err(Error::arity(b.name(), "2", argc)),
        Arity::Associative if argc < 2 => Err(Error::arity(b.name(), "at least 2", argc)),
        Arity::Special => Err(Error::bad_form(
            b.name(),
            "conditional operator applied to evaluated arguments",
        )),
        _ => Ok(()),
    }
}

/// Call a lambda: build the activation, reference it from the caller,
/// expand the body once, then clean the argument slots off the stack so
/// the result ends up on top.
fn apply_lambda(
    prog: &mut Program,
    lambda: Rc<Lambda>,
    seq: SeqId,
    args: Vec<Value>,
) -> Result<Value, Error> {
    if args.len() != lambda.params.len() {
        return Err(Error::arity(
            "lambda",
            lambda.params.len().to_string(),
            args.len(),
        ));
    }
    log::debug!(
        "lambda call: ({}) over {} argument(s)",
        lambda.params.join(" "),
        args.len()
    );
    let mut stack_size = 0;
    for arg in &args {
        if is_pushable(prog, arg)? {
            stack_size += 1;
        }
    }
    let id = prog.new_activation(lambda, args, stack_size);
    prog.emit_ref(seq, Inst::Seq(id));
    expand(prog, id)?;

    let offset = prog
        .sequence(id)
        .frame
        .as_ref()
        .map(|f| f.stack_offset)
        .unwrap_or(0);
    if offset < 0 {
        return Err(Error::UnbalancedFrame(offset));
    }
    if offset != 0 {
        for _ in 0..stack_size {
            prog.emit_push(seq, 1);
            prog.emit_push(seq, -1);
            prog.emit(seq, Inst::Roll);
            prog.emit(seq, Inst::Pop);
        }
    }
    Ok(Value::Seq(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lower(source: &str) -> Program {
        let mut prog = Program::new();
        let env = prog.env.clone();
        let top = prog.top;
        for form in parse(source).expect("parse failed") {
            evaluate(&mut prog, &form, &env, top).expect("evaluation failed");
        }
        prog
    }

    fn lower_err(source: &str) -> Error {
        let mut prog = Program::new();
        let env = prog.env.clone();
        let top = prog.top;
        let mut last = None;
        for form in parse(source).expect("parse failed") {
            if let Err(e) = evaluate(&mut prog, &form, &env, top) {
                last = Some(e);
                break;
            }
        }
        last.expect("expected an evaluation error")
    }

    #[test]
    fn test_literal_addition_lowering() {
        let prog = lower("(+ 2 3)");
        assert_eq!(
            prog.code(),
            &[Inst::Push(2), Inst::Push(3), Inst::Add]
        );
    }

    #[test]
    fn test_associative_fold_interleaves_operands() {
        let prog = lower("(- 10 3 2)");
        assert_eq!(
            prog.code(),
            &[
                Inst::Push(10),
                Inst::Push(3),
                Inst::Subtract,
                Inst::Push(2),
                Inst::Subtract,
            ]
        );
    }

    #[test]
    fn test_nested_forms_share_the_stream() {
        let prog = lower("(* (+ 1 2) 3)");
        assert_eq!(
            prog.code(),
            &[
                Inst::Push(1),
                Inst::Push(2),
                Inst::Add,
                Inst::Push(3),
                Inst::Multiply,
            ]
        );
    }

    #[test]
    fn test_define_collapses_lambda_at_binding_time() {
        let prog = lower("(define twice (lambda (x) (* 2 x)))");
        match prog.env.lookup("twice") {
            Some(Value::Lambda(lambda)) => {
                assert_eq!(lambda.params, vec!["x".to_string()]);
            }
            other => panic!("Expected a lambda binding, got {:?}", other),
        }
        // A definition emits nothing by itself.
        assert!(prog.code().is_empty());
    }

    #[test]
    fn test_define_keeps_compound_expression_as_thunk() {
        let prog = lower("(define three (+ 1 2))");
        match prog.env.lookup("three") {
            Some(Value::Seq(_)) => {}
            other => panic!("Expected a stored sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_define_collapses_quote_and_atom() {
        let prog = lower("(define a 'b) (define n 7) (define m n)");
        assert!(matches!(prog.env.lookup("a"), Some(Value::Quoted(_))));
        assert!(matches!(prog.env.lookup("n"), Some(Value::Integer(7))));
        assert!(matches!(prog.env.lookup("m"), Some(Value::Integer(7))));
    }

    #[test]
    fn test_quote_yields_unevaluated_expression() {
        let prog = lower("(define q '(+ 1 2))");
        match prog.env.lookup("q") {
            Some(Value::Quoted(Sexpr::List(items))) => assert_eq!(items.len(), 3),
            other => panic!("Expected a quoted list, got {:?}", other),
        }
    }

    #[test]
    fn test_lambda_call_references_activation_and_cleans_frame() {
        let prog = lower("((lambda (x) (* 2 x)) 7)");
        // Argument push, activation reference, then one swap-and-pop per
        // pushable argument.
        assert_eq!(prog.code()[0], Inst::Push(7));
        assert!(matches!(prog.code()[1], Inst::Seq(_)));
        assert_eq!(
            &prog.code()[2..],
            &[Inst::Push(1), Inst::Push(-1), Inst::Roll, Inst::Pop]
        );
    }

    #[test]
    fn test_parameter_reference_uses_depth_gadget() {
        let prog = lower("((lambda (x) (* 2 x)) 7)");
        let activation = match prog.code()[1] {
            Inst::Seq(id) => id,
            other => panic!("Expected an activation reference, got {:?}", other),
        };
        // Body: push 2, then bring x (depth 1) up, copy, bury it back.
        assert_eq!(
            prog.sequence(activation).code,
            vec![
                Inst::Push(2),
                Inst::Push(1),
                Inst::Push(-1),
                Inst::Roll,
                Inst::Duplicate,
                Inst::Push(2),
                Inst::Push(1),
                Inst::Roll,
                Inst::Multiply,
            ]
        );
    }

    #[test]
    fn test_conditional_defers_branches() {
        let prog = lower("(if (> 3 2) 100 200)");
        assert_eq!(prog.code().len(), 1);
        let cond = match prog.code()[0] {
            Inst::Cond(id) => id,
            other => panic!("Expected a conditional entry, got {:?}", other),
        };
        let cond = prog.conditional(cond);
        assert!(cond.choice.is_none());
        // The test was expanded eagerly into its own sequence.
        assert_eq!(
            prog.sequence(cond.test).code,
            vec![Inst::Push(3), Inst::Push(2), Inst::Greater]
        );
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let mut prog = lower("(define three (+ 1 2))");
        let id = match prog.env.lookup("three") {
            Some(Value::Seq(id)) => id,
            other => panic!("Expected a stored sequence, got {:?}", other),
        };
        expand(&mut prog, id).expect("first expansion failed");
        let first = prog.sequence(id).code.clone();
        expand(&mut prog, id).expect("second expansion failed");
        assert_eq!(prog.sequence(id).code, first);
    }

    #[test]
    fn test_unbound_symbol_is_fatal() {
        assert!(matches!(
            lower_err("(+ x 1)"),
            Error::UndefinedSymbol(name) if name == "x"
        ));
    }

    #[test]
    fn test_special_form_arity_errors() {
        assert!(matches!(lower_err("(quote)"), Error::Arity { .. }));
        assert!(matches!(lower_err("(define x)"), Error::Arity { .. }));
        assert!(matches!(lower_err("(lambda (x))"), Error::Arity { .. }));
        assert!(matches!(lower_err("(if 1)"), Error::Arity { .. }));
    }

    #[test]
    fn test_lambda_arity_mismatch() {
        assert!(matches!(
            lower_err("((lambda (x) x) 1 2)"),
            Error::Arity { .. }
        ));
    }

    #[test]
    fn test_bad_define_target() {
        assert!(matches!(lower_err("(define 5 6)"), Error::BadForm { .. }));
    }

    #[test]
    fn test_bad_lambda_parameters() {
        assert!(matches!(
            lower_err("(lambda (x 1) x)"),
            Error::BadForm { .. }
        ));
        assert!(matches!(lower_err("(lambda x x)"), Error::BadForm { .. }));
    }

    #[test]
    fn test_not_callable() {
        assert!(matches!(lower_err("(1 2 3)"), Error::NotCallable));
    }

    #[test]
    fn test_operator_arity_mismatch() {
        assert!(matches!(lower_err("(+ 1)"), Error::Arity { .. }));
        assert!(matches!(lower_err("(not 1 2)"), Error::Arity { .. }));
        assert!(matches!(lower_err("(modulo 1)"), Error::Arity { .. }));
        assert!(matches!(lower_err("(eq 1 2 3)"), Error::Arity { .. }));
    }
}
