// ABOUTME: The compilation unit: sequence arenas, open activations and the emitter

use crate::env::Environment;
use crate::inst::{BranchId, CondId, Inst, SeqId};
use crate::sexpr::Sexpr;
use crate::value::{Lambda, Parameter, Value};
use serde::Serialize;
use std::fmt::Write as _;
use std::rc::Rc;

/// One stored sub-program: the s-expression it was built from, the
/// environment it captured, and the instructions emitted into it so far.
///
/// The buffer is append-only and never reordered; `expanded` makes
/// expansion idempotent, with the evaluation result cached alongside.
#[derive(Debug)]
pub struct Sequence {
    pub sexpr: Sexpr,
    pub env: Rc<Environment>,
    pub code: Vec<Inst>,
    pub expanded: bool,
    pub result: Option<Value>,
    /// Referenced more than once; a painter draws it as a subroutine.
    pub subroutine: bool,
    /// Present when this sequence is a lambda activation.
    pub frame: Option<Frame>,
}

/// The activation record for one lambda call site.
#[derive(Debug)]
pub struct Frame {
    pub lambda: Rc<Lambda>,
    pub args: Vec<Value>,
    /// Stack slots pushed above this frame's arguments since activation.
    /// Every emission broadcasts its net stack delta here while the
    /// activation is open.
    pub stack_offset: i64,
    /// How many of the arguments occupy runtime stack slots.
    pub stack_size: usize,
}

/// A deferred two-way choice. The test sequence is populated the moment
/// the `if` form is evaluated; `choice` is write-once and neither branch
/// is expanded before it is set.
#[derive(Debug)]
pub struct Conditional {
    pub test: SeqId,
    pub if_sexpr: Sexpr,
    pub else_sexpr: Sexpr,
    pub env: Rc<Environment>,
    pub choice: Option<SeqId>,
    /// Open activations and their offsets when the conditional was
    /// created; branch expansion re-enters this context.
    pub context: Vec<(SeqId, i64)>,
}

/// A conditional that appeared in operator position: the argument values
/// are captured, and once the choice is known the selected callee is
/// applied into `body`.
#[derive(Debug)]
pub struct Branch {
    pub cond: CondId,
    pub args: Vec<Value>,
    pub body: SeqId,
    pub applied: bool,
    pub context: Vec<(SeqId, i64)>,
}

struct ContextSave {
    active: Vec<SeqId>,
    offsets: Vec<(SeqId, i64)>,
}

/// A whole compilation unit. Owns every sequence, conditional and branch
/// created while lowering one program, plus the stack of currently-open
/// lambda activations that emission broadcasts into.
pub struct Program {
    seqs: Vec<Sequence>,
    conds: Vec<Conditional>,
    branches: Vec<Branch>,
    active: Vec<SeqId>,
    saves: Vec<ContextSave>,
    /// The top-level emission target.
    pub top: SeqId,
    /// The pre-populated global environment.
    pub env: Rc<Environment>,
}

impl Program {
    pub fn new() -> Self {
        let env = crate::ops::default_environment();
        let top = Sequence {
            sexpr: Sexpr::Nil,
            env: env.clone(),
            code: Vec::new(),
            expanded: true,
            result: None,
            subroutine: false,
            frame: None,
        };
        Program {
            seqs: vec![top],
            conds: Vec::new(),
            branches: Vec::new(),
            active: Vec::new(),
            saves: Vec::new(),
            top: SeqId(0),
            env,
        }
    }

    // ========================================================================
    // Arena accessors
    // ========================================================================

    pub fn sequence(&self, id: SeqId) -> &Sequence {
        &self.seqs[id.0]
    }

    pub fn sequence_mut(&mut self, id: SeqId) -> &mut Sequence {
        &mut self.seqs[id.0]
    }

    pub fn conditional(&self, id: CondId) -> &Conditional {
        &self.conds[id.0]
    }

    pub fn branch(&self, id: BranchId) -> &Branch {
        &self.branches[id.0]
    }

    pub fn branch_mut(&mut self, id: BranchId) -> &mut Branch {
        &mut self.branches[id.0]
    }

    /// The emitted top-level stream.
    pub fn code(&self) -> &[Inst] {
        &self.seqs[self.top.0].code
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Store an s-expression for later expansion.
    pub fn new_sequence(&mut self, sexpr: Sexpr, env: Rc<Environment>, subroutine: bool) -> SeqId {
        let id = SeqId(self.seqs.len());
        self.seqs.push(Sequence {
            sexpr,
            env,
            code: Vec::new(),
            expanded: false,
            result: None,
            subroutine,
            frame: None,
        });
        id
    }

    /// Build the activation record for one lambda call site: a parameter
    /// per formal bound in a fresh scope chained to the lambda's capture,
    /// with the arguments considered already pushed beneath the top of
    /// stack (stack offset starts at zero).
    pub fn new_activation(
        &mut self,
        lambda: Rc<Lambda>,
        args: Vec<Value>,
        stack_size: usize,
    ) -> SeqId {
        let id = SeqId(self.seqs.len());
        let local = Environment::with_parent(lambda.env.clone());
        for (slot, name) in lambda.params.iter().enumerate() {
            local.bind(
                name.clone(),
                Value::Param(Parameter {
                    owner: id,
                    slot,
                    symbol: name.clone(),
                }),
            );
        }
        self.seqs.push(Sequence {
            sexpr: lambda.body.clone(),
            env: local,
            code: Vec::new(),
            expanded: false,
            result: None,
            subroutine: true,
            frame: Some(Frame {
                lambda,
                args,
                stack_offset: 0,
                stack_size,
            }),
        });
        id
    }

    pub fn new_conditional(
        &mut self,
        if_sexpr: Sexpr,
        else_sexpr: Sexpr,
        env: Rc<Environment>,
        test: SeqId,
    ) -> CondId {
        let id = CondId(self.conds.len());
        let context = self.capture_context();
        self.conds.push(Conditional {
            test,
            if_sexpr,
            else_sexpr,
            env,
            choice: None,
            context,
        });
        id
    }

    pub fn new_branch(&mut self, cond: CondId, args: Vec<Value>) -> BranchId {
        let env = self.conds[cond.0].env.clone();
        let body = self.new_sequence(Sexpr::Nil, env, true);
        // The body is an application target, never re-evaluated from its
        // (empty) expression.
        self.seqs[body.0].expanded = true;
        let id = BranchId(self.branches.len());
        let context = self.capture_context();
        self.branches.push(Branch {
            cond,
            args,
            body,
            applied: false,
            context,
        });
        id
    }

    /// Fix the write-once branch choice, materialising a sequence over the
    /// chosen expression.
    pub fn resolve_choice(&mut self, id: CondId, take_if: bool) -> SeqId {
        let (sexpr, env) = {
            let cond = &self.conds[id.0];
            let sexpr = if take_if {
                cond.if_sexpr.clone()
            } else {
                cond.else_sexpr.clone()
            };
            (sexpr, cond.env.clone())
        };
        let seq = self.new_sequence(sexpr, env, false);
        self.conds[id.0].choice = Some(seq);
        seq
    }

    // ========================================================================
    // Open activations and the emitter
    // ========================================================================

    pub(crate) fn open_activation(&mut self, id: SeqId) {
        self.active.push(id);
    }

    pub(crate) fn close_activation(&mut self) {
        self.active.pop();
    }

    fn capture_context(&self) -> Vec<(SeqId, i64)> {
        self.active
            .iter()
            .map(|&id| {
                let offset = self.seqs[id.0]
                    .frame
                    .as_ref()
                    .map(|f| f.stack_offset)
                    .unwrap_or(0);
                (id, offset)
            })
            .collect()
    }

    /// Re-enter the emission context captured by a deferred conditional,
    /// with the predicate slot accounted as consumed. Balanced by
    /// `leave_context`.
    pub(crate) fn enter_context(&mut self, context: &[(SeqId, i64)]) {
        let offsets = context
            .iter()
            .map(|&(id, _)| {
                let current = self.seqs[id.0]
                    .frame
                    .as_ref()
                    .map(|f| f.stack_offset)
                    .unwrap_or(0);
                (id, current)
            })
            .collect();
        let active = std::mem::replace(
            &mut self.active,
            context.iter().map(|&(id, _)| id).collect(),
        );
        self.saves.push(ContextSave { active, offsets });
        for &(id, offset) in context {
            if let Some(frame) = self.seqs[id.0].frame.as_mut() {
                frame.stack_offset = offset - 1;
            }
        }
    }

    pub(crate) fn leave_context(&mut self) {
        if let Some(save) = self.saves.pop() {
            for (id, offset) in save.offsets {
                if let Some(frame) = self.seqs[id.0].frame.as_mut() {
                    frame.stack_offset = offset;
                }
            }
            self.active = save.active;
        }
    }

    /// Append one instruction and broadcast its net stack delta to every
    /// open activation. All stack-mutating emission funnels through here.
    pub fn emit(&mut self, seq: SeqId, inst: Inst) {
        let delta = inst.stack_delta();
        self.seqs[seq.0].code.push(inst);
        if delta != 0 {
            self.broadcast(delta);
        }
    }

    pub fn emit_push(&mut self, seq: SeqId, n: i64) {
        self.emit(seq, Inst::Push(n));
    }

    /// Append a reference entry without touching the stack accounting; the
    /// referenced sequence manages its own when expanded.
    pub fn emit_ref(&mut self, seq: SeqId, inst: Inst) {
        self.seqs[seq.0].code.push(inst);
    }

    fn broadcast(&mut self, delta: i64) {
        for i in 0..self.active.len() {
            let id = self.active[i];
            if let Some(frame) = self.seqs[id.0].frame.as_mut() {
                frame.stack_offset += delta;
            }
        }
    }

    /// Number of stack slots between the top of stack and the parameter's
    /// slot at this moment of emission.
    pub fn param_depth(&self, param: &Parameter) -> i64 {
        let frame = self.seqs[param.owner.0]
            .frame
            .as_ref()
            .expect("parameter owner is a lambda activation");
        let offset = frame.lambda.params.len() as i64 - 1 - param.slot as i64;
        frame.stack_offset + offset
    }

    /// The argument value currently occupying a parameter's slot.
    pub fn parameter_arg(&self, param: &Parameter) -> Value {
        let frame = self.seqs[param.owner.0]
            .frame
            .as_ref()
            .expect("parameter owner is a lambda activation");
        frame.args[param.slot].clone()
    }

    // ========================================================================
    // Emitted-program views
    // ========================================================================

    /// Human-readable listing of the top-level stream and every stored
    /// sequence that received code.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "main:");
        for inst in self.code() {
            let _ = writeln!(out, "  {}", inst);
        }
        for (i, seq) in self.seqs.iter().enumerate() {
            if SeqId(i) == self.top || seq.code.is_empty() {
                continue;
            }
            let marker = if seq.subroutine { " (subroutine)" } else { "" };
            let _ = writeln!(out);
            let _ = writeln!(out, "@{}:{}", i, marker);
            for inst in &seq.code {
                let _ = writeln!(out, "  {}", inst);
            }
        }
        out
    }

    /// Serializable view for downstream tools (the painter, mostly).
    pub fn emitted(&self) -> EmittedProgram<'_> {
        EmittedProgram {
            code: self.code(),
            sequences: self
                .seqs
                .iter()
                .enumerate()
                .filter(|(i, seq)| SeqId(*i) != self.top && !seq.code.is_empty())
                .map(|(i, seq)| EmittedSequence {
                    id: i,
                    subroutine: seq.subroutine,
                    code: &seq.code,
                })
                .collect(),
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct EmittedProgram<'a> {
    pub code: &'a [Inst],
    pub sequences: Vec<EmittedSequence<'a>>,
}

#[derive(Serialize)]
pub struct EmittedSequence<'a> {
    pub id: usize,
    pub subroutine: bool,
    pub code: &'a [Inst],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation(prog: &mut Program, params: &[&str], args: Vec<Value>) -> SeqId {
        let lambda = Rc::new(Lambda {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Sexpr::Nil,
            env: prog.env.clone(),
        });
        let stack_size = args.len();
        prog.new_activation(lambda, args, stack_size)
    }

    #[test]
    fn test_emission_broadcasts_to_open_activations() {
        let mut prog = Program::new();
        let top = prog.top;
        let outer = activation(&mut prog, &["x"], vec![Value::Integer(1)]);
        let inner = activation(&mut prog, &["y"], vec![Value::Integer(2)]);

        prog.open_activation(outer);
        prog.emit_push(top, 10);
        prog.open_activation(inner);
        prog.emit_push(top, 20);
        prog.emit(top, Inst::Add);

        // Outer saw both pushes and the add; inner only what came after
        // it opened.
        assert_eq!(prog.sequence(outer).frame.as_ref().unwrap().stack_offset, 1);
        assert_eq!(prog.sequence(inner).frame.as_ref().unwrap().stack_offset, 0);

        prog.close_activation();
        prog.emit_push(top, 30);
        assert_eq!(prog.sequence(outer).frame.as_ref().unwrap().stack_offset, 2);
        assert_eq!(prog.sequence(inner).frame.as_ref().unwrap().stack_offset, 0);
    }

    #[test]
    fn test_reference_entries_do_not_broadcast() {
        let mut prog = Program::new();
        let top = prog.top;
        let act = activation(&mut prog, &["x"], vec![Value::Integer(1)]);
        let stored = prog.new_sequence(Sexpr::Nil, prog.env.clone(), true);

        prog.open_activation(act);
        prog.emit_ref(top, Inst::Seq(stored));
        assert_eq!(prog.sequence(act).frame.as_ref().unwrap().stack_offset, 0);
    }

    #[test]
    fn test_param_depth_tracks_offset_and_slot() {
        let mut prog = Program::new();
        let top = prog.top;
        let act = activation(
            &mut prog,
            &["x", "y"],
            vec![Value::Integer(4), Value::Integer(5)],
        );

        let x = Parameter {
            owner: act,
            slot: 0,
            symbol: "x".to_string(),
        };
        let y = Parameter {
            owner: act,
            slot: 1,
            symbol: "y".to_string(),
        };

        // Arguments pushed oldest-first: the later formal is shallower.
        assert_eq!(prog.param_depth(&x), 1);
        assert_eq!(prog.param_depth(&y), 0);

        prog.open_activation(act);
        prog.emit_push(top, 7);
        assert_eq!(prog.param_depth(&x), 2);
        assert_eq!(prog.param_depth(&y), 1);
    }

    #[test]
    fn test_context_reentry_restores_offsets() {
        let mut prog = Program::new();
        let top = prog.top;
        let act = activation(&mut prog, &["x"], vec![Value::Integer(1)]);

        prog.open_activation(act);
        prog.emit_push(top, 2);
        let context = prog.capture_context();
        prog.emit_push(top, 3);
        prog.close_activation();

        assert_eq!(prog.sequence(act).frame.as_ref().unwrap().stack_offset, 2);

        // Re-entering sees the captured offset minus the consumed
        // predicate slot; leaving restores the final value.
        prog.enter_context(&context);
        assert_eq!(prog.sequence(act).frame.as_ref().unwrap().stack_offset, 0);
        prog.leave_context();
        assert_eq!(prog.sequence(act).frame.as_ref().unwrap().stack_offset, 2);
    }

    #[test]
    fn test_resolve_choice_is_recorded() {
        let mut prog = Program::new();
        let env = prog.env.clone();
        let test = prog.new_sequence(Sexpr::Integer(1), env.clone(), false);
        let cond = prog.new_conditional(Sexpr::Integer(100), Sexpr::Integer(200), env, test);

        assert!(prog.conditional(cond).choice.is_none());
        let chosen = prog.resolve_choice(cond, false);
        assert_eq!(prog.conditional(cond).choice, Some(chosen));
        assert_eq!(prog.sequence(chosen).sexpr, Sexpr::Integer(200));
    }
}
