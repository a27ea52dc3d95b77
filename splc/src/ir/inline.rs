//! Inlining.
//!
//! Every callable is lowered once, callees before callers, into a
//! [`Lowered`] template: a call-free [`Node`] tree over a frame of slot
//! requests. A call site imports the callee's template into the caller's
//! frame under fresh copy numbers, so each site gets its own storage for
//! the callee's parameters, locals and temporaries. Nothing is named here;
//! the [`SymbolFlattener`](crate::ir::flatten::SymbolFlattener) turns the
//! final frame of main into flat slot names.

use crate::ir::ast::{Atom, BinOp, Instr, Output, Term, UnOp};
use crate::ir::flatten::{FrameSlot, SlotOrigin, SlotRef};
use crate::ir::scope::{CallableId, DeclId, DeclKind, ScopeId, ScopeTree, Unit};
use crate::{CompileError, InternalErrorKind, SemanticErrorKind};
use std::collections::HashMap;
use tracing::debug;

/// Call-free term over slots and literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LTerm {
    Num(i64),
    Slot(SlotRef),
    Unary {
        op: UnOp,
        operand: Box<LTerm>,
    },
    Binary {
        op: BinOp,
        left: Box<LTerm>,
        right: Box<LTerm>,
    },
}

impl LTerm {
    fn shifted(&self, offset: usize) -> LTerm {
        match self {
            LTerm::Num(n) => LTerm::Num(*n),
            LTerm::Slot(s) => LTerm::Slot(shift(*s, offset)),
            LTerm::Unary { op, operand } => LTerm::Unary {
                op: *op,
                operand: Box::new(operand.shifted(offset)),
            },
            LTerm::Binary { op, left, right } => LTerm::Binary {
                op: *op,
                left: Box::new(left.shifted(offset)),
                right: Box::new(right.shifted(offset)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintItem {
    Slot(SlotRef),
    Num(i64),
    Str(String),
}

/// Inlined instruction tree, mirroring the statement structure of one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Assign {
        dst: SlotRef,
        src: LTerm,
    },
    Print(PrintItem),
    Halt,
    If {
        cond: LTerm,
        then_branch: Vec<Node>,
        else_branch: Option<Vec<Node>>,
    },
    /// `test` computes what `cond` reads; it runs before every check.
    While {
        test: Vec<Node>,
        cond: LTerm,
        body: Vec<Node>,
    },
    DoUntil {
        body: Vec<Node>,
        test: Vec<Node>,
        cond: LTerm,
    },
    /// A callee's body spliced in at a call site. Argument assignments
    /// precede it; the return value is read after it.
    Inlined {
        callee: CallableId,
        body: Vec<Node>,
    },
}

impl Node {
    fn shifted(&self, offset: usize) -> Node {
        let block = |b: &[Node]| b.iter().map(|n| n.shifted(offset)).collect::<Vec<_>>();
        match self {
            Node::Assign { dst, src } => Node::Assign {
                dst: shift(*dst, offset),
                src: src.shifted(offset),
            },
            Node::Print(PrintItem::Slot(s)) => Node::Print(PrintItem::Slot(shift(*s, offset))),
            Node::Print(item) => Node::Print(item.clone()),
            Node::Halt => Node::Halt,
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => Node::If {
                cond: cond.shifted(offset),
                then_branch: block(then_branch),
                else_branch: else_branch.as_deref().map(block),
            },
            Node::While { test, cond, body } => Node::While {
                test: block(test),
                cond: cond.shifted(offset),
                body: block(body),
            },
            Node::DoUntil { body, test, cond } => Node::DoUntil {
                body: block(body),
                test: block(test),
                cond: cond.shifted(offset),
            },
            Node::Inlined { callee, body } => Node::Inlined {
                callee: *callee,
                body: block(body),
            },
        }
    }
}

fn shift(slot: SlotRef, offset: usize) -> SlotRef {
    match slot {
        SlotRef::Global(d) => SlotRef::Global(d),
        SlotRef::Frame(i) => SlotRef::Frame(i + offset),
    }
}

/// A fully inlined body.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub unit: Unit,
    pub frame: Vec<FrameSlot>,
    /// Frame indices of the parameters, in declaration order.
    pub params: Vec<usize>,
    pub body: Vec<Node>,
    /// Function result, read after `body` has run.
    pub ret: Option<LTerm>,
    /// Nesting depth: 1 for a callable that calls nothing. For main, the
    /// deepest callee.
    pub depth: usize,
    /// Copy numbers used in `frame` are `0..copies`; 0 is the unit itself.
    pub copies: usize,
}

pub struct Inliner<'t, 'p> {
    tree: &'t ScopeTree<'p>,
    limit: usize,
    templates: Vec<Option<Lowered>>,
}

impl<'t, 'p> Inliner<'t, 'p> {
    pub fn new(tree: &'t ScopeTree<'p>, limit: usize) -> Self {
        Self {
            tree,
            limit,
            templates: vec![None; tree.callable_count()],
        }
    }

    /// Lower one callable. Every callable it calls must already be lowered.
    pub fn lower_callable(&mut self, id: CallableId) -> Result<(), CompileError> {
        let tree = self.tree;
        let entry = tree.callable(id);
        let mut lowerer = BodyLowerer::new(tree, &self.templates, Unit::Callable(id));
        let mut body = lowerer.block(&entry.def.body)?;
        let ret = match &entry.def.ret {
            Some(term) => Some(lowerer.term(term, &mut body)?),
            None => None,
        };

        let depth = lowerer.callee_depth + 1;
        if depth > self.limit {
            return Err(CompileError::InliningDepthExceeded {
                callable: entry.name().to_string(),
                depth,
                limit: self.limit,
            });
        }

        let params = (0..entry.params.len()).collect();
        let lowered = lowerer.finish(body, ret, params, depth);
        debug!(
            callable = entry.name(),
            depth,
            frame = lowered.frame.len(),
            copies = lowered.copies,
            "callable lowered"
        );
        self.templates[id.0] = Some(lowered);
        Ok(())
    }

    pub fn lower_main(&self, body: &[Instr]) -> Result<Lowered, CompileError> {
        let mut lowerer = BodyLowerer::new(self.tree, &self.templates, Unit::Main);
        let body = lowerer.block(body)?;
        let depth = lowerer.callee_depth;
        let lowered = lowerer.finish(body, None, Vec::new(), depth);
        debug!(
            depth,
            frame = lowered.frame.len(),
            copies = lowered.copies,
            "main lowered"
        );
        Ok(lowered)
    }
}

struct InlinedCall {
    callee: CallableId,
    copy: usize,
    ret: Option<LTerm>,
}

struct BodyLowerer<'a, 'p> {
    tree: &'a ScopeTree<'p>,
    templates: &'a [Option<Lowered>],
    unit: Unit,
    scope: ScopeId,
    frame: Vec<FrameSlot>,
    own: HashMap<DeclId, usize>,
    next_copy: usize,
    temps: usize,
    callee_depth: usize,
}

impl<'a, 'p> BodyLowerer<'a, 'p> {
    fn new(tree: &'a ScopeTree<'p>, templates: &'a [Option<Lowered>], unit: Unit) -> Self {
        let decls: Vec<DeclId> = match unit {
            Unit::Main => tree.main_locals().to_vec(),
            Unit::Callable(id) => {
                let entry = tree.callable(id);
                entry.params.iter().chain(&entry.locals).copied().collect()
            }
        };
        let mut this = Self {
            tree,
            templates,
            unit,
            scope: tree.body_scope(unit),
            frame: Vec::new(),
            own: HashMap::new(),
            next_copy: 1,
            temps: 0,
            callee_depth: 0,
        };
        for decl in decls {
            this.own.insert(decl, this.frame.len());
            this.frame.push(FrameSlot {
                owner: unit,
                copy: 0,
                origin: SlotOrigin::Decl(decl),
            });
        }
        this
    }

    fn finish(self, body: Vec<Node>, ret: Option<LTerm>, params: Vec<usize>, depth: usize) -> Lowered {
        Lowered {
            unit: self.unit,
            frame: self.frame,
            params,
            body,
            ret,
            depth,
            copies: self.next_copy,
        }
    }

    fn variable(&self, name: &str) -> Result<SlotRef, CompileError> {
        let undeclared = || {
            CompileError::semantic(
                SemanticErrorKind::UndeclaredVariable,
                name,
                format!("Variable '{name}' is not declared"),
            )
        };
        let decl = self.tree.resolve(name, self.scope).ok_or_else(undeclared)?;
        match self.tree.decl(decl).kind {
            DeclKind::Global => Ok(SlotRef::Global(decl)),
            DeclKind::Param | DeclKind::Local => self
                .own
                .get(&decl)
                .map(|&i| SlotRef::Frame(i))
                .ok_or_else(undeclared),
        }
    }

    fn push_slot(&mut self, slot: FrameSlot) -> SlotRef {
        self.frame.push(slot);
        SlotRef::Frame(self.frame.len() - 1)
    }

    fn fresh_temp(&mut self) -> SlotRef {
        self.temps += 1;
        self.push_slot(FrameSlot {
            owner: self.unit,
            copy: 0,
            origin: SlotOrigin::Temp(self.temps),
        })
    }

    /// Whether a later call can change the value of `term`.
    fn is_stable(&self, term: &LTerm) -> bool {
        match term {
            LTerm::Num(_) => true,
            LTerm::Slot(SlotRef::Frame(i)) => matches!(
                self.frame[*i].origin,
                SlotOrigin::Temp(_) | SlotOrigin::Result
            ),
            _ => false,
        }
    }

    fn block(&mut self, instrs: &[Instr]) -> Result<Vec<Node>, CompileError> {
        let mut out = Vec::new();
        for instr in instrs {
            self.instr(instr, &mut out)?;
        }
        Ok(out)
    }

    fn instr(&mut self, instr: &Instr, out: &mut Vec<Node>) -> Result<(), CompileError> {
        match instr {
            Instr::Halt => out.push(Node::Halt),
            Instr::Print(output) => {
                let item = match output {
                    Output::Atom(Atom::Var(name)) => PrintItem::Slot(self.variable(name)?),
                    Output::Atom(Atom::Num(n)) => PrintItem::Num(*n),
                    Output::Str(s) => PrintItem::Str(s.clone()),
                };
                out.push(Node::Print(item));
            }
            Instr::Call { name, args } => {
                self.call(name, args, out)?;
            }
            Instr::Assign { target, value } => {
                let dst = self.variable(target)?;
                let src = match value {
                    Term::Call { name, args } => {
                        let call = self.call(name, args, out)?;
                        call.ret.ok_or_else(|| procedure_in_expression(name))?
                    }
                    _ => self.term(value, out)?,
                };
                out.push(Node::Assign { dst, src });
            }
            Instr::While { cond, body } => {
                let mut test = Vec::new();
                let cond = self.term(cond, &mut test)?;
                let body = self.block(body)?;
                out.push(Node::While { test, cond, body });
            }
            Instr::DoUntil { body, cond } => {
                let body = self.block(body)?;
                let mut test = Vec::new();
                let cond = self.term(cond, &mut test)?;
                out.push(Node::DoUntil { body, test, cond });
            }
            Instr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.term(cond, out)?;
                let then_branch = self.block(then_branch)?;
                let else_branch = match else_branch {
                    Some(b) => Some(self.block(b)?),
                    None => None,
                };
                out.push(Node::If {
                    cond,
                    then_branch,
                    else_branch,
                });
            }
        }
        Ok(())
    }

    /// Lower a term, appending whatever it needs computed first to `out`.
    fn term(&mut self, term: &Term, out: &mut Vec<Node>) -> Result<LTerm, CompileError> {
        match term {
            Term::Atom(Atom::Num(n)) => Ok(LTerm::Num(*n)),
            Term::Atom(Atom::Var(name)) => Ok(LTerm::Slot(self.variable(name)?)),
            Term::Unary { op, operand } => Ok(LTerm::Unary {
                op: *op,
                operand: Box::new(self.term(operand, out)?),
            }),
            Term::Binary { op, left, right } => {
                let mut l = self.term(left, out)?;
                if right.contains_call() && !self.is_stable(&l) {
                    let tmp = self.fresh_temp();
                    out.push(Node::Assign { dst: tmp, src: l });
                    l = LTerm::Slot(tmp);
                }
                let r = self.term(right, out)?;
                Ok(LTerm::Binary {
                    op: *op,
                    left: Box::new(l),
                    right: Box::new(r),
                })
            }
            Term::Call { name, args } => {
                let call = self.call(name, args, out)?;
                let ret = call.ret.ok_or_else(|| procedure_in_expression(name))?;
                let res = self.push_slot(FrameSlot {
                    owner: Unit::Callable(call.callee),
                    copy: call.copy,
                    origin: SlotOrigin::Result,
                });
                out.push(Node::Assign { dst: res, src: ret });
                Ok(LTerm::Slot(res))
            }
        }
    }

    /// Import a fresh copy of the callee, assign the arguments left to right
    /// into its parameter slots, then splice in its body.
    fn call(&mut self, name: &str, args: &[Term], out: &mut Vec<Node>) -> Result<InlinedCall, CompileError> {
        let callee = self.tree.callable_id(name).ok_or_else(|| {
            CompileError::semantic(
                SemanticErrorKind::UndefinedCallable,
                name,
                format!("Call to undefined procedure or function '{name}'"),
            )
        })?;
        let templates = self.templates;
        let template = templates.get(callee.0).and_then(Option::as_ref).ok_or_else(|| {
            CompileError::internal(
                InternalErrorKind::CalleeNotLowered,
                format!("call to '{name}' reached before its body was lowered"),
            )
        })?;
        if args.len() != template.params.len() {
            return Err(CompileError::semantic(
                SemanticErrorKind::ArgumentCountMismatch,
                name,
                format!(
                    "'{name}' expects {} argument(s), got {}",
                    template.params.len(),
                    args.len()
                ),
            ));
        }

        let offset = self.frame.len();
        let base = self.next_copy;
        self.next_copy += template.copies;
        self.frame.extend(template.frame.iter().map(|slot| FrameSlot {
            copy: base + slot.copy,
            ..*slot
        }));
        self.callee_depth = self.callee_depth.max(template.depth);

        for (arg, &param) in args.iter().zip(&template.params) {
            let src = self.term(arg, out)?;
            out.push(Node::Assign {
                dst: SlotRef::Frame(param + offset),
                src,
            });
        }
        out.push(Node::Inlined {
            callee,
            body: template.body.iter().map(|n| n.shifted(offset)).collect(),
        });

        Ok(InlinedCall {
            callee,
            copy: base,
            ret: template.ret.as_ref().map(|r| r.shifted(offset)),
        })
    }
}

fn procedure_in_expression(name: &str) -> CompileError {
    CompileError::semantic(
        SemanticErrorKind::ProcedureInExpression,
        name,
        format!("Procedure '{name}' has no value"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_program;
    use crate::ir::call_graph::CallGraph;

    fn lower_src(src: &str, limit: usize) -> Result<(Lowered, Vec<FrameSlot>), CompileError> {
        let program = parse_program(src).unwrap();
        let tree = ScopeTree::build(&program);
        let order = CallGraph::build(&tree)?.reverse_topological(&tree)?;
        let mut inliner = Inliner::new(&tree, limit);
        for id in order {
            inliner.lower_callable(id)?;
        }
        let main = inliner.lower_main(&program.main.body)?;
        let frame = main.frame.clone();
        Ok((main, frame))
    }

    #[test]
    fn parameter_is_assigned_before_the_inlined_body() {
        let (main, frame) = lower_src(
            "glob{c} proc{show(){local{} print c}} \
             func{double(n){local{}; return (n plus n)}} \
             main{var{x} x = 5; c = double(x); show(); halt}",
            32,
        )
        .unwrap();

        let double = Unit::Callable(CallableId(1));
        assert!(matches!(
            &main.body[0],
            Node::Assign { dst: SlotRef::Frame(0), src: LTerm::Num(5) }
        ));
        match &main.body[1] {
            Node::Assign {
                dst: SlotRef::Frame(p),
                src: LTerm::Slot(SlotRef::Frame(0)),
            } => assert_eq!(frame[*p].owner, double),
            other => panic!("expected parameter assignment, got {:?}", other),
        }
        assert!(matches!(&main.body[2], Node::Inlined { callee: CallableId(1), .. }));
        assert!(matches!(
            &main.body[3],
            Node::Assign { dst: SlotRef::Global(_), src: LTerm::Binary { op: BinOp::Plus, .. } }
        ));
        match &main.body[4] {
            Node::Inlined { callee, body } => {
                assert_eq!(*callee, CallableId(0));
                assert!(matches!(body[0], Node::Print(PrintItem::Slot(SlotRef::Global(_)))));
            }
            other => panic!("expected inlined show, got {:?}", other),
        }
        assert_eq!(main.body[5], Node::Halt);
        assert_eq!(main.depth, 1);
    }

    #[test]
    fn each_call_site_gets_its_own_copy() {
        let (main, frame) = lower_src(
            "glob{} proc{} func{inc(a){local{}; return (a plus 1)}} \
             main{var{x y} x = inc(1); y = inc(x); halt}",
            32,
        )
        .unwrap();
        let copies: Vec<usize> = frame
            .iter()
            .filter(|s| s.owner == Unit::Callable(CallableId(0)))
            .map(|s| s.copy)
            .collect();
        assert_eq!(copies.len(), 2);
        assert_ne!(copies[0], copies[1]);
        assert_eq!(main.copies, 3);
    }

    #[test]
    fn nested_call_goes_through_a_result_slot() {
        let (main, frame) = lower_src(
            "glob{} proc{} func{one(){local{}; return 1}} \
             main{var{x} x = (x plus one()); halt}",
            32,
        )
        .unwrap();
        // x is spilled because the call could have changed it.
        assert!(frame.iter().any(|s| s.origin == SlotOrigin::Temp(1)));
        assert!(frame.iter().any(|s| s.origin == SlotOrigin::Result));
        assert!(matches!(main.body.last(), Some(Node::Halt)));
    }

    #[test]
    fn loop_condition_calls_live_in_the_test_prelude() {
        let (main, _) = lower_src(
            "glob{} proc{} func{ten(){local{}; return 10}} \
             main{var{i} while (ten() > i) { i = (i plus 1) }; halt}",
            32,
        )
        .unwrap();
        match &main.body[0] {
            Node::While { test, .. } => {
                assert!(matches!(test[0], Node::Inlined { .. }));
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn depth_is_the_longest_chain() {
        let src = "glob{} proc{a(){local{} b()} b(){local{} c()} c(){local{} halt}} func{} \
                   main{var{} a()}";
        let (main, _) = lower_src(src, 3).unwrap();
        assert_eq!(main.depth, 3);

        let err = lower_src(src, 2).unwrap_err();
        match err {
            CompileError::InliningDepthExceeded { callable, depth, limit } => {
                assert_eq!(callable, "a");
                assert_eq!(depth, 3);
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn procedure_value_is_rejected() {
        let err = lower_src("glob{} proc{p(){local{} halt}} func{} main{var{x} x = p()}", 32).unwrap_err();
        assert_eq!(err.offending_name(), Some("p"));
    }
}
