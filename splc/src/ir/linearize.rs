//! Control-flow linearization.
//!
//! Turns an inlined [`Node`] tree into flat instructions with symbolic
//! jump targets. Labels are not instructions: a placed label is held until
//! the next instruction is emitted and attached to it.

use crate::ir::flat::{Expr, FlatInstruction, Label, Op, PrintArg, Target};
use crate::ir::flatten::SlotNames;
use crate::ir::inline::{LTerm, Node, PrintItem};
use crate::CompileError;
use tracing::debug;

/// `slot := 0` for every global, in declaration order.
pub fn globals_init(slots: &[&str]) -> Vec<FlatInstruction> {
    slots
        .iter()
        .map(|s| {
            FlatInstruction::new(Op::Assign {
                dst: s.to_string(),
                src: Expr::Num(0),
            })
        })
        .collect()
}

pub struct Linearizer<'n> {
    names: &'n SlotNames,
    unit: String,
    out: Vec<FlatInstruction>,
    pending: Vec<Label>,
    label_count: usize,
}

impl<'n> Linearizer<'n> {
    /// `unit` prefixes every label this linearizer creates.
    pub fn new(names: &'n SlotNames, unit: impl Into<String>) -> Self {
        Self {
            names,
            unit: unit.into(),
            out: Vec::new(),
            pending: Vec::new(),
            label_count: 0,
        }
    }

    /// The emitted sequence. Labels still waiting for an instruction go on a
    /// final `halt`.
    pub fn finish(mut self) -> Vec<FlatInstruction> {
        if !self.pending.is_empty() {
            self.emit(Op::Halt);
        }
        debug!(
            unit = %self.unit,
            instrs = self.out.len(),
            labels = self.label_count,
            "unit linearized"
        );
        self.out
    }

    pub fn new_label(&mut self, role: &str) -> Label {
        self.label_count += 1;
        Label(format!("{}_{}{:04}", self.unit, role, self.label_count))
    }

    pub fn place(&mut self, label: Label) {
        self.pending.push(label);
    }

    pub fn emit(&mut self, op: Op) {
        let mut ins = FlatInstruction::new(op);
        ins.labels = std::mem::take(&mut self.pending);
        self.out.push(ins);
    }

    pub fn lower_block(&mut self, nodes: &[Node]) -> Result<(), CompileError> {
        for node in nodes {
            self.lower_node(node)?;
        }
        Ok(())
    }

    pub fn lower_node(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Assign { dst, src } => {
                let op = Op::Assign {
                    dst: self.names.name(*dst)?.to_string(),
                    src: self.expr(src)?,
                };
                self.emit(op);
            }
            Node::Print(item) => {
                let arg = match item {
                    PrintItem::Slot(s) => PrintArg::Slot(self.names.name(*s)?.to_string()),
                    PrintItem::Num(n) => PrintArg::Num(*n),
                    PrintItem::Str(s) => PrintArg::Str(s.clone()),
                };
                self.emit(Op::Print(arg));
            }
            Node::Halt => self.emit(Op::Halt),
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref())?,
            Node::While { test, cond, body } => self.lower_while(test, cond, body)?,
            Node::DoUntil { body, test, cond } => self.lower_do_until(body, test, cond)?,
            Node::Inlined { body, .. } => self.lower_block(body)?,
        }
        Ok(())
    }

    fn lower_if(&mut self, cond: &LTerm, then_blk: &[Node], else_blk: Option<&[Node]>) -> Result<(), CompileError> {
        let else_label = else_blk.map(|_| self.new_label("ELSE"));
        let end = self.new_label("END");
        let false_target = else_label.clone().unwrap_or_else(|| end.clone());

        let cond = self.expr(cond)?;
        self.emit(Op::JumpIfFalse {
            cond,
            target: Target::Label(false_target),
        });
        self.lower_block(then_blk)?;

        if let (Some(lbl), Some(blk)) = (else_label, else_blk) {
            self.emit(Op::Jump(Target::Label(end.clone())));
            self.place(lbl);
            self.lower_block(blk)?;
        }
        self.place(end);
        Ok(())
    }

    fn lower_while(&mut self, test: &[Node], cond: &LTerm, body: &[Node]) -> Result<(), CompileError> {
        let top = self.new_label("TOP");
        let end = self.new_label("END");

        self.place(top.clone());
        self.lower_block(test)?;
        let cond = self.expr(cond)?;
        self.emit(Op::JumpIfFalse {
            cond,
            target: Target::Label(end.clone()),
        });
        self.lower_block(body)?;
        self.emit(Op::Jump(Target::Label(top)));
        self.place(end);
        Ok(())
    }

    /// Post-test loop: the body runs once before the first check, and the
    /// loop repeats while the condition is false.
    fn lower_do_until(&mut self, body: &[Node], test: &[Node], cond: &LTerm) -> Result<(), CompileError> {
        let top = self.new_label("TOP");
        self.place(top.clone());
        self.lower_block(body)?;
        self.lower_block(test)?;
        let cond = self.expr(cond)?;
        self.emit(Op::JumpIfFalse {
            cond,
            target: Target::Label(top),
        });
        Ok(())
    }

    fn expr(&self, term: &LTerm) -> Result<Expr, CompileError> {
        Ok(match term {
            LTerm::Num(n) => Expr::Num(*n),
            LTerm::Slot(s) => Expr::Slot(self.names.name(*s)?.to_string()),
            LTerm::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(self.expr(operand)?),
            },
            LTerm::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(self.expr(left)?),
                right: Box::new(self.expr(right)?),
            },
        })
    }
}
