//! Reference interpreter for resolved flat programs.
//!
//! Slots are integers that start at 0. Comparisons and boolean operators
//! produce 1 or 0, any non-zero value is true, and division truncates
//! toward zero. Execution stops at `halt` or after the last instruction.

use crate::ir::ast::{BinOp, UnOp};
use crate::ir::flat::{Expr, FlatInstruction, FlatProgram, Op, PrintArg, Target};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("Division by zero at line {line}")]
    DivisionByZero { line: u32 },

    #[error("Jump from line {from} to missing line {to}")]
    MissingLine { from: u32, to: u32 },

    #[error("Jump to unresolved label {label}")]
    UnresolvedLabel { label: String },

    #[error("Step limit of {limit} exceeded")]
    StepLimit { limit: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SimOutcome {
    /// One entry per executed `print`.
    pub output: Vec<String>,
    pub slots: HashMap<String, i64>,
    pub steps: usize,
}

impl SimOutcome {
    pub fn slot(&self, name: &str) -> i64 {
        self.slots.get(name).copied().unwrap_or(0)
    }
}

pub fn run(program: &FlatProgram, step_limit: usize) -> Result<SimOutcome, SimError> {
    Machine::new(&program.instrs).run(step_limit)
}

struct Machine<'a> {
    instrs: &'a [FlatInstruction],
    index_of_line: HashMap<u32, usize>,
    state: SimOutcome,
}

impl<'a> Machine<'a> {
    fn new(instrs: &'a [FlatInstruction]) -> Self {
        let index_of_line = instrs
            .iter()
            .enumerate()
            .filter_map(|(i, ins)| ins.line.map(|l| (l, i)))
            .collect();
        Self {
            instrs,
            index_of_line,
            state: SimOutcome::default(),
        }
    }

    fn run(mut self, step_limit: usize) -> Result<SimOutcome, SimError> {
        let instrs = self.instrs;
        let mut pc = 0;
        while let Some(ins) = instrs.get(pc) {
            if self.state.steps >= step_limit {
                return Err(SimError::StepLimit { limit: step_limit });
            }
            self.state.steps += 1;
            let line = ins.line.unwrap_or(0);
            pc = match &ins.op {
                Op::Assign { dst, src } => {
                    let v = self.eval(src, line)?;
                    self.state.slots.insert(dst.clone(), v);
                    pc + 1
                }
                Op::Print(arg) => {
                    let text = match arg {
                        PrintArg::Slot(s) => self.state.slot(s).to_string(),
                        PrintArg::Num(n) => n.to_string(),
                        PrintArg::Str(s) => s.clone(),
                    };
                    self.state.output.push(text);
                    pc + 1
                }
                Op::JumpIfFalse { cond, target } => {
                    if self.eval(cond, line)? == 0 {
                        self.jump(target, line)?
                    } else {
                        pc + 1
                    }
                }
                Op::Jump(target) => self.jump(target, line)?,
                Op::Halt => break,
            };
        }
        Ok(self.state)
    }

    fn jump(&self, target: &Target, from: u32) -> Result<usize, SimError> {
        match target {
            Target::Line(to) => self
                .index_of_line
                .get(to)
                .copied()
                .ok_or(SimError::MissingLine { from, to: *to }),
            Target::Label(label) => Err(SimError::UnresolvedLabel {
                label: label.0.clone(),
            }),
        }
    }

    fn eval(&self, e: &Expr, line: u32) -> Result<i64, SimError> {
        Ok(match e {
            Expr::Num(n) => *n,
            Expr::Slot(s) => self.state.slot(s),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, line)?;
                match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => (v == 0) as i64,
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, line)?;
                let r = self.eval(right, line)?;
                match op {
                    BinOp::Eq => (l == r) as i64,
                    BinOp::Gt => (l > r) as i64,
                    BinOp::Or => (l != 0 || r != 0) as i64,
                    BinOp::And => (l != 0 && r != 0) as i64,
                    BinOp::Plus => l.wrapping_add(r),
                    BinOp::Minus => l.wrapping_sub(r),
                    BinOp::Mult => l.wrapping_mul(r),
                    BinOp::Div => {
                        if r == 0 {
                            return Err(SimError::DivisionByZero { line });
                        }
                        l.wrapping_div(r)
                    }
                }
            }
        })
    }
}
