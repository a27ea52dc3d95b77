// Flat, globally-scoped instructions with symbolic or resolved jump targets.

use crate::ir::ast::{BinOp, UnOp};
use crate::ir::flatten::FlatSlot;
use std::fmt;

/// Symbolic jump target, unique within its unit (`MAIN_END0003`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub String);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Label(Label),
    /// Resolved line number.
    Line(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(l) => write!(f, "{l}"),
            Target::Line(n) => write!(f, "{n}"),
        }
    }
}

/// Expression over flat slot names and literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Num(i64),
    Slot(String),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Slot names read by this expression, left to right.
    pub fn slots(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_slots(&mut out);
        out
    }

    fn collect_slots<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Num(_) => {}
            Expr::Slot(s) => out.push(s),
            Expr::Unary { operand, .. } => operand.collect_slots(out),
            Expr::Binary { left, right, .. } => {
                left.collect_slots(out);
                right.collect_slots(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Slot(s) => write!(f, "{s}"),
            Expr::Unary { op, operand } => write!(f, "({} {})", op.spl_name(), operand),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.spl_name(), right)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintArg {
    Slot(String),
    Num(i64),
    Str(String),
}

impl fmt::Display for PrintArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintArg::Slot(s) => write!(f, "{s}"),
            PrintArg::Num(n) => write!(f, "{n}"),
            PrintArg::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `dst := src`
    Assign { dst: String, src: Expr },
    Print(PrintArg),
    /// Jump to `target` when `cond` is false, fall through otherwise.
    JumpIfFalse { cond: Expr, target: Target },
    Jump(Target),
    Halt,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Assign { dst, src } => write!(f, "{dst} := {src}"),
            Op::Print(arg) => write!(f, "print {arg}"),
            Op::JumpIfFalse { cond, target } => write!(f, "if_false {cond} goto {target}"),
            Op::Jump(target) => write!(f, "goto {target}"),
            Op::Halt => write!(f, "halt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatInstruction {
    /// Final line number, set by the label resolver.
    pub line: Option<u32>,
    /// Symbolic labels naming this instruction as a jump destination.
    pub labels: Vec<Label>,
    pub op: Op,
}

impl FlatInstruction {
    pub fn new(op: Op) -> Self {
        Self {
            line: None,
            labels: Vec::new(),
            op,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match &self.op {
            Op::JumpIfFalse { target, .. } | Op::Jump(target) => Some(target),
            _ => None,
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut Target> {
        match &mut self.op {
            Op::JumpIfFalse { target, .. } | Op::Jump(target) => Some(target),
            _ => None,
        }
    }
}

/// Output of the lowering pipeline: a jump-resolved instruction sequence and
/// the slots it uses.
#[derive(Debug, Clone)]
pub struct FlatProgram {
    pub instrs: Vec<FlatInstruction>,
    pub slots: Vec<FlatSlot>,
}

impl FlatProgram {
    pub fn to_lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.instrs.len());
        for ins in &self.instrs {
            let mut line = match ins.line {
                Some(n) => format!("{n:>5}  "),
                None => " ".repeat(7),
            };
            if !ins.labels.is_empty() {
                let names: Vec<&str> = ins.labels.iter().map(|l| l.0.as_str()).collect();
                line.push_str(&format!("[{}] ", names.join(", ")));
            }
            line.push_str(&ins.op.to_string());
            out.push(line);
        }
        out
    }

    pub fn slot(&self, name: &str) -> Option<&FlatSlot> {
        self.slots.iter().find(|s| s.name == name)
    }
}
