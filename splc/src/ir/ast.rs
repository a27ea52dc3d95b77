//! SPL abstract syntax tree.
//!
//! This is the contract between the front end and the lowering pipeline.
//! Nodes carry source lines where diagnostics need them; everything else is
//! plain owned data.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<VarDecl>,
    pub procedures: Vec<Callable>,
    pub functions: Vec<Callable>,
    pub main: MainProg,
}

impl Program {
    /// Procedures first, then functions, in declaration order.
    pub fn callables(&self) -> impl Iterator<Item = &Callable> {
        self.procedures.iter().chain(self.functions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub line: usize,
}

impl VarDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            line: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Procedure,
    Function,
}

impl std::fmt::Display for CallableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallableKind::Procedure => write!(f, "procedure"),
            CallableKind::Function => write!(f, "function"),
        }
    }
}

/// A procedure or function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub name: String,
    pub kind: CallableKind,
    pub params: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Instr>,
    /// Present for functions, absent for procedures.
    pub ret: Option<Term>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainProg {
    pub locals: Vec<VarDecl>,
    pub body: Vec<Instr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Halt,
    Print(Output),
    /// Procedure call statement: `name(args)`
    Call { name: String, args: Vec<Term> },
    /// `target = value`; SPL's `x = f(a)` is an assignment of a call term.
    Assign { target: String, value: Term },
    While { cond: Term, body: Vec<Instr> },
    /// Post-test loop: `do { body } until cond`
    DoUntil { body: Vec<Instr>, cond: Term },
    If {
        cond: Term,
        then_branch: Vec<Instr>,
        else_branch: Option<Vec<Instr>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Atom(Atom),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Var(String),
    Num(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Atom(Atom),
    Unary {
        op: UnOp,
        operand: Box<Term>,
    },
    Binary {
        op: BinOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    /// Function call used as a value.
    Call { name: String, args: Vec<Term> },
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Atom(Atom::Var(name.into()))
    }

    pub fn num(n: i64) -> Self {
        Term::Atom(Atom::Num(n))
    }

    pub fn unary(op: UnOp, operand: Term) -> Self {
        Term::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinOp, left: Term, right: Term) -> Self {
        Term::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Call {
            name: name.into(),
            args,
        }
    }

    pub fn contains_call(&self) -> bool {
        match self {
            Term::Atom(_) => false,
            Term::Unary { operand, .. } => operand.contains_call(),
            Term::Binary { left, right, .. } => left.contains_call() || right.contains_call(),
            Term::Call { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Eq,
    Gt,
    Or,
    And,
    Plus,
    Minus,
    Mult,
    Div,
}

impl BinOp {
    pub fn spl_name(self) -> &'static str {
        match self {
            BinOp::Eq => "eq",
            BinOp::Gt => ">",
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Plus => "plus",
            BinOp::Minus => "minus",
            BinOp::Mult => "mult",
            BinOp::Div => "div",
        }
    }
}

impl UnOp {
    pub fn spl_name(self) -> &'static str {
        match self {
            UnOp::Neg => "neg",
            UnOp::Not => "not",
        }
    }
}
