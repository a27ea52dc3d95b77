//! Name and type checks run between parsing and lowering.
//!
//! The lowering pipeline assumes every name resolves and every call matches
//! its callee; this pass is what makes that true for parsed programs.
//! Sections are checked in source order (globals, procedures, functions,
//! main), each declaration before its body, so the error reported is the
//! first one in the text.

use crate::ir::ast::{Atom, BinOp, Callable, CallableKind, Instr, Output, Program, Term, UnOp, VarDecl};
use crate::ir::scope::{ScopeId, ScopeTree, Unit};
use crate::{CompileError, SemanticErrorKind};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Report the first semantic error of `program`, if any.
pub fn check(program: &Program) -> Result<(), CompileError> {
    let tree = ScopeTree::build(program);
    let mut callables: HashMap<&str, &Callable> = HashMap::new();
    for c in program.callables() {
        callables.entry(c.name.as_str()).or_insert(c);
    }
    let decls = Declarations { callables: &callables };

    decls.variables(&program.globals, "Global variable", &[])?;

    let mut seen: HashMap<&str, CallableKind> = HashMap::new();
    for (id, entry) in tree.callables() {
        let c = entry.def;
        decls.callable(c, &mut seen)?;
        let mut body = BodyChecker {
            tree: &tree,
            callables: &callables,
            scope: tree.body_scope(Unit::Callable(id)),
            unit: &c.name,
        };
        body.block(&c.body)?;
        if let Some(ret) = &c.ret {
            body.expect(ret, Ty::Numeric, "Return value")?;
        }
    }

    decls.variables(&program.main.locals, "Main variable", &[])?;
    let mut main = BodyChecker {
        tree: &tree,
        callables: &callables,
        scope: tree.body_scope(Unit::Main),
        unit: "main",
    };
    main.block(&program.main.body)
}

fn error(kind: SemanticErrorKind, name: &str, message: String) -> CompileError {
    CompileError::semantic(kind, name, message)
}

struct Declarations<'a> {
    callables: &'a HashMap<&'a str, &'a Callable>,
}

impl Declarations<'_> {
    /// One declaration list, in order: no name twice, none shadowing a
    /// parameter in `params`, none naming a procedure or function.
    fn variables(&self, vars: &[VarDecl], what: &str, params: &[VarDecl]) -> Result<(), CompileError> {
        let mut seen = HashSet::new();
        for v in vars {
            if !seen.insert(v.name.as_str()) {
                return Err(error(
                    SemanticErrorKind::DuplicateDeclaration,
                    &v.name,
                    format!("{what} '{}' declared twice (line {})", v.name, v.line),
                ));
            }
            if params.iter().any(|p| p.name == v.name) {
                return Err(error(
                    SemanticErrorKind::ParameterShadowed,
                    &v.name,
                    format!("{what} '{}' shadows a parameter (line {})", v.name, v.line),
                ));
            }
            if let Some(c) = self.callables.get(v.name.as_str()) {
                return Err(error(
                    SemanticErrorKind::NameConflict,
                    &v.name,
                    format!("'{}' is used both as a variable and as a {}", v.name, c.kind),
                ));
            }
        }
        Ok(())
    }

    fn callable<'p>(&self, c: &'p Callable, seen: &mut HashMap<&'p str, CallableKind>) -> Result<(), CompileError> {
        if let Some(prev) = seen.insert(&c.name, c.kind) {
            let kind = if prev == c.kind {
                SemanticErrorKind::DuplicateDeclaration
            } else {
                SemanticErrorKind::NameConflict
            };
            return Err(error(
                kind,
                &c.name,
                format!("'{}' is already defined as a {prev}", c.name),
            ));
        }
        self.variables(&c.params, "Parameter", &[])?;
        self.variables(&c.locals, "Local variable", &c.params)?;
        match (c.kind, &c.ret) {
            (CallableKind::Function, None) => Err(error(
                SemanticErrorKind::MissingReturn,
                &c.name,
                format!("Function '{}' has no return", c.name),
            )),
            (CallableKind::Procedure, Some(_)) => Err(error(
                SemanticErrorKind::UnexpectedReturn,
                &c.name,
                format!("Procedure '{}' cannot return a value", c.name),
            )),
            _ => Ok(()),
        }
    }
}

/// Value type of a term. Variables, numbers and function results are
/// numeric; comparisons and logical operators are boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Numeric,
    Boolean,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Numeric => write!(f, "numeric"),
            Ty::Boolean => write!(f, "boolean"),
        }
    }
}

/// Operand type and result type of an operator.
fn unary_signature(op: UnOp) -> (Ty, Ty) {
    match op {
        UnOp::Neg => (Ty::Numeric, Ty::Numeric),
        UnOp::Not => (Ty::Boolean, Ty::Boolean),
    }
}

fn binary_signature(op: BinOp) -> (Ty, Ty) {
    match op {
        BinOp::Plus | BinOp::Minus | BinOp::Mult | BinOp::Div => (Ty::Numeric, Ty::Numeric),
        BinOp::And | BinOp::Or => (Ty::Boolean, Ty::Boolean),
        BinOp::Eq | BinOp::Gt => (Ty::Numeric, Ty::Boolean),
    }
}

struct BodyChecker<'a, 'p> {
    tree: &'a ScopeTree<'p>,
    callables: &'a HashMap<&'a str, &'a Callable>,
    scope: ScopeId,
    /// Name of the enclosing procedure or function, or `main`.
    unit: &'a str,
}

impl BodyChecker<'_, '_> {
    fn variable(&self, name: &str) -> Result<(), CompileError> {
        match self.tree.resolve(name, self.scope) {
            Some(_) => Ok(()),
            None => Err(error(
                SemanticErrorKind::UndeclaredVariable,
                name,
                format!("Variable '{name}' is not declared"),
            )),
        }
    }

    fn call(&self, name: &str, args: &[Term], want: CallableKind) -> Result<(), CompileError> {
        let callee = self.callables.get(name).ok_or_else(|| {
            error(
                SemanticErrorKind::UndefinedCallable,
                name,
                format!("Call to undefined procedure or function '{name}'"),
            )
        })?;
        match (want, callee.kind) {
            (CallableKind::Function, CallableKind::Procedure) => {
                return Err(error(
                    SemanticErrorKind::ProcedureInExpression,
                    name,
                    format!("Procedure '{name}' has no value"),
                ))
            }
            (CallableKind::Procedure, CallableKind::Function) => {
                return Err(error(
                    SemanticErrorKind::FunctionAsStatement,
                    name,
                    format!("Function '{name}' must be assigned, not called as a statement"),
                ))
            }
            _ => {}
        }
        if args.len() != callee.params.len() {
            return Err(error(
                SemanticErrorKind::ArgumentCountMismatch,
                name,
                format!(
                    "'{name}' expects {} argument(s), got {}",
                    callee.params.len(),
                    args.len()
                ),
            ));
        }
        args.iter()
            .try_for_each(|a| self.expect(a, Ty::Numeric, &format!("Argument of '{name}'")))
    }

    fn block(&mut self, body: &[Instr]) -> Result<(), CompileError> {
        body.iter().try_for_each(|i| self.instr(i))
    }

    fn instr(&mut self, instr: &Instr) -> Result<(), CompileError> {
        match instr {
            Instr::Halt | Instr::Print(Output::Str(_)) | Instr::Print(Output::Atom(Atom::Num(_))) => Ok(()),
            Instr::Print(Output::Atom(Atom::Var(name))) => self.variable(name),
            Instr::Call { name, args } => self.call(name, args, CallableKind::Procedure),
            Instr::Assign { target, value } => {
                self.variable(target)?;
                self.expect(value, Ty::Numeric, &format!("Value assigned to '{target}'"))
            }
            Instr::While { cond, body } => {
                self.expect(cond, Ty::Boolean, "Condition of 'while'")?;
                self.block(body)
            }
            Instr::DoUntil { body, cond } => {
                self.block(body)?;
                self.expect(cond, Ty::Boolean, "Condition of 'until'")
            }
            Instr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect(cond, Ty::Boolean, "Condition of 'if'")?;
                self.block(then_branch)?;
                match else_branch {
                    Some(b) => self.block(b),
                    None => Ok(()),
                }
            }
        }
    }

    fn expect(&self, term: &Term, want: Ty, what: &str) -> Result<(), CompileError> {
        let found = self.term(term)?;
        if found == want {
            return Ok(());
        }
        Err(error(
            SemanticErrorKind::TypeMismatch,
            self.unit,
            format!("{what} in '{}' must be {want}, found {found}", self.unit),
        ))
    }

    fn term(&self, term: &Term) -> Result<Ty, CompileError> {
        match term {
            Term::Atom(Atom::Num(_)) => Ok(Ty::Numeric),
            Term::Atom(Atom::Var(name)) => self.variable(name).map(|_| Ty::Numeric),
            Term::Unary { op, operand } => {
                let (arg, result) = unary_signature(*op);
                self.expect(operand, arg, &format!("Operand of '{}'", op.spl_name()))?;
                Ok(result)
            }
            Term::Binary { op, left, right } => {
                let (arg, result) = binary_signature(*op);
                let what = format!("Operand of '{}'", op.spl_name());
                self.expect(left, arg, &what)?;
                self.expect(right, arg, &what)?;
                Ok(result)
            }
            Term::Call { name, args } => self.call(name, args, CallableKind::Function).map(|_| Ty::Numeric),
        }
    }
}
