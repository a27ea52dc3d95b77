pub mod backend;
pub mod frontend;
pub mod ir;

use ir::ast::Program;
use ir::call_graph::CallGraph;
use ir::flat::FlatProgram;
use ir::flatten::SymbolFlattener;
use ir::inline::Inliner;
use ir::linearize::{self, Linearizer};
use ir::scope::ScopeTree;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info_span};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lexical(#[from] frontend::lexer::LexicalError),

    #[error("Parse error at line {line}, column {col}: {message}\n  Context: {context}")]
    Parse {
        line: usize,
        col: usize,
        context: String,
        message: String,
    },

    #[error("SemanticError:{kind} - {message}")]
    Semantic {
        kind: SemanticErrorKind,
        name: Option<String>,
        message: String,
    },

    #[error("Recursive definition unsupported: {}", .cycle.join(" -> "))]
    RecursiveDefinition { cycle: Vec<String> },

    #[error("Inlining too deep: '{callable}' nests {depth} calls deep (limit {limit})")]
    InliningDepthExceeded {
        callable: String,
        depth: usize,
        limit: usize,
    },

    #[error("Invalid option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    #[error("Internal compiler error ({kind}): {message}")]
    Internal {
        kind: InternalErrorKind,
        message: String,
    },
}

impl CompileError {
    pub fn internal(kind: InternalErrorKind, message: impl Into<String>) -> Self {
        CompileError::Internal {
            kind,
            message: message.into(),
        }
    }

    pub fn semantic(kind: SemanticErrorKind, name: &str, message: impl Into<String>) -> Self {
        CompileError::Semantic {
            kind,
            name: Some(name.to_string()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lexical(_) => ErrorKind::Lexical,
            CompileError::Parse { .. } => ErrorKind::Parse,
            CompileError::Semantic { kind, .. } => ErrorKind::Semantic(*kind),
            CompileError::RecursiveDefinition { .. } => ErrorKind::RecursiveDefinition,
            CompileError::InliningDepthExceeded { .. } => ErrorKind::InliningDepthExceeded,
            CompileError::InvalidOption { .. } => ErrorKind::InvalidOption,
            CompileError::Internal { kind, .. } => ErrorKind::Internal(*kind),
        }
    }

    /// The callable or declaration the error is about, when there is one.
    pub fn offending_name(&self) -> Option<&str> {
        match self {
            CompileError::Semantic { name, .. } => name.as_deref(),
            CompileError::RecursiveDefinition { cycle } => cycle.first().map(String::as_str),
            CompileError::InliningDepthExceeded { callable, .. } => Some(callable),
            _ => None,
        }
    }

    /// True for failures that point at a defect in the compiler rather than
    /// in the source program.
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Parse,
    Semantic(SemanticErrorKind),
    RecursiveDefinition,
    InliningDepthExceeded,
    InvalidOption,
    Internal(InternalErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    DuplicateDeclaration,
    ParameterShadowed,
    NameConflict,
    UndeclaredVariable,
    UndefinedCallable,
    ProcedureInExpression,
    FunctionAsStatement,
    ArgumentCountMismatch,
    MissingReturn,
    UnexpectedReturn,
    /// A numeric term where a boolean one is required, or the reverse.
    TypeMismatch,
}

impl std::fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticErrorKind::DuplicateDeclaration => write!(f, "DuplicateDeclaration"),
            SemanticErrorKind::ParameterShadowed => write!(f, "ParameterShadowed"),
            SemanticErrorKind::NameConflict => write!(f, "NameConflict"),
            SemanticErrorKind::UndeclaredVariable => write!(f, "UndeclaredVariable"),
            SemanticErrorKind::UndefinedCallable => write!(f, "UndefinedCallable"),
            SemanticErrorKind::ProcedureInExpression => write!(f, "ProcedureInExpression"),
            SemanticErrorKind::FunctionAsStatement => write!(f, "FunctionAsStatement"),
            SemanticErrorKind::ArgumentCountMismatch => write!(f, "ArgumentCountMismatch"),
            SemanticErrorKind::MissingReturn => write!(f, "MissingReturn"),
            SemanticErrorKind::UnexpectedReturn => write!(f, "UnexpectedReturn"),
            SemanticErrorKind::TypeMismatch => write!(f, "TypeMismatch"),
        }
    }
}

/// Invariant breaches inside the lowering passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalErrorKind {
    FlatNameCollision,
    UnresolvedJumpTarget,
    DuplicateLabel,
    /// A call site was reached before its callee's template was built.
    CalleeNotLowered,
    /// A lowered body refers to a slot with no materialized name.
    UnknownSlot,
}

impl std::fmt::Display for InternalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternalErrorKind::FlatNameCollision => write!(f, "FlatNameCollision"),
            InternalErrorKind::UnresolvedJumpTarget => write!(f, "UnresolvedJumpTarget"),
            InternalErrorKind::DuplicateLabel => write!(f, "DuplicateLabel"),
            InternalErrorKind::CalleeNotLowered => write!(f, "CalleeNotLowered"),
            InternalErrorKind::UnknownSlot => write!(f, "UnknownSlot"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// Ceiling on the caller-to-leaf nesting depth of inlined calls.
    pub max_inline_depth: usize,
    pub line_start: u32,
    pub line_step: u32,
    pub eliminate_dead_jumps: bool,
    /// Emit `slot := 0` for every global before main.
    pub zero_init_globals: bool,
}

impl LowerOptions {
    /// Reject settings that cannot produce a well-numbered program.
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.line_step == 0 {
            return Err(CompileError::InvalidOption {
                option: "line_step".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            max_inline_depth: 32,
            line_start: 10,
            line_step: 10,
            eliminate_dead_jumps: true,
            zero_init_globals: true,
        }
    }
}

/// Parse SPL source text into an AST.
pub fn parse(source: &str) -> Result<Program, CompileError> {
    frontend::parse_program(source)
}

/// Lower a program to a jump-resolved flat instruction sequence.
///
/// The AST is assumed to have passed [`ir::semantics::check`]; names that
/// fail to resolve are still reported as semantic errors.
pub fn lower(program: &Program, options: &LowerOptions) -> Result<FlatProgram, CompileError> {
    options.validate()?;

    let tree = {
        let _span = info_span!("lower.scopes").entered();
        let tree = ScopeTree::build(program);
        debug!(
            scopes = tree.scopes().count(),
            decls = tree.decl_count(),
            "scope tree built"
        );
        tree
    };

    let order = {
        let _span = info_span!("lower.call_graph").entered();
        let graph = CallGraph::build(&tree)?.with_main(&tree, &program.main.body)?;
        debug!(
            edges = graph.edges().count(),
            main_calls = graph.main_callees().len(),
            "call graph built"
        );
        graph.reverse_topological(&tree)?
    };

    let main = {
        let _span = info_span!("lower.inline").entered();
        let mut inliner = Inliner::new(&tree, options.max_inline_depth);
        for &id in &order {
            inliner.lower_callable(id)?;
        }
        inliner.lower_main(&program.main.body)?
    };

    let mut flattener = SymbolFlattener::new(&tree);
    flattener.flatten_globals()?;
    let names = flattener.materialize(&main.frame)?;

    let mut instrs = {
        let _span = info_span!("lower.linearize").entered();
        let mut instrs = Vec::new();
        if options.zero_init_globals {
            instrs.extend(linearize::globals_init(&flattener.global_slots()));
        }
        let mut lin = Linearizer::new(&names, tree.unit_tag(main.unit));
        lin.lower_block(&main.body)?;
        instrs.extend(lin.finish());
        if options.eliminate_dead_jumps {
            ir::opt::optimize(&mut instrs);
        }
        instrs
    };

    {
        let _span = info_span!("lower.resolve").entered();
        let table = ir::labels::resolve(&mut instrs, options.line_start, options.line_step)?;
        debug!(labels = table.len(), instrs = instrs.len(), "labels resolved");
    }

    Ok(FlatProgram {
        instrs,
        slots: flattener.into_slots(),
    })
}

/// Parse, check and lower SPL source text.
pub fn compile(source: &str, options: &LowerOptions) -> Result<FlatProgram, CompileError> {
    let program = parse(source)?;
    ir::semantics::check(&program)?;
    lower(&program, options)
}

/// Compile SPL source text all the way to line-numbered BASIC.
pub fn compile_to_basic(source: &str, options: &LowerOptions) -> Result<String, CompileError> {
    let flat = compile(source, options)?;
    Ok(backend::basic::write_program(&flat))
}
