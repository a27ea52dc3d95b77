//! Scope tree and declarations.
//!
//! ```text
//! Everywhere
//! ├── Global            (glob { ... })
//! ├── ProcedureSet
//! │   └── Callable(p)   (parameters)
//! │       └── Local(p)  (local { ... })
//! ├── FunctionSet
//! │   └── Callable(f)
//! │       └── Local(f)
//! └── Main              (var { ... })
//! ```
//!
//! Variable lookup walks from the innermost scope to the root and finally
//! consults the global scope, which is visible from every body.

use crate::ir::ast::{Callable, CallableKind, Program, VarDecl};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(pub usize);

/// A top-level body: the main program or one procedure/function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Main,
    Callable(CallableId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Everywhere,
    Global,
    ProcedureSet,
    FunctionSet,
    Main,
    Callable(CallableId),
    Local(CallableId),
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    symbols: HashMap<String, DeclId>,
}

impl Scope {
    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.symbols.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Global,
    Param,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct CallableEntry<'p> {
    pub def: &'p Callable,
    pub params: Vec<DeclId>,
    pub locals: Vec<DeclId>,
    pub scope: ScopeId,
    pub local_scope: ScopeId,
}

impl CallableEntry<'_> {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn kind(&self) -> CallableKind {
        self.def.kind
    }
}

/// Scopes, declarations and callables of one program. Built once per
/// compilation and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScopeTree<'p> {
    scopes: Vec<Scope>,
    decls: Vec<Declaration>,
    callables: Vec<CallableEntry<'p>>,
    callable_ids: HashMap<String, CallableId>,
    global_scope: ScopeId,
    main_scope: ScopeId,
    globals: Vec<DeclId>,
    main_locals: Vec<DeclId>,
}

impl<'p> ScopeTree<'p> {
    /// Build the tree for `program`. Duplicate names keep their first
    /// declaration; reporting them is the semantic checker's job.
    pub fn build(program: &'p Program) -> Self {
        let mut tree = ScopeTree {
            scopes: Vec::new(),
            decls: Vec::new(),
            callables: Vec::new(),
            callable_ids: HashMap::new(),
            global_scope: ScopeId(0),
            main_scope: ScopeId(0),
            globals: Vec::new(),
            main_locals: Vec::new(),
        };

        let everywhere = tree.add_scope(ScopeKind::Everywhere, None);
        tree.global_scope = tree.add_scope(ScopeKind::Global, Some(everywhere));
        let proc_set = tree.add_scope(ScopeKind::ProcedureSet, Some(everywhere));
        let func_set = tree.add_scope(ScopeKind::FunctionSet, Some(everywhere));
        tree.main_scope = tree.add_scope(ScopeKind::Main, Some(everywhere));

        tree.globals = tree.declare_all(&program.globals, DeclKind::Global, tree.global_scope);

        for def in program.callables() {
            let id = CallableId(tree.callables.len());
            let set = match def.kind {
                CallableKind::Procedure => proc_set,
                CallableKind::Function => func_set,
            };
            let scope = tree.add_scope(ScopeKind::Callable(id), Some(set));
            let local_scope = tree.add_scope(ScopeKind::Local(id), Some(scope));
            let params = tree.declare_all(&def.params, DeclKind::Param, scope);
            let locals = tree.declare_all(&def.locals, DeclKind::Local, local_scope);
            tree.callable_ids.entry(def.name.clone()).or_insert(id);
            tree.callables.push(CallableEntry {
                def,
                params,
                locals,
                scope,
                local_scope,
            });
        }

        tree.main_locals = tree.declare_all(&program.main.locals, DeclKind::Local, tree.main_scope);
        tree
    }

    fn add_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            parent,
            symbols: HashMap::new(),
        });
        id
    }

    /// Declare a symbol in `scope`. Returns the existing declaration if the
    /// name is already taken there.
    pub fn declare(&mut self, name: &str, kind: DeclKind, scope: ScopeId) -> Result<DeclId, DeclId> {
        if let Some(existing) = self.scopes[scope.0].lookup(name) {
            return Err(existing);
        }
        let id = DeclId(self.decls.len());
        self.decls.push(Declaration {
            name: name.to_string(),
            kind,
            scope,
        });
        self.scopes[scope.0].symbols.insert(name.to_string(), id);
        Ok(id)
    }

    fn declare_all(&mut self, vars: &[VarDecl], kind: DeclKind, scope: ScopeId) -> Vec<DeclId> {
        vars.iter()
            .filter_map(|v| self.declare(&v.name, kind, scope).ok())
            .collect()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeId(i), s))
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    pub fn callable(&self, id: CallableId) -> &CallableEntry<'p> {
        &self.callables[id.0]
    }

    pub fn callables(&self) -> impl Iterator<Item = (CallableId, &CallableEntry<'p>)> {
        self.callables
            .iter()
            .enumerate()
            .map(|(i, c)| (CallableId(i), c))
    }

    pub fn callable_count(&self) -> usize {
        self.callables.len()
    }

    pub fn callable_id(&self, name: &str) -> Option<CallableId> {
        self.callable_ids.get(name).copied()
    }

    pub fn globals(&self) -> &[DeclId] {
        &self.globals
    }

    pub fn main_locals(&self) -> &[DeclId] {
        &self.main_locals
    }

    /// Innermost scope of a unit's body, where name lookup starts.
    pub fn body_scope(&self, unit: Unit) -> ScopeId {
        match unit {
            Unit::Main => self.main_scope,
            Unit::Callable(id) => self.callables[id.0].local_scope,
        }
    }

    /// Resolve a variable name as seen from `from`.
    pub fn resolve(&self, name: &str, from: ScopeId) -> Option<DeclId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let scope = &self.scopes[id.0];
            if let Some(decl) = scope.lookup(name) {
                return Some(decl);
            }
            cur = scope.parent;
        }
        self.scopes[self.global_scope.0].lookup(name)
    }

    /// Tag used when naming a unit's storage and labels.
    pub fn unit_tag(&self, unit: Unit) -> String {
        match unit {
            Unit::Main => "MAIN".to_string(),
            Unit::Callable(id) => self.callables[id.0].def.name.to_ascii_uppercase(),
        }
    }
}
