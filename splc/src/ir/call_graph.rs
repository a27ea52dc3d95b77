//! Call graph construction and recursion detection.
//!
//! Inlining cannot terminate on a cyclic call graph, so any strongly
//! connected component with more than one member, or a callable that calls
//! itself, is rejected before the inliner runs.

use crate::ir::ast::{Instr, Term};
use crate::ir::scope::{CallableId, ScopeTree};
use crate::{CompileError, SemanticErrorKind};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallGraphEdge {
    pub caller: CallableId,
    pub callee: CallableId,
}

#[derive(Debug, Clone)]
pub struct CallGraph {
    /// Distinct callees per caller, in order of first call.
    callees: Vec<Vec<CallableId>>,
    main_callees: Vec<CallableId>,
}

impl CallGraph {
    pub fn build(tree: &ScopeTree<'_>) -> Result<Self, CompileError> {
        let mut callees = Vec::with_capacity(tree.callable_count());
        for (_, entry) in tree.callables() {
            let mut names = Vec::new();
            collect_calls(&entry.def.body, &mut names);
            if let Some(ret) = &entry.def.ret {
                collect_term_calls(ret, &mut names);
            }
            callees.push(resolve_all(tree, &names)?);
        }
        Ok(Self {
            callees,
            main_callees: Vec::new(),
        })
    }

    /// Also record the calls made by the main program.
    pub fn with_main(mut self, tree: &ScopeTree<'_>, main_body: &[Instr]) -> Result<Self, CompileError> {
        let mut names = Vec::new();
        collect_calls(main_body, &mut names);
        self.main_callees = resolve_all(tree, &names)?;
        Ok(self)
    }

    pub fn callees(&self, caller: CallableId) -> &[CallableId] {
        &self.callees[caller.0]
    }

    pub fn main_callees(&self) -> &[CallableId] {
        &self.main_callees
    }

    pub fn edges(&self) -> impl Iterator<Item = CallGraphEdge> + '_ {
        self.callees.iter().enumerate().flat_map(|(i, cs)| {
            cs.iter().map(move |&callee| CallGraphEdge {
                caller: CallableId(i),
                callee,
            })
        })
    }

    /// Check the graph is acyclic and return every callable ordered so that
    /// callees come before their callers.
    pub fn reverse_topological(&self, tree: &ScopeTree<'_>) -> Result<Vec<CallableId>, CompileError> {
        let sccs = Tarjan::run(&self.callees);
        let mut order = Vec::with_capacity(self.callees.len());
        for scc in sccs {
            let first = scc[0];
            let self_loop = scc.len() == 1 && self.callees[first.0].contains(&first);
            if scc.len() > 1 || self_loop {
                let cycle: Vec<String> = self
                    .cycle_through(&scc)
                    .into_iter()
                    .map(|id| tree.callable(id).name().to_string())
                    .collect();
                return Err(CompileError::RecursiveDefinition { cycle });
            }
            order.push(first);
        }
        debug!(order = ?order, "callables in reverse topological order");
        Ok(order)
    }

    /// A closed path through the members of one strongly connected component,
    /// starting and ending at its lowest-numbered member.
    fn cycle_through(&self, scc: &[CallableId]) -> Vec<CallableId> {
        let start = scc.iter().copied().min().unwrap_or(scc[0]);
        let mut path = vec![start];
        let mut visited = vec![false; self.callees.len()];
        if self.search_back(start, start, scc, &mut path, &mut visited) {
            path
        } else {
            vec![start, start]
        }
    }

    fn search_back(
        &self,
        node: CallableId,
        start: CallableId,
        scc: &[CallableId],
        path: &mut Vec<CallableId>,
        visited: &mut [bool],
    ) -> bool {
        visited[node.0] = true;
        for &next in &self.callees[node.0] {
            if next == start {
                path.push(start);
                return true;
            }
            if scc.contains(&next) && !visited[next.0] {
                path.push(next);
                if self.search_back(next, start, scc, path, visited) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }
}

fn resolve_all(tree: &ScopeTree<'_>, names: &[String]) -> Result<Vec<CallableId>, CompileError> {
    let mut out = Vec::new();
    for name in names {
        let id = tree.callable_id(name).ok_or_else(|| CompileError::Semantic {
            kind: SemanticErrorKind::UndefinedCallable,
            name: Some(name.clone()),
            message: format!("Call to undefined procedure or function '{name}'"),
        })?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

fn collect_calls(body: &[Instr], out: &mut Vec<String>) {
    for instr in body {
        match instr {
            Instr::Halt | Instr::Print(_) => {}
            Instr::Call { name, args } => {
                args.iter().for_each(|a| collect_term_calls(a, out));
                out.push(name.clone());
            }
            Instr::Assign { value, .. } => collect_term_calls(value, out),
            Instr::While { cond, body } => {
                collect_term_calls(cond, out);
                collect_calls(body, out);
            }
            Instr::DoUntil { body, cond } => {
                collect_calls(body, out);
                collect_term_calls(cond, out);
            }
            Instr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                collect_term_calls(cond, out);
                collect_calls(then_branch, out);
                if let Some(e) = else_branch {
                    collect_calls(e, out);
                }
            }
        }
    }
}

fn collect_term_calls(term: &Term, out: &mut Vec<String>) {
    match term {
        Term::Atom(_) => {}
        Term::Unary { operand, .. } => collect_term_calls(operand, out),
        Term::Binary { left, right, .. } => {
            collect_term_calls(left, out);
            collect_term_calls(right, out);
        }
        Term::Call { name, args } => {
            args.iter().for_each(|a| collect_term_calls(a, out));
            out.push(name.clone());
        }
    }
}

/// Tarjan's strongly connected components. Components come out in reverse
/// topological order: a component is emitted only after everything it
/// reaches.
struct Tarjan<'g> {
    graph: &'g [Vec<CallableId>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<CallableId>,
    next_index: usize,
    out: Vec<Vec<CallableId>>,
}

impl<'g> Tarjan<'g> {
    fn run(graph: &'g [Vec<CallableId>]) -> Vec<Vec<CallableId>> {
        let n = graph.len();
        let mut t = Tarjan {
            graph,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            out: Vec::new(),
        };
        for v in 0..n {
            if t.index[v].is_none() {
                t.connect(v);
            }
        }
        t.out
    }

    fn connect(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(CallableId(v));
        self.on_stack[v] = true;

        for &CallableId(w) in &self.graph[v] {
            match self.index[w] {
                None => {
                    self.connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(iw) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(iw);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut scc = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w.0] = false;
                scc.push(w);
                if w.0 == v {
                    break;
                }
            }
            scc.reverse();
            self.out.push(scc);
        }
    }
}
