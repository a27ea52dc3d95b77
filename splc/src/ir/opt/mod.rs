//! Optimizations over the linearized, still-symbolic instruction sequence.
//!
//! This module provides a framework for running passes before label
//! resolution.

use crate::ir::flat::{FlatInstruction, Op, Target};
use tracing::debug;

/// A pass over a flat instruction sequence.
pub trait IrPass {
    fn name(&self) -> &'static str;
    fn run(&mut self, instrs: &mut Vec<FlatInstruction>);
}

/// Manages and executes a sequence of passes.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn IrPass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn add_pass(&mut self, pass: Box<dyn IrPass>) {
        self.passes.push(pass);
    }

    pub fn run_passes(&mut self, instrs: &mut Vec<FlatInstruction>) {
        for pass in &mut self.passes {
            let before = instrs.len();
            pass.run(instrs);
            debug!(pass = pass.name(), removed = before - instrs.len(), "pass finished");
        }
    }
}

/// Removes `goto L` when the next instruction carries `L`. The removed
/// instruction's own labels move to that next instruction.
pub struct DeadJumpElimination;

impl IrPass for DeadJumpElimination {
    fn name(&self) -> &'static str {
        "dead-jump-elimination"
    }

    fn run(&mut self, instrs: &mut Vec<FlatInstruction>) {
        let mut i = 0;
        while i + 1 < instrs.len() {
            let falls_through = match &instrs[i].op {
                Op::Jump(Target::Label(target)) => instrs[i + 1].labels.contains(target),
                _ => false,
            };
            if falls_through {
                let removed = instrs.remove(i);
                let next = &mut instrs[i];
                let mut labels = removed.labels;
                labels.append(&mut next.labels);
                next.labels = labels;
                // A label moved here may make the previous jump dead too.
                i = i.saturating_sub(1);
            } else {
                i += 1;
            }
        }
    }
}

pub fn optimize(instrs: &mut Vec<FlatInstruction>) {
    let mut pm = PassManager::new();
    pm.add_pass(Box::new(DeadJumpElimination));
    pm.run_passes(instrs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::flat::{Expr, Label};

    fn jump(to: &str) -> FlatInstruction {
        FlatInstruction::new(Op::Jump(Target::Label(Label(to.into()))))
    }

    fn halt_at(labels: &[&str]) -> FlatInstruction {
        let mut ins = FlatInstruction::new(Op::Halt);
        ins.labels = labels.iter().map(|l| Label(l.to_string())).collect();
        ins
    }

    #[test]
    fn jump_to_next_is_removed_and_labels_move() {
        let mut j = jump("END");
        j.labels.push(Label("ELSE".into()));
        let mut instrs = vec![j, halt_at(&["END"])];
        optimize(&mut instrs);
        assert_eq!(instrs.len(), 1);
        assert_eq!(
            instrs[0].labels,
            vec![Label("ELSE".into()), Label("END".into())]
        );
    }

    #[test]
    fn other_jumps_are_kept() {
        let mut instrs = vec![
            jump("TOP"),
            halt_at(&["END"]),
            FlatInstruction::new(Op::JumpIfFalse {
                cond: Expr::Num(0),
                target: Target::Label(Label("X".into())),
            }),
            halt_at(&["X"]),
        ];
        optimize(&mut instrs);
        assert_eq!(instrs.len(), 4);
    }
}
