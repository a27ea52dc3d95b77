//! Label resolution: number every instruction, then rewrite symbolic jump
//! targets to line numbers.

use crate::ir::flat::{FlatInstruction, Label, Target};
use crate::{CompileError, InternalErrorKind};
use std::collections::HashMap;

/// Symbolic label to resolved line number.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    lines: HashMap<Label, u32>,
}

impl LabelTable {
    /// Number `instrs` from `start` in steps of `step` and record the line of
    /// every label. Fails if `step` is zero or the numbering passes
    /// `u32::MAX`.
    pub fn build(instrs: &mut [FlatInstruction], start: u32, step: u32) -> Result<Self, CompileError> {
        if step == 0 {
            return Err(CompileError::InvalidOption {
                option: "line_step".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        let count = instrs.len();
        let mut lines = HashMap::new();
        let mut next = Some(start);
        for ins in instrs.iter_mut() {
            let line = next.ok_or_else(|| CompileError::InvalidOption {
                option: "line_start".to_string(),
                message: format!(
                    "{count} instructions numbered from {start} in steps of {step} run past line {}",
                    u32::MAX
                ),
            })?;
            ins.line = Some(line);
            for label in &ins.labels {
                if lines.insert(label.clone(), line).is_some() {
                    return Err(CompileError::internal(
                        InternalErrorKind::DuplicateLabel,
                        format!("label {label} placed twice"),
                    ));
                }
            }
            next = line.checked_add(step);
        }
        Ok(Self { lines })
    }

    pub fn get(&self, label: &Label) -> Option<u32> {
        self.lines.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Both passes. After this returns `Ok`, no instruction holds a
/// [`Target::Label`].
pub fn resolve(instrs: &mut [FlatInstruction], start: u32, step: u32) -> Result<LabelTable, CompileError> {
    let table = LabelTable::build(instrs, start, step)?;
    for ins in instrs.iter_mut() {
        if let Some(target) = ins.target_mut() {
            if let Target::Label(label) = target {
                let line = table.get(label).ok_or_else(|| {
                    CompileError::internal(
                        InternalErrorKind::UnresolvedJumpTarget,
                        format!("jump to {label} has no matching instruction"),
                    )
                })?;
                *target = Target::Line(line);
            }
        }
    }
    Ok(table)
}
