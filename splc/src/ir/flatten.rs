//! Symbol flattening.
//!
//! Every declaration instance gets a storage slot whose name is unique in
//! the single global namespace of the target: globals become `GLOBAL<name>`,
//! main variables `MAIN<name>`, and the k-th inlined copy of callable `f`
//! gets `F<k><name>` for each of its parameters and locals. Uniqueness is
//! checked case-insensitively since the target's names are.

use crate::ir::scope::{DeclId, ScopeTree, Unit};
use crate::{CompileError, InternalErrorKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// What a slot stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOrigin {
    /// A declared global, parameter or local.
    Decl(DeclId),
    /// The value of a function call used inside a larger term.
    Result,
    /// A spilled operand, numbered within its owner.
    Temp(usize),
}

/// Reference to storage inside a lowered body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    Global(DeclId),
    /// Index into the owning body's frame.
    Frame(usize),
}

/// One slot request in a body's frame: storage for `origin` in copy `copy`
/// of `owner`. Copy numbers only need to be distinct per owner within one
/// frame; [`SymbolFlattener::materialize`] renumbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSlot {
    pub owner: Unit,
    pub copy: usize,
    pub origin: SlotOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatSlot {
    pub name: String,
    pub origin: SlotOrigin,
    /// `None` for globals.
    pub owner: Option<Unit>,
    /// Which inlined copy of `owner` this slot belongs to, counted from 1.
    /// Zero for globals and main.
    pub instance: usize,
}

/// Resolved names for one body: globals plus its frame.
#[derive(Debug, Clone, Default)]
pub struct SlotNames {
    globals: HashMap<DeclId, String>,
    frame: Vec<String>,
}

impl SlotNames {
    pub fn name(&self, slot: SlotRef) -> Result<&str, CompileError> {
        let name = match slot {
            SlotRef::Global(d) => self.globals.get(&d),
            SlotRef::Frame(i) => self.frame.get(i),
        };
        name.map(String::as_str).ok_or_else(|| {
            CompileError::internal(
                InternalErrorKind::UnknownSlot,
                format!("{slot:?} was never given a flat name"),
            )
        })
    }
}

pub struct SymbolFlattener<'t, 'p> {
    tree: &'t ScopeTree<'p>,
    used: HashSet<String>,
    slots: Vec<FlatSlot>,
    globals: HashMap<DeclId, String>,
}

impl<'t, 'p> SymbolFlattener<'t, 'p> {
    pub fn new(tree: &'t ScopeTree<'p>) -> Self {
        Self {
            tree,
            used: HashSet::new(),
            slots: Vec::new(),
            globals: HashMap::new(),
        }
    }

    /// Allocate `GLOBAL<name>` slots for every global declaration.
    pub fn flatten_globals(&mut self) -> Result<(), CompileError> {
        for &decl in self.tree.globals() {
            let name = self.allocate(SlotOrigin::Decl(decl), None, 0)?;
            self.globals.insert(decl, name);
        }
        Ok(())
    }

    /// Global slot names in declaration order.
    pub fn global_slots(&self) -> Vec<&str> {
        self.tree
            .globals()
            .iter()
            .filter_map(|d| self.globals.get(d).map(String::as_str))
            .collect()
    }

    /// Allocate a fresh slot for every entry of `frame`. Copies of the same
    /// owner are numbered 1, 2, ... in order of first appearance.
    pub fn materialize(&mut self, frame: &[FrameSlot]) -> Result<SlotNames, CompileError> {
        let mut copies: HashMap<(Unit, usize), usize> = HashMap::new();
        let mut per_owner: HashMap<Unit, usize> = HashMap::new();
        let mut names = Vec::with_capacity(frame.len());

        for slot in frame {
            let instance = match slot.owner {
                Unit::Main => 0,
                Unit::Callable(_) => *copies.entry((slot.owner, slot.copy)).or_insert_with(|| {
                    let n = per_owner.entry(slot.owner).or_insert(0);
                    *n += 1;
                    *n
                }),
            };
            names.push(self.allocate(slot.origin, Some(slot.owner), instance)?);
        }

        debug!(
            slots = names.len(),
            copies = copies.len(),
            "materialized frame"
        );
        Ok(SlotNames {
            globals: self.globals.clone(),
            frame: names,
        })
    }

    /// Allocate one slot, disambiguating the synthesized name if needed.
    pub fn allocate(
        &mut self,
        origin: SlotOrigin,
        owner: Option<Unit>,
        instance: usize,
    ) -> Result<String, CompileError> {
        let base = self.base_name(origin, owner, instance);
        let mut name = base.clone();
        let mut k = 2;
        while self.used.contains(&name.to_ascii_lowercase()) {
            name = format!("{base}X{k}");
            k += 1;
        }
        if !self.used.insert(name.to_ascii_lowercase()) {
            return Err(CompileError::internal(
                InternalErrorKind::FlatNameCollision,
                format!("flat name '{name}' allocated twice"),
            ));
        }
        self.slots.push(FlatSlot {
            name: name.clone(),
            origin,
            owner,
            instance,
        });
        Ok(name)
    }

    fn base_name(&self, origin: SlotOrigin, owner: Option<Unit>, instance: usize) -> String {
        let tag = match owner {
            None => "GLOBAL".to_string(),
            Some(Unit::Main) => "MAIN".to_string(),
            Some(unit) => format!("{}{}", self.tree.unit_tag(unit), instance),
        };
        match origin {
            SlotOrigin::Decl(d) => format!("{tag}{}", self.tree.decl(d).name),
            SlotOrigin::Result => format!("{tag}RES"),
            SlotOrigin::Temp(n) => format!("{tag}TMP{n}"),
        }
    }

    pub fn into_slots(self) -> Vec<FlatSlot> {
        self.slots
    }
}
