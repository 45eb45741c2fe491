//! Mapping resolution with priority merge.
//!
//! Mappings are grouped by target [`Slot`], then by priority key. At any
//! moment exactly one group per target is authoritative: the unprioritized
//! group until a call named as a priority settles, then that call's group.
//! This makes a merge point after a conditional read whichever branch
//! actually ran.
//!
//! Mappings whose target strategy is `Append` and whose source is a call are
//! accumulating: they are not part of any group and are pushed by the
//! composition each time their source call settles.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use semflow_core::{CallId, CompositionDef, CompositionId, Endpoint, MappingDef, Port, Strategy};

use crate::error::ExecError;

/// A writable target address inside one composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Call(CallId, Port),
    Boundary(Port),
    Variable(String),
}

impl Slot {
    /// `None` for constants, which can only be sources.
    pub fn of(endpoint: &Endpoint) -> Option<Slot> {
        match endpoint {
            Endpoint::Constant(_) => None,
            Endpoint::Call { call, port } => Some(Slot::Call(*call, *port)),
            Endpoint::Boundary(port) => Some(Slot::Boundary(*port)),
            Endpoint::Variable(name) => Some(Slot::Variable(name.clone())),
        }
    }

    fn is_input(&self) -> bool {
        match self {
            Slot::Call(_, port) => !port.is_output(),
            Slot::Boundary(port) => port.is_output(),
            Slot::Variable(_) => true,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Call(call, port) => write!(f, "call {call}.{port}"),
            Slot::Boundary(port) => write!(f, "boundary.{port}"),
            Slot::Variable(name) => write!(f, "var {name}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TargetMappings {
    groups: IndexMap<Option<CallId>, Vec<MappingDef>>,
    /// Key of the authoritative group; `None` is the unprioritized group.
    authority: Option<CallId>,
}

/// All mappings of one composition instance, plus the mutable authority state.
#[derive(Debug, Clone)]
pub struct MappingSet {
    composition: CompositionId,
    targets: IndexMap<Slot, TargetMappings>,
    inputs_by_call: HashMap<CallId, Vec<Slot>>,
    accumulating: HashMap<CallId, Vec<MappingDef>>,
    variables_by_source: HashMap<CallId, Vec<String>>,
    variables_by_variable: HashMap<String, Vec<String>>,
    all: Vec<MappingDef>,
}

impl MappingSet {
    /// Groups and validates the mappings of `def`.
    pub fn build(def: &CompositionDef) -> Result<MappingSet, ExecError> {
        let ambiguous = |reason: String| ExecError::AmbiguousComposition {
            composition: def.id,
            reason,
        };

        let mut targets: IndexMap<Slot, TargetMappings> = IndexMap::new();
        let mut accumulating: HashMap<CallId, Vec<MappingDef>> = HashMap::new();
        let mut accumulating_targets: Vec<Slot> = Vec::new();

        for mapping in &def.mappings {
            let slot = Slot::of(&mapping.target)
                .filter(Slot::is_input)
                .ok_or_else(|| ambiguous(format!("{} cannot be a mapping target", mapping.target)))?;

            match (&mapping.source, &mapping.target_strategy) {
                (Endpoint::Call { call, .. }, Some(Strategy::Append)) => {
                    accumulating.entry(*call).or_default().push(mapping.clone());
                    accumulating_targets.push(slot);
                }
                _ => targets
                    .entry(slot)
                    .or_default()
                    .groups
                    .entry(mapping.priority)
                    .or_default()
                    .push(mapping.clone()),
            }
        }

        for (slot, target) in &targets {
            for (priority, group) in &target.groups {
                check_group(slot, *priority, group).map_err(&ambiguous)?;
                let direct = group.iter().any(|m| m.target_strategy.is_none());
                if direct && accumulating_targets.contains(slot) {
                    return Err(ambiguous(format!(
                        "{slot} mixes a direct write with accumulated writes"
                    )));
                }
            }
        }

        let mut inputs_by_call: HashMap<CallId, Vec<Slot>> = HashMap::new();
        let mut variables_by_source: HashMap<CallId, Vec<String>> = HashMap::new();
        let mut variables_by_variable: HashMap<String, Vec<String>> = HashMap::new();
        for (slot, target) in &targets {
            match slot {
                Slot::Call(call, _) => inputs_by_call.entry(*call).or_default().push(slot.clone()),
                Slot::Variable(name) => {
                    for mapping in target.groups.values().flatten() {
                        let names = match &mapping.source {
                            Endpoint::Call { call, .. } => variables_by_source.entry(*call).or_default(),
                            Endpoint::Variable(source) => variables_by_variable.entry(source.clone()).or_default(),
                            _ => continue,
                        };
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                }
                Slot::Boundary(_) => {}
            }
        }

        Ok(MappingSet {
            composition: def.id,
            targets,
            inputs_by_call,
            accumulating,
            variables_by_source,
            variables_by_variable,
            all: def.mappings.clone(),
        })
    }

    /// The authoritative group for `slot`, or `None` when nothing maps into
    /// it. Candidates exist but none is authoritative: ambiguous.
    pub fn authoritative(&self, slot: &Slot) -> Result<Option<&[MappingDef]>, ExecError> {
        let Some(target) = self.targets.get(slot) else {
            return Ok(None);
        };
        match target.groups.get(&target.authority) {
            Some(group) => Ok(Some(group)),
            None => Err(ExecError::AmbiguousComposition {
                composition: self.composition,
                reason: format!(
                    "no authoritative source for {slot}: none of the priority calls {:?} has executed",
                    target.groups.keys().flatten().collect::<Vec<_>>()
                ),
            }),
        }
    }

    /// Like [`authoritative`](Self::authoritative), but an undecided target
    /// yields `None`. Used for initial variable seeding.
    pub fn current(&self, slot: &Slot) -> Option<&[MappingDef]> {
        let target = self.targets.get(slot)?;
        target.groups.get(&target.authority).map(Vec::as_slice)
    }

    pub fn targets_slot(&self, slot: &Slot) -> bool {
        self.targets.contains_key(slot)
    }

    /// Makes `call`'s group authoritative on every target that has one.
    pub fn mark_authoritative(&mut self, call: CallId) {
        for (slot, target) in self.targets.iter_mut() {
            if target.groups.contains_key(&Some(call)) {
                tracing::trace!(%slot, %call, "priority switched");
                target.authority = Some(call);
            }
        }
    }

    /// Input slots of `call` that have group mappings.
    pub fn input_slots_of(&self, call: CallId) -> &[Slot] {
        self.inputs_by_call.get(&call).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn accumulating_from(&self, call: CallId) -> &[MappingDef] {
        self.accumulating.get(&call).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn variables_fed_by(&self, call: CallId) -> &[String] {
        self.variables_by_source.get(&call).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Variables with a group mapping that reads variable `name`.
    pub fn variables_reading(&self, name: &str) -> &[String] {
        self.variables_by_variable.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Variable slots that are mapping targets, in declaration order.
    pub fn variable_slots(&self) -> impl Iterator<Item = &Slot> {
        self.targets.keys().filter(|s| matches!(s, Slot::Variable(_)))
    }

    /// Every declared mapping with whether it currently takes part in
    /// resolution (accumulating mappings always do).
    pub fn edges(&self) -> impl Iterator<Item = (&MappingDef, bool)> {
        self.all.iter().map(move |m| {
            let active = match Slot::of(&m.target).and_then(|s| self.targets.get(&s)) {
                Some(target) if !is_accumulating(m) => target.authority == m.priority,
                _ => true,
            };
            (m, active)
        })
    }

    pub fn reset(&mut self) {
        for target in self.targets.values_mut() {
            target.authority = None;
        }
    }
}

fn is_accumulating(mapping: &MappingDef) -> bool {
    matches!(mapping.source, Endpoint::Call { .. })
        && matches!(mapping.target_strategy, Some(Strategy::Append))
}

fn check_group(slot: &Slot, priority: Option<CallId>, group: &[MappingDef]) -> Result<(), String> {
    let at = match priority {
        Some(call) => format!("{slot} (priority {call})"),
        None => slot.to_string(),
    };
    let direct = group.iter().filter(|m| m.target_strategy.is_none()).count();
    if direct > 1 {
        return Err(format!("{at} has {direct} competing direct sources"));
    }
    if direct == 1 && group.len() > 1 {
        return Err(format!("{at} mixes a direct write with indexed writes"));
    }

    let mut seen: Vec<&Strategy> = Vec::new();
    for strategy in group.iter().filter_map(|m| m.target_strategy.as_ref()) {
        if matches!(strategy, Strategy::Append) {
            continue;
        }
        if seen.contains(&strategy) {
            return Err(format!("{at} is written twice at {strategy:?}"));
        }
        seen.push(strategy);
    }
    Ok(())
}
