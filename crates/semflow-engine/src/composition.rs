//! Composition instances and the visit loop.
//!
//! A [`CompositionInstance`] is the runtime form of one composition: its
//! applied calls, its grouped mappings and its variables. [`run`] walks the
//! control edges from the start call, one visit at a time:
//!
//! 1. **Ingest** every mapped input terminal of the call.
//! 2. **Bind**, **Dispatch**, **Publish** (see [`AppliedCall::execute`]).
//! 3. **Settle**: switch priorities to this call, push accumulating
//!    mappings it feeds, refresh variables it feeds and then the variables
//!    mapped from those.
//! 4. **Advance** along the control successor. A loop node whose call
//!    signals exhaustion takes `next` and skips Publish and Settle.
//!
//! When the composition is a function body, the enclosing call's terminals
//! are passed in as the boundary, and a final ingest after the walk moves the
//! return value (and the receiver's final value) out through it.
//!
//! [`run`]: CompositionInstance::run

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use semflow_core::{CallId, CompositionId, CoreError, Endpoint, FunctionId, GraphQuery, MappingDef, Port, Strategy, Successor};

use crate::call::AppliedCall;
use crate::cell::{Terminal, Terminals};
use crate::engine::Runtime;
use crate::error::{ExecError, Site};
use crate::mapping::{MappingSet, Slot};
use crate::snapshot::{CompositionSnapshot, EdgeSnapshot, TerminalSnapshot};
use crate::trace::Outcome;
use crate::value::Value;

pub(crate) struct CompositionInstance {
    id: CompositionId,
    name: String,
    represents: Option<FunctionId>,
    start: Option<CallId>,
    calls: IndexMap<CallId, AppliedCall>,
    mappings: MappingSet,
    variables: IndexMap<String, Terminal>,
}

impl CompositionInstance {
    /// Instantiates `id`. Start ambiguity and mapping conflicts are detected
    /// here, on first use. Only calls reachable from the start are applied;
    /// mappings to or from any other call are dropped.
    pub fn new(graph: &dyn GraphQuery, id: CompositionId, checked: bool) -> Result<Self, ExecError> {
        let def = graph.composition(id)?;
        let start = graph.start_of(id)?;
        let used = graph.used_calls(id)?;

        let mut calls = IndexMap::new();
        for call in def.calls.iter().filter(|c| used.contains(&c.id)) {
            let function = graph.function(call.function)?;
            calls.insert(
                call.id,
                AppliedCall::new(Site::Call(call.id), function, call.successor, call.label.clone(), checked),
            );
        }

        let live = |endpoint: &Endpoint| match endpoint {
            Endpoint::Call { call, .. } => used.contains(call),
            _ => true,
        };
        let mut reachable = def.clone();
        reachable.mappings.retain(|m| live(&m.source) && live(&m.target));
        if reachable.mappings.len() < def.mappings.len() {
            debug!(
                composition = %id,
                dropped = def.mappings.len() - reachable.mappings.len(),
                "mappings of unreachable calls dropped"
            );
        }
        let mappings = MappingSet::build(&reachable)?;

        let mut variables = IndexMap::new();
        for mapping in &def.mappings {
            for endpoint in [&mapping.source, &mapping.target] {
                if let Endpoint::Variable(name) = endpoint {
                    variables
                        .entry(name.clone())
                        .or_insert_with(|| Terminal::variable(name));
                }
            }
        }

        debug!(composition = %id, calls = calls.len(), "instantiated composition");
        Ok(CompositionInstance {
            id,
            name: def.name.clone(),
            represents: def.represents,
            start,
            calls,
            mappings,
            variables,
        })
    }

    /// Clears every terminal and variable and restores initial priorities.
    pub fn reset(&mut self) {
        for call in self.calls.values_mut() {
            call.reset();
        }
        for variable in self.variables.values_mut() {
            variable.reset();
        }
        self.mappings.reset();
    }

    /// Writes caller inputs into variables of a standalone composition.
    pub fn bind_variables(&mut self, inputs: IndexMap<String, Value>) -> Result<(), ExecError> {
        for (name, value) in inputs {
            match self.variables.get_mut(&name) {
                Some(variable) => variable.write(None, value)?,
                None => {
                    return Err(ExecError::UnknownInput {
                        name,
                        target: format!("composition '{}'", self.name),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn variable_values(&self) -> IndexMap<String, Value> {
        self.variables
            .iter()
            .map(|(name, t)| (name.clone(), t.peek().unwrap_or(Value::None)))
            .collect()
    }

    pub fn run(&mut self, rt: &mut Runtime<'_>, mut boundary: Option<&mut Terminals>) -> Result<(), ExecError> {
        self.seed_variables(boundary.as_deref())?;

        let mut current = self.start;
        while let Some(call) = current {
            current = self.visit(rt, call, &mut boundary)?;
        }

        if let Some(terminals) = boundary {
            self.finish(terminals)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Visit steps
    // -----------------------------------------------------------------------

    fn visit(
        &mut self,
        rt: &mut Runtime<'_>,
        call_id: CallId,
        boundary: &mut Option<&mut Terminals>,
    ) -> Result<Option<CallId>, ExecError> {
        let slots = self.mappings.input_slots_of(call_id).to_vec();
        for slot in &slots {
            self.ingest(slot, boundary.as_deref_mut())?;
        }

        rt.visits.push(call_id);
        let call = self.calls.get_mut(&call_id).ok_or(CoreError::CallNotFound {
            composition: self.id,
            call: call_id,
        })?;
        let function = call.function;
        let successor = call.successor;
        debug!(composition = %self.id, call = %call_id, function = %function, depth = rt.depth, "visit");

        match call.execute(rt) {
            Ok(()) => rt.record(self.id, call_id, function, Outcome::Completed),
            Err(ExecError::IterationExhausted { .. }) if successor.is_loop() => {
                rt.record(self.id, call_id, function, Outcome::Exhausted);
                trace!(call = %call_id, "loop exhausted");
                return Ok(match successor {
                    Successor::Loop { next, .. } => next,
                    _ => None,
                });
            }
            Err(err) => {
                if let ExecError::IterationExhausted { .. } = err {
                    warn!(call = %call_id, "iteration exhausted outside a loop node");
                }
                rt.record(self.id, call_id, function, Outcome::Failed);
                return Err(err);
            }
        }

        self.settle(call_id, boundary)?;
        Ok(self.advance(call_id, successor))
    }

    /// Resolves the authoritative mappings into `slot`. Returns whether
    /// anything was written.
    fn ingest(&mut self, slot: &Slot, boundary: Option<&mut Terminals>) -> Result<bool, ExecError> {
        let Some(group) = self.mappings.authoritative(slot)? else {
            return Ok(false);
        };
        let writes = self.read_group(group, boundary.as_deref())?;
        self.write_slot(slot, boundary, writes)
    }

    /// Variables start from their unprioritized sources unless the caller
    /// already bound them.
    fn seed_variables(&mut self, boundary: Option<&Terminals>) -> Result<(), ExecError> {
        let mut seeds = Vec::new();
        for slot in self.mappings.variable_slots() {
            let Slot::Variable(name) = slot else { continue };
            if self.variables.get(name).is_some_and(Terminal::is_fresh) {
                continue;
            }
            if let Some(group) = self.mappings.current(slot) {
                seeds.push((slot.clone(), self.read_group(group, boundary)?));
            }
        }
        let mut seeded = Vec::new();
        for (slot, writes) in seeds {
            if self.write_slot(&slot, None, writes)? {
                if let Slot::Variable(name) = slot {
                    seeded.push(name);
                }
            }
        }
        self.propagate_variables(seeded, boundary)
    }

    /// Re-reads every variable downstream of `changed` through
    /// variable-to-variable mappings. Each dependent is refreshed at most
    /// once per propagation, so cyclic chains terminate.
    fn propagate_variables(&mut self, changed: Vec<String>, boundary: Option<&Terminals>) -> Result<(), ExecError> {
        let mut queue = VecDeque::from(changed);
        let mut refreshed = HashSet::new();
        while let Some(name) = queue.pop_front() {
            for dependent in self.mappings.variables_reading(&name).to_vec() {
                if !refreshed.insert(dependent.clone()) {
                    continue;
                }
                let slot = Slot::Variable(dependent.clone());
                let Some(group) = self.mappings.current(&slot) else {
                    continue;
                };
                let writes = self.read_group(group, boundary)?;
                if self.write_slot(&slot, None, writes)? {
                    trace!(from = %name, to = %dependent, "variable propagated");
                    queue.push_back(dependent);
                }
            }
        }
        Ok(())
    }

    fn settle(&mut self, call_id: CallId, boundary: &mut Option<&mut Terminals>) -> Result<(), ExecError> {
        self.mappings.mark_authoritative(call_id);

        let mut pushes = Vec::new();
        for mapping in self.mappings.accumulating_from(call_id) {
            let value = self.read_source(&mapping.source, mapping.source_strategy.as_ref(), boundary.as_deref())?;
            if let (Some(value), Some(slot)) = (value, Slot::of(&mapping.target)) {
                pushes.push((slot, value));
            }
        }
        let mut changed = Vec::new();
        for (slot, value) in pushes {
            trace!(%slot, "accumulate");
            self.write_slot(&slot, boundary.as_deref_mut(), vec![(Some(Strategy::Append), value)])?;
            if let Slot::Variable(name) = slot {
                changed.push(name);
            }
        }

        let fed = self.mappings.variables_fed_by(call_id).to_vec();
        for name in fed {
            if self.ingest(&Slot::Variable(name.clone()), boundary.as_deref_mut())? {
                changed.push(name);
            }
        }
        self.propagate_variables(changed, boundary.as_deref())
    }

    fn advance(&self, call_id: CallId, successor: Successor) -> Option<CallId> {
        match successor {
            Successor::End => None,
            Successor::Next(next) => Some(next),
            Successor::Loop { iterate, .. } => Some(iterate),
            Successor::Branch { if_true, if_false } => {
                let taken = self
                    .calls
                    .get(&call_id)
                    .and_then(|c| c.terminals.output.peek())
                    .is_some_and(|v| v.truthy());
                trace!(call = %call_id, taken, "branch");
                if taken {
                    if_true
                } else {
                    if_false
                }
            }
        }
    }

    /// Final ingest of the boundary outputs. An output that nothing was
    /// mapped or accumulated into returns `None`; an unwritten self-output
    /// reports the receiver as it is now.
    fn finish(&mut self, terminals: &mut Terminals) -> Result<(), ExecError> {
        let ingested = self.ingest(&Slot::Boundary(Port::Output), Some(&mut *terminals))?;
        if !ingested && !terminals.output.cell().is_written() {
            terminals.output.write(None, Value::None)?;
        }
        let Some(written) = terminals.self_output.as_ref().map(|t| t.cell().is_written()) else {
            return Ok(());
        };
        if !self.ingest(&Slot::Boundary(Port::SelfOutput), Some(&mut *terminals))? && !written {
            let receiver = terminals
                .receiver
                .as_ref()
                .and_then(Terminal::peek)
                .unwrap_or(Value::None);
            if let Some(self_output) = terminals.self_output.as_mut() {
                self_output.write(None, receiver)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reading and writing endpoints
    // -----------------------------------------------------------------------

    fn read_group(
        &self,
        group: &[MappingDef],
        boundary: Option<&Terminals>,
    ) -> Result<Vec<(Option<Strategy>, Value)>, ExecError> {
        let mut writes = Vec::with_capacity(group.len());
        for mapping in group {
            match self.read_source(&mapping.source, mapping.source_strategy.as_ref(), boundary)? {
                Some(value) => writes.push((mapping.target_strategy.clone(), value)),
                None => trace!(source = %mapping.source, "source not written, skipped"),
            }
        }
        Ok(writes)
    }

    fn read_source(
        &self,
        source: &Endpoint,
        strategy: Option<&Strategy>,
        boundary: Option<&Terminals>,
    ) -> Result<Option<Value>, ExecError> {
        let value = match source {
            Endpoint::Constant(c) => Some(Value::from_const(c)),
            Endpoint::Call { call, port } => self
                .calls
                .get(call)
                .and_then(|c| c.terminals.get(*port))
                .and_then(Terminal::peek),
            Endpoint::Boundary(port) => boundary.and_then(|t| t.get(*port)).and_then(Terminal::peek),
            Endpoint::Variable(name) => self.variables.get(name).and_then(Terminal::peek),
        };

        match (value, strategy) {
            (Some(value), Some(strategy)) => value
                .get_item(strategy)
                .map(Some)
                .map_err(|reason| ExecError::ItemAccess {
                    endpoint: source.to_string(),
                    reason,
                }),
            (value, _) => Ok(value),
        }
    }

    fn write_slot(
        &mut self,
        slot: &Slot,
        boundary: Option<&mut Terminals>,
        writes: Vec<(Option<Strategy>, Value)>,
    ) -> Result<bool, ExecError> {
        if writes.is_empty() {
            return Ok(false);
        }
        let terminal = match slot {
            Slot::Call(call, port) => self.calls.get_mut(call).and_then(|c| c.terminals.get_mut(*port)),
            Slot::Boundary(port) => boundary.and_then(|t| t.get_mut(*port)),
            Slot::Variable(name) => Some(
                self.variables
                    .entry(name.clone())
                    .or_insert_with(|| Terminal::variable(name)),
            ),
        };
        let Some(terminal) = terminal else {
            return Err(ExecError::AmbiguousComposition {
                composition: self.id,
                reason: format!("{slot} does not exist"),
            });
        };
        trace!(%slot, count = writes.len(), "ingest");
        for (strategy, value) in writes {
            terminal.write(strategy.as_ref(), value)?;
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> CompositionSnapshot {
        CompositionSnapshot {
            composition: self.id,
            name: self.name.clone(),
            represents: self.represents,
            calls: self.calls.values().filter_map(AppliedCall::snapshot).collect(),
            variables: self.variables.values().map(TerminalSnapshot::from).collect(),
            edges: self
                .mappings
                .edges()
                .map(|(m, authoritative)| EdgeSnapshot {
                    source: m.source.to_string(),
                    source_strategy: m.source_strategy.clone(),
                    target: m.target.to_string(),
                    target_strategy: m.target_strategy.clone(),
                    priority: m.priority,
                    authoritative,
                })
                .collect(),
        }
    }

    pub fn call(&self, id: CallId) -> Option<&AppliedCall> {
        self.calls.get(&id)
    }
}
