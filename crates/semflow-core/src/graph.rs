//! The knowledge-graph read surface and its in-memory implementation.
//!
//! [`GraphQuery`] is everything the execution engine asks of the graph
//! store: function descriptions, compositions, mappings, control successors
//! and implementation handles. The engine treats whatever implements it as a
//! read-only snapshot for the duration of one execution.
//!
//! [`KnowledgeGraph`] is the in-memory store. All mutations go through its
//! builder methods, which validate references so that a composition can only
//! mention calls it owns and ports its functions actually declare.

use std::collections::BTreeMap;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

use crate::composition::{CallDef, CompositionDef, Endpoint, MappingDef, Port, Successor};
use crate::error::CoreError;
use crate::function::{FunctionDef, ImplementationRef, OutputDef, ParamDef};
use crate::id::{CallId, CompositionId, FunctionId};
use crate::types::ConstValue;

/// Read-only query surface of the knowledge graph store.
///
/// Implementors provide the three lookups; everything else is derived.
pub trait GraphQuery {
    fn function(&self, id: FunctionId) -> Result<&FunctionDef, CoreError>;

    fn composition(&self, id: CompositionId) -> Result<&CompositionDef, CoreError>;

    fn function_by_name(&self, name: &str) -> Result<FunctionId, CoreError>;

    /// Calls reachable from the start through control edges, in DFS order.
    /// Calls no visit can reach are not part of the executed composition.
    fn used_calls(&self, comp: CompositionId) -> Result<Vec<CallId>, CoreError> {
        let def = self.composition(comp)?;
        let Some(start) = self.start_of(comp)? else {
            return Ok(Vec::new());
        };

        let mut flow = DiGraphMap::<CallId, ()>::new();
        for call in &def.calls {
            flow.add_node(call.id);
            for target in call.successor.targets() {
                flow.add_edge(call.id, target, ());
            }
        }

        let mut reached = Vec::new();
        let mut dfs = Dfs::new(&flow, start);
        while let Some(call) = dfs.next(&flow) {
            reached.push(call);
        }
        Ok(reached)
    }

    /// The single start call. `None` for an empty composition; several
    /// declared starts are ambiguous.
    fn start_of(&self, comp: CompositionId) -> Result<Option<CallId>, CoreError> {
        let def = self.composition(comp)?;
        match def.starts.as_slice() {
            [] => Ok(None),
            [start] => Ok(Some(*start)),
            many => Err(CoreError::Ambiguous {
                composition: comp,
                reason: format!("{} declared start calls: {:?}", many.len(), many),
            }),
        }
    }

    fn mappings_of(&self, comp: CompositionId) -> Result<&[MappingDef], CoreError> {
        Ok(&self.composition(comp)?.mappings)
    }

    fn parameters_of(&self, function: FunctionId) -> Result<&[ParamDef], CoreError> {
        Ok(&self.function(function)?.params)
    }

    fn self_of(&self, function: FunctionId) -> Result<Option<&ParamDef>, CoreError> {
        Ok(self.function(function)?.receiver.as_ref())
    }

    fn output_of(&self, function: FunctionId) -> Result<&OutputDef, CoreError> {
        Ok(&self.function(function)?.output)
    }

    fn self_output_of(&self, function: FunctionId) -> Result<Option<&OutputDef>, CoreError> {
        Ok(self.function(function)?.self_output.as_ref())
    }

    fn variadic_positional_of(&self, function: FunctionId) -> Result<Option<u16>, CoreError> {
        Ok(self.function(function)?.var_positional().map(|(i, _)| i))
    }

    fn variadic_keyword_of(&self, function: FunctionId) -> Result<Option<u16>, CoreError> {
        Ok(self.function(function)?.var_keyword().map(|(i, _)| i))
    }

    /// Default value of a parameter (or of the receiver, for `Port::Receiver`).
    fn default_of(&self, function: FunctionId, port: Port) -> Result<Option<&ConstValue>, CoreError> {
        let def = self.function(function)?;
        let param = match port {
            Port::Param(i) => def.params.get(i as usize),
            Port::Receiver => def.receiver.as_ref(),
            Port::Output | Port::SelfOutput => None,
        };
        Ok(param.and_then(|p| p.default.as_ref()))
    }

    fn control_successors(&self, comp: CompositionId, call: CallId) -> Result<Successor, CoreError> {
        self.composition(comp)?
            .call(call)
            .map(|c| c.successor)
            .ok_or(CoreError::CallNotFound { composition: comp, call })
    }

    fn nested_composition_of(&self, function: FunctionId) -> Result<Option<CompositionId>, CoreError> {
        Ok(self.function(function)?.body)
    }

    fn implementation_of(&self, function: FunctionId) -> Result<Option<&ImplementationRef>, CoreError> {
        Ok(self.function(function)?.implementation.as_ref())
    }
}

/// In-memory knowledge graph: function descriptions plus compositions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Graph name (the described program or build script).
    pub name: String,
    functions: BTreeMap<FunctionId, FunctionDef>,
    compositions: BTreeMap<CompositionId, CompositionDef>,
    next_function_id: u32,
    next_composition_id: u32,
    next_call_id: u32,
}

impl KnowledgeGraph {
    pub fn new(name: &str) -> Self {
        KnowledgeGraph {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Reassembles a graph from stored parts, recomputing the id counters.
    pub fn from_parts(
        name: &str,
        functions: Vec<FunctionDef>,
        compositions: Vec<CompositionDef>,
    ) -> Self {
        let next_function_id = functions.iter().map(|f| f.id.0 + 1).max().unwrap_or(0);
        let next_composition_id = compositions.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        let next_call_id = compositions
            .iter()
            .flat_map(|c| c.calls.iter())
            .map(|c| c.id.0 + 1)
            .max()
            .unwrap_or(0);

        KnowledgeGraph {
            name: name.to_string(),
            functions: functions.into_iter().map(|f| (f.id, f)).collect(),
            compositions: compositions.into_iter().map(|c| (c.id, c)).collect(),
            next_function_id,
            next_composition_id,
            next_call_id,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.values()
    }

    pub fn compositions(&self) -> impl Iterator<Item = &CompositionDef> {
        self.compositions.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn composition_count(&self) -> usize {
        self.compositions.len()
    }

    // -----------------------------------------------------------------------
    // Function methods
    // -----------------------------------------------------------------------

    /// Adds a function description with no body or implementation yet.
    pub fn add_function(&mut self, name: &str, params: Vec<ParamDef>) -> Result<FunctionId, CoreError> {
        let id = FunctionId(self.next_function_id);
        let def = FunctionDef::new(id, name, params);
        def.validate()?;
        self.next_function_id += 1;
        self.functions.insert(id, def);
        Ok(id)
    }

    /// Adds a function description bound to a host implementation.
    pub fn add_native(
        &mut self,
        name: &str,
        params: Vec<ParamDef>,
        implementation: &str,
    ) -> Result<FunctionId, CoreError> {
        let id = self.add_function(name, params)?;
        self.function_mut(id)?.implementation = Some(ImplementationRef::new(implementation));
        Ok(id)
    }

    /// Mutable access, e.g. to attach a receiver or self-output. Callers are
    /// expected to keep the description valid; [`check`](Self::check)
    /// re-validates everything.
    pub fn function_mut(&mut self, id: FunctionId) -> Result<&mut FunctionDef, CoreError> {
        self.functions
            .get_mut(&id)
            .ok_or(CoreError::FunctionNotFound { id })
    }

    /// Sets or clears the default value of a named parameter.
    pub fn set_default(
        &mut self,
        function: FunctionId,
        param: &str,
        default: Option<ConstValue>,
    ) -> Result<(), CoreError> {
        let def = self.function_mut(function)?;
        let name = def.name.clone();
        let slot = def
            .params
            .iter_mut()
            .find(|p| p.name == param)
            .ok_or_else(|| CoreError::InvalidFunction {
                function: name,
                reason: format!("no parameter named '{param}'"),
            })?;
        slot.default = default;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Composition methods
    // -----------------------------------------------------------------------

    /// Adds an empty composition. When `represents` is set, the composition
    /// becomes that function's body.
    pub fn add_composition(
        &mut self,
        name: &str,
        represents: Option<FunctionId>,
    ) -> Result<CompositionId, CoreError> {
        let id = CompositionId(self.next_composition_id);
        if let Some(function) = represents {
            self.function_mut(function)?.body = Some(id);
        }
        self.next_composition_id += 1;
        self.compositions
            .insert(id, CompositionDef::new(id, name, represents));
        Ok(id)
    }

    /// Instantiates `function` inside `comp` as a new applied call.
    pub fn add_call(&mut self, comp: CompositionId, function: FunctionId) -> Result<CallId, CoreError> {
        if !self.functions.contains_key(&function) {
            return Err(CoreError::FunctionNotFound { id: function });
        }
        let id = CallId(self.next_call_id);
        self.composition_mut(comp)?.calls.push(CallDef {
            id,
            function,
            successor: Successor::End,
            label: None,
        });
        self.next_call_id += 1;
        Ok(id)
    }

    pub fn set_label(&mut self, comp: CompositionId, call: CallId, label: &str) -> Result<(), CoreError> {
        let def = self.composition_mut(comp)?;
        let slot = def
            .calls
            .iter_mut()
            .find(|c| c.id == call)
            .ok_or(CoreError::CallNotFound { composition: comp, call })?;
        slot.label = Some(label.to_string());
        Ok(())
    }

    /// Declares `call` as a start of `comp`.
    pub fn set_start(&mut self, comp: CompositionId, call: CallId) -> Result<(), CoreError> {
        let def = self.composition_mut(comp)?;
        if !def.contains_call(call) {
            return Err(CoreError::CallNotFound { composition: comp, call });
        }
        if !def.starts.contains(&call) {
            def.starts.push(call);
        }
        Ok(())
    }

    pub fn set_successor(
        &mut self,
        comp: CompositionId,
        call: CallId,
        successor: Successor,
    ) -> Result<(), CoreError> {
        let def = self.composition_mut(comp)?;
        for target in successor.targets() {
            if !def.contains_call(target) {
                return Err(CoreError::CallNotFound { composition: comp, call: target });
            }
        }
        let slot = def
            .calls
            .iter_mut()
            .find(|c| c.id == call)
            .ok_or(CoreError::CallNotFound { composition: comp, call })?;
        slot.successor = successor;
        Ok(())
    }

    /// Chains `calls` with unconditional `Next` edges and makes the first one
    /// the start.
    pub fn sequence(&mut self, comp: CompositionId, calls: &[CallId]) -> Result<(), CoreError> {
        for pair in calls.windows(2) {
            self.set_successor(comp, pair[0], Successor::Next(pair[1]))?;
        }
        if let Some(first) = calls.first() {
            self.set_start(comp, *first)?;
        }
        Ok(())
    }

    pub fn add_mapping(&mut self, comp: CompositionId, mapping: MappingDef) -> Result<(), CoreError> {
        self.check_mapping(comp, &mapping)?;
        self.composition_mut(comp)?.mappings.push(mapping);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Re-validates every function and mapping. Used after bulk loads.
    pub fn check(&self) -> Result<(), CoreError> {
        for def in self.functions.values() {
            def.validate()?;
        }
        for comp in self.compositions.values() {
            for mapping in &comp.mappings {
                self.check_mapping(comp.id, mapping)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn composition_mut(&mut self, id: CompositionId) -> Result<&mut CompositionDef, CoreError> {
        self.compositions
            .get_mut(&id)
            .ok_or(CoreError::CompositionNotFound { id })
    }

    fn check_mapping(&self, comp: CompositionId, mapping: &MappingDef) -> Result<(), CoreError> {
        let def = self.composition(comp)?;
        let invalid = |reason: String| CoreError::InvalidMapping { composition: comp, reason };

        if let Some(priority) = mapping.priority {
            if !def.contains_call(priority) {
                return Err(invalid(format!("priority names call {priority} outside the composition")));
            }
        }

        match &mapping.target {
            Endpoint::Constant(_) => return Err(invalid("a constant cannot be a mapping target".into())),
            Endpoint::Call { port, .. } if port.is_output() => {
                return Err(invalid(format!("call output {} cannot be a mapping target", mapping.target)))
            }
            Endpoint::Boundary(port) if !port.is_output() => {
                return Err(invalid(format!("boundary input {} cannot be a mapping target", mapping.target)))
            }
            _ => {}
        }

        for endpoint in [&mapping.source, &mapping.target] {
            match endpoint {
                Endpoint::Call { call, port } => {
                    let call_def = def
                        .call(*call)
                        .ok_or(CoreError::CallNotFound { composition: comp, call: *call })?;
                    self.check_port(comp, call_def.function, *port)?;
                }
                Endpoint::Boundary(port) => {
                    let function = def
                        .represents
                        .ok_or_else(|| invalid("boundary endpoint in a standalone composition".into()))?;
                    self.check_port(comp, function, *port)?;
                }
                Endpoint::Constant(_) | Endpoint::Variable(_) => {}
            }
        }
        Ok(())
    }

    fn check_port(&self, comp: CompositionId, function: FunctionId, port: Port) -> Result<(), CoreError> {
        let def = self.function(function)?;
        let exists = match port {
            Port::Param(i) => (i as usize) < def.params.len(),
            Port::Receiver => def.receiver.is_some(),
            Port::Output => true,
            Port::SelfOutput => def.self_output.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(CoreError::InvalidMapping {
                composition: comp,
                reason: format!("function '{}' has no {port}", def.name),
            })
        }
    }
}

impl GraphQuery for KnowledgeGraph {
    fn function(&self, id: FunctionId) -> Result<&FunctionDef, CoreError> {
        self.functions
            .get(&id)
            .ok_or(CoreError::FunctionNotFound { id })
    }

    fn composition(&self, id: CompositionId) -> Result<&CompositionDef, CoreError> {
        self.compositions
            .get(&id)
            .ok_or(CoreError::CompositionNotFound { id })
    }

    fn function_by_name(&self, name: &str) -> Result<FunctionId, CoreError> {
        self.functions
            .values()
            .find(|f| f.name == name)
            .map(|f| f.id)
            .ok_or_else(|| CoreError::UnknownFunctionName { name: name.to_string() })
    }
}
