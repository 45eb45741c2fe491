//! The engine facade: configuration, entry points and run bookkeeping.

use indexmap::IndexMap;
use tracing::{debug, info};

use semflow_core::{CallId, CompositionId, FunctionId, GraphQuery};

use crate::call::AppliedCall;
use crate::composition::CompositionInstance;
use crate::error::{ExecError, Site};
use crate::host::ImplementationResolver;
use crate::snapshot::CompositionSnapshot;
use crate::trace::{Outcome, TraceEntry};
use crate::value::Value;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Whether to record a [`TraceEntry`] per visit.
    pub trace_enabled: bool,
    /// Whether terminals validate values against their declared types.
    pub check_types: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trace_enabled: false,
            check_types: true,
        }
    }
}

/// What to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Function(FunctionId),
    Composition(CompositionId),
}

/// Shared state threaded through every visit of one execution.
pub(crate) struct Runtime<'g> {
    pub graph: &'g dyn GraphQuery,
    pub resolver: &'g dyn ImplementationResolver,
    pub config: EngineConfig,
    pub trace: Option<Vec<TraceEntry>>,
    pub visits: Vec<CallId>,
    pub depth: usize,
    /// Function of the innermost call that failed in this execution.
    pub failed: Option<FunctionId>,
}

impl Runtime<'_> {
    pub fn record(&mut self, composition: CompositionId, call: CallId, function: FunctionId, outcome: Outcome) {
        if outcome == Outcome::Failed && self.failed.is_none() {
            self.failed = Some(function);
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry {
                depth: self.depth,
                composition,
                call,
                function,
                outcome,
            });
        }
    }

    fn begin(&mut self) {
        self.visits.clear();
        self.depth = 0;
        self.failed = None;
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
    }
}

/// State kept from the last execution for introspection.
enum LastRun {
    Entry(Box<AppliedCall>),
    Standalone(Box<CompositionInstance>),
}

/// Replays compositions of a knowledge graph against host implementations.
///
/// The graph is treated as a read-only snapshot. Each call to
/// [`execute`](Self::execute) starts from fresh terminals.
pub struct Engine<'g> {
    rt: Runtime<'g>,
    last: Option<LastRun>,
}

impl<'g> Engine<'g> {
    pub fn new(graph: &'g dyn GraphQuery, resolver: &'g dyn ImplementationResolver, config: EngineConfig) -> Self {
        let trace = config.trace_enabled.then(Vec::new);
        Engine {
            rt: Runtime {
                graph,
                resolver,
                config,
                trace,
                visits: Vec::new(),
                depth: 0,
                failed: None,
            },
            last: None,
        }
    }

    /// Binds `inputs` to the target's boundary, runs it to completion and
    /// returns the boundary outputs.
    ///
    /// A function returns its output (and self-output, if declared) by name.
    /// A standalone composition takes and returns its variables.
    pub fn execute(&mut self, target: Target, inputs: IndexMap<String, Value>) -> Result<IndexMap<String, Value>, ExecError> {
        self.rt.begin();
        info!(?target, inputs = inputs.len(), "execute");

        let result = match target {
            Target::Function(id) => self.run_function(id, inputs),
            Target::Composition(id) => match self.rt.graph.composition(id)?.represents {
                Some(function) => self.run_function(function, inputs),
                None => self.run_standalone(id, inputs),
            },
        };

        match result {
            Err(ExecError::IterationExhausted { site }) => Err(ExecError::ImplementationFailure {
                site,
                function: self.function_name(site),
                message: "iteration exhausted outside a loop node".into(),
                arguments: String::new(),
            }),
            other => {
                debug!(visits = self.rt.visits.len(), ok = other.is_ok(), "execute finished");
                other
            }
        }
    }

    pub fn execute_function(&mut self, id: FunctionId, inputs: IndexMap<String, Value>) -> Result<IndexMap<String, Value>, ExecError> {
        self.execute(Target::Function(id), inputs)
    }

    pub fn execute_composition(
        &mut self,
        id: CompositionId,
        inputs: IndexMap<String, Value>,
    ) -> Result<IndexMap<String, Value>, ExecError> {
        self.execute(Target::Composition(id), inputs)
    }

    /// Call-visitation sequence of the last execution, at every depth.
    pub fn visits(&self) -> &[CallId] {
        &self.rt.visits
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.rt.trace.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.rt.config
    }

    /// Calls, terminals and mapping edges of the last execution. `None`
    /// before the first execution and for functions without a body.
    pub fn snapshot(&self) -> Option<CompositionSnapshot> {
        match self.last.as_ref()? {
            LastRun::Entry(call) => call.body().map(CompositionInstance::snapshot),
            LastRun::Standalone(instance) => Some(instance.snapshot()),
        }
    }

    fn run_function(&mut self, id: FunctionId, inputs: IndexMap<String, Value>) -> Result<IndexMap<String, Value>, ExecError> {
        let graph = self.rt.graph;
        let def = graph.function(id)?;
        let site = Site::Entry(id);
        let mut entry = AppliedCall::new(site, def, Default::default(), None, self.rt.config.check_types);

        for (name, value) in inputs {
            let terminal = entry
                .terminals
                .params
                .iter_mut()
                .chain(entry.terminals.receiver.as_mut())
                .find(|t| t.name == name);
            match terminal {
                Some(terminal) => terminal.write(None, value)?,
                None => {
                    return Err(ExecError::UnknownInput {
                        name,
                        target: format!("function '{}'", def.name),
                    })
                }
            }
        }

        let result = entry.execute(&mut self.rt);
        let outputs = entry_outputs(&entry);
        self.last = Some(LastRun::Entry(Box::new(entry)));
        result.map(|()| outputs)
    }

    fn run_standalone(&mut self, id: CompositionId, inputs: IndexMap<String, Value>) -> Result<IndexMap<String, Value>, ExecError> {
        let mut instance = CompositionInstance::new(self.rt.graph, id, self.rt.config.check_types)?;
        instance.reset();
        instance.bind_variables(inputs)?;
        let result = instance.run(&mut self.rt, None);
        let outputs = instance.variable_values();
        self.last = Some(LastRun::Standalone(Box::new(instance)));
        result.map(|()| outputs)
    }

    fn function_name(&self, site: Site) -> String {
        let function = match site {
            Site::Entry(function) => Some(function),
            Site::Call(_) => self.rt.failed,
        };
        function
            .and_then(|f| self.rt.graph.function(f).ok())
            .map(|f| f.name.clone())
            .unwrap_or_else(|| site.to_string())
    }
}

fn entry_outputs(entry: &AppliedCall) -> IndexMap<String, Value> {
    let mut outputs = IndexMap::new();
    let terminals = &entry.terminals;
    outputs.insert(terminals.output.name.clone(), terminals.output.peek().unwrap_or(Value::None));
    if let Some(self_output) = &terminals.self_output {
        outputs.insert(self_output.name.clone(), self_output.peek().unwrap_or(Value::None));
    }
    outputs
}
