//! Applied calls: one instantiation of a Function Description.
//!
//! An [`AppliedCall`] owns the terminals of its description, the lazily
//! bound implementation handle and, for descriptions with a body, the lazily
//! created nested composition instance. [`AppliedCall::execute`] performs the
//! Bind, Dispatch and Publish steps of a visit; Ingest, Settle and Advance
//! need the surrounding composition and live in
//! [`composition`](crate::composition).

use semflow_core::{CallId, CompositionId, FunctionDef, FunctionId, Successor};

use crate::binding::{self, Arguments};
use crate::cell::Terminals;
use crate::composition::CompositionInstance;
use crate::engine::Runtime;
use crate::error::{ExecError, Site};
use crate::host::{Callable, HostError, Invocation};
use crate::snapshot::{CallSnapshot, TerminalSnapshot};
use crate::value::Value;

pub(crate) struct AppliedCall {
    pub site: Site,
    pub function: FunctionId,
    pub successor: Successor,
    pub label: Option<String>,
    pub terminals: Terminals,
    /// Static implementation handle, bound on first use.
    handle: Option<Callable>,
    body: Option<Box<CompositionInstance>>,
}

impl AppliedCall {
    pub fn new(site: Site, def: &FunctionDef, successor: Successor, label: Option<String>, checked: bool) -> Self {
        AppliedCall {
            site,
            function: def.id,
            successor,
            label,
            terminals: Terminals::for_function(def, site, checked),
            handle: None,
            body: None,
        }
    }

    /// Bind, Dispatch and Publish. Terminals must already be ingested.
    pub fn execute(&mut self, rt: &mut Runtime<'_>) -> Result<(), ExecError> {
        let graph = rt.graph;
        let def = graph.function(self.function)?;
        match def.body {
            Some(body) => self.run_body(rt, def, body),
            None => self.invoke(rt, def),
        }
    }

    fn run_body(&mut self, rt: &mut Runtime<'_>, def: &FunctionDef, body_id: CompositionId) -> Result<(), ExecError> {
        binding::prepare_boundary(def, self.site, &mut self.terminals)?;

        let mut body = match self.body.take() {
            Some(body) => body,
            None => Box::new(CompositionInstance::new(rt.graph, body_id, rt.config.check_types)?),
        };
        body.reset();
        // Outputs are rebuilt by every run; accumulated returns start empty.
        self.terminals.output.reset();
        if let Some(self_output) = self.terminals.self_output.as_mut() {
            self_output.reset();
        }

        rt.depth += 1;
        let result = body.run(rt, Some(&mut self.terminals));
        rt.depth -= 1;
        self.body = Some(body);
        result?;

        self.terminals.consume_inputs();
        Ok(())
    }

    fn invoke(&mut self, rt: &mut Runtime<'_>, def: &FunctionDef) -> Result<(), ExecError> {
        let args = binding::assemble(def, self.site, &mut self.terminals)?;
        let snapshot = args.to_string();
        let callable = self.bind(rt, def, args.receiver.as_ref())?;

        let Arguments {
            positional,
            keyword,
            mut receiver,
        } = args;
        tracing::trace!(site = %self.site, function = %def.name, arguments = %snapshot, "invoking");

        let result = callable(Invocation {
            args: positional,
            kwargs: keyword,
            receiver: receiver.as_mut(),
        });

        match result {
            Ok(value) => {
                self.terminals.output.write(None, value)?;
                if let Some(self_output) = self.terminals.self_output.as_mut() {
                    self_output.write(None, receiver.unwrap_or(Value::None))?;
                }
                Ok(())
            }
            Err(HostError::Exhausted) => Err(ExecError::IterationExhausted { site: self.site }),
            Err(err) => Err(ExecError::ImplementationFailure {
                site: self.site,
                function: def.name.clone(),
                message: err.to_string(),
                arguments: snapshot,
            }),
        }
    }

    /// A receiver's runtime value decides the member first; the static
    /// handle is the fallback.
    fn bind(&mut self, rt: &Runtime<'_>, def: &FunctionDef, receiver: Option<&Value>) -> Result<Callable, ExecError> {
        let implementation = def.implementation.as_ref();

        if let (Some(recv), Some(imp)) = (receiver, implementation) {
            if let Some(member) = rt.resolver.resolve_member(recv, imp.member()) {
                return Ok(member);
            }
        }

        if self.handle.is_none() {
            self.handle = implementation.and_then(|imp| rt.resolver.resolve(imp));
        }
        self.handle.clone().ok_or_else(|| ExecError::Unbound {
            site: self.site,
            function: def.name.clone(),
            path: implementation.map(|imp| imp.path.clone()),
        })
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.site.call()
    }

    pub fn body(&self) -> Option<&CompositionInstance> {
        self.body.as_deref()
    }

    pub fn reset(&mut self) {
        self.terminals.reset();
        if let Some(body) = self.body.as_mut() {
            body.reset();
        }
    }

    pub fn snapshot(&self) -> Option<CallSnapshot> {
        Some(CallSnapshot {
            call: self.call_id()?,
            function: self.function,
            label: self.label.clone(),
            successor: self.successor,
            terminals: self.terminals.iter().map(TerminalSnapshot::from).collect(),
            body: self.body.as_ref().map(|b| Box::new(b.snapshot())),
        })
    }
}
