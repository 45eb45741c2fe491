//! Value cells and the terminals that own them.
//!
//! A [`Cell`] holds either one scalar or an index/key-accumulated collection.
//! It also remembers whether its owning call has already read it in the
//! current visit: a consumed cell still shows its value to observers, but the
//! next write starts a fresh resolution and a second binding read sees
//! nothing.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use semflow_core::{FunctionDef, Port, Strategy, ValueType};

use crate::error::{ExecError, Site};
use crate::value::Value;

/// Contents of a cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellState {
    #[default]
    Empty,
    Scalar(Value),
    /// Ordered by index; gaps are allowed and collapse on read.
    List(BTreeMap<usize, Value>),
    Map(IndexMap<String, Value>),
}

#[derive(Debug, Clone, Default)]
pub struct Cell {
    state: CellState,
    consumed: bool,
}

impl Cell {
    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn is_written(&self) -> bool {
        !matches!(self.state, CellState::Empty)
    }

    /// Written since the owning call last read it.
    pub fn is_fresh(&self) -> bool {
        self.is_written() && !self.consumed
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    fn begin_write(&mut self) {
        if self.consumed {
            self.state = CellState::Empty;
            self.consumed = false;
        }
    }

    pub fn write(&mut self, value: Value) {
        self.begin_write();
        self.state = CellState::Scalar(value);
    }

    /// Switches the cell into list mode on first use.
    pub fn write_index(&mut self, index: usize, value: Value) {
        self.begin_write();
        match &mut self.state {
            CellState::List(items) => {
                items.insert(index, value);
            }
            state => *state = CellState::List(BTreeMap::from([(index, value)])),
        }
    }

    /// Writes at the next free index after the highest one present.
    pub fn append(&mut self, value: Value) {
        self.begin_write();
        let next = match &self.state {
            CellState::List(items) => items.keys().next_back().map_or(0, |last| last + 1),
            _ => 0,
        };
        self.write_index(next, value);
    }

    /// Switches the cell into map mode on first use.
    pub fn write_key(&mut self, key: String, value: Value) {
        self.begin_write();
        match &mut self.state {
            CellState::Map(entries) => {
                entries.insert(key, value);
            }
            state => *state = CellState::Map(IndexMap::from([(key, value)])),
        }
    }

    /// Current value without consuming it. Collections are returned as one
    /// aggregate: the list sorted by index, or the map.
    pub fn peek(&self) -> Option<Value> {
        match &self.state {
            CellState::Empty => None,
            CellState::Scalar(value) => Some(value.clone()),
            CellState::List(items) => Some(Value::List(items.values().cloned().collect())),
            CellState::Map(entries) => Some(Value::Map(entries.clone())),
        }
    }

    /// Binding read: returns the value once per resolution.
    pub fn take(&mut self) -> Option<Value> {
        if !self.is_fresh() {
            return None;
        }
        self.consumed = true;
        self.peek()
    }

    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn clear(&mut self) {
        self.state = CellState::Empty;
        self.consumed = false;
    }
}

/// A typed cell bound to one port of one call, or to a composition variable.
#[derive(Debug, Clone)]
pub struct Terminal {
    pub name: String,
    /// `None` for composition variables.
    pub port: Option<Port>,
    pub value_type: ValueType,
    label: String,
    /// Variadic parameters declare the type of their elements.
    elementwise: bool,
    checked: bool,
    cell: Cell,
}

impl Terminal {
    pub fn new(site: Site, port: Port, name: &str, value_type: ValueType, elementwise: bool, checked: bool) -> Self {
        Terminal {
            name: name.to_string(),
            port: Some(port),
            value_type,
            label: format!("{site}.{port} '{name}'"),
            elementwise,
            checked,
            cell: Cell::default(),
        }
    }

    pub fn variable(name: &str) -> Self {
        Terminal {
            name: name.to_string(),
            port: None,
            value_type: ValueType::Any,
            label: format!("var {name}"),
            elementwise: false,
            checked: false,
            cell: Cell::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Writes `value` using a target-side strategy (`None` = direct write).
    pub fn write(&mut self, strategy: Option<&Strategy>, value: Value) -> Result<(), ExecError> {
        self.check(strategy, &value)?;
        match strategy {
            None => self.cell.write(value),
            Some(Strategy::Index(i)) => self.cell.write_index(*i, value),
            Some(Strategy::Append) => self.cell.append(value),
            Some(Strategy::Key(k)) => self.cell.write_key(k.clone(), value),
        }
        Ok(())
    }

    pub fn peek(&self) -> Option<Value> {
        self.cell.peek()
    }

    pub fn take(&mut self) -> Option<Value> {
        self.cell.take()
    }

    pub fn is_fresh(&self) -> bool {
        self.cell.is_fresh()
    }

    pub fn consume(&mut self) {
        self.cell.consume();
    }

    pub fn reset(&mut self) {
        self.cell.clear();
    }

    fn check(&self, strategy: Option<&Strategy>, value: &Value) -> Result<(), ExecError> {
        if !self.checked || self.value_type == ValueType::Any {
            return Ok(());
        }
        if self.elementwise {
            return match (strategy, value) {
                (Some(_), element) => self.expect(self.value_type, element),
                (None, Value::List(items)) => items.iter().try_for_each(|v| self.expect(self.value_type, v)),
                (None, Value::Map(entries)) => entries.values().try_for_each(|v| self.expect(self.value_type, v)),
                (None, other) => self.expect(self.value_type, other),
            };
        }
        match strategy {
            None => self.expect(self.value_type, value),
            Some(Strategy::Key(_)) => self.expect_container(ValueType::Map, value),
            Some(_) => self.expect_container(ValueType::List, value),
        }
    }

    fn expect(&self, expected: ValueType, value: &Value) -> Result<(), ExecError> {
        if expected.accepts(value.value_type()) {
            Ok(())
        } else {
            Err(ExecError::TypeMismatch {
                terminal: self.label.clone(),
                expected,
                actual: value.summary(),
            })
        }
    }

    fn expect_container(&self, container: ValueType, value: &Value) -> Result<(), ExecError> {
        if self.value_type == container {
            Ok(())
        } else {
            Err(ExecError::TypeMismatch {
                terminal: self.label.clone(),
                expected: self.value_type,
                actual: format!("{container} element {}", value.summary()),
            })
        }
    }
}

/// All terminals of one call, addressable by [`Port`].
#[derive(Debug, Clone)]
pub struct Terminals {
    pub params: Vec<Terminal>,
    pub receiver: Option<Terminal>,
    pub output: Terminal,
    pub self_output: Option<Terminal>,
}

impl Terminals {
    pub fn for_function(def: &FunctionDef, site: Site, checked: bool) -> Self {
        let params = def
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| Terminal::new(site, Port::Param(i as u16), &p.name, p.value_type, p.is_variadic(), checked))
            .collect();
        let receiver = def
            .receiver
            .as_ref()
            .map(|r| Terminal::new(site, Port::Receiver, &r.name, r.value_type, false, checked));
        let output = Terminal::new(site, Port::Output, &def.output.name, def.output.value_type, false, checked);
        let self_output = def
            .self_output
            .as_ref()
            .map(|o| Terminal::new(site, Port::SelfOutput, &o.name, o.value_type, false, checked));

        Terminals {
            params,
            receiver,
            output,
            self_output,
        }
    }

    pub fn get(&self, port: Port) -> Option<&Terminal> {
        match port {
            Port::Param(i) => self.params.get(i as usize),
            Port::Receiver => self.receiver.as_ref(),
            Port::Output => Some(&self.output),
            Port::SelfOutput => self.self_output.as_ref(),
        }
    }

    pub fn get_mut(&mut self, port: Port) -> Option<&mut Terminal> {
        match port {
            Port::Param(i) => self.params.get_mut(i as usize),
            Port::Receiver => self.receiver.as_mut(),
            Port::Output => Some(&mut self.output),
            Port::SelfOutput => self.self_output.as_mut(),
        }
    }

    /// Parameters, receiver, output, self-output, in that order.
    pub fn iter(&self) -> impl Iterator<Item = &Terminal> {
        self.params
            .iter()
            .chain(self.receiver.as_ref())
            .chain(std::iter::once(&self.output))
            .chain(self.self_output.as_ref())
    }

    pub fn consume_inputs(&mut self) {
        for t in self.params.iter_mut().chain(self.receiver.as_mut()) {
            t.consume();
        }
    }

    pub fn reset(&mut self) {
        for t in self
            .params
            .iter_mut()
            .chain(self.receiver.as_mut())
            .chain(std::iter::once(&mut self.output))
            .chain(self.self_output.as_mut())
        {
            t.reset();
        }
    }
}
