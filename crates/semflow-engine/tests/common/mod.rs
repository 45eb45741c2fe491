//! Graph-building helpers shared by the integration tests.

#![allow(dead_code)]

use indexmap::IndexMap;

use semflow_core::{
    CallId, CompositionId, Endpoint, FunctionId, KnowledgeGraph, MappingDef, OutputDef, ParamDef, Port, ValueType,
};
use semflow_engine::Value;

/// Untyped positional parameters named after `names`, indexed in order.
pub fn positional(names: &[&str]) -> Vec<ParamDef> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| ParamDef::positional(n, i as u16, ValueType::Any))
        .collect()
}

/// A function bound to the host implementation of the same name.
pub fn native(graph: &mut KnowledgeGraph, name: &str, params: Vec<ParamDef>) -> FunctionId {
    graph.add_native(name, params, name).unwrap()
}

/// A method-style function: receiver in, mutated receiver out.
pub fn method(graph: &mut KnowledgeGraph, name: &str, params: Vec<ParamDef>, path: &str) -> FunctionId {
    let id = graph.add_native(name, params, path).unwrap();
    let def = graph.function_mut(id).unwrap();
    def.receiver = Some(ParamDef::positional("self", 0, ValueType::Any));
    def.self_output = Some(OutputDef::new("self", ValueType::Any));
    id
}

pub fn map(graph: &mut KnowledgeGraph, comp: CompositionId, mapping: MappingDef) {
    graph.add_mapping(comp, mapping).unwrap();
}

pub fn param(call: CallId, index: u16) -> Endpoint {
    Endpoint::call(call, Port::Param(index))
}

pub fn output(call: CallId) -> Endpoint {
    Endpoint::call(call, Port::Output)
}

pub fn inputs<const N: usize>(pairs: [(&str, Value); N]) -> IndexMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().copied().map(Value::Int).collect())
}

/// `add_xy(x, y)`: a function whose body adds its two boundary inputs.
pub fn build_add_xy() -> (KnowledgeGraph, FunctionId) {
    let mut graph = KnowledgeGraph::new("add_xy");
    let add = native(&mut graph, "add", positional(&["a", "b"]));
    let add_xy = graph.add_function("add_xy", positional(&["x", "y"])).unwrap();

    let body = graph.add_composition("add_xy_body", Some(add_xy)).unwrap();
    let a = graph.add_call(body, add).unwrap();
    graph.set_start(body, a).unwrap();
    map(&mut graph, body, MappingDef::new(Endpoint::Boundary(Port::Param(0)), param(a, 0)));
    map(&mut graph, body, MappingDef::new(Endpoint::Boundary(Port::Param(1)), param(a, 1)));
    map(&mut graph, body, MappingDef::new(output(a), Endpoint::Boundary(Port::Output)));

    (graph, add_xy)
}

/// Standalone loop: `out = [i * 10 for i in range(n)]`, accumulated through
/// a variadic parameter of `pack`.
pub struct LoopGraph {
    pub graph: KnowledgeGraph,
    pub comp: CompositionId,
    pub next: CallId,
    pub body: CallId,
    pub pack: CallId,
}

pub fn build_loop() -> LoopGraph {
    let mut graph = KnowledgeGraph::new("loop");
    let range = native(&mut graph, "range", positional(&["stop"]));
    let iter = native(&mut graph, "iter", positional(&["iterable"]));
    let next = method(&mut graph, "next", vec![], "next");
    let mul = native(&mut graph, "mul", positional(&["a", "b"]));
    let pack = native(&mut graph, "pack", vec![ParamDef::var_positional("items", ValueType::Int)]);

    let comp = graph.add_composition("main", None).unwrap();
    let c_range = graph.add_call(comp, range).unwrap();
    let c_iter = graph.add_call(comp, iter).unwrap();
    let c_next = graph.add_call(comp, next).unwrap();
    let c_mul = graph.add_call(comp, mul).unwrap();
    let c_pack = graph.add_call(comp, pack).unwrap();

    graph.sequence(comp, &[c_range, c_iter, c_next]).unwrap();
    graph
        .set_successor(comp, c_next, semflow_core::Successor::Loop { iterate: c_mul, next: Some(c_pack) })
        .unwrap();
    graph.set_successor(comp, c_mul, semflow_core::Successor::Next(c_next)).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::variable("n"), param(c_range, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_range), param(c_iter, 0)));
    // The iterator is threaded through `next`: fresh from `iter`, then the
    // advanced receiver from the previous `next`.
    map(
        &mut graph,
        comp,
        MappingDef::new(output(c_iter), Endpoint::call(c_next, Port::Receiver)).with_priority(c_iter),
    );
    map(
        &mut graph,
        comp,
        MappingDef::new(Endpoint::call(c_next, Port::SelfOutput), Endpoint::call(c_next, Port::Receiver))
            .with_priority(c_next),
    );
    map(&mut graph, comp, MappingDef::new(output(c_next), param(c_mul, 0)));
    map(&mut graph, comp, MappingDef::new(Endpoint::constant(10), param(c_mul, 1)));
    map(
        &mut graph,
        comp,
        MappingDef::new(output(c_mul), param(c_pack, 0)).into_item(semflow_core::Strategy::Append),
    );
    map(&mut graph, comp, MappingDef::new(output(c_pack), Endpoint::variable("out")));

    LoopGraph {
        graph,
        comp,
        next: c_next,
        body: c_mul,
        pack: c_pack,
    }
}
