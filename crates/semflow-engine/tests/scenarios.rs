//! End-to-end scenarios: recursion through nested bodies, late-bound
//! methods, mapping strategies, the error taxonomy, tracing and snapshots.

mod common;

use indexmap::IndexMap;

use semflow_core::{
    ConstValue, Endpoint, KnowledgeGraph, MappingDef, OutputDef, ParamDef, Port, Strategy, Successor, ValueType,
};
use semflow_engine::{Engine, EngineConfig, ExecError, HostError, Outcome, Registry, Value};

use common::*;

// ---------------------------------------------------------------------------
// Nested compositions
// ---------------------------------------------------------------------------

/// `fact(n) = 1 if n <= 1 else n * fact(n - 1)`, where the return value is a
/// merge of the two branch results.
fn build_factorial() -> (KnowledgeGraph, semflow_core::FunctionId) {
    let mut graph = KnowledgeGraph::new("fact");
    let le = native(&mut graph, "le", positional(&["a", "b"]));
    let sub = native(&mut graph, "sub", positional(&["a", "b"]));
    let mul = native(&mut graph, "mul", positional(&["a", "b"]));
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let fact = graph.add_function("fact", positional(&["n"])).unwrap();

    let body = graph.add_composition("fact_body", Some(fact)).unwrap();
    let c_le = graph.add_call(body, le).unwrap();
    let c_one = graph.add_call(body, identity).unwrap();
    let c_sub = graph.add_call(body, sub).unwrap();
    let c_rec = graph.add_call(body, fact).unwrap();
    let c_mul = graph.add_call(body, mul).unwrap();

    graph.set_start(body, c_le).unwrap();
    graph
        .set_successor(body, c_le, Successor::Branch { if_true: Some(c_one), if_false: Some(c_sub) })
        .unwrap();
    graph.set_successor(body, c_sub, Successor::Next(c_rec)).unwrap();
    graph.set_successor(body, c_rec, Successor::Next(c_mul)).unwrap();

    let n = Endpoint::Boundary(Port::Param(0));
    map(&mut graph, body, MappingDef::new(n.clone(), param(c_le, 0)));
    map(&mut graph, body, MappingDef::new(Endpoint::constant(1), param(c_le, 1)));
    map(&mut graph, body, MappingDef::new(Endpoint::constant(1), param(c_one, 0)));
    map(&mut graph, body, MappingDef::new(n.clone(), param(c_sub, 0)));
    map(&mut graph, body, MappingDef::new(Endpoint::constant(1), param(c_sub, 1)));
    map(&mut graph, body, MappingDef::new(output(c_sub), param(c_rec, 0)));
    map(&mut graph, body, MappingDef::new(n, param(c_mul, 0)));
    map(&mut graph, body, MappingDef::new(output(c_rec), param(c_mul, 1)));

    let ret = Endpoint::Boundary(Port::Output);
    map(&mut graph, body, MappingDef::new(output(c_one), ret.clone()).with_priority(c_one));
    map(&mut graph, body, MappingDef::new(output(c_mul), ret).with_priority(c_mul));

    (graph, fact)
}

#[test]
fn recursive_body_computes_factorial() {
    let (graph, fact) = build_factorial();
    let registry = Registry::standard();
    let config = EngineConfig {
        trace_enabled: true,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(&graph, &registry, config);

    let outputs = engine.execute_function(fact, inputs([("n", Value::Int(5))])).unwrap();
    assert_eq!(outputs["result"], Value::Int(120));

    let trace = engine.trace().unwrap();
    assert_eq!(trace.iter().map(|e| e.depth).max(), Some(5));
    assert!(trace.iter().all(|e| e.outcome == Outcome::Completed));

    let outputs = engine.execute_function(fact, inputs([("n", Value::Int(1))])).unwrap();
    assert_eq!(outputs["result"], Value::Int(1));
}

#[test]
fn function_body_reruns_on_every_loop_visit() {
    let mut graph = KnowledgeGraph::new("squares");
    let mul = native(&mut graph, "mul", positional(&["a", "b"]));
    let range = native(&mut graph, "range", positional(&["stop"]));
    let iter = native(&mut graph, "iter", positional(&["iterable"]));
    let next = method(&mut graph, "next", vec![], "next");
    let pack = native(&mut graph, "pack", vec![ParamDef::var_positional("items", ValueType::Any)]);

    let square = graph.add_function("square", positional(&["v"])).unwrap();
    let square_body = graph.add_composition("square_body", Some(square)).unwrap();
    let c_sq = graph.add_call(square_body, mul).unwrap();
    graph.set_start(square_body, c_sq).unwrap();
    map(&mut graph, square_body, MappingDef::new(Endpoint::Boundary(Port::Param(0)), param(c_sq, 0)));
    map(&mut graph, square_body, MappingDef::new(Endpoint::Boundary(Port::Param(0)), param(c_sq, 1)));
    map(&mut graph, square_body, MappingDef::new(output(c_sq), Endpoint::Boundary(Port::Output)));

    let comp = graph.add_composition("main", None).unwrap();
    let c_range = graph.add_call(comp, range).unwrap();
    let c_iter = graph.add_call(comp, iter).unwrap();
    let c_next = graph.add_call(comp, next).unwrap();
    let c_square = graph.add_call(comp, square).unwrap();
    let c_pack = graph.add_call(comp, pack).unwrap();
    graph.sequence(comp, &[c_range, c_iter, c_next]).unwrap();
    graph
        .set_successor(comp, c_next, Successor::Loop { iterate: c_square, next: Some(c_pack) })
        .unwrap();
    graph.set_successor(comp, c_square, Successor::Next(c_next)).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::constant(4), param(c_range, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_range), param(c_iter, 0)));
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
    map(&mut graph, comp, MappingDef::new(output(c_next), param(c_square, 0)));
    map(
        &mut graph,
        comp,
        MappingDef::new(output(c_square), param(c_pack, 0)).into_item(Strategy::Append),
    );
    map(&mut graph, comp, MappingDef::new(output(c_pack), Endpoint::variable("out")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_composition(comp, IndexMap::new()).unwrap();
    assert_eq!(outputs["out"], ints(&[0, 1, 4, 9]));

    let snapshot = engine.snapshot().unwrap();
    let square_call = snapshot.find_call(c_square).unwrap();
    assert!(square_call.body.is_some());
    assert!(snapshot.find_call(c_sq).is_some());
}

#[test]
fn unmapped_body_outputs_return_none_and_the_receiver() {
    let mut graph = KnowledgeGraph::new("touch");
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let touch = graph.add_function("touch", vec![]).unwrap();
    {
        let def = graph.function_mut(touch).unwrap();
        def.receiver = Some(ParamDef::positional("self", 0, ValueType::List));
        def.self_output = Some(OutputDef::new("self", ValueType::List));
    }
    let body = graph.add_composition("touch_body", Some(touch)).unwrap();
    let c = graph.add_call(body, identity).unwrap();
    graph.set_start(body, c).unwrap();
    map(&mut graph, body, MappingDef::new(Endpoint::constant(0), param(c, 0)));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_function(touch, inputs([("self", ints(&[1]))])).unwrap();

    assert_eq!(outputs["result"], Value::None);
    assert_eq!(outputs["self"], ints(&[1]));
}

/// `collect()`: a body whose return value is appended to by two calls.
fn build_collect(graph: &mut KnowledgeGraph) -> semflow_core::FunctionId {
    let identity = native(graph, "identity", positional(&["x"]));
    let collect = graph.add_function("collect", vec![]).unwrap();
    let body = graph.add_composition("collect_body", Some(collect)).unwrap();
    let c_one = graph.add_call(body, identity).unwrap();
    let c_two = graph.add_call(body, identity).unwrap();
    graph.sequence(body, &[c_one, c_two]).unwrap();

    let ret = Endpoint::Boundary(Port::Output);
    map(graph, body, MappingDef::new(Endpoint::constant(1), param(c_one, 0)));
    map(graph, body, MappingDef::new(Endpoint::constant(2), param(c_two, 0)));
    map(graph, body, MappingDef::new(output(c_one), ret.clone()).into_item(Strategy::Append));
    map(graph, body, MappingDef::new(output(c_two), ret).into_item(Strategy::Append));
    collect
}

#[test]
fn appended_return_value_survives_the_final_ingest() {
    let mut graph = KnowledgeGraph::new("collect");
    let collect = build_collect(&mut graph);

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_function(collect, IndexMap::new()).unwrap();
    assert_eq!(outputs["result"], ints(&[1, 2]));

    // A second top-level run starts from a fresh instance.
    let outputs = engine.execute_function(collect, IndexMap::new()).unwrap();
    assert_eq!(outputs["result"], ints(&[1, 2]));
}

#[test]
fn appended_return_value_starts_empty_on_each_visit() {
    let mut graph = KnowledgeGraph::new("collect_twice");
    let collect = build_collect(&mut graph);
    let range = native(&mut graph, "range", positional(&["stop"]));
    let iter = native(&mut graph, "iter", positional(&["iterable"]));
    let next = method(&mut graph, "next", vec![], "next");
    let pack = native(&mut graph, "pack", vec![ParamDef::var_positional("items", ValueType::Any)]);

    let comp = graph.add_composition("main", None).unwrap();
    let c_range = graph.add_call(comp, range).unwrap();
    let c_iter = graph.add_call(comp, iter).unwrap();
    let c_next = graph.add_call(comp, next).unwrap();
    let c_collect = graph.add_call(comp, collect).unwrap();
    let c_pack = graph.add_call(comp, pack).unwrap();
    graph.sequence(comp, &[c_range, c_iter, c_next]).unwrap();
    graph
        .set_successor(comp, c_next, Successor::Loop { iterate: c_collect, next: Some(c_pack) })
        .unwrap();
    graph.set_successor(comp, c_collect, Successor::Next(c_next)).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::constant(2), param(c_range, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_range), param(c_iter, 0)));
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
    map(
        &mut graph,
        comp,
        MappingDef::new(output(c_collect), param(c_pack, 0)).into_item(Strategy::Append),
    );
    map(&mut graph, comp, MappingDef::new(output(c_pack), Endpoint::variable("out")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_composition(comp, IndexMap::new()).unwrap();
    assert_eq!(outputs["out"], Value::List(vec![ints(&[1, 2]), ints(&[1, 2])]));
}

// ---------------------------------------------------------------------------
// Late binding and strategies
// ---------------------------------------------------------------------------

#[test]
fn member_is_resolved_against_the_receiver_value() {
    let mut graph = KnowledgeGraph::new("late");
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let size = method(&mut graph, "size", vec![], "size");
    let comp = graph.add_composition("main", None).unwrap();
    let c_value = graph.add_call(comp, identity).unwrap();
    let c_size = graph.add_call(comp, size).unwrap();
    graph.sequence(comp, &[c_value, c_size]).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::variable("v"), param(c_value, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_value), Endpoint::call(c_size, Port::Receiver)));
    map(&mut graph, comp, MappingDef::new(output(c_size), Endpoint::variable("out")));

    let mut registry = Registry::new();
    registry
        .register("identity", |mut inv| Ok(inv.args.remove(0)))
        .register_method("list", "size", |_| Ok(Value::Str("list size".into())))
        .register_method("str", "size", |_| Ok(Value::Str("str size".into())));

    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let on_list = engine.execute_composition(comp, inputs([("v", ints(&[1]))])).unwrap();
    assert_eq!(on_list["out"], Value::Str("list size".into()));
    let on_str = engine.execute_composition(comp, inputs([("v", Value::Str("x".into()))])).unwrap();
    assert_eq!(on_str["out"], Value::Str("str size".into()));

    // No static handle and no matching member.
    let err = engine.execute_composition(comp, inputs([("v", Value::Int(1))])).unwrap_err();
    assert!(matches!(err, ExecError::Unbound { .. }), "{err}");
}

#[test]
fn source_item_strategy_reads_elements() {
    let mut graph = KnowledgeGraph::new("items");
    let add = native(&mut graph, "add", positional(&["a", "b"]));
    let comp = graph.add_composition("main", None).unwrap();
    let c = graph.add_call(comp, add).unwrap();
    graph.set_start(comp, c).unwrap();
    map(&mut graph, comp, MappingDef::new(Endpoint::variable("pair"), param(c, 0)).from_item(Strategy::Index(0)));
    map(&mut graph, comp, MappingDef::new(Endpoint::variable("pair"), param(c, 1)).from_item(Strategy::Index(1)));
    map(&mut graph, comp, MappingDef::new(output(c), Endpoint::variable("sum")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_composition(comp, inputs([("pair", ints(&[3, 4]))])).unwrap();
    assert_eq!(outputs["sum"], Value::Int(7));

    let err = engine.execute_composition(comp, inputs([("pair", ints(&[3]))])).unwrap_err();
    assert!(matches!(err, ExecError::ItemAccess { .. }), "{err}");
}

#[test]
fn variable_chains_follow_their_source_variable() {
    let mut graph = KnowledgeGraph::new("chain");
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let comp = graph.add_composition("main", None).unwrap();
    let c_first = graph.add_call(comp, identity).unwrap();
    let c_second = graph.add_call(comp, identity).unwrap();
    graph.sequence(comp, &[c_first, c_second]).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::constant(5), param(c_first, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_first), Endpoint::variable("x")));
    map(&mut graph, comp, MappingDef::new(Endpoint::variable("x"), Endpoint::variable("y")));
    map(&mut graph, comp, MappingDef::new(Endpoint::variable("y"), param(c_second, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_second), Endpoint::variable("out")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_composition(comp, IndexMap::new()).unwrap();
    assert_eq!(outputs["x"], Value::Int(5));
    assert_eq!(outputs["y"], Value::Int(5));
    assert_eq!(outputs["out"], Value::Int(5));
}

#[test]
fn keyword_and_variadic_keyword_arguments() {
    let mut graph = KnowledgeGraph::new("format");
    let format = native(
        &mut graph,
        "format",
        vec![
            ParamDef::positional("template", 0, ValueType::Str),
            ParamDef::var_positional("args", ValueType::Any),
            ParamDef::var_keyword("kwargs", ValueType::Any),
        ],
    );
    let comp = graph.add_composition("main", None).unwrap();
    let c = graph.add_call(comp, format).unwrap();
    graph.set_start(comp, c).unwrap();
    map(&mut graph, comp, MappingDef::new(Endpoint::constant("{}, {who}!"), param(c, 0)));
    map(&mut graph, comp, MappingDef::new(Endpoint::constant("hello"), param(c, 1)).into_item(Strategy::Append));
    map(
        &mut graph,
        comp,
        MappingDef::new(Endpoint::variable("name"), param(c, 2)).into_item(Strategy::Key("who".into())),
    );
    map(&mut graph, comp, MappingDef::new(output(c), Endpoint::variable("text")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine
        .execute_composition(comp, inputs([("name", Value::Str("world".into()))]))
        .unwrap();
    assert_eq!(outputs["text"], Value::Str("hello, world!".into()));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn single_call(path: &str, params: Vec<ParamDef>, args: Vec<ConstValue>) -> (KnowledgeGraph, semflow_core::CompositionId) {
    let mut graph = KnowledgeGraph::new(path);
    let f = native(&mut graph, path, params);
    let comp = graph.add_composition("main", None).unwrap();
    let c = graph.add_call(comp, f).unwrap();
    graph.set_start(comp, c).unwrap();
    for (i, arg) in args.into_iter().enumerate() {
        map(&mut graph, comp, MappingDef::new(Endpoint::Constant(arg), param(c, i as u16)));
    }
    (graph, comp)
}

#[test]
fn implementation_failure_carries_arguments() {
    let (graph, comp) = single_call("truediv", positional(&["a", "b"]), vec![ConstValue::Int(1), ConstValue::Int(0)]);
    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());

    match engine.execute_composition(comp, IndexMap::new()).unwrap_err() {
        ExecError::ImplementationFailure { function, message, arguments, .. } => {
            assert_eq!(function, "truediv");
            assert_eq!(message, HostError::failed("division by zero").to_string());
            assert_eq!(arguments, "(int 1, int 0)");
        }
        other => panic!("expected ImplementationFailure, got {other}"),
    }
}

#[test]
fn exhaustion_outside_a_loop_node_is_a_failure() {
    let mut graph = KnowledgeGraph::new("exhausted");
    let iter = native(&mut graph, "iter", positional(&["iterable"]));
    let next = method(&mut graph, "next", vec![], "next");
    let comp = graph.add_composition("main", None).unwrap();
    let c_iter = graph.add_call(comp, iter).unwrap();
    let c_next = graph.add_call(comp, next).unwrap();
    graph.sequence(comp, &[c_iter, c_next]).unwrap();
    map(&mut graph, comp, MappingDef::new(Endpoint::Constant(ConstValue::List(vec![])), param(c_iter, 0)));
    map(&mut graph, comp, MappingDef::new(output(c_iter), Endpoint::call(c_next, Port::Receiver)));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    match engine.execute_composition(comp, IndexMap::new()).unwrap_err() {
        ExecError::ImplementationFailure { function, message, .. } => {
            assert_eq!(function, "next");
            assert!(message.contains("exhausted"), "{message}");
        }
        other => panic!("expected ImplementationFailure, got {other}"),
    }
}

#[test]
fn declared_types_are_checked_unless_disabled() {
    let (graph, comp) = single_call(
        "identity",
        vec![ParamDef::positional("x", 0, ValueType::Int)],
        vec![ConstValue::Str("nope".into())],
    );
    let registry = Registry::standard();

    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    match engine.execute_composition(comp, IndexMap::new()).unwrap_err() {
        ExecError::TypeMismatch { expected, actual, .. } => {
            assert_eq!(expected, ValueType::Int);
            assert_eq!(actual, "str nope");
        }
        other => panic!("expected TypeMismatch, got {other}"),
    }

    let unchecked = EngineConfig {
        check_types: false,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(&graph, &registry, unchecked);
    assert!(engine.execute_composition(comp, IndexMap::new()).is_ok());
}

#[test]
fn several_declared_starts_are_ambiguous() {
    let mut graph = KnowledgeGraph::new("starts");
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let comp = graph.add_composition("main", None).unwrap();
    let a = graph.add_call(comp, identity).unwrap();
    let b = graph.add_call(comp, identity).unwrap();
    graph.set_start(comp, a).unwrap();
    graph.set_start(comp, b).unwrap();

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let err = engine.execute_composition(comp, IndexMap::new()).unwrap_err();
    assert!(matches!(err, ExecError::AmbiguousComposition { .. }), "{err}");
}

#[test]
fn calls_unreachable_from_the_start_are_not_applied() {
    let mut graph = KnowledgeGraph::new("orphan");
    let identity = native(&mut graph, "identity", positional(&["x"]));
    let comp = graph.add_composition("main", None).unwrap();
    let live = graph.add_call(comp, identity).unwrap();
    let orphan = graph.add_call(comp, identity).unwrap();
    graph.set_start(comp, live).unwrap();

    map(&mut graph, comp, MappingDef::new(Endpoint::constant(1), param(live, 0)));
    map(&mut graph, comp, MappingDef::new(Endpoint::constant(2), param(orphan, 0)));
    // Two unprioritized sources, but only one of them can ever run.
    map(&mut graph, comp, MappingDef::new(output(live), Endpoint::variable("out")));
    map(&mut graph, comp, MappingDef::new(output(orphan), Endpoint::variable("out")));

    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let outputs = engine.execute_composition(comp, IndexMap::new()).unwrap();
    assert_eq!(outputs["out"], Value::Int(1));

    let snapshot = engine.snapshot().unwrap();
    assert!(snapshot.find_call(live).is_some());
    assert!(snapshot.find_call(orphan).is_none());
    assert_eq!(engine.visits(), &[live]);
}

#[test]
fn unknown_inputs_are_rejected() {
    let (graph, add_xy) = build_add_xy();
    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let err = engine
        .execute_function(add_xy, inputs([("z", Value::Int(1))]))
        .unwrap_err();
    assert!(matches!(err, ExecError::UnknownInput { ref name, .. } if name == "z"), "{err}");
}

#[test]
fn missing_boundary_input_fails_before_the_body_runs() {
    let (graph, add_xy) = build_add_xy();
    let registry = Registry::standard();
    let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
    let err = engine
        .execute_function(add_xy, inputs([("x", Value::Int(1))]))
        .unwrap_err();
    assert!(matches!(err, ExecError::UnresolvedInput { ref param, .. } if param == "y"), "{err}");
    assert!(engine.visits().is_empty());
}

// ---------------------------------------------------------------------------
// Trace and snapshot
// ---------------------------------------------------------------------------

#[test]
fn trace_records_loop_exhaustion() {
    let lg = build_loop();
    let registry = Registry::standard();
    let config = EngineConfig {
        trace_enabled: true,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(&lg.graph, &registry, config);
    engine.execute_composition(lg.comp, inputs([("n", Value::Int(2))])).unwrap();

    let outcomes: Vec<Outcome> = engine
        .trace()
        .unwrap()
        .iter()
        .filter(|e| e.call == lg.next)
        .map(|e| e.outcome)
        .collect();
    assert_eq!(outcomes, vec![Outcome::Completed, Outcome::Completed, Outcome::Exhausted]);
    assert!(engine.trace().unwrap().iter().all(|e| e.depth == 0));
    assert_eq!(engine.visits().len(), engine.trace().unwrap().len());
}

#[test]
fn snapshot_reports_authoritative_edges() {
    let lg = build_loop();
    let registry = Registry::standard();
    let mut engine = Engine::new(&lg.graph, &registry, EngineConfig::default());
    assert!(engine.snapshot().is_none());
    engine.execute_composition(lg.comp, inputs([("n", Value::Int(3))])).unwrap();

    let snapshot = engine.snapshot().unwrap();
    let receiver_edges: Vec<_> = snapshot
        .edges
        .iter()
        .filter(|e| e.target.ends_with(".receiver"))
        .collect();
    assert_eq!(receiver_edges.len(), 2);
    // After the loop the threaded self-output is the live source.
    let live: Vec<_> = receiver_edges.iter().filter(|e| e.authoritative).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].priority, Some(lg.next));

    assert_eq!(snapshot.variable("out"), Some(&ints(&[0, 10, 20])));
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"edges\""));
}
