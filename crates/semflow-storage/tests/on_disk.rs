//! SqliteStore against a database file, and parity with InMemoryStore.

use semflow_core::{Endpoint, KnowledgeGraph, MappingDef, ParamDef, Port, Strategy, ValueType};
use semflow_storage::{GraphStore, InMemoryStore, SqliteStore, StorageError};

fn build_graph() -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new("collect");
    let range = graph
        .add_native("range", vec![ParamDef::positional("stop", 0, ValueType::Int)], "range")
        .unwrap();
    let pack = graph
        .add_native("pack", vec![ParamDef::var_positional("items", ValueType::Any)], "pack")
        .unwrap();
    let comp = graph.add_composition("main", None).unwrap();
    let r = graph.add_call(comp, range).unwrap();
    let p = graph.add_call(comp, pack).unwrap();
    graph.sequence(comp, &[r, p]).unwrap();
    graph
        .add_mapping(comp, MappingDef::new(Endpoint::variable("n"), Endpoint::call(r, Port::Param(0))))
        .unwrap();
    graph
        .add_mapping(
            comp,
            MappingDef::new(Endpoint::call(r, Port::Output), Endpoint::call(p, Port::Param(0))).into_item(Strategy::Append),
        )
        .unwrap();
    graph
}

// ---------------------------------------------------------------------------
// Persistence across connections
// ---------------------------------------------------------------------------

#[test]
fn graph_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("semflow.db");
    let path = path.to_str().unwrap();
    let graph = build_graph();

    let id = {
        let mut store = SqliteStore::new(path).unwrap();
        store.import_graph(&graph).unwrap()
    };

    let store = SqliteStore::new(path).unwrap();
    assert_eq!(store.find_graph("collect").unwrap(), id);
    assert_eq!(store.load_graph(id).unwrap(), graph);
}

#[test]
fn ids_are_not_reused_after_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("semflow.db");
    let mut store = SqliteStore::new(path.to_str().unwrap()).unwrap();

    let first = store.create_graph("a").unwrap();
    store.delete_graph(first).unwrap();
    let second = store.create_graph("b").unwrap();
    assert!(second.0 > first.0);
}

// ---------------------------------------------------------------------------
// Backend parity
// ---------------------------------------------------------------------------

fn exercise(store: &mut dyn GraphStore) -> Vec<String> {
    let graph = build_graph();
    let id = store.import_graph(&graph).unwrap();
    let mut seen = vec![];

    let summary = store.list_graphs().unwrap().pop().unwrap();
    seen.push(format!("{} {} {}", summary.name, summary.functions, summary.compositions));
    for f in store.list_functions(id).unwrap() {
        seen.push(f.name);
    }
    match store.load_graph(id) {
        Ok(loaded) => seen.push(format!("equal={}", loaded == graph)),
        Err(e) => seen.push(e.to_string()),
    }
    store.delete_graph(id).unwrap();
    if let Err(StorageError::GraphNotFound(_)) = store.load_graph(id) {
        seen.push("gone".to_string());
    }
    seen
}

#[test]
fn backends_behave_alike() {
    let mut memory = InMemoryStore::new();
    let mut sqlite = SqliteStore::in_memory().unwrap();
    let expected = vec!["collect 2 1", "range", "pack", "equal=true", "gone"];
    assert_eq!(exercise(&mut memory), expected);
    assert_eq!(exercise(&mut sqlite), expected);
}
