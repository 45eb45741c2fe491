//! Semflow command-line tool.
//!
//! Provides the `semflow` binary for working with knowledge graphs stored in
//! a SQLite database: import a graph snapshot from JSON, list what is
//! stored, export a graph back to JSON, and replay a function or
//! composition with JSON inputs.
//!
//! Exit codes: 0 = success, 1 = execution error, 2 = invalid input,
//! 3 = storage or I/O error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use semflow_core::{CompositionId, GraphQuery, KnowledgeGraph};
use semflow_engine::{Engine, EngineConfig, ExecError, Registry, Target, Value};
use semflow_storage::{GraphId, GraphStore, SqliteStore};

/// Semflow knowledge-graph replay tools.
#[derive(Parser)]
#[command(name = "semflow", about = "Replay compositions stored in a semflow knowledge graph")]
struct Cli {
    /// Path to the graph database file.
    #[arg(long, global = true, env = "SEMFLOW_DB", default_value = "semflow.db")]
    db: String,

    /// Log engine visits to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a graph snapshot (JSON) into the database.
    Import {
        /// Path to the graph JSON file.
        file: PathBuf,

        /// Store under this name instead of the graph's own.
        #[arg(long)]
        name: Option<String>,
    },

    /// List stored graphs.
    List,

    /// Print a stored graph as JSON.
    Export {
        /// Graph ID or name.
        graph: String,
    },

    /// Execute a function or composition and print its outputs as JSON.
    Run {
        /// Graph ID or name.
        graph: String,

        /// Function to execute, by name.
        #[arg(short, long, conflicts_with = "composition")]
        function: Option<String>,

        /// Composition to execute, by name or numeric ID.
        #[arg(short, long)]
        composition: Option<String>,

        /// Inputs as a JSON object, e.g. '{"n": 5}'.
        #[arg(short, long, default_value = "{}")]
        inputs: String,

        /// Include the visit trace in the output.
        #[arg(long)]
        trace: bool,

        /// Include the introspection snapshot of the last run.
        #[arg(long)]
        snapshot: bool,

        /// Skip declared-type checks on terminals.
        #[arg(long)]
        no_type_check: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Import { file, name } => run_import(&cli.db, &file, name),
        Commands::List => run_list(&cli.db),
        Commands::Export { graph } => run_export(&cli.db, &graph),
        Commands::Run {
            graph,
            function,
            composition,
            inputs,
            trace,
            snapshot,
            no_type_check,
        } => {
            let options = RunOptions {
                function,
                composition,
                inputs,
                config: EngineConfig {
                    trace_enabled: trace,
                    check_types: !no_type_check,
                },
                snapshot,
            };
            run_execute(&cli.db, &graph, options)
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "semflow_engine=debug,semflow_storage=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db_path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        3
    })
}

/// Accepts a numeric graph ID or a graph name.
fn resolve_graph(store: &SqliteStore, graph: &str) -> Result<GraphId, i32> {
    let found = match graph.parse::<i64>() {
        Ok(id) => Ok(GraphId(id)),
        Err(_) => store.find_graph(graph),
    };
    found.map_err(|e| {
        eprintln!("Error: {}", e);
        3
    })
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

/// Execute the import subcommand.
fn run_import(db_path: &str, file: &Path, name: Option<String>) -> i32 {
    let text = match fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", file.display(), e);
            return 3;
        }
    };
    let mut graph: KnowledgeGraph = match serde_json::from_str(&text) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: '{}' is not a graph snapshot: {}", file.display(), e);
            return 2;
        }
    };
    if let Err(e) = graph.check() {
        eprintln!("Error: invalid graph: {}", e);
        return 2;
    }
    if let Some(name) = name {
        graph.name = name;
    }

    let mut store = match open_store(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.import_graph(&graph) {
        Ok(id) => {
            info!(%id, name = %graph.name, "imported");
            print_json(&serde_json::json!({ "id": id.0, "name": graph.name }));
            0
        }
        Err(e) => {
            eprintln!("Error: failed to store graph: {}", e);
            3
        }
    }
}

/// Execute the list subcommand.
fn run_list(db_path: &str) -> i32 {
    let store = match open_store(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list_graphs() {
        Ok(summaries) => {
            for s in summaries {
                println!("{}\t{}\t{} functions\t{} compositions", s.id.0, s.name, s.functions, s.compositions);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            3
        }
    }
}

/// Execute the export subcommand.
fn run_export(db_path: &str, graph: &str) -> i32 {
    let store = match open_store(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let loaded = resolve_graph(&store, graph).and_then(|id| {
        store.load_graph(id).map_err(|e| {
            eprintln!("Error: failed to load graph {}: {}", graph, e);
            3
        })
    });
    match loaded {
        Ok(g) => match serde_json::to_value(&g) {
            Ok(json) => {
                print_json(&json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                3
            }
        },
        Err(code) => code,
    }
}

struct RunOptions {
    function: Option<String>,
    composition: Option<String>,
    inputs: String,
    config: EngineConfig,
    snapshot: bool,
}

/// Execute the run subcommand.
///
/// Prints `{"outputs": ..., "trace": ..., "snapshot": ...}` on success;
/// execution errors go to stderr with exit code 1.
fn run_execute(db_path: &str, graph: &str, options: RunOptions) -> i32 {
    let inputs = match parse_inputs(&options.inputs) {
        Ok(i) => i,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 2;
        }
    };

    let store = match open_store(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let kg = match resolve_graph(&store, graph).and_then(|id| {
        store.load_graph(id).map_err(|e| {
            eprintln!("Error: failed to load graph {}: {}", graph, e);
            3
        })
    }) {
        Ok(g) => g,
        Err(code) => return code,
    };

    let target = match select_target(&kg, options.function.as_deref(), options.composition.as_deref()) {
        Ok(t) => t,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 2;
        }
    };
    debug!(?target, "selected target");

    let registry = Registry::standard();
    let mut engine = Engine::new(&kg, &registry, options.config);
    let result = engine.execute(target, inputs);

    let mut report = serde_json::Map::new();
    if let Some(trace) = engine.trace() {
        report.insert("trace".into(), serde_json::to_value(trace).unwrap_or_default());
    }
    if options.snapshot {
        let snapshot = engine.snapshot();
        report.insert("snapshot".into(), serde_json::to_value(&snapshot).unwrap_or_default());
    }

    match result {
        Ok(outputs) => {
            let outputs: serde_json::Map<String, serde_json::Value> =
                outputs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
            report.insert("outputs".into(), serde_json::Value::Object(outputs));
            print_json(&serde_json::Value::Object(report));
            0
        }
        Err(e) => {
            eprintln!("Execution failed: {}", e);
            if let ExecError::ImplementationFailure { arguments, .. } = &e {
                if !arguments.is_empty() {
                    eprintln!("  arguments: {}", arguments);
                }
            }
            if !report.is_empty() {
                print_json(&serde_json::Value::Object(report));
            }
            1
        }
    }
}

/// Parses a JSON object into named engine inputs.
fn parse_inputs(text: &str) -> Result<IndexMap<String, Value>, String> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(|e| format!("invalid inputs JSON: {}", e))?;
    match json {
        serde_json::Value::Object(entries) => Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect()),
        other => Err(format!("inputs must be a JSON object, got {}", other)),
    }
}

/// Picks the execution target. Without either flag, a graph with exactly
/// one standalone composition runs that one.
fn select_target(graph: &KnowledgeGraph, function: Option<&str>, composition: Option<&str>) -> Result<Target, String> {
    if let Some(name) = function {
        return graph
            .function_by_name(name)
            .map(Target::Function)
            .map_err(|e| e.to_string());
    }
    if let Some(key) = composition {
        let by_id = key.parse::<u32>().ok().map(CompositionId);
        return graph
            .compositions()
            .find(|c| Some(c.id) == by_id || c.name == key)
            .map(|c| Target::Composition(c.id))
            .ok_or_else(|| format!("no composition '{}'", key));
    }

    let standalone: Vec<_> = graph.compositions().filter(|c| c.represents.is_none()).collect();
    match standalone.as_slice() {
        [only] => Ok(Target::Composition(only.id)),
        [] => Err("graph has no standalone composition; pass --function or --composition".into()),
        _ => Err("graph has several standalone compositions; pass --composition".into()),
    }
}
