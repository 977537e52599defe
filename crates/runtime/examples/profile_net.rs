//! Profiling a net with observers
//!
//! Run with: RUST_LOG=debug cargo run -p netobs-runtime --example profile_net [net.json]
//!
//! This example demonstrates:
//! - Loading a net definition from JSON
//! - Attaching logging and profiling observers to a DAG net
//! - Reading the per-run trace tree back from the profile
//! - Detaching an observer and its operator observers

use std::sync::Arc;

use netobs_runtime::hooks::{LoggingObserver, Profile, ProfileObserver};
use netobs_runtime::{create_net, NetDef, OperatorRegistry, Tensor, Workspace};
use tracing_subscriber::EnvFilter;

const NET_JSON: &str = r#"{
    "name": "two_branch",
    "type": "dag",
    "num_workers": 2,
    "external_inputs": ["x", "w"],
    "external_outputs": ["loss"],
    "ops": [
        { "type": "Mul", "name": "scale", "inputs": ["x", "w"], "outputs": ["scaled"] },
        { "type": "Relu", "name": "relu", "inputs": ["x"], "outputs": ["rectified"] },
        { "type": "Add", "name": "merge", "inputs": ["scaled", "rectified"], "outputs": ["merged"] },
        { "type": "SumAll", "name": "reduce", "inputs": ["merged"], "outputs": ["loss"] }
    ]
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Profiling an Operator Net ===\n");

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------
    let def = match std::env::args().nth(1) {
        Some(path) => NetDef::from_json_file(path)?,
        None => NetDef::from_json(NET_JSON)?,
    };
    println!("{}\n", def.to_json()?);
    let net = create_net(&def, &OperatorRegistry::with_builtins())?;
    println!("net `{}`: {} operators, {} strategy", net.name(), net.operators().len(), net.strategy_name());

    // -------------------------------------------------------------------------
    // Instrument
    // -------------------------------------------------------------------------
    let profile = Arc::new(Profile::new());
    let profiler = net.attach_observer(ProfileObserver::new(Arc::clone(&profile)));
    let logger = net.attach_observer(LoggingObserver::new());
    println!("attached {} net observers ({}, {})", net.num_observers(), profiler, logger);
    for op in net.operators() {
        println!("  {:<8} observers: {}", op.name(), op.num_observers());
    }
    println!();

    // -------------------------------------------------------------------------
    // Run
    // -------------------------------------------------------------------------
    let ws = Workspace::new();
    ws.feed("x", Tensor::vector(vec![-1.0, 0.5, 2.0]));
    ws.feed("w", Tensor::vector(vec![3.0, 3.0, 3.0]));
    let unfed: Vec<&String> = def.external_inputs.iter().filter(|b| !ws.has_blob(b)).collect();
    if !unfed.is_empty() {
        anyhow::bail!("external inputs not fed: {:?}", unfed);
    }
    for _ in 0..3 {
        net.run(&ws)?;
    }
    for name in ws.blob_names() {
        println!("  {:<10} {:?}", name, ws.fetch(&name)?);
    }
    println!();

    if let Some(run) = profile.last_run() {
        println!("last run:");
        println!("{}", run);
        println!("peak concurrency: {}", run.peak_concurrency());
    }
    let runs = profile.runs();
    let slowest = runs.iter().map(|run| run.duration).max().unwrap_or_default();
    println!("runs recorded: {} (slowest {:?})", runs.len(), slowest);
    println!("total time in `merge`: {:?}\n", profile.operator_total("merge"));

    // -------------------------------------------------------------------------
    // Detach
    // -------------------------------------------------------------------------
    net.detach_observer(profiler)?;
    net.run(&ws)?;
    println!("after detaching the profiler: {} net observer(s), {} runs recorded", net.num_observers(), profile.num_runs());

    Ok(())
}
