// SPDX-License-Identifier: MIT

//! `flowctl`: loads a workflow definition file and runs it to completion
//! against the in-memory reference adapters (`flowctl-adapters`),
//! printing the events the engine emitted along the way. A local driver
//! for manual testing, not a server — there is no daemon or definitions
//! service behind this binary, just the coordinator and the stand-in
//! collaborators it was built against.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use flowctl_adapters::{Collaborators, InMemoryResourcesClient, InProcessRegistry, RecordingEmitter, ScriptedTaskExecutor};
use flowctl_core::{NeverRetry, RunStatus, SystemClock, Value, WorkflowEvent};
use flowctl_defs::DefinitionsCatalog;

#[derive(Parser)]
#[command(name = "flowctl", about = "Runs a workflow definition to completion against in-memory adapters")]
struct Args {
    /// Path to a TOML workflow definition file.
    def_path: PathBuf,

    /// Workflow id to run (defaults to the id declared in the file).
    #[arg(long)]
    workflow_id: Option<String>,

    /// Definition version to run, if the file declares one.
    #[arg(long)]
    version: Option<String>,

    /// JSON input for the run.
    #[arg(long, default_value = "{}")]
    input: String,

    /// Emit each event as a JSON line instead of a short human summary.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let def = flowctl_defs::loader::load_file(&args.def_path)?;
    let workflow_id = args.workflow_id.clone().unwrap_or_else(|| def.workflow_id.clone());
    let version = args.version.clone().or_else(|| def.version.clone());

    let mut catalog = DefinitionsCatalog::new();
    catalog.insert(def)?;

    let input: Value = serde_json::from_str(&args.input)?;
    let emitter = RecordingEmitter::new();

    let registry = InProcessRegistry::new(Collaborators {
        catalog: Arc::new(catalog),
        executor: Arc::new(ScriptedTaskExecutor::new()),
        emitter: Arc::new(emitter.clone()),
        resources: Arc::new(InMemoryResourcesClient::new()),
        retry_policy: Arc::new(NeverRetry),
        clock: SystemClock,
    });

    let coordinator = registry.start_run(&workflow_id, version.as_deref(), input).await?;
    coordinator.join_background().await;

    for event in emitter.events() {
        print_event(&event, args.json);
    }

    match coordinator.store().status.get() {
        RunStatus::Completed => Ok(()),
        status => anyhow::bail!("run ended in {status:?} state"),
    }
}

fn print_event(event: &WorkflowEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to serialize event: {err}"),
        }
    } else {
        println!("{:<28} {}", event.name(), event.run_id());
    }
}
