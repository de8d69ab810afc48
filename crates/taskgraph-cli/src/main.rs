//! Taskgraph CLI — command-line interface for the workflow orchestrator.
//!
//! Reuses the same core domain logic (taskgraph-core) and server bootstrap
//! (taskgraph-server) that power the HTTP API.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskgraph", version, about = "Taskgraph CLI — workflow orchestrator")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "TASKGRAPH_DB_PATH", default_value = "taskgraph.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the workflow orchestrator HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8088)]
        port: u16,
    },

    /// Validate and dispatch YAML-defined workflow templates
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Validate a workflow template file without dispatching it
    Validate {
        /// Path to the template YAML file
        file: String,
    },
    /// Dispatch a workflow template by name (looked up in the templates dir)
    Start {
        /// Template name (without the .yml extension)
        template: String,
        /// Workflow id to tag dispatched tasks with
        #[arg(long)]
        workflow_id: Option<String>,
        /// Initial input as key=value pairs (repeatable)
        #[arg(long = "input", value_parser = parse_key_value)]
        inputs: Vec<(String, String)>,
        /// Block until every dispatched task reaches a terminal state
        #[arg(long)]
        wait: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected key=value, got `{s}`")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskgraph=info".into()),
        )
        .init();

    commands::load_dotenv();

    let result = match cli.command {
        Commands::Server { host, port } => commands::server::run(host, port, cli.db).await,

        Commands::Workflow { action } => match action {
            WorkflowAction::Validate { file } => commands::workflow::validate(&file).await,
            WorkflowAction::Start {
                template,
                workflow_id,
                inputs,
                wait,
            } => {
                let state = commands::init_state(&cli.db).await;
                commands::workflow::start(&state, &template, workflow_id, inputs, wait).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
