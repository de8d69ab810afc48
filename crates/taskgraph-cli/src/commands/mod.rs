//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! taskgraph-core domain logic through `AppState`.

pub mod server;
pub mod workflow;

use std::sync::Arc;

use taskgraph_core::{AppState, AppStateInner, Database, EngineConfig};

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// This mirrors `taskgraph_server::create_app_state` but lets the CLI
/// override just the database path without touching the rest of the
/// environment-resolved configuration.
pub async fn init_state(db_path: &str) -> AppState {
    let mut config = EngineConfig::from_env();
    config.db_path = db_path.to_string();

    let db = Database::open(&config.db_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", config.db_path, e);
        std::process::exit(1);
    });

    let state = AppStateInner::new(config, db).unwrap_or_else(|e| {
        eprintln!("Failed to initialize app state: {}", e);
        std::process::exit(1);
    });

    Arc::new(state)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Load `.env.local` then `.env` into the process environment, for API
/// keys and other local overrides. Existing environment variables win.
pub fn load_dotenv() {
    for filename in &[".env.local", ".env"] {
        let path = std::path::Path::new(filename);
        if !path.exists() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(eq_idx) = line.find('=') else {
                continue;
            };
            let key = line[..eq_idx].trim();
            let mut value = line[eq_idx + 1..].trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            if std::env::var(key).is_err() {
                std::env::set_var(key, &value);
            }
        }
        tracing::info!(filename, "loaded environment overrides");
    }
}
