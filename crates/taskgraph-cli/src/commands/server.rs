//! `taskgraph server` — Start the workflow orchestrator's HTTP server.

pub async fn run(host: String, port: u16, db_path: String) -> Result<(), String> {
    let mut engine = taskgraph_core::EngineConfig::from_env();
    engine.db_path = db_path;

    let config = taskgraph_server::ServerConfig {
        host: host.clone(),
        port,
        engine,
    };

    println!("Starting taskgraph server on {}:{}...", host, port);

    let addr = taskgraph_server::start_server(config).await?;
    println!("taskgraph server listening on http://{}", addr);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
