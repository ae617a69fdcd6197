//! Tuple Space Server
//!
//! This is the main entry point for the tuple space server.
//! It parses the configuration, sets up logging and runs the listener
//! until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tuplespace::config::{init_tracing, ServerConfig};
use tuplespace::server::Server;

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
Tuple Space v{} - Shared READ / GET / PUT over TCP
──────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        tuplespace::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    init_tracing(&config.log_level);

    let server = Server::bind(&config)
        .await
        .context("could not start the tuple space server")?;

    print_banner(&config);
    info!(
        max_tuple_size = config.max_tuple_size,
        report_interval_secs = config.report_interval,
        idle_timeout_secs = ?config.idle_timeout,
        "Tuple space initialized"
    );

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
