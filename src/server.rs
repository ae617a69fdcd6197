//! TCP Listener
//!
//! Binds the listening socket, owns the single shared [`TupleSpace`], starts
//! the stats reporter and spawns one session task per accepted connection.
//!
//! Shutdown only stops accepting: sessions already running keep going until
//! their own loop ends.

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::{ReporterConfig, StatsReporter, TupleSpace};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound tuple space server.
pub struct Server {
    listener: TcpListener,
    space: Arc<TupleSpace>,
    stats: Arc<ConnectionStats>,
    report_interval: Duration,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Creates the tuple space and binds the listening socket.
    ///
    /// Nothing is left running if binding fails.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            space: Arc::new(TupleSpace::with_max_tuple_size(config.max_tuple_size)),
            stats: Arc::new(ConnectionStats::new()),
            report_interval: config.report_interval(),
            idle_timeout: config.idle_timeout(),
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The shared tuple space.
    pub fn space(&self) -> &Arc<TupleSpace> {
        &self.space
    }

    /// Connection statistics across all sessions.
    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Accepts connections until `shutdown` resolves, then closes the listener.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let _reporter = StatsReporter::start(
            Arc::clone(&self.space),
            ReporterConfig {
                interval: self.report_interval,
            },
        );

        if let Ok(addr) = self.listener.local_addr() {
            info!("Listening on {}", addr);
        }

        tokio::select! {
            _ = accept_loop(&self.listener, &self.space, &self.stats, self.idle_timeout) => {}
            _ = shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
            }
        }
    }
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: &TcpListener,
    space: &Arc<TupleSpace>,
    stats: &Arc<ConnectionStats>,
    idle_timeout: Option<Duration>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(space));
                let stats = Arc::clone(stats);

                // Spawn a task to handle this connection
                tokio::spawn(handle_connection(stream, addr, handler, stats, idle_timeout));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
