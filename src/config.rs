//! Configuration for the server and client binaries.
//!
//! Both are parsed with `clap`; server options can also come from
//! `TUPLESPACE_*` environment variables.

use crate::protocol::MAX_PAYLOAD_LEN;
use crate::storage::DEFAULT_REPORT_INTERVAL;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// The default port the server listens on
pub const DEFAULT_PORT: u16 = 51234;

/// The default host the server binds to (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default seconds between stats reports
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = DEFAULT_REPORT_INTERVAL.as_secs();

/// Largest tuple whose longest response (`OK(<key>, <value>) removed`) still
/// fits in one frame.
pub const DEFAULT_MAX_TUPLE_SIZE: usize = MAX_PAYLOAD_LEN - "OK(, ) removed".len();

/// Server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "tuplespace")]
#[command(about = "Tuple space server: shared READ / GET / PUT over TCP", long_about = None)]
#[command(version)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(value_name = "PORT", env = "TUPLESPACE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "TUPLESPACE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Seconds between statistics reports
    #[arg(
        long,
        value_name = "SECS",
        env = "TUPLESPACE_REPORT_INTERVAL",
        default_value_t = DEFAULT_REPORT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub report_interval: u64,

    /// Close connections idle for this many seconds (default: never)
    #[arg(
        long,
        value_name = "SECS",
        env = "TUPLESPACE_IDLE_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub idle_timeout: Option<u64>,

    /// Reject PUTs whose key + value exceed this many bytes
    #[arg(
        long,
        value_name = "BYTES",
        env = "TUPLESPACE_MAX_TUPLE_SIZE",
        default_value_t = DEFAULT_MAX_TUPLE_SIZE
    )]
    pub max_tuple_size: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "TUPLESPACE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            report_interval: DEFAULT_REPORT_INTERVAL_SECS,
            idle_timeout: None,
            max_tuple_size: DEFAULT_MAX_TUPLE_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout.map(Duration::from_secs)
    }
}

/// Reference client configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "tuplespace-client")]
#[command(about = "Replays a request file against a tuple space server", long_about = None)]
#[command(version)]
pub struct ClientConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// File with one request per line: `PUT key value`, `READ key` or `GET key`
    pub request_file: PathBuf,
}

impl ClientConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
