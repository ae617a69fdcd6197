//! # Tuple Space - A Shared, Concurrent Key-Value Space over TCP
//!
//! A tuple space is a shared associative store that independent clients
//! use through three verbs:
//!
//! - **READ**: look a tuple up, leaving it in place
//! - **GET**: look a tuple up and remove it
//! - **PUT**: insert a tuple if its key is absent
//!
//! No operation ever waits for a tuple to appear: a missing key is an
//! immediate error.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Tuple Space                                │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│  Session    │───>│  Command    │                  │
//! │  │ (Listener)  │    │ (per client)│    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │ Frame Codec │    │                 TupleSpace                   │   │
//! │  │ + Parser    │    │   Mutex<{ tuples, counters, client count }>  │   │
//! │  └─────────────┘    └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           StatsReporter                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tuplespace::config::ServerConfig;
//! use tuplespace::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(&ServerConfig::default()).await?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Wire Protocol
//!
//! Every message is `LLL<payload>`, with `LLL` the payload length as three
//! decimal digits:
//!
//! ```text
//! client: 004Pa b     server: 014OK(a, b) added
//! client: 002Ra       server: 013OK(a, b) read
//! client: 002Ga       server: 016OK(a, b) removed
//! client: 002Ga       server: 020ERR a does not exist
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Frame codec, request parser and response payloads
//! - [`storage`]: The tuple space and its background stats reporter
//! - [`commands`]: Executes requests against the tuple space
//! - [`connection`]: Per-client session loop
//! - [`server`]: TCP listener
//! - [`client`]: Reference client and request-file replay
//! - [`config`]: Command-line configuration and logging setup

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{ClientError, TupleClient};
pub use commands::CommandHandler;
pub use config::{ClientConfig, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{FrameError, Request, RequestError, Response};
pub use server::{Server, ServerError};
pub use storage::{StatsReporter, StoreError, StoreStats, TupleSpace};

/// Version of the tuple space server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
