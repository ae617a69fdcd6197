//! Storage Module
//!
//! This module provides the core storage of the tuple space: a single
//! mutually-exclusive map with operation counters, and a background
//! reporter that periodically logs its statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TupleSpace                             │
//! │        Mutex<{ tuples, counters, client count }>            │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ snapshot()
//!              ┌─────────────┴─────────────┐
//!              │      StatsReporter        │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tuplespace::storage::TupleSpace;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let space = Arc::new(TupleSpace::new());
//!
//! space.put(Bytes::from("name"), Bytes::from("Ada")).unwrap();
//! assert_eq!(space.read(b"name").unwrap().value, Bytes::from("Ada"));
//!
//! let stats = space.snapshot();
//! assert_eq!(stats.tuple_count, 1);
//! assert_eq!(stats.total_operations, 2);
//! ```

pub mod engine;
pub mod reporter;

// Re-export commonly used types
pub use engine::{ClientGuard, StoreError, StoreStats, Tuple, TupleSpace};
pub use reporter::{ReporterConfig, StatsReporter, DEFAULT_REPORT_INTERVAL};
