//! Thread-Safe Tuple Store
//!
//! This module implements the core storage for the tuple space: one map of
//! key → value, the operation counters and the live client count.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The map, the counters and the client count sit behind a
//!    single `Mutex`. Every operation is one critical section, so all operations
//!    are totally ordered and no one observes a half-applied insert or remove.
//! 2. **Insert-if-absent**: `put` never overwrites; it fails on an existing key.
//! 3. **Running Size Totals**: Key and value byte totals are maintained on every
//!    insert/remove, so a snapshot never has to walk the map.
//! 4. **Never Blocks on State**: A missing key is an immediate error, not a wait.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TupleSpace                            │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                  Mutex<Inner>                         │  │
//! │  │   HashMap<key, value>   counters   clients            │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲             ▲             ▲                ▲
//!     session 1     session 2     session N     stats reporter
//! ```

use bytes::Bytes;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A key together with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub key: Bytes,
    pub value: Bytes,
}

impl Tuple {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Combined size of key and value in bytes.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Logical errors returned by store operations.
///
/// These are expected outcomes, reported to the client as normal responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// READ or GET on an absent key
    #[error("{} does not exist", lossy(.0))]
    NotFound(Bytes),

    /// PUT on a key that is already present
    #[error("{} already exists", lossy(.0))]
    AlreadyExists(Bytes),

    /// PUT of a tuple larger than the configured limit
    #[error("{} is too large", lossy(.0))]
    TooLarge(Bytes),
}

fn lossy(bytes: &Bytes) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Operation counters. Only ever increase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    operations: u64,
    reads: u64,
    gets: u64,
    puts: u64,
    errors: u64,
}

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct Inner {
    tuples: HashMap<Bytes, Bytes>,
    key_bytes: usize,
    value_bytes: usize,
    counters: Counters,
    clients: u64,
    total_clients: u64,
}

impl Inner {
    /// Records the outcome of one operation.
    fn record<T>(&mut self, result: &Result<T, StoreError>) {
        self.counters.operations += 1;
        if result.is_err() {
            self.counters.errors += 1;
        }
    }

    fn remove(&mut self, key: &[u8]) -> Option<(Bytes, Bytes)> {
        let (key, value) = self.tuples.remove_entry(key)?;
        self.key_bytes -= key.len();
        self.value_bytes -= value.len();
        Some((key, value))
    }

    fn insert(&mut self, key: Bytes, value: Bytes) {
        self.key_bytes += key.len();
        self.value_bytes += value.len();
        self.tuples.insert(key, value);
    }
}

/// The shared tuple space.
///
/// Wrap it in an `Arc` and hand a clone to every connection. All operations
/// are thread-safe and serialized by a single lock.
///
/// # Example
///
/// ```
/// use tuplespace::storage::{StoreError, TupleSpace};
/// use bytes::Bytes;
///
/// let space = TupleSpace::new();
///
/// space.put(Bytes::from("name"), Bytes::from("Ada")).unwrap();
/// assert_eq!(space.read(b"name").unwrap().value, Bytes::from("Ada"));
///
/// // A second PUT on the same key fails instead of overwriting
/// assert!(matches!(
///     space.put(Bytes::from("name"), Bytes::from("Grace")),
///     Err(StoreError::AlreadyExists(_))
/// ));
///
/// // GET removes the tuple
/// assert_eq!(space.get(b"name").unwrap().value, Bytes::from("Ada"));
/// assert!(space.read(b"name").is_err());
/// ```
#[derive(Debug, Default)]
pub struct TupleSpace {
    inner: Mutex<Inner>,

    /// Upper bound on `key.len() + value.len()` for PUT (None = unbounded)
    max_tuple_size: Option<usize>,
}

impl TupleSpace {
    /// Creates an empty tuple space with no tuple size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tuple space that rejects tuples larger than `limit` bytes.
    pub fn with_max_tuple_size(limit: usize) -> Self {
        Self {
            inner: Mutex::default(),
            max_tuple_size: Some(limit),
        }
    }

    /// Acquires the store lock.
    ///
    /// Every mutation is a single step under the lock, so the state behind a
    /// poisoned lock is still consistent and safe to keep using.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the tuple stored under `key`, leaving it in place.
    pub fn read(&self, key: &[u8]) -> Result<Tuple, StoreError> {
        let mut inner = self.lock();
        inner.counters.reads += 1;

        let result = inner
            .tuples
            .get_key_value(key)
            .map(|(key, value)| Tuple::new(key.clone(), value.clone()))
            .ok_or_else(|| StoreError::NotFound(Bytes::copy_from_slice(key)));

        inner.record(&result);
        result
    }

    /// Removes the tuple stored under `key` and returns it.
    pub fn get(&self, key: &[u8]) -> Result<Tuple, StoreError> {
        let mut inner = self.lock();
        inner.counters.gets += 1;

        let result = inner
            .remove(key)
            .map(|(key, value)| Tuple::new(key, value))
            .ok_or_else(|| StoreError::NotFound(Bytes::copy_from_slice(key)));

        inner.record(&result);
        result
    }

    /// Inserts `(key, value)` if `key` is absent.
    ///
    /// Returns the stored tuple, or `AlreadyExists` without touching the
    /// existing value.
    pub fn put(&self, key: Bytes, value: Bytes) -> Result<Tuple, StoreError> {
        let mut inner = self.lock();
        inner.counters.puts += 1;

        let tuple = Tuple { key, value };
        let result = if self.max_tuple_size.is_some_and(|limit| tuple.size() > limit) {
            Err(StoreError::TooLarge(tuple.key))
        } else if inner.tuples.contains_key(&tuple.key) {
            Err(StoreError::AlreadyExists(tuple.key))
        } else {
            inner.insert(tuple.key.clone(), tuple.value.clone());
            Ok(tuple)
        };

        inner.record(&result);
        result
    }

    /// Returns true if `key` is currently stored. Not counted as an operation.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.lock().tuples.contains_key(key)
    }

    /// Number of tuples currently stored.
    pub fn len(&self) -> usize {
        self.lock().tuples.len()
    }

    /// Returns true if the space holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a newly connected client.
    pub fn client_connected(&self) {
        let mut inner = self.lock();
        inner.clients += 1;
        inner.total_clients += 1;
    }

    /// Deregisters a client.
    pub fn client_disconnected(&self) {
        let mut inner = self.lock();
        inner.clients = inner.clients.saturating_sub(1);
    }

    /// Registers a client and returns a guard that deregisters it on drop.
    pub fn register_client(self: &Arc<Self>) -> ClientGuard {
        self.client_connected();
        ClientGuard {
            space: Arc::clone(self),
        }
    }

    /// Takes a consistent point-in-time view of the store statistics.
    pub fn snapshot(&self) -> StoreStats {
        let inner = self.lock();
        let tuple_count = inner.tuples.len();

        let average = |total: usize| {
            if tuple_count == 0 {
                0.0
            } else {
                total as f64 / tuple_count as f64
            }
        };

        StoreStats {
            tuple_count,
            avg_tuple_size: average(inner.key_bytes + inner.value_bytes),
            avg_key_size: average(inner.key_bytes),
            avg_value_size: average(inner.value_bytes),
            clients: inner.clients,
            total_clients: inner.total_clients,
            total_operations: inner.counters.operations,
            total_reads: inner.counters.reads,
            total_gets: inner.counters.gets,
            total_puts: inner.counters.puts,
            total_errors: inner.counters.errors,
        }
    }
}

/// Keeps a client registered with the [`TupleSpace`] for as long as it lives.
///
/// Dropping the guard decrements the client count, so every exit path of a
/// session deregisters, including early returns and panics.
#[derive(Debug)]
pub struct ClientGuard {
    space: Arc<TupleSpace>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.space.client_disconnected();
    }
}

/// Point-in-time statistics of the tuple space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreStats {
    /// Number of tuples currently stored
    pub tuple_count: usize,
    /// Average key + value size in bytes
    pub avg_tuple_size: f64,
    /// Average key size in bytes
    pub avg_key_size: f64,
    /// Average value size in bytes
    pub avg_value_size: f64,
    /// Currently connected clients
    pub clients: u64,
    /// Clients connected since startup
    pub total_clients: u64,
    /// Total READ + GET + PUT operations
    pub total_operations: u64,
    /// Total READ operations
    pub total_reads: u64,
    /// Total GET operations
    pub total_gets: u64,
    /// Total PUT operations
    pub total_puts: u64,
    /// Total failed operations
    pub total_errors: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tuple Space Report:")?;
        writeln!(f, "- Tuples: {}", self.tuple_count)?;
        writeln!(f, "- Avg Tuple Size: {:.2}", self.avg_tuple_size)?;
        writeln!(f, "- Avg Key Size: {:.2}", self.avg_key_size)?;
        writeln!(f, "- Avg Value Size: {:.2}", self.avg_value_size)?;
        writeln!(f, "- Total Clients: {}", self.clients)?;
        writeln!(f, "- Total Operations: {}", self.total_operations)?;
        writeln!(f, "- READs: {}", self.total_reads)?;
        writeln!(f, "- GETs: {}", self.total_gets)?;
        writeln!(f, "- PUTs: {}", self.total_puts)?;
        write!(f, "- Errors: {}", self.total_errors)
    }
}
