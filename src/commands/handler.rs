//! Command Handler
//!
//! Executes parsed [`Request`]s against the shared [`TupleSpace`] and turns
//! the outcome into the [`Response`] sent back to the client.
//!
//! ## Supported Commands
//!
//! - `R<key>` - read a tuple, leaving it in place
//! - `G<key>` - get a tuple, removing it
//! - `P<key> <value>` - put a tuple if the key is absent
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  Request    │───>│  dispatch   │───>│  Response   │     │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘     │
//! │                            │                                │
//! │                            ▼                                │
//! │                       TupleSpace                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Action, Request, Response};
use crate::storage::{StoreError, Tuple, TupleSpace};
use std::sync::Arc;
use tracing::trace;

/// Dispatches requests to the tuple space.
///
/// Cheap to clone; every clone shares the same store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    space: Arc<TupleSpace>,
}

impl CommandHandler {
    /// Creates a new command handler over the given tuple space.
    pub fn new(space: Arc<TupleSpace>) -> Self {
        Self { space }
    }

    /// The tuple space this handler executes against.
    pub fn space(&self) -> &Arc<TupleSpace> {
        &self.space
    }

    /// Executes a request and returns the response payload.
    ///
    /// Logical failures (missing key, existing key) are ordinary responses
    /// beginning with `ERR`.
    pub fn execute(&self, request: Request) -> Response {
        let (result, action) = match request {
            Request::Read { key } => (self.space.read(&key), Action::Read),
            Request::Get { key } => (self.space.get(&key), Action::Removed),
            Request::Put { key, value } => (self.space.put(key, value), Action::Added),
        };

        match result {
            Ok(Tuple { key, value }) => {
                trace!(action = action.as_str(), key_len = key.len(), "Command succeeded");
                Response::ok(&key, &value, action)
            }
            Err(e) => {
                trace!(error = %e, "Command failed");
                error_response(&e)
            }
        }
    }
}

fn error_response(error: &StoreError) -> Response {
    match error {
        StoreError::NotFound(key) => Response::not_found(key),
        StoreError::AlreadyExists(key) => Response::already_exists(key),
        StoreError::TooLarge(key) => Response::too_large(key),
    }
}
