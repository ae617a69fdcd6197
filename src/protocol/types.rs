//! Request and Response Payload Types
//!
//! These are the payloads carried inside frames (see [`crate::protocol::frame`]).
//!
//! ## Request Payloads
//!
//! The first byte is the operation code:
//! - `R<key>` - read a tuple, leaving it in place
//! - `G<key>` - get a tuple, removing it
//! - `P<key> <value>` - put a tuple if the key is absent
//!
//! ## Response Payloads
//!
//! - `OK(<key>, <value>) read` / `removed` / `added`
//! - `ERR <key> does not exist` / `ERR <key> already exists`
//! - `ERR <description>` for protocol errors

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Operation codes, the first byte of every request payload.
pub mod opcode {
    pub const READ: u8 = b'R';
    pub const GET: u8 = b'G';
    pub const PUT: u8 = b'P';
}

/// Separator between key and value in a PUT payload.
pub const KEY_VALUE_SEPARATOR: u8 = b' ';

/// Marker at the start of every error response.
pub const ERROR_PREFIX: &[u8] = b"ERR ";

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Non-destructive lookup
    Read { key: Bytes },

    /// Destructive lookup
    Get { key: Bytes },

    /// Insert if absent
    Put { key: Bytes, value: Bytes },
}

impl Request {
    pub fn read(key: impl Into<Bytes>) -> Self {
        Request::Read { key: key.into() }
    }

    pub fn get(key: impl Into<Bytes>) -> Self {
        Request::Get { key: key.into() }
    }

    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Request::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The key this request targets.
    pub fn key(&self) -> &Bytes {
        match self {
            Request::Read { key } | Request::Get { key } | Request::Put { key, .. } => key,
        }
    }

    /// The operation code byte for this request.
    pub fn opcode(&self) -> u8 {
        match self {
            Request::Read { .. } => opcode::READ,
            Request::Get { .. } => opcode::GET,
            Request::Put { .. } => opcode::PUT,
        }
    }

    /// Serializes the request into its payload (without the frame header).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.key().len());
        buf.put_u8(self.opcode());
        buf.put_slice(self.key());

        if let Request::Put { value, .. } = self {
            buf.put_u8(KEY_VALUE_SEPARATOR);
            buf.put_slice(value);
        }

        buf.freeze()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Read { key } => write!(f, "READ {}", String::from_utf8_lossy(key)),
            Request::Get { key } => write!(f, "GET {}", String::from_utf8_lossy(key)),
            Request::Put { key, value } => write!(
                f,
                "PUT {} {}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(value)
            ),
        }
    }
}

/// The action reported in a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Removed,
    Added,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Removed => "removed",
            Action::Added => "added",
        }
    }
}

/// A response payload, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response(Bytes);

impl Response {
    /// `OK(<key>, <value>) <action>`
    pub fn ok(key: &[u8], value: &[u8], action: Action) -> Self {
        let action = action.as_str().as_bytes();
        let mut buf = BytesMut::with_capacity(key.len() + value.len() + action.len() + 7);
        buf.put_slice(b"OK(");
        buf.put_slice(key);
        buf.put_slice(b", ");
        buf.put_slice(value);
        buf.put_slice(b") ");
        buf.put_slice(action);
        Response(buf.freeze())
    }

    /// `ERR <key> does not exist`
    pub fn not_found(key: &[u8]) -> Self {
        Self::key_error(key, b"does not exist")
    }

    /// `ERR <key> already exists`
    pub fn already_exists(key: &[u8]) -> Self {
        Self::key_error(key, b"already exists")
    }

    /// `ERR <key> is too large`
    pub fn too_large(key: &[u8]) -> Self {
        Self::key_error(key, b"is too large")
    }

    /// `ERR <description>`
    pub fn error(description: impl fmt::Display) -> Self {
        Response(Bytes::from(format!("ERR {}", description)))
    }

    fn key_error(key: &[u8], message: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(ERROR_PREFIX.len() + key.len() + 1 + message.len());
        buf.put_slice(ERROR_PREFIX);
        buf.put_slice(key);
        buf.put_u8(b' ');
        buf.put_slice(message);
        Response(buf.freeze())
    }

    /// Wraps a payload received from the wire.
    pub fn from_payload(payload: Bytes) -> Self {
        Response(payload)
    }

    pub fn is_error(&self) -> bool {
        self.0.starts_with(ERROR_PREFIX)
    }

    pub fn payload(&self) -> &Bytes {
        &self.0
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
