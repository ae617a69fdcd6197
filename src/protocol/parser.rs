//! Request Payload Parser
//!
//! Turns the payload of a decoded frame into a [`Request`]. Parsing is strict:
//! anything that does not match the grammar is a [`RequestError`], and the
//! connection layer closes the session after reporting it.

use crate::protocol::types::{opcode, Request, KEY_VALUE_SEPARATOR};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The frame carried no payload at all
    #[error("empty request")]
    Empty,

    /// The first byte is not `R`, `G` or `P`
    #[error("unknown operation code {:?}", op_char(.0))]
    UnknownOperation(u8),

    /// No key follows the operation code
    #[error("missing key")]
    MissingKey,

    /// A READ or GET key contains the separator
    #[error("key must not contain spaces")]
    KeyContainsSpace,

    /// A PUT payload has no space between key and value
    #[error("malformed PUT: missing space between key and value")]
    MissingValueSeparator,
}

fn op_char(code: &u8) -> char {
    char::from(*code)
}

/// Parses a request payload.
///
/// # Example
///
/// ```
/// use tuplespace::protocol::{parse_request, Request};
///
/// let request = parse_request(b"Pname Ada Lovelace").unwrap();
/// assert_eq!(request, Request::put("name", "Ada Lovelace"));
/// ```
pub fn parse_request(payload: &[u8]) -> Result<Request, RequestError> {
    let (&code, rest) = payload.split_first().ok_or(RequestError::Empty)?;

    match code {
        opcode::READ => Ok(Request::Read {
            key: parse_key(rest)?,
        }),
        opcode::GET => Ok(Request::Get {
            key: parse_key(rest)?,
        }),
        opcode::PUT => parse_put(rest),
        other => Err(RequestError::UnknownOperation(other)),
    }
}

/// A bare key: non-empty, no separator.
fn parse_key(rest: &[u8]) -> Result<Bytes, RequestError> {
    if rest.is_empty() {
        return Err(RequestError::MissingKey);
    }
    if rest.contains(&KEY_VALUE_SEPARATOR) {
        return Err(RequestError::KeyContainsSpace);
    }
    Ok(Bytes::copy_from_slice(rest))
}

/// `<key> <value>`: key up to the first space, value is everything after it.
fn parse_put(rest: &[u8]) -> Result<Request, RequestError> {
    let split = rest
        .iter()
        .position(|&b| b == KEY_VALUE_SEPARATOR)
        .ok_or(if rest.is_empty() {
            RequestError::MissingKey
        } else {
            RequestError::MissingValueSeparator
        })?;

    if split == 0 {
        return Err(RequestError::MissingKey);
    }

    Ok(Request::Put {
        key: Bytes::copy_from_slice(&rest[..split]),
        value: Bytes::copy_from_slice(&rest[split + 1..]),
    })
}
