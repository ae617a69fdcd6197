//! Tuple Space Wire Protocol
//!
//! This module implements the length-prefixed protocol spoken between clients
//! and the server.
//!
//! ## Overview
//!
//! Every message, request or response, is a frame: a 3-digit zero-padded
//! decimal length followed by exactly that many payload bytes. The length
//! counts the payload only, never the header.
//!
//! ## Modules
//!
//! - `frame`: Encodes and incrementally decodes frames
//! - `types`: Defines `Request`, `Response` and the payload grammar
//! - `parser`: Parses request payloads
//!
//! ## Example
//!
//! ```
//! use tuplespace::protocol::{decode_frame, encode_frame, parse_request, Request};
//!
//! // Parsing incoming data
//! let (payload, consumed) = decode_frame(b"004Pa b").unwrap().unwrap();
//! assert_eq!(consumed, 7);
//! assert_eq!(parse_request(&payload).unwrap(), Request::put("a", "b"));
//!
//! // Framing an outgoing payload
//! let frame = encode_frame(b"OK(a, b) added").unwrap();
//! assert_eq!(&frame[..], b"014OK(a, b) added");
//! ```

pub mod frame;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use frame::{
    decode_frame, encode_frame, encode_frame_into, FrameError, HEADER_LEN, MAX_PAYLOAD_LEN,
};
pub use parser::{parse_request, RequestError};
pub use types::{Action, Request, Response};
