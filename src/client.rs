//! Reference Client
//!
//! A small client for the tuple space protocol, plus the request-file format
//! replayed by the `tuplespace-client` binary:
//!
//! ```text
//! PUT key value with spaces
//! READ key
//! GET key
//! ```
//!
//! Blank lines are ignored. Malformed lines are skipped with a notice and
//! never stop the replay; network errors do.

use crate::protocol::{decode_frame, encode_frame, FrameError, Request, Response};
use bytes::BytesMut;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

/// Errors returned by [`TupleClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request does not fit in a frame; nothing was sent
    #[error("request too large: {0}")]
    RequestTooLarge(#[source] FrameError),

    /// The server sent bytes that are not a valid frame
    #[error("bad response from server: {0}")]
    BadResponse(#[source] FrameError),

    /// The server closed the connection before responding
    #[error("connection closed by server")]
    ConnectionClosed,
}

/// A malformed line in a request file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{0} requires a key")]
    MissingKey(&'static str),

    #[error("PUT requires a value")]
    MissingValue,

    #[error("{0} takes exactly one key")]
    TrailingArguments(&'static str),
}

/// Parses one request-file line.
///
/// Returns `Ok(None)` for blank lines.
///
/// # Example
///
/// ```
/// use tuplespace::client::parse_script_line;
/// use tuplespace::protocol::Request;
///
/// assert_eq!(
///     parse_script_line("PUT name Ada Lovelace").unwrap(),
///     Some(Request::put("name", "Ada Lovelace"))
/// );
/// assert_eq!(parse_script_line("   ").unwrap(), None);
/// assert!(parse_script_line("DELETE name").is_err());
/// ```
pub fn parse_script_line(line: &str) -> Result<Option<Request>, ScriptError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let mut parts = line.splitn(3, ' ');
    let verb = parts.next().unwrap_or_default();

    match verb {
        "PUT" => {
            let key = non_empty(parts.next()).ok_or(ScriptError::MissingKey("PUT"))?;
            let value = parts.next().ok_or(ScriptError::MissingValue)?;
            Ok(Some(Request::put(key.to_string(), value.to_string())))
        }
        "READ" => {
            let key = single_key("READ", parts)?;
            Ok(Some(Request::read(key.to_string())))
        }
        "GET" => {
            let key = single_key("GET", parts)?;
            Ok(Some(Request::get(key.to_string())))
        }
        other => Err(ScriptError::UnknownCommand(other.to_string())),
    }
}

fn non_empty(part: Option<&str>) -> Option<&str> {
    part.filter(|s| !s.is_empty())
}

fn single_key<'a>(
    verb: &'static str,
    mut parts: impl Iterator<Item = &'a str>,
) -> Result<&'a str, ScriptError> {
    let key = non_empty(parts.next()).ok_or(ScriptError::MissingKey(verb))?;
    if parts.next().is_some() {
        return Err(ScriptError::TrailingArguments(verb));
    }
    Ok(key)
}

/// Totals from replaying a request file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Requests sent and answered
    pub sent: usize,
    /// Lines skipped as malformed or unsendable
    pub skipped: usize,
}

/// A connection to a tuple space server.
pub struct TupleClient {
    stream: TcpStream,
    buffer: BytesMut,
}

impl TupleClient {
    /// Connects to the server at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(1024),
        })
    }

    /// Sends one request and waits for its response.
    ///
    /// Requests whose payload does not fit in a frame are rejected before
    /// anything is sent.
    pub async fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        let frame = encode_frame(&request.encode()).map_err(ClientError::RequestTooLarge)?;
        self.stream.write_all(&frame).await?;
        trace!(bytes = frame.len(), "Sent request");

        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response, ClientError> {
        loop {
            let decoded = decode_frame(&self.buffer).map_err(ClientError::BadResponse)?;
            if let Some((payload, consumed)) = decoded {
                let _ = self.buffer.split_to(consumed);
                return Ok(Response::from_payload(payload));
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Replays a request file, writing `<line>: <response>` for every request
    /// and a notice for every skipped line to `out`.
    ///
    /// Lines whose request does not fit in a frame are skipped locally.
    /// Stops at the first network error or undecodable response.
    pub async fn replay<W: Write>(
        &mut self,
        script: &str,
        out: &mut W,
    ) -> Result<ReplaySummary, ClientError> {
        let mut summary = ReplaySummary::default();

        for (index, line) in script.lines().enumerate() {
            let line_no = index + 1;

            let request = match parse_script_line(line) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    writeln!(out, "Skipping line {}: {}", line_no, e)?;
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.request(&request).await {
                Ok(response) => {
                    writeln!(out, "{}: {}", line, response)?;
                    summary.sent += 1;
                }
                Err(ClientError::RequestTooLarge(e)) => {
                    writeln!(out, "Skipping line {}: {}", line_no, e)?;
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(sent = summary.sent, skipped = summary.skipped, "Replay finished");
        Ok(summary)
    }
}
