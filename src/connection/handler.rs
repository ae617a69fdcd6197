//! Connection Session
//!
//! This module handles individual client connections to the tuple space.
//! Each client gets its own session task that runs in a loop,
//! reading requests and sending responses.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Client connects, session registers with the TupleSpace
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Active                  │
//!    │                              │
//!    │  read frame ─> parse request │
//!    │       ─> execute ─> respond  │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        │ peer closed / protocol error / idle timeout / I/O error
//!        ▼
//! 3. Closed: connection released, client deregistered
//! ```
//!
//! ## Error Policy
//!
//! - Logical store errors (missing key, existing key) are ordinary responses
//!   and the session keeps going.
//! - A protocol error (bad length header, unknown operation, malformed key or
//!   PUT payload, frame cut short by EOF) gets exactly one `ERR` response, then
//!   the session ends.
//! - Transport errors end the session silently.

use crate::commands::CommandHandler;
use crate::protocol::{
    decode_frame, encode_frame, parse_request, FrameError, Request, RequestError, Response,
};
use crate::storage::ClientGuard;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity. A full frame is at most 1002 bytes.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Sent in place of a response whose payload exceeds the frame limit.
const OVERSIZED_RESPONSE_FRAME: &[u8] = b"022ERR response too large";

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Sessions closed because of a protocol error
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// A protocol violation. Ends the session after one error response.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// The peer closed the stream in the middle of a frame
    #[error("incomplete frame")]
    IncompleteFrame,
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client broke the protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No data arrived within the idle timeout
    #[error("Idle for more than {0:?}")]
    IdleTimeout(Duration),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,
}

/// Serves one client connection.
///
/// Owns the stream, the read buffer and the client's registration with the
/// tuple space. Generic over the stream so tests can drive it in memory.
pub struct Session<S> {
    /// The client stream
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared store)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Close the session after this long without input (None = wait forever)
    idle_timeout: Option<Duration>,

    /// Deregisters the client when the session is dropped
    _client: ClientGuard,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new session and registers the client with the tuple space.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        let client = command_handler.space().register_client();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            idle_timeout: None,
            _client: client,
        }
    }

    /// Sets the idle timeout for reads.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Runs the session until the client disconnects or an error occurs.
    ///
    /// A normal disconnect returns `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = match self.main_loop().await {
            Err(ConnectionError::ClientDisconnected) => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(e) => match e {
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                ConnectionError::Protocol(_) | ConnectionError::IdleTimeout(_) => {
                    info!(client = %self.addr, reason = %e, "Closing connection")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        // Best effort: the peer may already be gone
        let _ = self.stream.shutdown().await;

        self.stats.connection_closed();
        result
    }

    /// Serves requests, answering a protocol error before giving up.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let result = self.serve().await;
        if let Err(ConnectionError::Protocol(e)) = &result {
            self.reject(e).await;
        }
        result
    }

    /// The read-execute-respond loop.
    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete request already buffered, in order
            while let Some(request) = self.try_parse_request()? {
                let response = self.command_handler.execute(request);
                self.stats.request_processed();
                self.send_response(&response).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to take one complete request from the buffer.
    fn try_parse_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        match decode_frame(&self.buffer) {
            Ok(Some((payload, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded frame"
                );
                Ok(Some(parse_request(&payload)?))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete frame, need more data"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads more data from the stream into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let idle_timeout = self.idle_timeout;
        let read = self.stream.get_mut().read_buf(&mut self.buffer);

        let n = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(limit))??,
            None => read.await?,
        };

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            return Err(ProtocolError::IncompleteFrame.into());
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Frames and sends a response.
    ///
    /// A response too long for one frame is replaced by an error response;
    /// the operation behind it has already been applied.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let frame = match encode_frame(response.payload()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Response does not fit in a frame");
                Bytes::from_static(OVERSIZED_RESPONSE_FRAME)
            }
        };

        self.write_frame(&frame).await
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(frame.len());
        trace!(
            client = %self.addr,
            bytes = frame.len(),
            "Sent response"
        );
        Ok(())
    }

    /// Sends the single error response for a protocol violation.
    async fn reject(&mut self, error: &ProtocolError) {
        warn!(client = %self.addr, error = %error, "Protocol error");
        self.stats.protocol_error();

        if let Err(e) = self.send_response(&Response::error(error)).await {
            debug!(client = %self.addr, error = %e, "Failed to send error response");
        }
    }
}

/// Serves a client connection to completion.
///
/// Protocol errors are answered with one `ERR` response before the connection
/// is closed. Every error ends only this session.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    idle_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let session =
        Session::new(stream, addr, command_handler, stats).with_idle_timeout(idle_timeout);
    if let Err(e) = session.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TupleSpace;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn create_test_server_with(
        space: TupleSpace,
        idle_timeout: Option<Duration>,
    ) -> (SocketAddr, Arc<TupleSpace>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let space = Arc::new(space);
        let stats = Arc::new(ConnectionStats::new());

        let space_clone = Arc::clone(&space);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&space_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    stats,
                    idle_timeout,
                ));
            }
        });

        (addr, space, stats)
    }

    async fn create_test_server() -> (SocketAddr, Arc<TupleSpace>, Arc<ConnectionStats>) {
        create_test_server_with(TupleSpace::new(), None).await
    }

    /// Reads exactly one response frame and returns its payload.
    async fn read_frame(client: &mut TcpStream) -> String {
        let mut header = [0u8; 3];
        client.read_exact(&mut header).await.unwrap();
        let len: usize = std::str::from_utf8(&header).unwrap().parse().unwrap();

        let mut payload = vec![0u8; len];
        client.read_exact(&mut payload).await.unwrap();
        String::from_utf8(payload).unwrap()
    }

    /// Waits until the server closes the connection.
    async fn assert_closed(client: &mut TcpStream) {
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_put_read_get_scenario() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"004Pa b").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(a, b) added");

        client.write_all(b"002Ra").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(a, b) read");

        client.write_all(b"002Ga").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(a, b) removed");

        client.write_all(b"002Ga").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "ERR a does not exist");
    }

    #[tokio::test]
    async fn test_logical_errors_keep_session_open() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"005Pk v1").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(k, v1) added");

        client.write_all(b"005Pk v2").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "ERR k already exists");

        client.write_all(b"002Rk").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(k, v1) read");
    }

    #[tokio::test]
    async fn test_multiple_requests_in_one_write() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"006Pk1 v1006Pk2 v2003Rk1003Gk2")
            .await
            .unwrap();

        assert_eq!(read_frame(&mut client).await, "OK(k1, v1) added");
        assert_eq!(read_frame(&mut client).await, "OK(k2, v2) added");
        assert_eq!(read_frame(&mut client).await, "OK(k1, v1) read");
        assert_eq!(read_frame(&mut client).await, "OK(k2, v2) removed");
    }

    #[tokio::test]
    async fn test_request_sent_in_fragments() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.set_nodelay(true).unwrap();

        for fragment in ["0", "18Pgre", "eting hi", " there"] {
            client.write_all(fragment.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            read_frame(&mut client).await,
            "OK(greeting, hi there) added"
        );
    }

    #[tokio::test]
    async fn test_bad_length_header_closes_session() {
        let (addr, space, stats) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"0x2Ra").await.unwrap();
        let response = read_frame(&mut client).await;
        assert!(response.starts_with("ERR invalid length header"), "{}", response);
        assert_closed(&mut client).await;

        assert_eq!(stats.protocol_errors.load(Ordering::Relaxed), 1);
        assert_eq!(space.snapshot().total_operations, 0);
    }

    #[tokio::test]
    async fn test_unknown_operation_closes_session() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"002Xa").await.unwrap();
        assert_eq!(
            read_frame(&mut client).await,
            "ERR unknown operation code 'X'"
        );
        assert_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_malformed_put_closes_session() {
        let (addr, space, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"003Pab").await.unwrap();
        assert_eq!(
            read_frame(&mut client).await,
            "ERR malformed PUT: missing space between key and value"
        );
        assert_closed(&mut client).await;
        assert!(space.is_empty());
    }

    #[tokio::test]
    async fn test_requests_before_protocol_error_are_applied() {
        let (addr, space, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"004Pa b004Rb c").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "OK(a, b) added");
        assert_eq!(
            read_frame(&mut client).await,
            "ERR key must not contain spaces"
        );
        assert_closed(&mut client).await;
        assert!(space.contains(b"a"));
    }

    #[tokio::test]
    async fn test_truncated_frame_at_eof() {
        let (addr, _, stats) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"010Rke").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(read_frame(&mut client).await, "ERR incomplete frame");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.protocol_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_oversized_response_is_replaced() {
        let (addr, space, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // 998-byte payload: fits in a frame, but its response does not
        let value = "v".repeat(995);
        let request = format!("998Pk {}", value);
        client.write_all(request.as_bytes()).await.unwrap();

        assert_eq!(read_frame(&mut client).await, "ERR response too large");
        assert!(space.contains(b"k"));

        // The session is still usable
        client.write_all(b"002Gk").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "ERR response too large");
        client.write_all(b"002Gk").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "ERR k does not exist");
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_session() {
        let (addr, space, _) =
            create_test_server_with(TupleSpace::new(), Some(Duration::from_millis(50))).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"002Ra").await.unwrap();
        assert_eq!(read_frame(&mut client).await, "ERR a does not exist");

        assert_closed(&mut client).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(space.snapshot().clients, 0);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, space, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(space.snapshot().clients, 1);

        client.write_all(b"004Pa b").await.unwrap();
        let _ = read_frame(&mut client).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.requests_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 7);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 17);

        // Close connection
        drop(client);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        let snapshot = space.snapshot();
        assert_eq!(snapshot.clients, 0);
        assert_eq!(snapshot.total_clients, 1);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_disjoint_puts() {
        let (addr, space, _) = create_test_server().await;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                tokio::spawn(async move {
                    let mut client = TcpStream::connect(addr).await.unwrap();
                    let payload = format!("Pkey{} value{}", i, i);
                    let frame = encode_frame(payload.as_bytes()).unwrap();
                    client.write_all(&frame).await.unwrap();
                    read_frame(&mut client).await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(
                task.await.unwrap(),
                format!("OK(key{}, value{}) added", i, i)
            );
        }

        assert_eq!(space.len(), 16);
        for i in 0..16 {
            assert_eq!(
                space.read(format!("key{}", i).as_bytes()).unwrap().value,
                Bytes::from(format!("value{}", i))
            );
        }
    }

    #[test]
    fn test_oversized_response_frame() {
        let expected = encode_frame(Response::error("response too large").payload()).unwrap();
        assert_eq!(OVERSIZED_RESPONSE_FRAME, &expected[..]);
    }

    #[tokio::test]
    async fn test_session_over_mock_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(b"004Pa b")
            .write(b"014OK(a, b) added")
            .read(b"002Ra")
            .write(b"013OK(a, b) read")
            .read(b"002Ga")
            .write(b"016OK(a, b) removed")
            .read(b"002Ga")
            .write(b"020ERR a does not exist")
            .build();

        let space = Arc::new(TupleSpace::new());
        let stats = Arc::new(ConnectionStats::new());
        let session = Session::new(
            stream,
            "127.0.0.1:9".parse().unwrap(),
            CommandHandler::new(Arc::clone(&space)),
            Arc::clone(&stats),
        );

        session.run().await.unwrap();

        let snapshot = space.snapshot();
        assert_eq!(snapshot.total_operations, 4);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.clients, 0);
        assert_eq!(stats.requests_processed.load(Ordering::Relaxed), 4);
    }
}
