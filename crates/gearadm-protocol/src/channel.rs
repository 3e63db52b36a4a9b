//! Command/reply framing over an open connection.
//!
//! Administrative replies have no length prefix; they end with a line holding
//! a single `.`. The channel reads with blocking, time-sliced reads until the
//! terminator arrives, the deadline elapses, or the caller cancels.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::endpoint::Endpoint;
use crate::error::ChannelError;

/// Deadline for a complete reply unless configured otherwise.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest single blocking read unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 64 * 1024;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A bidirectional stream whose blocking reads and writes can be bounded.
pub trait AdminStream: Read + Write + Send {
    /// Bounds subsequent blocking reads; `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the timeout cannot be applied.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Bounds subsequent blocking writes; `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the timeout cannot be applied.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl AdminStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_write_timeout(self, timeout)
    }
}

/// Timing bounds for one command/reply exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    response_timeout: Duration,
    poll_interval: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ChannelOptions {
    /// Builds options with the given reply deadline.
    #[must_use]
    pub fn new(response_timeout: Duration) -> Self {
        Self {
            response_timeout,
            ..Self::default()
        }
    }

    /// Sets the longest single blocking read; bounds cancellation latency.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Deadline for a complete reply.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Longest single blocking read.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    LineStart,
    Dot,
    Body,
    Complete,
}

/// Incremental detector for the `.` line ending a reply.
///
/// Only newly received bytes are inspected; the state carried between chunks
/// records whether the previous byte ended a line or began a `.` line. A
/// reply is complete when the received text ends with `"\n.\n"`, or is
/// exactly `".\n"` for an empty reply.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TerminatorMatcher {
    state: MatchState,
}

impl Default for TerminatorMatcher {
    fn default() -> Self {
        Self {
            state: MatchState::LineStart,
        }
    }
}

impl TerminatorMatcher {
    /// Consumes `bytes` and reports whether the text now ends with the terminator.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> bool {
        for &byte in bytes {
            self.state = match (self.state, byte) {
                (MatchState::LineStart | MatchState::Complete, b'.') => MatchState::Dot,
                (MatchState::Dot, b'\n') => MatchState::Complete,
                (_, b'\n') => MatchState::LineStart,
                _ => MatchState::Body,
            };
        }
        self.is_complete()
    }

    pub(crate) fn is_complete(self) -> bool {
        self.state == MatchState::Complete
    }
}

/// Sends `command` and returns the complete reply, terminator included.
///
/// The connection is consumed and dropped when the exchange finishes.
///
/// # Errors
///
/// Returns [`ChannelError`] when the command cannot be written, the reply
/// cannot be read, the peer closes early, the deadline elapses, or `cancel`
/// fires.
pub fn execute<S>(
    mut stream: S,
    endpoint: &Endpoint,
    command: &'static str,
    options: &ChannelOptions,
    cancel: &CancellationToken,
) -> Result<String, ChannelError>
where
    S: AdminStream,
{
    let deadline = Instant::now() + options.response_timeout;
    send_command(&mut stream, endpoint, command, options)?;

    let mut response: Vec<u8> = Vec::new();
    let mut matcher = TerminatorMatcher::default();
    let mut chunk = vec![0_u8; READ_CHUNK];

    loop {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled {
                endpoint: endpoint.to_string(),
                partial_response: decode(response),
            });
        }
        let Some(remaining) = deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
        else {
            return Err(ChannelError::DeadlineElapsed {
                endpoint: endpoint.to_string(),
                timeout_ms: options.response_timeout.as_millis(),
                partial_response: decode(response),
            });
        };

        let slice = remaining.min(options.poll_interval).max(MIN_POLL_INTERVAL);
        if let Err(source) = stream.set_read_timeout(Some(slice)) {
            return Err(read_error(endpoint, response, source));
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(ChannelError::Closed {
                    endpoint: endpoint.to_string(),
                    partial_response: decode(response),
                });
            }
            Ok(read) => {
                let fresh = chunk.get(..read).unwrap_or_default();
                trace!(%endpoint, bytes = read, "received reply fragment");
                response.extend_from_slice(fresh);
                if matcher.feed(fresh) {
                    debug!(%endpoint, command, bytes = response.len(), "reply complete");
                    return Ok(decode(response));
                }
            }
            Err(error) if is_retryable(&error) => {}
            Err(source) => return Err(read_error(endpoint, response, source)),
        }
    }
}

fn send_command<S>(
    stream: &mut S,
    endpoint: &Endpoint,
    command: &'static str,
    options: &ChannelOptions,
) -> Result<(), ChannelError>
where
    S: AdminStream,
{
    let write_error = |source| ChannelError::Write {
        endpoint: endpoint.to_string(),
        command,
        source,
    };
    stream
        .set_write_timeout(Some(options.response_timeout.max(MIN_POLL_INTERVAL)))
        .map_err(write_error)?;
    stream
        .write_all(command.as_bytes())
        .and_then(|()| stream.write_all(b"\n"))
        .and_then(|()| stream.flush())
        .map_err(write_error)
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn read_error(endpoint: &Endpoint, response: Vec<u8>, source: io::Error) -> ChannelError {
    ChannelError::Read {
        endpoint: endpoint.to_string(),
        partial_response: decode(response),
        source,
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}
