//! Error taxonomy for administrative queries.
//!
//! Only [`ConfigurationError`] aborts a cluster call. Every other error is
//! recorded against the endpoint that produced it so the remaining endpoints
//! still report.

use std::io;

use thiserror::Error;

use crate::endpoint::EndpointParseError;

/// Invalid input to a cluster call, detected before any network activity.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The call named no endpoints.
    #[error("at least one job server endpoint must be configured")]
    NoEndpoints,
    /// An endpoint string could not be parsed.
    #[error("invalid job server endpoint '{input}': {source}")]
    InvalidEndpoint {
        /// The offending endpoint text.
        input: String,
        /// Why parsing failed.
        #[source]
        source: EndpointParseError,
    },
    /// The connection policy allowed no attempts at all.
    #[error("connection attempts must be at least 1")]
    ZeroAttempts,
}

/// Failure to obtain a connection to one endpoint.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Every attempt failed.
    #[error("unable to connect to job server {endpoint} after {attempts} attempts: {source}")]
    Unreachable {
        /// Endpoint key.
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error reported by the final attempt.
        #[source]
        source: io::Error,
    },
    /// The caller cancelled the query before a connection was established.
    #[error("connection to job server {endpoint} was cancelled")]
    Cancelled {
        /// Endpoint key.
        endpoint: String,
    },
}

/// Failure while exchanging a command and its reply over an open connection.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The command could not be written.
    #[error("failed to send '{command}' to job server {endpoint}: {source}")]
    Write {
        /// Endpoint key.
        endpoint: String,
        /// Command that was being sent.
        command: &'static str,
        /// Underlying transport error.
        #[source]
        source: io::Error,
    },
    /// Reading the reply failed.
    #[error("failed to read reply from job server {endpoint}: {source}")]
    Read {
        /// Endpoint key.
        endpoint: String,
        /// Bytes received before the failure.
        partial_response: String,
        /// Underlying transport error.
        #[source]
        source: io::Error,
    },
    /// The server closed the connection before sending the terminator.
    #[error("job server {endpoint} closed the connection before the reply terminator")]
    Closed {
        /// Endpoint key.
        endpoint: String,
        /// Bytes received before the connection closed.
        partial_response: String,
    },
    /// No terminator arrived before the response deadline.
    #[error("no complete reply from job server {endpoint} within {timeout_ms} ms")]
    DeadlineElapsed {
        /// Endpoint key.
        endpoint: String,
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u128,
        /// Bytes received before the deadline.
        partial_response: String,
    },
    /// The caller cancelled the query while the reply was being read.
    #[error("reply from job server {endpoint} was cancelled")]
    Cancelled {
        /// Endpoint key.
        endpoint: String,
        /// Bytes received before cancellation.
        partial_response: String,
    },
}

impl ChannelError {
    /// Text received before the exchange failed, if any.
    #[must_use]
    pub fn partial_response(&self) -> Option<&str> {
        match self {
            Self::Write { .. } => None,
            Self::Read {
                partial_response, ..
            }
            | Self::Closed {
                partial_response, ..
            }
            | Self::DeadlineElapsed {
                partial_response, ..
            }
            | Self::Cancelled {
                partial_response, ..
            } => Some(partial_response.as_str()),
        }
    }
}

/// Per-endpoint failure recorded in a cluster result.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint could not be reached.
    #[error(transparent)]
    Connect(ConnectError),
    /// The command/reply exchange failed.
    #[error(transparent)]
    Channel(ChannelError),
    /// The caller cancelled the query for this endpoint.
    #[error("query against job server {endpoint} was cancelled")]
    Cancelled {
        /// Endpoint key.
        endpoint: String,
    },
    /// The worker thread running this endpoint's query panicked.
    #[error("query against job server {endpoint} panicked")]
    Panicked {
        /// Endpoint key.
        endpoint: String,
    },
}

impl From<ConnectError> for EndpointError {
    fn from(error: ConnectError) -> Self {
        match error {
            ConnectError::Cancelled { endpoint } => Self::Cancelled { endpoint },
            other @ ConnectError::Unreachable { .. } => Self::Connect(other),
        }
    }
}

impl From<ChannelError> for EndpointError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Cancelled { endpoint, .. } => Self::Cancelled { endpoint },
            other => Self::Channel(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_connect_maps_to_endpoint_cancellation() {
        let error = EndpointError::from(ConnectError::Cancelled {
            endpoint: String::from("gearman1:4730"),
        });
        assert!(matches!(error, EndpointError::Cancelled { ref endpoint } if endpoint == "gearman1:4730"));
    }

    #[test]
    fn cancelled_channel_maps_to_endpoint_cancellation() {
        let error = EndpointError::from(ChannelError::Cancelled {
            endpoint: String::from("gearman1:4730"),
            partial_response: String::from("foo 1"),
        });
        assert!(matches!(error, EndpointError::Cancelled { .. }));
    }

    #[test]
    fn closed_channel_keeps_partial_response() {
        let error = ChannelError::Closed {
            endpoint: String::from("gearman1:4730"),
            partial_response: String::from("foo 1 0 1\n"),
        };
        assert_eq!(error.partial_response(), Some("foo 1 0 1\n"));
        assert!(matches!(
            EndpointError::from(error),
            EndpointError::Channel(ChannelError::Closed { .. })
        ));
    }

    #[test]
    fn unreachable_message_names_endpoint_and_attempts() {
        let error = ConnectError::Unreachable {
            endpoint: String::from("gearman1:4730"),
            attempts: 3,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let message = error.to_string();
        assert!(message.contains("gearman1:4730"), "message: {message}");
        assert!(message.contains("3 attempts"), "message: {message}");
    }
}
