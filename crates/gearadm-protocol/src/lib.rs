//! Administrative protocol client for Gearman-style job server clusters.
//!
//! The crate connects to each configured job server, sends a read-only text
//! command (`status` or `workers`), collects the reply up to its terminating
//! `.` line, and parses it into structured records. Endpoints are queried
//! independently: an unreachable server is reported in its own entry of the
//! [`ClusterResult`] and never hides the replies of the others.
//!
//! ```no_run
//! use gearadm_protocol::Cluster;
//!
//! # fn main() -> Result<(), gearadm_protocol::ConfigurationError> {
//! let cluster = Cluster::new(["gearman1:4730", "gearman2:4730"])?;
//! for (endpoint, outcome) in cluster.status().iter() {
//!     match outcome {
//!         Ok(reply) => println!("{endpoint}: {} functions", reply.records.len()),
//!         Err(error) => println!("{endpoint}: {error}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod cancel;
mod channel;
mod cluster;
mod command;
mod connector;
mod endpoint;
mod error;
mod reply;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cancel::CancellationToken;
pub use channel::{
    AdminStream, ChannelOptions, DEFAULT_POLL_INTERVAL, DEFAULT_RESPONSE_TIMEOUT, execute,
};
pub use cluster::{Cluster, ClusterOptions, ClusterResult, EndpointOutcome, status, workers};
pub use command::{AdminCommand, Status, Workers};
pub use connector::{
    ConnectPolicy, DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_TIMEOUT, Dialer, TcpDialer, connect,
};
pub use endpoint::{DEFAULT_PORT, Endpoint, EndpointParseError};
pub use error::{ChannelError, ConfigurationError, ConnectError, EndpointError};
pub use reply::{
    LineError, LineErrorReason, Reply, SessionKind, StatusRow, TERMINATOR_LINE, WorkerSession,
    parse_status, parse_workers,
};
