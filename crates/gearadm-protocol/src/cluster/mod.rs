//! Fan-out of administrative commands across job servers.
//!
//! Every endpoint runs its own connect, execute, and parse pipeline on a
//! scoped thread. Pipelines share nothing but the read-only [`Cluster`], and
//! their outcomes are collected in configured order, so each endpoint's entry
//! is written exactly once.

use std::collections::HashSet;
use std::thread;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::channel::{ChannelOptions, execute};
use crate::command::{AdminCommand, Status, Workers};
use crate::connector::{ConnectPolicy, Dialer, TcpDialer, connect};
use crate::endpoint::Endpoint;
use crate::error::{ConfigurationError, EndpointError};
use crate::reply::{Reply, StatusRow, WorkerSession};

/// Outcome recorded for one endpoint.
pub type EndpointOutcome<T> = Result<Reply<T>, EndpointError>;

/// Connection and framing settings shared by every endpoint of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterOptions {
    /// Retry policy for connection attempts.
    pub connect: ConnectPolicy,
    /// Deadlines for the command/reply exchange.
    pub channel: ChannelOptions,
}

/// A validated set of job servers and the settings used to query them.
#[derive(Debug, Clone)]
pub struct Cluster<D = TcpDialer> {
    endpoints: Vec<Endpoint>,
    options: ClusterOptions,
    dialer: D,
    cancel: CancellationToken,
}

impl Cluster<TcpDialer> {
    /// Validates `endpoints` and builds a cluster that dials over TCP.
    ///
    /// Duplicate endpoints collapse to their first occurrence, compared by
    /// their normalised key (see [`ClusterResult::get`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoEndpoints`] for an empty collection and
    /// [`ConfigurationError::InvalidEndpoint`] for unparsable entries.
    pub fn new<I, S>(endpoints: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<Endpoint> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for input in endpoints {
            let text = input.as_ref();
            let endpoint =
                Endpoint::parse(text).map_err(|source| ConfigurationError::InvalidEndpoint {
                    input: text.to_owned(),
                    source,
                })?;
            if seen.insert(endpoint.as_str().to_owned()) {
                parsed.push(endpoint);
            }
        }
        if parsed.is_empty() {
            return Err(ConfigurationError::NoEndpoints);
        }
        Ok(Self {
            endpoints: parsed,
            options: ClusterOptions::default(),
            dialer: TcpDialer,
            cancel: CancellationToken::new(),
        })
    }
}

impl<D> Cluster<D>
where
    D: Dialer,
{
    /// Replaces the connection and framing settings.
    #[must_use]
    pub fn with_options(mut self, options: ClusterOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches a token that aborts in-flight queries when cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Swaps the transport used to reach job servers.
    #[must_use]
    pub fn with_dialer<T>(self, dialer: T) -> Cluster<T>
    where
        T: Dialer,
    {
        Cluster {
            endpoints: self.endpoints,
            options: self.options,
            dialer,
            cancel: self.cancel,
        }
    }

    /// Endpoints in configured order.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Settings applied to every endpoint.
    #[must_use]
    pub const fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Queries per-function queue and worker counts on every endpoint.
    #[must_use]
    pub fn status(&self) -> ClusterResult<StatusRow> {
        self.run::<Status>()
    }

    /// Lists connected sessions on every endpoint.
    #[must_use]
    pub fn workers(&self) -> ClusterResult<WorkerSession> {
        self.run::<Workers>()
    }

    /// Runs `C` against every endpoint independently.
    ///
    /// A failing endpoint is recorded in the result and never prevents the
    /// others from reporting.
    #[must_use]
    pub fn run<C>(&self) -> ClusterResult<C::Record>
    where
        C: AdminCommand,
    {
        let entries: Vec<(Endpoint, EndpointOutcome<C::Record>)> = thread::scope(|scope| {
            let pending: Vec<_> = self
                .endpoints
                .iter()
                .map(|endpoint| {
                    let spawned = thread::Builder::new()
                        .name(format!("gearadm-{endpoint}"))
                        .spawn_scoped(scope, move || self.query::<C>(endpoint));
                    (endpoint, spawned)
                })
                .collect();

            pending
                .into_iter()
                .map(|(endpoint, spawned)| {
                    let outcome = match spawned {
                        Ok(handle) => handle.join().unwrap_or_else(|_| {
                            Err(EndpointError::Panicked {
                                endpoint: endpoint.to_string(),
                            })
                        }),
                        Err(error) => {
                            warn!(%endpoint, %error, "could not spawn query thread; running inline");
                            self.query::<C>(endpoint)
                        }
                    };
                    (endpoint.clone(), outcome)
                })
                .collect()
        });

        let result = ClusterResult { entries };
        info!(
            command = C::NAME,
            endpoints = result.len(),
            failures = result.failures().count(),
            "cluster query finished"
        );
        result
    }

    fn query<C>(&self, endpoint: &Endpoint) -> EndpointOutcome<C::Record>
    where
        C: AdminCommand,
    {
        let outcome = connect(&self.dialer, endpoint, &self.options.connect, &self.cancel)
            .map_err(EndpointError::from)
            .and_then(|stream| {
                execute(
                    stream,
                    endpoint,
                    C::NAME,
                    &self.options.channel,
                    &self.cancel,
                )
                .map_err(EndpointError::from)
            })
            .map(|raw| C::parse(&raw));

        match &outcome {
            Ok(reply) if !reply.is_clean() => {
                warn!(
                    %endpoint,
                    command = C::NAME,
                    rejected_lines = reply.errors.len(),
                    "reply contained unparsable lines"
                );
            }
            Ok(_) => {}
            Err(error) => warn!(%endpoint, command = C::NAME, %error, "job server query failed"),
        }
        outcome
    }
}

/// Queries `status` on every endpoint over TCP with default settings.
///
/// # Errors
///
/// Returns [`ConfigurationError`] when the endpoint list is empty or invalid.
pub fn status<I, S>(endpoints: I) -> Result<ClusterResult<StatusRow>, ConfigurationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Cluster::new(endpoints).map(|cluster| cluster.status())
}

/// Queries `workers` on every endpoint over TCP with default settings.
///
/// # Errors
///
/// Returns [`ConfigurationError`] when the endpoint list is empty or invalid.
pub fn workers<I, S>(endpoints: I) -> Result<ClusterResult<WorkerSession>, ConfigurationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Cluster::new(endpoints).map(|cluster| cluster.workers())
}

/// Per-endpoint outcomes of one cluster call, in configured order.
///
/// Holds exactly one entry per configured endpoint.
#[derive(Debug)]
pub struct ClusterResult<T> {
    entries: Vec<(Endpoint, EndpointOutcome<T>)>,
}

impl<T> ClusterResult<T> {
    /// Number of endpoints reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the result has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the outcome for an endpoint key such as `gearman1:4730`.
    ///
    /// Keys are normalised endpoint text rather than the caller's input:
    /// surrounding whitespace is trimmed and a bare host gains the default
    /// port, so `" gearman1 "` is found under `gearman1:4730`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EndpointOutcome<T>> {
        self.entries
            .iter()
            .find(|(endpoint, _)| endpoint.as_str() == key)
            .map(|(_, outcome)| outcome)
    }

    /// Iterates over endpoints and their outcomes.
    pub fn iter(&self) -> impl Iterator<Item = (&Endpoint, &EndpointOutcome<T>)> {
        self.entries.iter().map(|(endpoint, outcome)| (endpoint, outcome))
    }

    /// Endpoint keys in configured order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(endpoint, _)| endpoint.as_str())
    }

    /// Endpoints that returned a reply.
    pub fn successes(&self) -> impl Iterator<Item = (&Endpoint, &Reply<T>)> {
        self.entries
            .iter()
            .filter_map(|(endpoint, outcome)| outcome.as_ref().ok().map(|reply| (endpoint, reply)))
    }

    /// Endpoints that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&Endpoint, &EndpointError)> {
        self.entries
            .iter()
            .filter_map(|(endpoint, outcome)| outcome.as_ref().err().map(|error| (endpoint, error)))
    }

    /// Reports whether every endpoint returned a reply.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|(_, outcome)| outcome.is_ok())
    }
}

impl<T> IntoIterator for ClusterResult<T> {
    type Item = (Endpoint, EndpointOutcome<T>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "snake_case")]
enum EntryView<'a, T> {
    Ok(&'a Reply<T>),
    Error(String),
}

impl<T> Serialize for ClusterResult<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (endpoint, outcome) in &self.entries {
            let view = match outcome {
                Ok(reply) => EntryView::Ok(reply),
                Err(error) => EntryView::Error(error.to_string()),
            };
            map.serialize_entry(endpoint.as_str(), &view)?;
        }
        map.end()
    }
}
