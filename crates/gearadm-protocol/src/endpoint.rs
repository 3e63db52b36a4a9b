//! Job server endpoint parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Port assumed when an endpoint omits one.
pub const DEFAULT_PORT: u16 = 4730;

/// A job server address, keyed by its `host:port` text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    key: String,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parses `host:port`, `[v6-address]:port`, or a bare host.
    ///
    /// Surrounding whitespace is ignored. A bare host uses [`DEFAULT_PORT`]
    /// and is keyed as `host:4730`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointParseError`] when the host is empty, the port is not
    /// in `1..=65535`, or an IPv6 address is missing its brackets.
    pub fn parse(input: &str) -> Result<Self, EndpointParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }

        let (host, port) = match trimmed.strip_prefix('[') {
            Some(bracketed) => split_bracketed(bracketed)?,
            None => split_plain(trimmed)?,
        };
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost);
        }

        let key = match port {
            Some(_) => trimmed.to_owned(),
            None => format!("{trimmed}:{DEFAULT_PORT}"),
        };
        Ok(Self {
            key,
            host: host.to_owned(),
            port: port.unwrap_or(DEFAULT_PORT),
        })
    }

    /// Host name or address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` key identifying this endpoint in results.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

fn split_bracketed(bracketed: &str) -> Result<(&str, Option<u16>), EndpointParseError> {
    let (host, tail) = bracketed
        .split_once(']')
        .ok_or(EndpointParseError::UnclosedBracket)?;
    if tail.is_empty() {
        return Ok((host, None));
    }
    let port_text = tail
        .strip_prefix(':')
        .ok_or_else(|| EndpointParseError::InvalidPort(tail.to_owned()))?;
    Ok((host, Some(parse_port(port_text)?)))
}

fn split_plain(text: &str) -> Result<(&str, Option<u16>), EndpointParseError> {
    match text.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => Err(EndpointParseError::UnbracketedIpv6),
        Some((host, port_text)) => Ok((host, Some(parse_port(port_text)?))),
        None => Ok((text, None)),
    }
}

fn parse_port(text: &str) -> Result<u16, EndpointParseError> {
    match text.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(EndpointParseError::InvalidPort(text.to_owned())),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.key)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.key)
    }
}

/// Errors encountered while parsing an [`Endpoint`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    /// The input was empty or whitespace.
    #[error("endpoint is empty")]
    Empty,
    /// The host part was empty.
    #[error("missing host")]
    MissingHost,
    /// The port was not a number in `1..=65535`.
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    /// An IPv6 address was given without surrounding brackets.
    #[error("IPv6 addresses must be written as [address]:port")]
    UnbracketedIpv6,
    /// An opening `[` had no matching `]`.
    #[error("unclosed '[' in IPv6 address")]
    UnclosedBracket,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::host_and_port("gearman1:4730", "gearman1", 4730, "gearman1:4730")]
    #[case::custom_port("10.0.0.5:7003", "10.0.0.5", 7003, "10.0.0.5:7003")]
    #[case::bare_host("localhost", "localhost", DEFAULT_PORT, "localhost:4730")]
    #[case::padded(" gearman2:4731\n", "gearman2", 4731, "gearman2:4731")]
    #[case::ipv6("[::1]:4730", "::1", 4730, "[::1]:4730")]
    #[case::ipv6_without_port("[::1]", "::1", DEFAULT_PORT, "[::1]:4730")]
    fn parses_endpoints(
        #[case] input: &str,
        #[case] host: &str,
        #[case] port: u16,
        #[case] key: &str,
    ) {
        let endpoint = Endpoint::parse(input).expect("endpoint should parse");
        assert_eq!(endpoint.host(), host);
        assert_eq!(endpoint.port(), port);
        assert_eq!(endpoint.as_str(), key);
        assert_eq!(endpoint.to_string(), key);
    }

    #[rstest]
    #[case::empty("  ", EndpointParseError::Empty)]
    #[case::missing_host(":4730", EndpointParseError::MissingHost)]
    #[case::port_zero("gearman1:0", EndpointParseError::InvalidPort(String::from("0")))]
    #[case::port_overflow("gearman1:70000", EndpointParseError::InvalidPort(String::from("70000")))]
    #[case::port_text("gearman1:http", EndpointParseError::InvalidPort(String::from("http")))]
    #[case::bare_ipv6("::1:4730", EndpointParseError::UnbracketedIpv6)]
    #[case::unclosed("[::1:4730", EndpointParseError::UnclosedBracket)]
    fn rejects_malformed_endpoints(#[case] input: &str, #[case] expected: EndpointParseError) {
        let error = Endpoint::parse(input).expect_err("endpoint should be rejected");
        assert_eq!(error, expected);
    }
}
