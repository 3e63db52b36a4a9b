//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use gearadm_protocol::ConfigurationError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid cluster configuration: {0}")]
    Cluster(#[from] ConfigurationError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to serialise cluster result: {0}")]
    SerialiseResult(serde_json::Error),
    #[error("failed to write cluster result: {0}")]
    EmitResult(io::Error),
}
