//! Error types for Bluelink.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDiagnostic {
    pub location: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A plugin-config diagnostic, carrying a source position when available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDiagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed")]
    ValidationFailed(Vec<ValidationDiagnostic>),

    #[error("plugin config invalid")]
    PluginConfigInvalid(Vec<ConfigDiagnostic>),

    #[error("drift blocked")]
    DriftBlocked,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization error: {err}"))
    }
}
