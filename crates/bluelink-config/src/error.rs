//! Configuration and request-validation errors.

use bluelink_core::error::{ConfigDiagnostic, ValidationDiagnostic};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("request validation failed")]
    Validation(Vec<ValidationDiagnostic>),

    #[error("plugin config invalid")]
    PluginConfig(Vec<ConfigDiagnostic>),

    #[error("unresolvable blueprint source: {0}")]
    UnresolvableSource(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for bluelink_core::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(diags) => bluelink_core::Error::ValidationFailed(diags),
            ConfigError::PluginConfig(diags) => bluelink_core::Error::PluginConfigInvalid(diags),
            ConfigError::UnresolvableSource(msg) => bluelink_core::Error::BadRequest(msg),
        }
    }
}
