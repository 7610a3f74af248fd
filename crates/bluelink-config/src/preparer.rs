//! Plugin-config preparation: turns the caller-supplied provider/transformer
//! config payload in a request into a validated effective config, carrying
//! source positions on failure (§4.1, §6.4).

use async_trait::async_trait;
use bluelink_core::error::{ConfigDiagnostic, DiagnosticLevel};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ConfigError;

/// The validated, merged plugin configuration handed to the blueprint
/// container for this operation.
#[derive(Debug, Clone, Default)]
pub struct EffectivePluginConfig {
    pub values: HashMap<String, Value>,
}

#[async_trait]
pub trait PluginConfigPreparer: Send + Sync {
    async fn prepare(&self, raw: &Value) -> Result<EffectivePluginConfig, ConfigError>;
}

/// Default preparer: the raw payload must be a JSON object; each top-level
/// key becomes a plugin config entry. Unknown shapes are reported with a
/// source-position-free diagnostic (no parser producing positions is in
/// scope for this core — that lives in the plugin framework).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPluginConfigPreparer;

#[async_trait]
impl PluginConfigPreparer for DefaultPluginConfigPreparer {
    async fn prepare(&self, raw: &Value) -> Result<EffectivePluginConfig, ConfigError> {
        match raw {
            Value::Null => Ok(EffectivePluginConfig::default()),
            Value::Object(map) => Ok(EffectivePluginConfig {
                values: map.clone().into_iter().collect(),
            }),
            other => Err(ConfigError::PluginConfig(vec![ConfigDiagnostic {
                level: DiagnosticLevel::Error,
                message: format!(
                    "plugin config must be a JSON object, got {}",
                    value_kind(other)
                ),
                range: None,
            }])),
        }
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_object_payload() {
        let preparer = DefaultPluginConfigPreparer;
        let cfg = preparer
            .prepare(&serde_json::json!({"region": "us-east-1"}))
            .await
            .unwrap();
        assert_eq!(cfg.values.get("region").unwrap(), "us-east-1");
    }

    #[tokio::test]
    async fn rejects_non_object_payload() {
        let preparer = DefaultPluginConfigPreparer;
        let err = preparer.prepare(&serde_json::json!("oops")).await.unwrap_err();
        assert!(matches!(err, ConfigError::PluginConfig(_)));
    }
}
