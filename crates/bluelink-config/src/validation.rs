//! Small request validation helpers shared across route handlers.

use bluelink_core::error::ValidationDiagnostic;

use crate::error::ConfigError;

#[derive(Default)]
pub struct Validator {
    diagnostics: Vec<ValidationDiagnostic>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_non_empty(&mut self, location: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.diagnostics.push(ValidationDiagnostic {
                location: location.to_string(),
                message: format!("{location} must not be empty"),
                kind: "missing_field".to_string(),
            });
        }
        self
    }

    pub fn require_some<T>(&mut self, location: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.diagnostics.push(ValidationDiagnostic {
                location: location.to_string(),
                message: format!("{location} is required"),
                kind: "missing_field".to_string(),
            });
        }
        self
    }

    pub fn reject(&mut self, location: &str, message: impl Into<String>, kind: &str) -> &mut Self {
        self.diagnostics.push(ValidationDiagnostic {
            location: location.to_string(),
            message: message.into(),
            kind: kind.to_string(),
        });
        self
    }

    pub fn finish(self) -> Result<(), ConfigError> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(self.diagnostics))
        }
    }
}
