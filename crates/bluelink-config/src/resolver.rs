//! Resolves a request's source-blueprint payload into a location URL the
//! blueprint container loader can load.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// The caller-supplied description of where a blueprint lives. Mirrors the
/// shape used by the staging/deploy request payloads (§8, scenario 1):
/// `{ fileSourceScheme: "file", directory: "/test/dir", blueprintFile:
/// "test.blueprint.yaml" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintSourceRequest {
    pub file_source_scheme: String,
    pub directory: String,
    pub blueprint_file: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlueprintResolver;

impl BlueprintResolver {
    /// Resolve a request into the `file://` (or other scheme) location URL
    /// the container loader consumes. A blank `directory` is a no-op: the
    /// blueprint file path is taken as-is, relative to the process cwd.
    pub fn resolve(&self, req: &BlueprintSourceRequest) -> Result<url::Url, ConfigError> {
        if req.blueprint_file.trim().is_empty() {
            return Err(ConfigError::UnresolvableSource(
                "blueprintFile must not be empty".to_string(),
            ));
        }

        let full_path = if req.directory.trim().is_empty() {
            PathBuf::from(&req.blueprint_file)
        } else {
            PathBuf::from(&req.directory).join(&req.blueprint_file)
        };

        let url_str = format!(
            "{}://{}",
            req.file_source_scheme,
            full_path.to_string_lossy()
        );
        url::Url::parse(&url_str)
            .map_err(|e| ConfigError::UnresolvableSource(format!("invalid blueprint location: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_directory_and_file() {
        let resolver = BlueprintResolver;
        let req = BlueprintSourceRequest {
            file_source_scheme: "file".to_string(),
            directory: "/test/dir".to_string(),
            blueprint_file: "test.blueprint.yaml".to_string(),
        };
        let url = resolver.resolve(&req).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("test.blueprint.yaml"));
    }

    #[test]
    fn empty_blueprint_file_is_rejected() {
        let resolver = BlueprintResolver;
        let req = BlueprintSourceRequest {
            file_source_scheme: "file".to_string(),
            directory: "/test/dir".to_string(),
            blueprint_file: String::new(),
        };
        assert!(resolver.resolve(&req).is_err());
    }
}
