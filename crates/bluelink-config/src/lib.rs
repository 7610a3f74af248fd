//! Request validation, plugin-config preparation and blueprint source
//! resolution.
//!
//! This crate holds the synchronous phase of the HTTP controller's request
//! flow (§4.1): decode → validate → prepare plugin config → resolve source
//! blueprint, before any record is persisted or worker spawned.

pub mod error;
pub mod preparer;
pub mod resolver;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use preparer::{DefaultPluginConfigPreparer, EffectivePluginConfig, PluginConfigPreparer};
pub use resolver::{BlueprintSourceRequest, BlueprintResolver};
