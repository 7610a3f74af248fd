//! Core domain types and traits for the Bluelink deployment orchestration core.
//!
//! This crate contains:
//! - Resource/event identifiers
//! - Instance, changeset, reconciliation and cleanup record types
//! - The event log's wire types
//! - Traits for the collaborators the core drives but does not implement
//!   (blueprint container/loader, state store conflict detection, clock,
//!   id generation)

pub mod changeset;
pub mod cleanup;
pub mod clock;
pub mod container;
pub mod error;
pub mod event;
pub mod id;
pub mod instance;
pub mod reconciliation;

pub use error::{Error, Result};
pub use id::ResourceId;
