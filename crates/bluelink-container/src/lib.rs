//! A deterministic blueprint container used by this workspace's own tests.
//!
//! The real blueprint-loader subsystem (blueprint evaluation, diffing,
//! provider calls) lives outside this core, the same way `buildit-executor`
//! sat outside `buildit-core` behind the `Executor` trait. This crate
//! ships the collaborator-side test double instead: a scripted container
//! that replays a fixed sequence of messages, mirroring the
//! `MockExecutor` pattern the scheduler's own tests use.

pub mod mock;

pub use mock::{MockBlueprintContainer, MockBlueprintContainerLoader};
