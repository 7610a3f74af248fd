//! HTTP control plane for the Bluelink deployment orchestration core.

pub mod error;
pub mod identifiers;
pub mod responses;
pub mod routes;
pub mod sse;
pub mod state;

pub use state::AppState;
