//! Resource and event identifiers.
//!
//! Both are backed by UUIDv7 so that identifiers generated later sort after
//! ones generated earlier — the property the event log's replay cursor
//! depends on.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for an instance, changeset, reconciliation result or
/// cleanup operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ResourceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ResourceId> for Uuid {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An event log entry identifier. Strictly k-sortable: events for a channel
/// MUST be consumed in increasing `EventId` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct EventId(Uuid);

impl EventId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EventId> for Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl std::str::FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Generates event ids. The default implementation MUST be k-sortable.
pub trait EventIdGenerator: Send + Sync {
    fn next_id(&self) -> EventId;
}

/// UUIDv7-backed generator; the default used everywhere in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7EventIdGenerator;

impl EventIdGenerator for UuidV7EventIdGenerator {
    fn next_id(&self) -> EventId {
        EventId::from_uuid(Uuid::now_v7())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_monotonic() {
        let generator = UuidV7EventIdGenerator;
        let a = generator.next_id();
        let b = generator.next_id();
        assert!(a <= b);
    }
}
