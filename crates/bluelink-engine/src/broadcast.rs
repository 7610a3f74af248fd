//! In-process fan-out of freshly-saved events to live SSE subscribers.
//!
//! The event store is the durable source of truth; this registry only
//! carries events from the moment a worker saves them to the moment an SSE
//! handler is listening, so a stream can replay-then-tail without a second
//! trip to postgres for every byte (§4.2).

use bluelink_core::event::{ChannelType, Event};
use bluelink_core::ResourceId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct EventBroadcaster {
    channels: Mutex<HashMap<(ChannelType, ResourceId), broadcast::Sender<Event>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: &Event) {
        let key = (event.channel_type, event.channel_id);
        let mut channels = self.channels.lock().expect("broadcaster mutex poisoned");
        let Some(sender) = channels.get(&key) else {
            return;
        };
        // No subscribers is not an error: most events are published well
        // after the relevant SSE client disconnected.
        let _ = sender.send(event.clone());
        if sender.receiver_count() == 0 {
            channels.remove(&key);
        }
    }

    pub fn subscribe(
        &self,
        channel_type: ChannelType,
        channel_id: ResourceId,
    ) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.lock().expect("broadcaster mutex poisoned");
        channels
            .entry((channel_type, channel_id))
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}
