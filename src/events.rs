//! In-process fan-out of thread events to realtime subscribers.
//!
//! One broadcast channel per thread, created lazily on first subscribe or
//! publish and dropped again once nobody listens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Events delivered to thread subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadEvent {
    MessageCreated {
        uuid: String,
        author: String,
        content: String,
        created_at: String,
    },
    MessageDeleted {
        uuid: String,
    },
}

/// Registry of per-thread broadcast channels.
#[derive(Clone, Default)]
pub struct EventHub {
    channels: Arc<Mutex<HashMap<i64, broadcast::Sender<ThreadEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events for a thread.
    pub fn subscribe(&self, thread_id: i64) -> broadcast::Receiver<ThreadEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        channels
            .entry(thread_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a thread's subscribers, if any.
    pub fn publish(&self, thread_id: i64, event: ThreadEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(sender) = channels.get(&thread_id) {
            // A send error means every receiver is gone; drop the channel
            if sender.send(event).is_err() {
                channels.remove(&thread_id);
            }
        }
    }

    /// Number of live subscribers for a thread.
    pub fn subscriber_count(&self, thread_id: i64) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        channels
            .get(&thread_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
