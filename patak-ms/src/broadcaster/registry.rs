//! Connection registry for live subscribers
//!
//! Each subscriber owns a bounded channel. Delivery never waits: a subscriber
//! whose buffer is full or whose receiver is gone is removed on the spot.

use patak_common::events::MeterEvent;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use uuid::Uuid;

pub struct ConnectionRegistry {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<MeterEvent>>>,
    buffer: usize,
}

impl ConnectionRegistry {
    /// Registry whose subscribers buffer at most `buffer` events
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber
    pub fn add(&self) -> (Uuid, mpsc::Receiver<MeterEvent>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let mut subscribers = self.lock();
        subscribers.insert(id, tx);
        debug!("Subscriber {} connected, total subscribers: {}", id, subscribers.len());
        (id, rx)
    }

    /// Remove a subscriber; returns false when it was already gone
    pub fn remove(&self, id: Uuid) -> bool {
        let mut subscribers = self.lock();
        let removed = subscribers.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} disconnected, total subscribers: {}", id, subscribers.len());
        }
        removed
    }

    /// Deliver an event to every subscriber, dropping stale ones
    ///
    /// Returns the number of subscribers that received the event.
    pub fn broadcast(&self, event: &MeterEvent) -> usize {
        let mut subscribers = self.lock();
        let mut stale = Vec::new();

        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Stale subscriber {}: buffer full, dropping", id);
                    stale.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Stale subscriber {}: connection closed, dropping", id);
                    stale.push(*id);
                }
            }
        }

        for id in &stale {
            subscribers.remove(id);
        }
        subscribers.len()
    }

    /// Drop every subscriber, ending their streams
    pub fn clear(&self) -> usize {
        let mut subscribers = self.lock();
        let count = subscribers.len();
        subscribers.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<MeterEvent>>> {
        // A panic while holding the lock leaves the map itself intact
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
