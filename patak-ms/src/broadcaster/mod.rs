//! Real-time broadcaster
//!
//! Fans accepted readings out to live dashboard subscribers and keeps the
//! live log trimmed to the retention window.

pub mod registry;

pub use registry::ConnectionRegistry;

use axum::response::sse::Event;
use chrono::Duration as ChronoDuration;
use futures::stream::Stream;
use patak_common::config::LiveConfig;
use patak_common::events::MeterEvent;
use patak_common::models::Reading;
use patak_common::sse::to_sse_event;
use patak_common::{time, Result};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::projector::SummaryProjector;
use crate::store::MeterStore;

pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    store: Arc<MeterStore>,
    projector: SummaryProjector,
    live: LiveConfig,
}

/// Removes its subscriber when the SSE stream is dropped
struct SubscriberGuard {
    id: Uuid,
    registry: Arc<ConnectionRegistry>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl Broadcaster {
    pub fn new(store: Arc<MeterStore>, live: LiveConfig) -> Self {
        info!(
            "Broadcaster initialized: subscriber buffer {}, retention {}s",
            live.subscriber_buffer, live.retention_secs
        );
        Self {
            registry: Arc::new(ConnectionRegistry::new(live.subscriber_buffer)),
            store,
            projector: SummaryProjector::new(live.online_window_secs),
            live,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Open a subscription as a stream of SSE frames
    ///
    /// The first frame is always a `summary` snapshot. The subscriber is
    /// registered before the snapshot is taken, so nothing published in
    /// between is missed.
    pub fn subscribe(self: &Arc<Self>) -> impl Stream<Item = std::result::Result<Event, Infallible>> + Send + 'static {
        let (id, mut rx) = self.registry.add();
        let guard = SubscriberGuard {
            id,
            registry: Arc::clone(&self.registry),
        };
        let this = Arc::clone(self);

        async_stream::stream! {
            let _guard = guard;

            if let Some(frame) = this.summary_event().await.as_ref().and_then(to_sse_event) {
                yield Ok(frame);
            }
            drop(this);

            while let Some(event) = rx.recv().await {
                if let Some(frame) = to_sse_event(&event) {
                    yield Ok(frame);
                }
            }
        }
    }

    /// Push `reading` and then the refreshed summary to every subscriber
    pub async fn publish(&self, reading: &Reading) {
        if self.registry.is_empty() {
            return;
        }

        let delivered = self.registry.broadcast(&MeterEvent::Reading(reading.clone()));
        if let Some(summary) = self.summary_event().await {
            self.registry.broadcast(&summary);
        }
        debug!("Published reading for {} to {} subscribers", reading.house, delivered);
    }

    /// Close every open subscription so graceful shutdown can complete
    pub fn disconnect_all(&self) {
        let closed = self.registry.clear();
        if closed > 0 {
            info!("Closed {} live subscriptions", closed);
        }
    }

    /// Evict live readings older than the retention window
    pub async fn sweep(&self) -> Result<usize> {
        let cutoff = time::now() - ChronoDuration::seconds(self.live.retention_secs as i64);
        let removed = self.store.evict_older_than(cutoff).await?;
        if removed > 0 {
            debug!("Swept {} expired live readings", removed);
        }
        Ok(removed)
    }

    /// Run [`Broadcaster::sweep`] on the configured interval until aborted
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let period = Duration::from_secs(self.live.sweep_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = this.sweep().await {
                    warn!("Live log sweep failed: {}", e);
                }
            }
        })
    }

    async fn summary_event(&self) -> Option<MeterEvent> {
        let projection = self
            .projector
            .project(&self.store.summary_snapshot().await, time::now());
        match serde_json::to_value(projection) {
            Ok(value) => Some(MeterEvent::Summary(value)),
            Err(e) => {
                warn!("Failed to serialize summary projection: {}", e);
                None
            }
        }
    }
}
