//! Delayed notification fan-out.
//!
//! A bounded intake queue decouples the poller from delivery. Every entry
//! taken off the queue gets its own spawned delay task, so the delay
//! window is measured from that entry's discovery time; entries found in
//! the same or different cycles never stagger each other.
//!
//! Pending notifications exist only in memory. An entry still inside its
//! delay window when the process exits is dropped for good: it was marked
//! known at discovery, so it will not be rediscovered either.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{FeedEntry, Notification},
    ports::{Enricher, Notifier},
    registry::SubscriberRegistry,
};

#[derive(Clone)]
pub struct NotificationPipeline {
    registry: Arc<SubscriberRegistry>,
    enricher: Arc<dyn Enricher>,
    notifier: Arc<dyn Notifier>,
    delay: Duration,
}

impl NotificationPipeline {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        enricher: Arc<dyn Enricher>,
        notifier: Arc<dyn Notifier>,
        delay: Duration,
    ) -> Self {
        Self {
            registry,
            enricher,
            notifier,
            delay,
        }
    }

    /// Intake dispatcher: one short-lived delay task per entry.
    pub async fn run(self, mut intake: mpsc::Receiver<FeedEntry>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                entry = intake.recv() => {
                    let Some(entry) = entry else { break };
                    let pipeline = self.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        pipeline.deliver_after_delay(entry, cancel).await;
                    });
                }
            }
        }
    }

    async fn deliver_after_delay(&self, entry: FeedEntry, cancel: CancellationToken) {
        tokio::time::sleep(self.delay).await;
        if cancel.is_cancelled() {
            return;
        }

        let image_url = match self.enricher.lead_image_for(&entry.link).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, link = %entry.link, "enrichment failed, sending plain notification");
                None
            }
        };

        let subscribers = self.registry.all().await;
        if subscribers.is_empty() {
            tracing::info!(title = %entry.title, "no subscribers registered, skipping notification");
            return;
        }

        tracing::info!(
            title = %entry.title,
            subscribers = subscribers.len(),
            "sending new entry notification"
        );
        let notification = Notification::from_entry(&entry, image_url);
        for destination in subscribers {
            if let Err(e) = self.notifier.deliver(destination, &notification).await {
                tracing::warn!(chat_id = destination.0, error = %e, "delivery failed");
            }
        }
    }
}
