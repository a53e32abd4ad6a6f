use async_trait::async_trait;

use crate::{
    domain::{ChatId, Notification},
    Result,
};

/// Outbound delivery port. Telegram is the first implementation; the core
/// only ever offers a notification to a destination and logs failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, destination: ChatId, notification: &Notification) -> Result<()>;
}

/// Content-enrichment port: given an entry link, produce the lead image
/// URL for the notification, if the page has one.
///
/// Failures here never cancel a delivery; the pipeline falls back to a
/// plain text notification.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn lead_image_for(&self, link: &str) -> Result<Option<String>>;
}
