use chrono::{DateTime, Utc};

/// Telegram chat id (numeric). Opaque to the core: it is only ever stored,
/// compared, and handed back to the delivery port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One feed item. Identity is the guid; everything else is payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedEntry {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// What the delivery port receives: an entry after its delay window,
/// possibly enriched with a lead image.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
}

impl Notification {
    pub fn from_entry(entry: &FeedEntry, image_url: Option<String>) -> Self {
        Self {
            title: entry.title.clone(),
            link: entry.link.clone(),
            image_url,
        }
    }
}
