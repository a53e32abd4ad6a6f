use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::domain::ChatId;

/// Concurrent set of notification destinations.
///
/// Written by the inbound-update handlers (chat discovery), read by the
/// notification pipeline. There is no unsubscribe path: once discovered,
/// a chat stays registered until the operator edits the state file.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    inner: RwLock<HashSet<ChatId>>,
}

impl SubscriberRegistry {
    pub fn seeded(chats: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            inner: RwLock::new(chats.into_iter().collect()),
        }
    }

    /// Idempotent registration. Returns true only for a genuinely new
    /// destination; callers persist the state snapshot on true.
    pub async fn register(&self, chat: ChatId) -> bool {
        self.inner.write().await.insert(chat)
    }

    pub async fn contains(&self, chat: ChatId) -> bool {
        self.inner.read().await.contains(&chat)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Point-in-time copy; registrations made after this call returns are
    /// not reflected in it.
    pub async fn all(&self) -> Vec<ChatId> {
        self.inner.read().await.iter().copied().collect()
    }
}
