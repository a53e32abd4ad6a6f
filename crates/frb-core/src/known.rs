use std::collections::HashSet;

use tokio::sync::RwLock;

/// Guids already seen. Grows monotonically within a process lifetime;
/// seeded from the persisted snapshot at startup so restarts do not
/// re-notify historical entries.
#[derive(Debug, Default)]
pub struct KnownEntries {
    inner: RwLock<HashSet<String>>,
}

impl KnownEntries {
    pub fn seeded(guids: impl IntoIterator<Item = String>) -> Self {
        Self {
            inner: RwLock::new(guids.into_iter().collect()),
        }
    }

    /// Mark a guid known. Returns true only the first time it is seen;
    /// a guid that is already known is never re-enqueued for notification.
    pub async fn insert(&self, guid: String) -> bool {
        self.inner.write().await.insert(guid)
    }

    pub async fn contains(&self, guid: &str) -> bool {
        self.inner.read().await.contains(guid)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Point-in-time copy for snapshot persistence.
    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_reports_new_only_once() {
        let known = KnownEntries::default();
        assert!(known.insert("a".to_string()).await);
        assert!(!known.insert("a".to_string()).await);
        assert_eq!(known.len().await, 1);
    }

    #[tokio::test]
    async fn seeding_marks_entries_known() {
        let known = KnownEntries::seeded(["a".to_string(), "b".to_string()]);
        assert!(known.contains("a").await);
        assert!(!known.insert("b".to_string()).await);
        assert!(known.insert("c".to_string()).await);
        assert_eq!(known.len().await, 3);
    }
}
