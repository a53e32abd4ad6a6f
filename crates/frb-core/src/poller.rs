//! The feed-polling loop: fetch, parse, diff against the known set,
//! persist, hand new entries to the notification pipeline.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::SessionManager,
    domain::FeedEntry,
    feed,
    known::KnownEntries,
    registry::SubscriberRegistry,
    state::StateStore,
    Result,
};

pub struct FeedPoller {
    session: Arc<SessionManager>,
    known: Arc<KnownEntries>,
    registry: Arc<SubscriberRegistry>,
    store: Arc<StateStore>,
    intake: mpsc::Sender<FeedEntry>,
    feed_url: String,
    interval: Duration,
}

impl FeedPoller {
    pub fn new(
        session: Arc<SessionManager>,
        known: Arc<KnownEntries>,
        registry: Arc<SubscriberRegistry>,
        store: Arc<StateStore>,
        intake: mpsc::Sender<FeedEntry>,
        feed_url: String,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            known,
            registry,
            store,
            intake,
            feed_url,
            interval,
        }
    }

    /// Fixed-interval polling loop. The first cycle runs immediately so a
    /// long interval does not delay the first check; a failed cycle is
    /// logged and the next tick is the retry.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if let Err(e) = self.check_feed().await {
                        tracing::warn!(error = %e, "feed check failed");
                    }
                }
            }
        }
    }

    /// One polling cycle. Returns the number of newly discovered entries.
    ///
    /// New guids are marked known and persisted BEFORE enqueueing, so a
    /// crash between the two can lose a notification but can never
    /// re-notify the entry after restart. A fetch or parse failure aborts
    /// the cycle with no state mutation.
    pub async fn check_feed(&self) -> Result<usize> {
        let resp = self.session.get_ok(&self.feed_url).await?;
        let bytes = resp.bytes().await?;
        let entries = feed::parse(&bytes)?;
        tracing::debug!(entries = entries.len(), "fetched feed");

        let mut fresh = Vec::new();
        for entry in entries {
            if self.known.insert(entry.guid.clone()).await {
                fresh.push(entry);
            }
        }

        self.store.set_last_check_now().await;
        if let Err(e) = self.store.snapshot(&self.known, &self.registry).await {
            tracing::warn!(error = %e, "failed to save state");
        }

        if !fresh.is_empty() {
            tracing::info!(count = fresh.len(), "found new entries");
        }

        let count = fresh.len();
        for entry in fresh {
            match self.intake.try_send(entry) {
                Ok(()) => {}
                Err(TrySendError::Full(entry)) => {
                    tracing::warn!(title = %entry.title, "notification queue full, dropping entry");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("notification queue closed, discarding remaining entries");
                    break;
                }
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use crate::state::PersistedState;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><guid>g2</guid><title>Two</title><link>https://example.org/2</link></item>
  <item><guid>g1</guid><title>One</title><link>https://example.org/1</link></item>
</channel></rss>"#;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("frb-poller-{tag}-{}.json", std::process::id()))
    }

    fn make_poller(
        server_uri: &str,
        state_path: PathBuf,
        capacity: usize,
    ) -> (FeedPoller, mpsc::Receiver<FeedEntry>, Arc<StateStore>) {
        let session = Arc::new(
            SessionManager::new(AuthMethod::Basic, None, "/user/login".to_string(), None, None)
                .unwrap(),
        );
        let (store, state) = StateStore::open(state_path).unwrap();
        let store = Arc::new(store);
        let known = Arc::new(KnownEntries::seeded(state.known_entries));
        let registry = Arc::new(SubscriberRegistry::default());
        let (tx, rx) = mpsc::channel(capacity);

        let poller = FeedPoller::new(
            session,
            known,
            registry,
            store.clone(),
            tx,
            format!("{server_uri}/feed.xml"),
            Duration::from_secs(3600),
        );
        (poller, rx, store)
    }

    #[tokio::test]
    async fn repeated_cycles_never_reenqueue_known_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let state_path = scratch_path("dedup");
        let _ = std::fs::remove_file(&state_path);
        let (poller, mut rx, _store) = make_poller(&server.uri(), state_path.clone(), 10);

        assert_eq!(poller.check_feed().await.unwrap(), 2);
        assert_eq!(poller.check_feed().await.unwrap(), 0);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        let _ = std::fs::remove_file(&state_path);
    }

    #[tokio::test]
    async fn known_marking_survives_restart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let state_path = scratch_path("restart");
        let _ = std::fs::remove_file(&state_path);

        {
            let (poller, _rx, _store) = make_poller(&server.uri(), state_path.clone(), 10);
            assert_eq!(poller.check_feed().await.unwrap(), 2);
        }

        // Fresh poller over the same state file: nothing is new anymore.
        let (poller, mut rx, _store) = make_poller(&server.uri(), state_path.clone(), 10);
        assert_eq!(poller.check_feed().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
        let _ = std::fs::remove_file(&state_path);
    }

    #[tokio::test]
    async fn failed_fetch_mutates_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let state_path = scratch_path("failure");
        let _ = std::fs::remove_file(&state_path);
        let (poller, mut rx, _store) = make_poller(&server.uri(), state_path.clone(), 10);

        assert!(poller.check_feed().await.is_err());
        assert!(rx.try_recv().is_err());
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn saturated_intake_drops_entries_but_keeps_them_known() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let state_path = scratch_path("saturated");
        let _ = std::fs::remove_file(&state_path);
        let (poller, mut rx, _store) = make_poller(&server.uri(), state_path.clone(), 1);

        assert_eq!(poller.check_feed().await.unwrap(), 2);

        // Only one fit in the queue; the dropped one is not retried.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(poller.check_feed().await.unwrap(), 0);
        let _ = std::fs::remove_file(&state_path);
    }

    #[tokio::test]
    async fn cycle_persists_known_set_and_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let state_path = scratch_path("persist");
        let _ = std::fs::remove_file(&state_path);
        let (poller, _rx, _store) = make_poller(&server.uri(), state_path.clone(), 10);

        poller.check_feed().await.unwrap();

        let saved: PersistedState =
            serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
        let mut known = saved.known_entries.clone();
        known.sort();
        assert_eq!(known, vec!["g1".to_string(), "g2".to_string()]);
        assert!(!saved.last_check_time.is_empty());
        let _ = std::fs::remove_file(&state_path);
    }
}
