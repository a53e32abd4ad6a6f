use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{known::KnownEntries, registry::SubscriberRegistry, Result};

/// Durable snapshot of everything the bot must remember across restarts.
/// Written as one JSON document, full overwrite, after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub known_entries: Vec<String>,
    #[serde(default)]
    pub last_check_time: String,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

/// Owner of the state file and the last-check timestamp.
///
/// A missing file yields an empty default state; a file that exists but
/// cannot be parsed is a fatal startup error, since silently starting
/// over would re-notify the entire feed history.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    last_check: Mutex<String>,
}

impl StateStore {
    /// Load (or default) the snapshot and build the store around it.
    pub fn open(path: PathBuf) -> Result<(Self, PersistedState)> {
        let state = load_state(&path)?;
        let store = Self {
            last_check: Mutex::new(state.last_check_time.clone()),
            path,
        };
        Ok((store, state))
    }

    pub async fn set_last_check_now(&self) -> String {
        let ts = Utc::now().to_rfc3339();
        *self.last_check.lock().await = ts.clone();
        ts
    }

    pub async fn last_check(&self) -> String {
        self.last_check.lock().await.clone()
    }

    /// Full-overwrite save of an assembled snapshot.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        save_state(&self.path, state)
    }

    /// Assemble the complete current snapshot and save it. The two set
    /// locks are taken one after the other, never together.
    pub async fn snapshot(
        &self,
        known: &KnownEntries,
        subscribers: &SubscriberRegistry,
    ) -> Result<()> {
        let known_entries = known.snapshot().await;
        let chat_ids = subscribers.all().await.into_iter().map(|c| c.0).collect();
        let last_check_time = self.last_check().await;

        self.save(&PersistedState {
            known_entries,
            last_check_time,
            chat_ids,
        })
    }
}

fn load_state(path: &Path) -> Result<PersistedState> {
    let txt = match std::fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PersistedState::default());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(serde_json::from_str(&txt)?)
}

fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    let txt = serde_json::to_string_pretty(state)?;
    std::fs::write(path, txt)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;
    use pretty_assertions::assert_eq;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("frb-state-{tag}-{}.json", std::process::id()))
    }

    #[test]
    fn missing_file_yields_default_state() {
        let path = scratch_path("missing");
        let _ = std::fs::remove_file(&path);

        let (_, state) = StateStore::open(path).unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = scratch_path("malformed");
        std::fs::write(&path, "{not json").unwrap();

        assert!(StateStore::open(path.clone()).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let (store, _) = StateStore::open(path.clone()).unwrap();
        let state = PersistedState {
            known_entries: vec!["a".to_string(), "b".to_string()],
            last_check_time: "2026-08-06T10:00:00+00:00".to_string(),
            chat_ids: vec![-100123, 42],
        };
        store.save(&state).unwrap();

        let (_, loaded) = StateStore::open(path.clone()).unwrap();
        assert_eq!(loaded, state);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn snapshot_captures_sets_and_timestamp() {
        let path = scratch_path("snapshot");
        let _ = std::fs::remove_file(&path);

        let (store, _) = StateStore::open(path.clone()).unwrap();
        let known = KnownEntries::seeded(["g1".to_string()]);
        let subscribers = SubscriberRegistry::seeded([ChatId(5)]);
        let ts = store.set_last_check_now().await;

        store.snapshot(&known, &subscribers).await.unwrap();

        let (_, loaded) = StateStore::open(path.clone()).unwrap();
        assert_eq!(loaded.known_entries, vec!["g1".to_string()]);
        assert_eq!(loaded.chat_ids, vec![5]);
        assert_eq!(loaded.last_check_time, ts);
        let _ = std::fs::remove_file(&path);
    }
}
