//! Persistence of the per-target known state.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use threadwatch_common::{StateMap, WatchError};

/// Load/save the whole state map. Saves replace the previous contents.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<StateMap, WatchError>;
    async fn save(&self, state: &StateMap) -> Result<(), WatchError>;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Single JSON file: `{ "<targetId>": { "knownIdentities": [...], "lastCount": n } }`.
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a crash mid-write leaves the previous file intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_state(path: &Path) -> Result<StateMap, WatchError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateMap::new()),
        Err(e) => {
            return Err(WatchError::Persistence(format!(
                "read {}: {e}",
                path.display()
            )))
        }
    };
    if raw.trim().is_empty() {
        return Ok(StateMap::new());
    }
    serde_json::from_str(&raw)
        .map_err(|e| WatchError::Persistence(format!("parse {}: {e}", path.display())))
}

fn write_state(path: &Path, body: &[u8]) -> Result<(), WatchError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let fail = |what: &str, e: &dyn std::fmt::Display| {
        WatchError::Persistence(format!("{what} {}: {e}", path.display()))
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| fail("create temp for", &e))?;
    tmp.write_all(body).map_err(|e| fail("write", &e))?;
    tmp.as_file().sync_all().map_err(|e| fail("sync", &e))?;
    tmp.persist(path).map_err(|e| fail("rename into", &e.error))?;
    Ok(())
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<StateMap, WatchError> {
        let path = self.path.clone();
        let state = tokio::task::spawn_blocking(move || read_state(&path))
            .await
            .map_err(|e| WatchError::Persistence(format!("load task: {e}")))??;
        info!(
            path = %self.path.display(),
            targets = state.len(),
            "Loaded known state"
        );
        Ok(state)
    }

    async fn save(&self, state: &StateMap) -> Result<(), WatchError> {
        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| WatchError::Persistence(format!("serialize state: {e}")))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_state(&path, &body))
            .await
            .map_err(|e| WatchError::Persistence(format!("save task: {e}")))??;
        debug!(path = %self.path.display(), targets = state.len(), "Saved known state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadwatch_common::KnownState;

    fn sample() -> StateMap {
        let mut map = StateMap::new();
        map.insert(
            "post-1".into(),
            KnownState {
                known_identities: ["11", "12"].into_iter().map(String::from).collect(),
                last_count: Some(2),
            },
        );
        map.insert("post-2".into(), KnownState::default());
        map
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn file_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        JsonFileStore::new(&path).save(&sample()).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"knownIdentities\""));
        assert!(raw.contains("\"lastCount\": 2"));
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        store.save(&sample()).await.unwrap();
        store.save(&StateMap::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
        // only the state file remains, no temp leftovers
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, WatchError::Persistence(_)));
    }
}
