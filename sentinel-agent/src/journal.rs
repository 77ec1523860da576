//! Append-only, file-backed offline action log, drained on reconnect.
//!
//! The journal is informational, not transactional — at-most-once delivery on reconnect is
//! acceptable, so a failed post-send clear is logged rather than retried.

use std::path::PathBuf;

use sentinel_core::JournalEntry;
use tokio::sync::Mutex;
use tracing::warn;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
    Json(#[from] serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct OfflineJournal {
    path: PathBuf,
    entries: Mutex<Vec<JournalEntry>>,
}

impl OfflineJournal {
    /// Loads from `path`; a missing or empty file means "no entries", not an error.
    pub fn load(path: PathBuf) -> Result<Self, Error> {
        let entries = match fsutil::read_optional(&path)? {
            None => Vec::new(),
            Some(data) if data.is_empty() => Vec::new(),
            Some(data) => serde_json::from_slice(&data)?,
        };
        Ok(OfflineJournal {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Appends `entry`, then rewrites the whole file.
    pub async fn add(&self, entry: JournalEntry) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
        let data = serde_json::to_vec_pretty(&*entries)?;
        fsutil::write_atomic(&self.path, &data)?;
        Ok(())
    }

    /// Empties the in-memory slice and deletes the file.
    pub async fn clear(&self) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        fsutil::remove_if_present(&self.path)?;
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Sends the current entries (via `send`) then clears; a clear failure after a
    /// successful send is logged but non-fatal.
    pub async fn drain<F, Fut>(&self, send: F) -> Result<(), Error>
    where
        F: FnOnce(Vec<JournalEntry>) -> Fut,
        Fut: std::future::Future<Output = Result<(), Error>>,
    {
        let entries = self.snapshot().await;
        if entries.is_empty() {
            return Ok(());
        }
        send(entries).await?;
        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to clear offline journal after drain");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_journal.json");
        let journal = OfflineJournal::load(path).unwrap();
        assert!(journal.is_empty().await);
    }

    #[tokio::test]
    async fn add_then_clear_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_journal.json");
        let journal = OfflineJournal::load(path.clone()).unwrap();

        journal.add(JournalEntry::new("update", "web")).await.unwrap();
        assert_eq!(journal.snapshot().await.len(), 1);
        assert!(path.exists());

        journal.clear().await.unwrap();
        assert!(journal.is_empty().await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn reload_after_restart_sees_persisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_journal.json");
        {
            let journal = OfflineJournal::load(path.clone()).unwrap();
            journal.add(JournalEntry::new("pull", "db")).await.unwrap();
        }
        let reloaded = OfflineJournal::load(path).unwrap();
        assert_eq!(reloaded.snapshot().await.len(), 1);
    }
}
