use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Keyed, read-once storage. `take` hands the value over and deletes it, so
/// each handoff is consumed by exactly one reader.
#[async_trait]
pub trait HandoffSlot: Send + Sync {
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    async fn take(&self, key: &str) -> Result<Option<Value>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    saved_at: DateTime<Utc>,
    value: Value,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            saved_at: Utc::now(),
            value,
        }
    }

    fn into_live(self, ttl: Duration) -> Option<Value> {
        let ttl = chrono::Duration::from_std(ttl).ok()?;
        (self.saved_at + ttl >= Utc::now()).then_some(self.value)
    }
}

/// Handoff that lives as long as the process.
pub struct MemoryHandoff {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryHandoff {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl HandoffSlot for MemoryHandoff {
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), Entry::new(value));
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        let entry = self.entries.lock().remove(key);
        Ok(entry.and_then(|e| e.into_live(self.ttl)))
    }
}

/// Handoff that survives a restart: one JSON file per key.
pub struct FileHandoff {
    dir: PathBuf,
    ttl: Duration,
}

impl FileHandoff {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl HandoffSlot for FileHandoff {
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let data = serde_json::to_vec(&Entry::new(value))?;
        tokio::fs::write(self.path_for(key), data).await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        tokio::fs::remove_file(&path).await?;

        match serde_json::from_slice::<Entry>(&data) {
            Ok(entry) => Ok(entry.into_live(self.ttl)),
            Err(e) => {
                debug!("discarding unreadable handoff {}: {e}", path.display());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_take_is_read_once() {
        let slot = MemoryHandoff::new(Duration::from_secs(60));
        slot.put("text-to-video", json!({"prompt": "a comet"})).await.unwrap();

        assert_eq!(slot.take("text-to-video").await.unwrap(), Some(json!({"prompt": "a comet"})));
        assert_eq!(slot.take("text-to-video").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let slot = MemoryHandoff::new(Duration::ZERO);
        slot.entries.lock().insert(
            "k".into(),
            Entry {
                saved_at: Utc::now() - chrono::Duration::seconds(5),
                value: json!(1),
            },
        );
        assert_eq!(slot.take("k").await.unwrap(), None);
        assert!(slot.entries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_file_handoff_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileHandoff::new(dir.path(), Duration::from_secs(60))
            .put("image-to-video", json!({"destination": "reels"}))
            .await
            .unwrap();

        let reopened = FileHandoff::new(dir.path(), Duration::from_secs(60));
        assert_eq!(
            reopened.take("image-to-video").await.unwrap(),
            Some(json!({"destination": "reels"}))
        );
        assert_eq!(reopened.take("image-to-video").await.unwrap(), None);
        assert!(!dir.path().join("image-to-video.json").exists());
    }

    #[test]
    fn test_keys_are_sanitized() {
        let slot = FileHandoff::new("/tmp/h", Duration::from_secs(1));
        assert_eq!(slot.path_for("../etc/passwd"), PathBuf::from("/tmp/h/___etc_passwd.json"));
    }
}
