use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::sleep,
};

use crate::{
    domain::{StoreChange, StoreKey, StoreSnapshot},
    infrastructure::shutdown::ShutdownListener,
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreRecord {
    #[serde(default)]
    preferences_text: String,
    #[serde(default)]
    blocked_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Key-value store shared with the settings UI, optionally backed by a JSON file.
pub struct PersistedStore {
    path: Option<PathBuf>,
    record: Mutex<StoreRecord>,
    changes: broadcast::Sender<StoreChange>,
    write_lock: tokio::sync::Mutex<()>,
}

impl PersistedStore {
    pub fn in_memory() -> Self {
        Self::with_record(None, StoreRecord::default())
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let record = read_record(path).await?.unwrap_or_default();
        tracing::info!(
            target: "store",
            path = %path.display(),
            blocked = record.blocked_count,
            has_preferences = !record.preferences_text.is_empty(),
            "store opened"
        );
        Ok(Self::with_record(Some(path.to_path_buf()), record))
    }

    fn with_record(path: Option<PathBuf>, record: StoreRecord) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            record: Mutex::new(record),
            changes,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let record = self.record.lock();
        StoreSnapshot {
            preferences: record.preferences_text.clone(),
            blocked_count: record.blocked_count,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub async fn blocked_count(&self) -> u64 {
        self.record.lock().blocked_count
    }

    pub async fn set_preferences(&self, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let change = {
            let mut record = self.record.lock();
            if record.preferences_text == text {
                None
            } else {
                let old = std::mem::replace(&mut record.preferences_text, text.to_string());
                record.updated_at = Some(Utc::now());
                Some(StoreChange {
                    key: StoreKey::PreferencesText,
                    old_value: json!(old),
                    new_value: json!(text),
                })
            }
        };
        self.commit(change).await
    }

    pub async fn set_blocked_count(&self, count: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let change = {
            let mut record = self.record.lock();
            if record.blocked_count == count {
                None
            } else {
                let old = std::mem::replace(&mut record.blocked_count, count);
                record.updated_at = Some(Utc::now());
                Some(StoreChange {
                    key: StoreKey::BlockedCount,
                    old_value: json!(old),
                    new_value: json!(count),
                })
            }
        };
        self.commit(change).await
    }

    /// Picks up edits made to the backing file by another writer.
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let Some(fresh) = read_record(path).await? else {
            return Ok(());
        };

        let changes = {
            let mut record = self.record.lock();
            let mut changes = Vec::new();
            if record.preferences_text != fresh.preferences_text {
                changes.push(StoreChange {
                    key: StoreKey::PreferencesText,
                    old_value: json!(record.preferences_text),
                    new_value: json!(fresh.preferences_text),
                });
            }
            if record.blocked_count != fresh.blocked_count {
                changes.push(StoreChange {
                    key: StoreKey::BlockedCount,
                    old_value: json!(record.blocked_count),
                    new_value: json!(fresh.blocked_count),
                });
            }
            *record = fresh;
            changes
        };

        for change in changes {
            tracing::debug!(target: "store", key = change.key.as_str(), "external store change");
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    pub fn spawn_watch(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.notified() => break,
                }
                if let Err(err) = self.reload().await {
                    tracing::warn!(target: "store", error = %err, "store reload failed");
                }
            }
        })
    }

    /// Callers hold `write_lock`, so the file never lags memory while a reload reads it.
    async fn commit(&self, change: Option<StoreChange>) -> Result<()> {
        let Some(change) = change else {
            return Ok(());
        };
        let _ = self.changes.send(change);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(&*self.record.lock())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

async fn read_record(path: &Path) -> Result<Option<StoreRecord>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(Some(StoreRecord::default())),
        Ok(bytes) => {
            let record = serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse store file {}", path.display()))?;
            Ok(Some(record))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
