use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::sleep};
use url::Url;

use crate::infrastructure::shutdown::ShutdownListener;

use super::document::{FeedDocument, NodeSpec};

/// On-disk page description: `{"url": "...", "body": [NodeSpec, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
}

impl PageSnapshot {
    pub fn parse_url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("invalid snapshot url {}", self.url))
    }
}

pub async fn load_snapshot(path: &Path) -> Result<PageSnapshot> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read page snapshot {}", path.display()))?;
    let snapshot: PageSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse page snapshot {}", path.display()))?;
    Ok(snapshot)
}

pub async fn open_document(path: &Path) -> Result<FeedDocument> {
    let snapshot = load_snapshot(path).await?;
    Ok(FeedDocument::new(snapshot.parse_url()?, &snapshot.body))
}

/// Re-reads the snapshot whenever its modification time changes.
pub fn spawn_reload(
    document: Arc<FeedDocument>,
    path: PathBuf,
    interval: Duration,
    mut shutdown: ShutdownListener,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_modified = modified_at(&path).await;
        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.notified() => break,
            }

            let modified = modified_at(&path).await;
            if modified.is_none() || modified == last_modified {
                continue;
            }
            last_modified = modified;

            match load_snapshot(&path).await.and_then(|s| Ok((s.parse_url()?, s.body))) {
                Ok((url, body)) => {
                    tracing::info!(target: "page", url = %url, items = body.len(), "page snapshot reloaded");
                    document.replace(url, &body);
                }
                Err(err) => {
                    tracing::warn!(target: "page", error = %err, "page snapshot reload failed");
                }
            }
        }
    })
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}
