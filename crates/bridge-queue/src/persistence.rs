use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bridge_model::QueuedMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::stats::QueueStats;

/// On-disk representation of `<persistence_path>/queue.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedQueue {
    pub pending: Vec<QueuedMessage>,
    pub failed: Vec<QueuedMessage>,
    pub stats: QueueStats,
    pub timestamp: DateTime<Utc>,
}

/// Write `data` to `<dir>/queue.json` atomically: serialize to a temp file
/// in the same directory, fsync it, then rename over the target. A reader
/// never observes a partially-written file.
pub fn persist(dir: &Path, data: &PersistedQueue) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join("queue.json");
    let tmp_path = dir.join(format!("queue.json.{}.tmp", std::process::id()));

    let bytes = serde_json::to_vec_pretty(data)?;
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, &target)?;
    info!(pending = data.pending.len(), failed = data.failed.len(), "persisted queue state");
    Ok(())
}

/// Load `<dir>/queue.json` if present. The top-level document must parse as
/// JSON, but `pending`/`failed` entries are decoded one at a time so a
/// single corrupt message only drops that message, not the whole queue.
pub fn load(dir: &Path) -> anyhow::Result<Option<PersistedQueue>> {
    let path = dir.join("queue.json");
    if !path.exists() {
        return Ok(None);
    }
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read persisted queue");
            return Err(err.into());
        }
    };
    let document: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(document) => document,
        Err(err) => {
            error!(error = %err, path = %path.display(), "failed to parse persisted queue; starting empty");
            return Ok(None);
        }
    };

    let pending = decode_messages(document.get("pending"));
    let failed = decode_messages(document.get("failed"));
    let stats = document
        .get("stats")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let timestamp = document
        .get("timestamp")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_else(Utc::now);

    Ok(Some(PersistedQueue { pending, failed, stats, timestamp }))
}

/// Decode a JSON array of messages entry by entry. A malformed entry is
/// skipped and counted rather than failing the whole array.
fn decode_messages(value: Option<&serde_json::Value>) -> Vec<QueuedMessage> {
    let Some(serde_json::Value::Array(entries)) = value else {
        return Vec::new();
    };
    let mut messages = Vec::with_capacity(entries.len());
    let mut skipped = 0u32;
    for entry in entries {
        match serde_json::from_value::<QueuedMessage>(entry.clone()) {
            Ok(message) => messages.push(message),
            Err(err) => {
                skipped += 1;
                warn!(error = %err, "skipping corrupt persisted message entry");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped corrupt persisted message entries");
    }
    messages
}

pub fn default_persistence_path(configured: &str) -> PathBuf {
    PathBuf::from(configured)
}
