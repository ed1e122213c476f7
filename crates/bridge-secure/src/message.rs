use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decoded inbound delivery on the secure transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureMessage {
    pub id: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl SecureMessage {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        fields: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            destination: destination.into(),
            title: title.into(),
            content: content.into(),
            created_at: Utc::now(),
            fields,
        }
    }
}

fn messages_file(storage_path: &str, name: &str) -> PathBuf {
    Path::new(storage_path).join("messages").join(name)
}

pub fn load(storage_path: &str) -> anyhow::Result<VecDeque<SecureMessage>> {
    load_named(storage_path, "messages.json")
}

pub fn save(storage_path: &str, messages: &VecDeque<SecureMessage>) -> anyhow::Result<()> {
    save_named(storage_path, "messages.json", messages)
}

/// Outbound deliveries this node constructed, kept so a sent message is
/// retrievable the same way an inbound one is via `load`/`get_stored_messages`.
pub fn load_outbound(storage_path: &str) -> anyhow::Result<VecDeque<SecureMessage>> {
    load_named(storage_path, "outbound.json")
}

pub fn save_outbound(storage_path: &str, messages: &VecDeque<SecureMessage>) -> anyhow::Result<()> {
    save_named(storage_path, "outbound.json", messages)
}

fn load_named(storage_path: &str, name: &str) -> anyhow::Result<VecDeque<SecureMessage>> {
    let path = messages_file(storage_path, name);
    if !path.exists() {
        return Ok(VecDeque::new());
    }
    let raw = std::fs::read(&path)?;
    let messages: Vec<SecureMessage> = serde_json::from_slice(&raw)?;
    Ok(messages.into())
}

fn save_named(storage_path: &str, name: &str, messages: &VecDeque<SecureMessage>) -> anyhow::Result<()> {
    let path = messages_file(storage_path, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contiguous: Vec<&SecureMessage> = messages.iter().collect();
    let raw = serde_json::to_vec_pretty(&contiguous)?;
    std::fs::write(path, raw)?;
    Ok(())
}
