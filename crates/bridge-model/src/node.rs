use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A peer known on the mesh transport. Created on first sighting and never
/// deleted; fields only ever move from unknown to known, never back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub hardware_model: Option<String>,
    #[serde(default)]
    pub snr: Option<f32>,
    #[serde(default)]
    pub rssi: Option<i32>,
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub voltage: Option<f32>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub hops_away: Option<u32>,
    pub last_heard: DateTime<Utc>,
    #[serde(default)]
    pub is_licensed: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Geographic position reported over telemetry, if the device has a GPS fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

impl Node {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            long_name: None,
            short_name: None,
            hardware_model: None,
            snr: None,
            rssi: None,
            battery_level: None,
            voltage: None,
            position: None,
            hops_away: None,
            last_heard: Utc::now(),
            is_licensed: None,
            role: None,
        }
    }

    /// Merge fields present in an inbound packet. Null/absent values never
    /// overwrite an already-known value; `last_heard` always advances.
    pub fn merge_update(&mut self, update: &NodeUpdate) {
        if let Some(v) = &update.long_name {
            self.long_name = Some(v.clone());
        }
        if let Some(v) = &update.short_name {
            self.short_name = Some(v.clone());
        }
        if let Some(v) = &update.hardware_model {
            self.hardware_model = Some(v.clone());
        }
        if update.snr.is_some() {
            self.snr = update.snr;
        }
        if update.rssi.is_some() {
            self.rssi = update.rssi;
        }
        if update.battery_level.is_some() {
            self.battery_level = update.battery_level;
        }
        if update.voltage.is_some() {
            self.voltage = update.voltage;
        }
        if update.position.is_some() {
            self.position = update.position;
        }
        if update.hops_away.is_some() {
            self.hops_away = update.hops_away;
        }
        if update.is_licensed.is_some() {
            self.is_licensed = update.is_licensed;
        }
        if let Some(v) = &update.role {
            self.role = Some(v.clone());
        }
        self.last_heard = Utc::now();
    }

    /// Whether this node has been heard from within `recency` of now.
    pub fn is_connected(&self, recency: chrono::Duration) -> bool {
        Utc::now() - self.last_heard <= recency
    }
}

/// A sparse, partial view of a node carried by a single inbound packet.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub hardware_model: Option<String>,
    pub snr: Option<f32>,
    pub rssi: Option<i32>,
    pub battery_level: Option<u8>,
    pub voltage: Option<f32>,
    pub position: Option<Position>,
    pub hops_away: Option<u32>,
    pub is_licensed: Option<bool>,
    pub role: Option<String>,
}

/// A pending delivery expectation keyed by message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub node_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl DeliveryReceipt {
    pub fn new(message_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            node_id: node_id.into(),
            created_at: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}
