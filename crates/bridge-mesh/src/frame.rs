use bridge_model::{NodeUpdate, Position};
use serde::{Deserialize, Serialize};

/// One line of the newline-delimited JSON protocol spoken over the device
/// link (the TCP interface mode of the upstream mesh firmware, rather than
/// its raw serial/protobuf framing).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub from_id: String,
    #[serde(default)]
    pub to_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ack_of: Option<String>,
    #[serde(default)]
    pub snr: Option<f32>,
    #[serde(default)]
    pub rssi: Option<i32>,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub device_metrics: Option<DeviceMetrics>,
    #[serde(default)]
    pub hops_away: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub hw_model: Option<String>,
    #[serde(default)]
    pub is_licensed: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceMetrics {
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub voltage: Option<f32>,
}

impl InboundFrame {
    pub fn node_update(&self) -> NodeUpdate {
        let user = self.user.clone().unwrap_or(UserInfo {
            long_name: None,
            short_name: None,
            hw_model: None,
            is_licensed: None,
            role: None,
        });
        let metrics = self.device_metrics.clone().unwrap_or(DeviceMetrics {
            battery_level: None,
            voltage: None,
        });
        NodeUpdate {
            long_name: user.long_name,
            short_name: user.short_name,
            hardware_model: user.hw_model,
            snr: self.snr,
            rssi: self.rssi,
            battery_level: metrics.battery_level,
            voltage: metrics.voltage,
            position: self.position,
            hops_away: self.hops_away,
            is_licensed: user.is_licensed,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a> {
    pub text: &'a str,
    pub to_id: Option<&'a str>,
    pub want_ack: bool,
    pub channel_index: u8,
}
