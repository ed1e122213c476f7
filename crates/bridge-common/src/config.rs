use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BridgeError, Result};

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| BridgeError::Config(format!("{key} is not a valid value: {raw}"))),
        None => Ok(default),
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Result<Duration> {
    match env_var(key) {
        Some(raw) => {
            let secs: f64 = raw
                .parse()
                .map_err(|_| BridgeError::Config(format!("{key} is not a valid duration: {raw}")))?;
            Ok(Duration::from_secs_f64(secs))
        }
        None => Ok(default),
    }
}

fn env_string(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env_var(key) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Configuration for the mesh (LoRa) transport supervisor.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub device_path: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_multiplier: f64,
    pub message_timeout: Duration,
}

impl MeshConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            device_path: env_string("MESH_DEVICE_PATH", "/dev/ttyUSB0"),
            reconnect_delay: env_duration_secs("MESH_RECONNECT_DELAY", Duration::from_secs(5))?,
            max_reconnect_attempts: env_parsed("MESH_MAX_RECONNECT_ATTEMPTS", 10)?,
            reconnect_backoff_multiplier: env_parsed("MESH_RECONNECT_BACKOFF", 1.5)?,
            message_timeout: env_duration_secs("MESH_MESSAGE_TIMEOUT", Duration::from_secs(30))?,
        })
    }
}

/// Configuration for the secure (store-and-forward) transport supervisor.
#[derive(Debug, Clone)]
pub struct SecureConfig {
    pub identity_path: Option<String>,
    pub storage_path: String,
    pub announce_interval: Duration,
}

impl SecureConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            identity_path: env_var("SECURE_IDENTITY_PATH"),
            storage_path: env_string("SECURE_STORAGE_PATH", "/var/lib/meshbridge/secure"),
            announce_interval: env_duration_secs(
                "SECURE_ANNOUNCE_INTERVAL",
                Duration::from_secs(300),
            )?,
        })
    }
}

/// Configuration for alert routing, escalation and the ISP probe.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub escalation_timeout: Duration,
    pub max_retries: u32,
    pub isp_check_interval: Duration,
    pub isp_check_hosts: Vec<String>,
}

impl AlertConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            escalation_timeout: env_duration_secs(
                "ALERT_ESCALATION_TIMEOUT",
                Duration::from_secs(300),
            )?,
            max_retries: env_parsed("ALERT_MAX_RETRIES", 3)?,
            isp_check_interval: env_duration_secs("ISP_CHECK_INTERVAL", Duration::from_secs(60))?,
            isp_check_hosts: env_list("ISP_CHECK_HOSTS", &["8.8.8.8", "1.1.1.1"]),
        })
    }
}

/// Configuration for the durable outbound queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub persistence_path: String,
}

impl QueueConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_queue_size: env_parsed("QUEUE_MAX_SIZE", 1000)?,
            batch_size: env_parsed("QUEUE_BATCH_SIZE", 10)?,
            flush_interval: env_duration_secs("QUEUE_FLUSH_INTERVAL", Duration::from_secs(1))?,
            persistence_path: env_string("QUEUE_PERSISTENCE_PATH", "/var/lib/meshbridge/queue"),
        })
    }
}

/// Configuration for the inbound HTTP surface.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub listen: String,
    pub metrics_listen: String,
    /// `key -> allowed scopes`, empty means the surface is unauthenticated.
    pub api_keys: Vec<(String, Vec<String>)>,
}

impl HttpConfig {
    pub fn from_env() -> Result<Self> {
        let api_keys = env_var("MESH_BRIDGE_API_KEYS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|entry| {
                        let mut parts = entry.splitn(2, ':');
                        let key = parts.next()?.trim().to_string();
                        if key.is_empty() {
                            return None;
                        }
                        let scopes = parts
                            .next()
                            .map(|s| s.split('|').map(|p| p.trim().to_string()).collect())
                            .unwrap_or_default();
                        Some((key, scopes))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            listen: env_string("MESH_BRIDGE_HTTP_LISTEN", "0.0.0.0:8733"),
            metrics_listen: env_string("MESH_BRIDGE_METRICS_LISTEN", "0.0.0.0:9733"),
            api_keys,
        })
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: String,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let filter = env_var("MESH_BRIDGE_LOG")
            .or_else(|| env_var("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string());
        Ok(Self {
            filter,
            directory: env_string("MESH_BRIDGE_LOG_DIR", "./logs"),
        })
    }
}

/// Top-level configuration for the Mesh Bridge daemon, assembled once at
/// startup and passed by reference into every component's constructor.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mesh: MeshConfig,
    pub secure: SecureConfig,
    pub alerts: AlertConfig,
    pub queue: QueueConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration entirely from the environment. There is no file
    /// format: every setting in this workspace has a documented env var and
    /// a sane default, so a fresh checkout runs unconfigured.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mesh: MeshConfig::from_env()?,
            secure: SecureConfig::from_env()?,
            alerts: AlertConfig::from_env()?,
            queue: QueueConfig::from_env()?,
            http: HttpConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }
}
