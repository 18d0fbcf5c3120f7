use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub event_store: EventStoreConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// WebSocket liveness settings. The ping interval must be materially shorter
/// than the pong wait, otherwise healthy connections miss their read deadline.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// How often the server pings each connection, in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// How long a connection may stay silent before its read deadline
    /// expires, in seconds
    #[serde(default = "default_pong_wait")]
    pub pong_wait: u64,
    /// Deadline for a single write to a connection, in seconds
    #[serde(default = "default_write_wait")]
    pub write_wait: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

/// Deduplication record settings for the event store.
#[derive(Debug, Clone, Deserialize)]
pub struct EventStoreConfig {
    /// Retention window for dedup records, in seconds
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_seconds: u64,
    /// Namespace segment of the dedup record key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// Downstream services a created chat message is forwarded to.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardingConfig {
    #[serde(default = "default_relay_host")]
    pub relay_host: String,
    #[serde(default = "default_notifications_host")]
    pub notifications_host: String,
    /// Per-request timeout, in seconds
    #[serde(default = "default_forwarding_timeout")]
    pub timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_wait() -> u64 {
    40
}

fn default_write_wait() -> u64 {
    10
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_dedup_ttl() -> u64 {
    3600
}

fn default_key_prefix() -> String {
    "chat-messages".to_string()
}

fn default_relay_host() -> String {
    "http://localhost:8080".to_string()
}

fn default_notifications_host() -> String {
    "http://localhost:8082".to_string()
}

fn default_forwarding_timeout() -> u64 {
    10
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Double underscore separates section from field so snake_case
            // fields survive: SERVER__HOST, WEBSOCKET__PING_INTERVAL,
            // EVENT_STORE__KEY_PREFIX, REDIS__URL, etc.
            .add_source(Environment::default().separator("__").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait)
    }
}

impl EventStoreConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }
}

impl ForwardingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            pong_wait: default_pong_wait(),
            write_wait: default_write_wait(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_seconds: default_dedup_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            relay_host: default_relay_host(),
            notifications_host: default_notifications_host(),
            timeout_seconds: default_forwarding_timeout(),
        }
    }
}
