use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    /// Bot user id sent as `User-Id` on the event-stream handshake.
    pub user_id: u64,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            client_name: default_client_name(),
            request_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// 0 retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResumingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_resume_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResumingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_resume_timeout_secs(),
        }
    }
}

fn default_client_name() -> String {
    format!("rustalink-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_jitter() -> bool {
    true
}

fn default_resume_timeout_secs() -> u64 {
    60
}
