use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    common::{ClientError, Result},
    configs::*,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub resuming: ResumingConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            reconnect: ReconnectConfig::default(),
            resuming: ResumingConfig::default(),
            nodes: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Loads `config.toml`, falling back to `config.default.toml`.
    pub fn load() -> Result<Self> {
        let config_path = ["config.toml", "config.default.toml"]
            .into_iter()
            .find(|p| Path::new(p).exists())
            .ok_or_else(|| {
                ClientError::Config("config.toml or config.default.toml not found".into())
            })?;

        Self::load_from(config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        if config_str.trim().is_empty() {
            return Err(ClientError::Config(format!("{} is empty", path.display())));
        }
        config_str.parse()
    }
}

impl std::str::FromStr for Config {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))
    }
}
