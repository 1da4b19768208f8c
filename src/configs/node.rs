use serde::{Deserialize, Serialize};

use crate::gateway::constants::WEBSOCKET_PATH;

/// Connection details of one audio node.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    /// Generated when absent.
    #[serde(default)]
    pub identifier: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Use `https`/`wss` instead of `http`/`ws`.
    #[serde(default)]
    pub secure: bool,
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            identifier: None,
            host: host.into(),
            port,
            password: password.into(),
            secure: false,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// `host:port`, with IPv6 literals bracketed.
    fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn rest_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}/v4", scheme, self.authority())
    }

    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.authority(), WEBSOCKET_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_for_named_and_ipv4_hosts() {
        let config = NodeConfig::new("127.0.0.1", 2333, "pw");
        assert_eq!(config.rest_base(), "http://127.0.0.1:2333/v4");
        assert_eq!(config.websocket_url(), "ws://127.0.0.1:2333/v4/websocket");

        let mut config = NodeConfig::new("node.example.com", 443, "pw");
        config.secure = true;
        assert_eq!(config.rest_base(), "https://node.example.com:443/v4");
        assert_eq!(config.websocket_url(), "wss://node.example.com:443/v4/websocket");
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let config = NodeConfig::new("::1", 2333, "pw");
        assert_eq!(config.rest_base(), "http://[::1]:2333/v4");
        assert_eq!(config.websocket_url(), "ws://[::1]:2333/v4/websocket");

        let config = NodeConfig::new("[fe80::1]", 2333, "pw");
        assert_eq!(config.rest_base(), "http://[fe80::1]:2333/v4");
    }
}
