use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::GuildId;

/// Exception severity levels reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Common => "common",
            Self::Suspicious => "suspicious",
            Self::Fault => "fault",
        };
        f.write_str(s)
    }
}

/// Why an event-stream handshake did not produce a connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// The node rejected the credential (401/403).
    #[error("authentication rejected with status {0}")]
    Unauthorized(u16),
    /// The node answered the upgrade with a non-101, non-auth status.
    #[error("upgrade rejected with status {0}")]
    Rejected(u16),
    /// The node could not be reached at the transport level.
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("handshake timed out")]
    TimedOut,
    /// Malformed URL/header or a broken upgrade response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl HandshakeFailure {
    /// Whether a later attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Refused(_) | Self::TimedOut => true,
            Self::Rejected(status) => *status >= 500 || *status == 429,
            Self::Unauthorized(_) | Self::Protocol(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("a node with identifier '{0}' already exists")]
    DuplicateIdentifier(String),

    #[error("no node with identifier '{0}'")]
    NodeNotFound(String),

    #[error("no nodes are registered")]
    NoNodesAvailable,

    #[error("node '{identifier}' refused the connection: {reason}")]
    NodeRefused { identifier: String, reason: String },

    #[error("connection of node '{0}' was destroyed")]
    ConnectionDestroyed(String),

    #[error("handshake with node '{identifier}' failed: {failure}")]
    Handshake {
        identifier: String,
        failure: HandshakeFailure,
    },

    #[error("node '{0}' has not been assigned a session id yet")]
    MissingSessionId(String),

    #[error("player for guild {0} was destroyed")]
    PlayerDestroyed(GuildId),

    #[error("node failed to load tracks ({severity}): {message}")]
    LoadFailed { message: String, severity: Severity },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn from_handshake(identifier: &str, failure: HandshakeFailure) -> Self {
        match failure {
            HandshakeFailure::Refused(reason) => Self::NodeRefused {
                identifier: identifier.to_string(),
                reason,
            },
            failure => Self::Handshake {
                identifier: identifier.to_string(),
                failure,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
