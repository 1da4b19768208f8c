use tokio_tungstenite::tungstenite;

use crate::common::HandshakeFailure;

/// Lifecycle of a node's event-stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal; set by an explicit destroy.
    Destroyed,
}

/// How a receive loop ended, telling the supervisor what to do next.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// The stream closed or failed; reconnect unless destroyed.
    Closed { code: Option<u16>, reason: String },
    /// Destroy was requested while receiving.
    Shutdown,
}

/// Maps a failed upgrade onto the closed set of handshake failure kinds.
pub(crate) fn classify(err: tungstenite::Error) -> HandshakeFailure {
    match err {
        tungstenite::Error::Http(response) => match response.status().as_u16() {
            status @ (401 | 403) => HandshakeFailure::Unauthorized(status),
            status => HandshakeFailure::Rejected(status),
        },
        tungstenite::Error::Io(e) => HandshakeFailure::Refused(e.to_string()),
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            HandshakeFailure::Refused("connection closed during handshake".into())
        }
        tungstenite::Error::Url(e) => HandshakeFailure::Protocol(e.to_string()),
        other => HandshakeFailure::Protocol(other.to_string()),
    }
}
