use serde::Deserialize;

use crate::protocol::VoiceState;

/// Server-assignment half of the voice handshake (`VOICE_SERVER_UPDATE`).
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceServerUpdate {
    pub token: String,
    /// `None` while the voice server is being reallocated.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Session-assignment half of the voice handshake (`VOICE_STATE_UPDATE` for
/// the bot user).
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStateUpdate {
    pub session_id: String,
    /// `None` means the bot left the channel.
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Buffers the two handshake fragments until both are known.
#[derive(Debug, Default)]
pub(crate) struct VoiceHandshake {
    token: Option<String>,
    endpoint: Option<String>,
    session_id: Option<String>,
}

impl VoiceHandshake {
    /// Stores the server fragment. Returns the full voice state when the
    /// session fragment is already present.
    pub fn set_server(&mut self, update: VoiceServerUpdate) -> Option<VoiceState> {
        match update.endpoint {
            Some(endpoint) => {
                self.token = Some(update.token);
                self.endpoint = Some(endpoint);
                self.complete()
            }
            None => {
                self.token = None;
                self.endpoint = None;
                None
            }
        }
    }

    pub fn set_session(&mut self, update: VoiceStateUpdate) -> Option<VoiceState> {
        self.session_id = Some(update.session_id);
        self.complete()
    }

    pub fn complete(&self) -> Option<VoiceState> {
        Some(VoiceState {
            token: self.token.clone()?,
            endpoint: self.endpoint.clone()?,
            session_id: self.session_id.clone()?,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(endpoint: Option<&str>) -> VoiceServerUpdate {
        VoiceServerUpdate {
            token: "tok".into(),
            endpoint: endpoint.map(str::to_string),
            guild_id: Some("1".into()),
        }
    }

    fn session(id: &str) -> VoiceStateUpdate {
        VoiceStateUpdate {
            session_id: id.into(),
            channel_id: Some("99".into()),
        }
    }

    #[test]
    fn needs_both_fragments() {
        let mut hs = VoiceHandshake::default();
        assert!(hs.set_server(server(Some("voice.example"))).is_none());

        let state = hs.set_session(session("s1")).unwrap();
        assert_eq!(state.token, "tok");
        assert_eq!(state.endpoint, "voice.example");
        assert_eq!(state.session_id, "s1");

        let body = serde_json::to_value(&state).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"token": "tok", "endpoint": "voice.example", "sessionId": "s1"})
        );
    }

    #[test]
    fn order_does_not_matter() {
        let mut hs = VoiceHandshake::default();
        assert!(hs.set_session(session("s1")).is_none());
        assert!(hs.set_server(server(Some("voice.example"))).is_some());
    }

    #[test]
    fn null_endpoint_clears_server_fragment() {
        let mut hs = VoiceHandshake::default();
        hs.set_session(session("s1"));
        assert!(hs.set_server(server(Some("a.example"))).is_some());

        assert!(hs.set_server(server(None)).is_none());
        assert!(hs.complete().is_none());

        let state = hs.set_server(server(Some("b.example"))).unwrap();
        assert_eq!(state.endpoint, "b.example");
    }

    #[test]
    fn clear_forgets_everything() {
        let mut hs = VoiceHandshake::default();
        hs.set_session(session("s1"));
        hs.set_server(server(Some("a.example")));
        hs.clear();
        assert!(hs.complete().is_none());
    }

    #[test]
    fn decodes_gateway_payloads() {
        let update: VoiceServerUpdate = serde_json::from_str(
            r#"{"token":"t","guild_id":"1","endpoint":null}"#,
        )
        .unwrap();
        assert!(update.endpoint.is_none());

        let update: VoiceStateUpdate = serde_json::from_str(
            r#"{"session_id":"s","channel_id":null,"user_id":"5","deaf":false}"#,
        )
        .unwrap();
        assert!(update.channel_id.is_none());
    }
}
