use serde::{Deserialize, Serialize};

use crate::{common::types::GuildId, protocol::tracks::TrackData};

fn default_ping() -> i64 {
    -1
}

/// Player state as reported by `playerUpdate` frames and REST responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Unix timestamp in milliseconds.
    pub time: u64,
    #[serde(default)]
    pub position: u64,
    pub connected: bool,
    /// -1 when the node is not connected to voice.
    #[serde(default = "default_ping")]
    pub ping: i64,
    #[serde(default)]
    pub track: Option<TrackData>,
}

/// Voice credentials handed to the node so it can join voice transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Body of `PATCH /v4/sessions/{sessionId}/players/{guildId}`.
///
/// Omitted fields are left unchanged by the node. `Some(None)` on the
/// nullable fields serializes as an explicit `null`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_track: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
    /// Sent as the `noReplace` query parameter.
    #[serde(skip)]
    pub no_replace: bool,
}

impl PlayerUpdate {
    pub fn track(encoded: impl Into<String>) -> Self {
        Self {
            encoded_track: Some(Some(encoded.into())),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            encoded_track: Some(None),
            ..Default::default()
        }
    }

    pub fn voice(voice: VoiceState) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_end_time(mut self, end_time: Option<u64>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_volume(mut self, volume: u16) -> Self {
        self.volume = Some(volume.min(1000));
        self
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = Some(paused);
        self
    }

    pub fn with_no_replace(mut self, no_replace: bool) -> Self {
        self.no_replace = no_replace;
        self
    }
}

/// Player as returned by the node after an update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub guild_id: GuildId,
    #[serde(default)]
    pub track: Option<TrackData>,
    #[serde(default)]
    pub volume: u16,
    #[serde(default)]
    pub paused: bool,
    pub state: PlayerState,
    #[serde(default)]
    pub voice: VoiceState,
    #[serde(default)]
    pub filters: serde_json::Value,
}

/// Body of `PATCH /v4/sessions/{sessionId}`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resuming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub resuming: bool,
    pub timeout: u64,
}
