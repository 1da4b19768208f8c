use serde::Deserialize;

use crate::{
    common::types::{GuildId, SessionId},
    protocol::{events::NodeEvent, models::PlayerState, stats::Stats},
};

/// One decoded event-stream frame, tagged by `op`.
///
/// Unknown ops decode to [`Frame::Unknown`] so newer nodes keep working;
/// a known op with a malformed body is a decode error.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Frame {
    #[serde(rename_all = "camelCase")]
    Ready {
        #[serde(default)]
        resumed: bool,
        session_id: SessionId,
    },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate { guild_id: GuildId, state: PlayerState },
    Stats(Stats),
    #[serde(rename_all = "camelCase")]
    Event {
        guild_id: GuildId,
        #[serde(flatten)]
        event: NodeEvent,
    },
    #[serde(other)]
    Unknown,
}

impl Frame {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::PlayerUpdate { .. } => "playerUpdate",
            Self::Stats(_) => "stats",
            Self::Event { .. } => "event",
            Self::Unknown => "unknown",
        }
    }
}
