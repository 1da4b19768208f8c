use std::sync::Arc;

use serde_json::Value;

use crate::{
    node::Node,
    player::Player,
    protocol::{TrackEndReason, TrackException},
    protocol::tracks::Track,
};

/// Domain events delivered to the host application through the receiver
/// returned by [`crate::NodeRegistry::new`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The node assigned a session id; control-plane calls are now valid.
    NodeReady { node: Arc<Node>, resumed: bool },
    /// The event stream dropped; a reconnect follows unless the node was destroyed.
    NodeDisconnected {
        node: Arc<Node>,
        code: Option<u16>,
        reason: String,
    },
    TrackStart(TrackStartEvent),
    TrackEnd(TrackEndEvent),
    TrackException(TrackExceptionEvent),
    TrackStuck(TrackStuckEvent),
    /// The node's own voice connection for a player was closed.
    VoiceClosed(VoiceClosedEvent),
}

#[derive(Debug, Clone)]
pub struct TrackStartEvent {
    pub raw: Value,
    pub track: Track,
    pub player: Arc<Player>,
}

#[derive(Debug, Clone)]
pub struct TrackEndEvent {
    pub raw: Value,
    pub track: Track,
    pub reason: TrackEndReason,
    pub player: Arc<Player>,
}

#[derive(Debug, Clone)]
pub struct TrackExceptionEvent {
    pub raw: Value,
    pub track: Track,
    pub exception: TrackException,
    pub player: Arc<Player>,
}

#[derive(Debug, Clone)]
pub struct TrackStuckEvent {
    pub raw: Value,
    pub track: Track,
    pub threshold_ms: u64,
    pub player: Arc<Player>,
}

#[derive(Debug, Clone)]
pub struct VoiceClosedEvent {
    pub raw: Value,
    pub code: u16,
    pub reason: String,
    pub by_remote: bool,
    pub player: Arc<Player>,
}
