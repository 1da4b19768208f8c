use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    common::{ClientError, Result, types::GuildId},
    events::{
        ClientEvent, TrackEndEvent, TrackExceptionEvent, TrackStartEvent, TrackStuckEvent,
        VoiceClosedEvent,
    },
    node::Node,
    protocol::{NodeEvent, PlayerInfo, PlayerState, PlayerUpdate, Track, VoiceState},
};

pub mod voice;

pub use voice::{VoiceServerUpdate, VoiceStateUpdate};

use self::voice::VoiceHandshake;

const DEFAULT_VOLUME: u16 = 100;

/// Result of a play request.
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    /// The node answered with the track it is now playing.
    Started(Track),
    /// The node accepted the update without naming a track, or answered non-200.
    Accepted(Option<PlayerInfo>),
}

#[derive(Debug)]
struct PlaybackState {
    /// Node timestamp of the last `playerUpdate`, in milliseconds.
    last_update: u64,
    position: u64,
    connected: bool,
    ping: i64,
    volume: u16,
    paused: bool,
    current: Option<Track>,
    last_track: Option<Track>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            last_update: 0,
            position: 0,
            connected: false,
            ping: -1,
            volume: DEFAULT_VOLUME,
            paused: false,
            current: None,
            last_track: None,
        }
    }
}

/// Playback state of one guild, bound to a single node.
pub struct Player {
    guild_id: GuildId,
    node: Arc<Node>,
    state: RwLock<PlaybackState>,
    /// Held across the voice dispatch so fragment arrivals are serialized.
    voice: Mutex<VoiceHandshake>,
    destroyed: AtomicBool,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .field("node", &self.node.identifier())
            .field("connected", &state.connected)
            .field("position", &state.position)
            .field("current", &state.current.as_ref().map(|t| t.title()))
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Player {
    pub(crate) fn new(guild_id: GuildId, node: Arc<Node>) -> Arc<Self> {
        Arc::new(Self {
            guild_id,
            node,
            state: RwLock::new(PlaybackState::default()),
            voice: Mutex::new(VoiceHandshake::default()),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Position in milliseconds as of the last `playerUpdate`.
    pub fn position(&self) -> u64 {
        self.state.read().position
    }

    pub fn ping(&self) -> i64 {
        self.state.read().ping
    }

    pub fn last_update(&self) -> u64 {
        self.state.read().last_update
    }

    pub fn volume(&self) -> u16 {
        self.state.read().volume
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.read().current.clone()
    }

    /// The track of the most recent `TrackStartEvent`.
    pub fn last_track(&self) -> Option<Track> {
        self.state.read().last_track.clone()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(ClientError::PlayerDestroyed(self.guild_id.clone()))
        } else {
            Ok(())
        }
    }

    pub async fn on_voice_server_update(&self, update: VoiceServerUpdate) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        let mut handshake = self.voice.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }
        match handshake.set_server(update) {
            Some(voice) => self.dispatch_voice(voice).await,
            None => Ok(()),
        }
    }

    /// A cleared channel tears the player down.
    pub async fn on_voice_state_update(self: &Arc<Self>, update: VoiceStateUpdate) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        if update.channel_id.is_none() {
            debug!("[{}] Left voice channel, destroying player", self.guild_id);
            return self.destroy().await;
        }

        let mut handshake = self.voice.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }
        self.state.write().connected = true;
        match handshake.set_session(update) {
            Some(voice) => self.dispatch_voice(voice).await,
            None => Ok(()),
        }
    }

    /// Re-sends the buffered voice state. Returns false when the handshake
    /// is incomplete.
    pub async fn reconnect_voice(&self) -> Result<bool> {
        self.ensure_alive()?;
        let handshake = self.voice.lock().await;
        self.ensure_alive()?;
        match handshake.complete() {
            Some(voice) => {
                self.dispatch_voice(voice).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn dispatch_voice(&self, voice: VoiceState) -> Result<()> {
        debug!(
            "[{}] Sending voice state to node {} (endpoint {})",
            self.guild_id,
            self.node.identifier(),
            voice.endpoint
        );
        self.node
            .update_player(&self.guild_id, &PlayerUpdate::voice(voice))
            .await?;
        self.state.write().connected = true;
        Ok(())
    }

    pub(crate) fn update_state(&self, state: PlayerState) {
        if self.is_destroyed() {
            return;
        }
        let mut current = self.state.write();
        current.last_update = state.time;
        current.position = state.position;
        current.connected = state.connected;
        current.ping = state.ping;
        current.current = state.track.map(Track::from);
    }

    pub(crate) fn handle_event(self: &Arc<Self>, event: NodeEvent, raw: Value) {
        let player = self.clone();
        let event = match event {
            NodeEvent::TrackStart { track } => {
                let track = Track::from(track);
                {
                    let mut state = self.state.write();
                    state.last_track = Some(track.clone());
                    state.current = Some(track.clone());
                }
                ClientEvent::TrackStart(TrackStartEvent { raw, track, player })
            }
            NodeEvent::TrackEnd { track, reason } => {
                let track = Track::from(track);
                {
                    let mut state = self.state.write();
                    if state
                        .current
                        .as_ref()
                        .is_some_and(|c| c.encoded() == track.encoded())
                    {
                        state.current = None;
                    }
                }
                ClientEvent::TrackEnd(TrackEndEvent {
                    raw,
                    track,
                    reason,
                    player,
                })
            }
            NodeEvent::TrackException { track, exception } => {
                warn!(
                    "[{}] Track exception ({}): {}",
                    self.guild_id,
                    exception.severity,
                    exception.message.as_deref().unwrap_or(&exception.cause)
                );
                ClientEvent::TrackException(TrackExceptionEvent {
                    raw,
                    track: track.into(),
                    exception,
                    player,
                })
            }
            NodeEvent::TrackStuck {
                track,
                threshold_ms,
            } => ClientEvent::TrackStuck(TrackStuckEvent {
                raw,
                track: track.into(),
                threshold_ms,
                player,
            }),
            NodeEvent::WebSocketClosed {
                code,
                reason,
                by_remote,
            } => {
                info!(
                    "[{}] Node voice connection closed: code={}, reason='{}'",
                    self.guild_id, code, reason
                );
                self.state.write().connected = false;
                ClientEvent::VoiceClosed(VoiceClosedEvent {
                    raw,
                    code,
                    reason,
                    by_remote,
                    player,
                })
            }
            NodeEvent::Unknown => {
                debug!("[{}] Ignoring unknown event type", self.guild_id);
                return;
            }
        };
        self.node.emit(event);
    }

    pub async fn play(&self, track: &Track) -> Result<PlayOutcome> {
        self.play_with(PlayerUpdate::track(track.encoded())).await
    }

    pub async fn play_encoded(&self, encoded: &str) -> Result<PlayOutcome> {
        self.play_with(PlayerUpdate::track(encoded)).await
    }

    /// Sends an arbitrary update; if the node answers with a track it
    /// becomes the current one.
    pub async fn play_with(&self, update: PlayerUpdate) -> Result<PlayOutcome> {
        let info = self.update(&update).await?;

        if let Some(data) = info.as_ref().and_then(|i| i.track.clone()) {
            let track = Track::from(data);
            self.state.write().current = Some(track.clone());
            return Ok(PlayOutcome::Started(track));
        }
        Ok(PlayOutcome::Accepted(info))
    }

    pub async fn pause(&self, paused: bool) -> Result<Option<PlayerInfo>> {
        self.update(&PlayerUpdate::default().with_paused(paused))
            .await
    }

    /// Seeks to `position` milliseconds.
    pub async fn seek(&self, position: u64) -> Result<Option<PlayerInfo>> {
        self.update(&PlayerUpdate::default().with_position(position))
            .await
    }

    /// Volume is clamped to 0..=1000.
    pub async fn set_volume(&self, volume: u16) -> Result<Option<PlayerInfo>> {
        self.update(&PlayerUpdate::default().with_volume(volume))
            .await
    }

    pub async fn stop(&self) -> Result<Option<PlayerInfo>> {
        let info = self.update(&PlayerUpdate::stop()).await?;
        self.state.write().current = None;
        Ok(info)
    }

    async fn update(&self, update: &PlayerUpdate) -> Result<Option<PlayerInfo>> {
        self.ensure_alive()?;
        let info = self.node.update_player(&self.guild_id, update).await?;

        let mut state = self.state.write();
        if let Some(volume) = update.volume {
            state.volume = volume;
        }
        if let Some(paused) = update.paused {
            state.paused = paused;
        }
        Ok(info)
    }

    /// Idempotent. The remote delete is issued only by the call that
    /// actually unbinds the player from its node, and only after any voice
    /// dispatch in flight has finished.
    pub async fn destroy(self: &Arc<Self>) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        {
            let mut handshake = self.voice.lock().await;
            self.invalidate();
            handshake.clear();
        }

        if self.node.remove_player(self) {
            info!("[{}] Destroying player on node {}", self.guild_id, self.node.identifier());
            self.node.destroy_player(&self.guild_id).await
        } else {
            Ok(())
        }
    }

    /// Drops local connection state; the voice buffer is cleared if no
    /// dispatch currently holds it.
    pub(crate) fn invalidate(&self) {
        self.destroyed.store(true, Ordering::Release);
        {
            let mut state = self.state.write();
            state.connected = false;
            state.current = None;
        }
        if let Ok(mut handshake) = self.voice.try_lock() {
            handshake.clear();
        }
    }
}
