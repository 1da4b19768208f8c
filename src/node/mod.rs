use std::{fmt, sync::Arc, time::Duration};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    common::{
        ClientError, HandshakeFailure, Result,
        types::{GuildId, SessionId, UserId},
    },
    configs::{ClientConfig, NodeConfig, ReconnectConfig, ResumingConfig},
    events::ClientEvent,
    gateway::{
        Connection, ConnectionState,
        constants::SHUTDOWN_GRACE_MS,
        session::{self, HandshakeRequest, handshake},
    },
    player::Player,
    protocol::{LoadResult, PlayerInfo, PlayerUpdate, SessionInfo, SessionUpdate, Track},
};

pub mod registry;
pub mod rest;

pub use registry::NodeRegistry;
pub use rest::{DEFAULT_SEARCH_PREFIX, RestClient, search_identifier};

/// Settings shared by every node of one registry.
pub(crate) struct NodeContext {
    pub http: reqwest::Client,
    pub client: ClientConfig,
    pub reconnect: ReconnectConfig,
    pub resuming: ResumingConfig,
    pub events: UnboundedSender<ClientEvent>,
}

/// One remote audio node: its REST client, event-stream connection, current
/// session id and the players bound to it.
pub struct Node {
    identifier: String,
    config: NodeConfig,
    context: Arc<NodeContext>,
    rest: RestClient,
    session_id: RwLock<Option<SessionId>>,
    players: DashMap<GuildId, Arc<Player>>,
    stats: RwLock<Option<crate::protocol::Stats>>,
    connection: Connection,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.identifier)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("session_id", &*self.session_id.read())
            .field("players", &self.players.len())
            .field("state", &self.connection.state())
            .finish()
    }
}

impl Node {
    pub(crate) fn new(identifier: String, config: NodeConfig, context: Arc<NodeContext>) -> Arc<Self> {
        let rest = RestClient::new(
            context.http.clone(),
            config.rest_base(),
            config.password.clone(),
            identifier.clone(),
        );

        Arc::new(Self {
            identifier,
            config,
            context,
            rest,
            session_id: RwLock::new(None),
            players: DashMap::new(),
            stats: RwLock::new(None),
            connection: Connection::new(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// `None` until the first `ready` frame.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Latest `stats` frame, if any arrived.
    pub fn stats(&self) -> Option<crate::protocol::Stats> {
        self.stats.read().clone()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, guild_id: &GuildId) -> Option<Arc<Player>> {
        self.players.get(guild_id).map(|p| p.value().clone())
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.players.iter().map(|p| p.value().clone()).collect()
    }

    /// Opens the event stream and starts its supervisor.
    ///
    /// Every handshake failure is returned to the caller. Calling this while
    /// a connection is already being established or supervised is a no-op.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.connection.is_destroyed() {
            return Err(ClientError::ConnectionDestroyed(self.identifier.clone()));
        }
        if !self.connection.begin_connect() {
            debug!("[{}] Connect requested while already active", self.identifier);
            return Ok(());
        }

        let request = self.handshake_request();
        info!("[{}] Connecting to {}", self.identifier, request.url);

        let result = tokio::select! {
            biased;
            _ = self.connection.cancelled() => {
                return Err(ClientError::ConnectionDestroyed(self.identifier.clone()));
            }
            result = handshake(&request) => result,
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(failure) => {
                self.connection.set_state(ConnectionState::Disconnected);
                if matches!(failure, HandshakeFailure::Unauthorized(_)) {
                    warn!(
                        "[{}] Node rejected the credential, check the password",
                        self.identifier
                    );
                }
                return Err(ClientError::from_handshake(&self.identifier, failure));
            }
        };

        if self.connection.is_destroyed() {
            return Err(ClientError::ConnectionDestroyed(self.identifier.clone()));
        }
        self.connection.set_state(ConnectionState::Connected);

        let span = info_span!("node", id = %self.identifier);
        let handle = tokio::spawn(session::run(self.clone(), stream).instrument(span));
        self.connection.store_task(handle);
        Ok(())
    }

    /// Destroys the connection and every player, then waits briefly for the
    /// supervisor to finish.
    pub async fn shutdown(&self) {
        info!("[{}] Shutting down", self.identifier);
        self.connection.destroy();

        let players = self.players();
        self.players.clear();
        for player in players {
            player.invalidate();
        }

        self.connection
            .join(Duration::from_millis(SHUTDOWN_GRACE_MS))
            .await;
    }

    /// Loads tracks for `query` using the default search prefix.
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Track>> {
        self.search_tracks_with(query, DEFAULT_SEARCH_PREFIX).await
    }

    /// Absolute URLs are loaded directly, anything else is searched through
    /// `prefix`. Playlists and empty results yield an empty list.
    pub async fn search_tracks_with(&self, query: &str, prefix: &str) -> Result<Vec<Track>> {
        let identifier = search_identifier(query, prefix);

        match self.rest.load_tracks(&identifier).await? {
            Some(LoadResult::Track(track)) => Ok(vec![track.into()]),
            Some(LoadResult::Search(tracks)) => Ok(tracks.into_iter().map(Track::from).collect()),
            Some(LoadResult::Playlist(_)) | Some(LoadResult::Empty {}) | None => Ok(Vec::new()),
            Some(LoadResult::Unknown(load_type)) => {
                debug!(
                    "[{}] Unknown loadType '{}' for '{}', treating as empty",
                    self.identifier, load_type, identifier
                );
                Ok(Vec::new())
            }
            Some(LoadResult::Error(e)) => Err(ClientError::LoadFailed {
                message: e.message.unwrap_or(e.cause),
                severity: e.severity,
            }),
        }
    }

    /// Raw `loadtracks` call; `None` when the node answered non-200.
    pub async fn load_tracks(&self, identifier: &str) -> Result<Option<LoadResult>> {
        self.rest.load_tracks(identifier).await
    }

    pub async fn update_player(
        &self,
        guild_id: &GuildId,
        update: &PlayerUpdate,
    ) -> Result<Option<PlayerInfo>> {
        let session_id = self.require_session()?;
        self.rest.update_player(&session_id, guild_id, update).await
    }

    /// Without a session the node cannot know the player, so there is
    /// nothing to delete.
    pub async fn destroy_player(&self, guild_id: &GuildId) -> Result<()> {
        match self.session_id() {
            Some(session_id) => self.rest.destroy_player(&session_id, guild_id).await,
            None => Ok(()),
        }
    }

    pub async fn update_session(
        &self,
        resuming: Option<bool>,
        timeout: Option<u64>,
    ) -> Result<Option<SessionInfo>> {
        let session_id = self.require_session()?;
        self.rest
            .update_session(&session_id, &SessionUpdate { resuming, timeout })
            .await
    }

    fn require_session(&self) -> Result<SessionId> {
        self.session_id()
            .ok_or_else(|| ClientError::MissingSessionId(self.identifier.clone()))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) fn reconnect_config(&self) -> &ReconnectConfig {
        &self.context.reconnect
    }

    pub(crate) fn resuming_config(&self) -> &ResumingConfig {
        &self.context.resuming
    }

    /// Returns the existing player for `guild_id` or binds a new one.
    pub(crate) fn attach_player(self: &Arc<Self>, guild_id: GuildId) -> Arc<Player> {
        self.players
            .entry(guild_id.clone())
            .or_insert_with(|| Player::new(guild_id, self.clone()))
            .value()
            .clone()
    }

    /// Removes `player` only if it is still the one bound to its guild.
    pub(crate) fn remove_player(&self, player: &Arc<Player>) -> bool {
        self.players
            .remove_if(player.guild_id(), |_, bound| Arc::ptr_eq(bound, player))
            .is_some()
    }

    /// Returns the previous session id.
    pub(crate) fn set_session_id(&self, session_id: SessionId) -> Option<SessionId> {
        self.session_id.write().replace(session_id)
    }

    pub(crate) fn set_stats(&self, stats: crate::protocol::Stats) {
        *self.stats.write() = Some(stats);
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        if self.context.events.send(event).is_err() {
            debug!("[{}] Event receiver dropped", self.identifier);
        }
    }

    pub(crate) fn handshake_request(&self) -> HandshakeRequest {
        let session_id = if self.context.resuming.enabled {
            self.session_id()
        } else {
            None
        };

        HandshakeRequest {
            url: self.config.websocket_url(),
            password: self.config.password.clone(),
            user_id: UserId(self.context.client.user_id),
            client_name: self.context.client.client_name.clone(),
            session_id,
            timeout: Duration::from_millis(self.context.client.connect_timeout_ms),
        }
    }
}
