use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{info, warn};

use crate::{
    common::{ClientError, HttpClient, Result, types::GuildId, types::random_identifier},
    configs::{Config, NodeConfig},
    events::ClientEvent,
    node::{Node, NodeContext},
    player::Player,
};

/// Owns every node of one application. Dropping the registry does not stop
/// the nodes; call [`NodeRegistry::shutdown`].
pub struct NodeRegistry {
    context: Arc<NodeContext>,
    nodes: DashMap<String, Arc<Node>>,
}

impl NodeRegistry {
    /// Builds an empty registry. Domain events of every node arrive on the
    /// returned receiver.
    pub fn new(config: &Config) -> Result<(Self, UnboundedReceiver<ClientEvent>)> {
        let http = HttpClient::new(&config.client)?;
        let (events, rx) = unbounded_channel();

        let context = Arc::new(NodeContext {
            http,
            client: config.client.clone(),
            reconnect: config.reconnect.clone(),
            resuming: config.resuming.clone(),
            events,
        });

        Ok((
            Self {
                context,
                nodes: DashMap::new(),
            },
            rx,
        ))
    }

    /// Registers a node and connects it. A node whose first connect fails is
    /// not kept.
    pub async fn create(&self, config: NodeConfig) -> Result<Arc<Node>> {
        let node = self.register(config)?;

        if let Err(e) = node.connect().await {
            warn!("[{}] Initial connect failed: {}", node.identifier(), e);
            self.nodes.remove(node.identifier());
            node.shutdown().await;
            return Err(e);
        }
        Ok(node)
    }

    pub(crate) fn register(&self, config: NodeConfig) -> Result<Arc<Node>> {
        let identifier = config.identifier.clone().unwrap_or_else(random_identifier);

        match self.nodes.entry(identifier.clone()) {
            Entry::Occupied(_) => Err(ClientError::DuplicateIdentifier(identifier)),
            Entry::Vacant(slot) => {
                info!("[{}] Registering node {}:{}", identifier, config.host, config.port);
                let node = Node::new(identifier, config, self.context.clone());
                slot.insert(node.clone());
                Ok(node)
            }
        }
    }

    /// Looks up a node by identifier, or picks the one with the fewest
    /// players (ties broken by identifier).
    pub fn get(&self, identifier: Option<&str>) -> Result<Arc<Node>> {
        match identifier {
            Some(id) => self
                .nodes
                .get(id)
                .map(|n| n.value().clone())
                .ok_or_else(|| ClientError::NodeNotFound(id.to_string())),
            None => self
                .nodes
                .iter()
                .map(|n| n.value().clone())
                .min_by(|a, b| {
                    a.player_count()
                        .cmp(&b.player_count())
                        .then_with(|| a.identifier().cmp(b.identifier()))
                })
                .ok_or(ClientError::NoNodesAvailable),
        }
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().map(|n| n.value().clone()).collect()
    }

    /// Returns the guild's player, creating it on `node` or on the least
    /// loaded node if none exists yet.
    pub fn attach(&self, guild_id: impl Into<GuildId>, node: Option<Arc<Node>>) -> Result<Arc<Player>> {
        let guild_id = guild_id.into();
        if let Some(player) = self.player(&guild_id) {
            return Ok(player);
        }

        let node = match node {
            Some(node) => node,
            None => self.get(None)?,
        };
        Ok(node.attach_player(guild_id))
    }

    /// The guild's player on any node.
    pub fn player(&self, guild_id: &GuildId) -> Option<Arc<Player>> {
        self.nodes.iter().find_map(|n| n.value().player(guild_id))
    }

    /// Removes and shuts down one node.
    pub async fn remove(&self, identifier: &str) -> Result<()> {
        let (_, node) = self
            .nodes
            .remove(identifier)
            .ok_or_else(|| ClientError::NodeNotFound(identifier.to_string()))?;
        node.shutdown().await;
        Ok(())
    }

    /// Tears down every node.
    pub async fn shutdown(&self) {
        let nodes = self.nodes();
        self.nodes.clear();

        for node in nodes {
            node.shutdown().await;
        }
        info!("Node registry shut down");
    }
}
