use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::{events::ClientEvent, node::Node, protocol::Frame};

/// Decodes one text frame and applies it to the node. Frames are handled to
/// completion in arrival order; malformed or unknown frames are logged and
/// dropped without affecting the stream.
pub(crate) fn dispatch(node: &Arc<Node>, text: &str) {
    let raw: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("[{}] Dropping non-JSON frame: {}", node.identifier(), e);
            return;
        }
    };

    let frame = match Frame::deserialize(&raw) {
        Ok(f) => f,
        Err(e) => {
            warn!(
                "[{}] Dropping malformed frame ({}): {}",
                node.identifier(),
                e,
                text
            );
            return;
        }
    };

    trace!("[{}] <- {}", node.identifier(), frame.op());

    match frame {
        Frame::Ready {
            resumed,
            session_id,
        } => {
            info!(
                "[{}] Ready: session={}, resumed={}",
                node.identifier(),
                session_id,
                resumed
            );
            if let Some(previous) = node.set_session_id(session_id) {
                debug!("[{}] Replaced session {}", node.identifier(), previous);
            }

            if node.resuming_config().enabled && !resumed {
                let node = node.clone();
                tokio::spawn(async move {
                    let timeout = node.resuming_config().timeout_secs;
                    if let Err(e) = node.update_session(Some(true), Some(timeout)).await {
                        warn!("[{}] Failed to enable resuming: {}", node.identifier(), e);
                    }
                });
            }

            // A fresh session knows none of our players; hand over any
            // complete voice credentials again.
            if !resumed {
                for player in node.players() {
                    tokio::spawn(async move {
                        if let Err(e) = player.reconnect_voice().await
                            && !player.is_destroyed()
                        {
                            warn!(
                                "[{}] Voice re-dispatch after new session failed: {}",
                                player.guild_id(),
                                e
                            );
                        }
                    });
                }
            }

            node.emit(ClientEvent::NodeReady {
                node: node.clone(),
                resumed,
            });
        }
        Frame::PlayerUpdate { guild_id, state } => match node.player(&guild_id) {
            Some(player) => player.update_state(state),
            None => debug!(
                "[{}] playerUpdate for unknown guild {}, discarding",
                node.identifier(),
                guild_id
            ),
        },
        Frame::Stats(stats) => {
            trace!(
                "[{}] Stats: players={}, playing={}",
                node.identifier(),
                stats.players,
                stats.playing_players
            );
            node.set_stats(stats);
        }
        Frame::Event { guild_id, event } => match node.player(&guild_id) {
            Some(player) => player.handle_event(event, raw),
            None => warn!(
                "[{}] Event for unknown guild {}, discarding",
                node.identifier(),
                guild_id
            ),
        },
        Frame::Unknown => {
            let op = raw.get("op").and_then(Value::as_str).unwrap_or("<none>");
            debug!("[{}] Ignoring unknown op '{}'", node.identifier(), op);
        }
    }
}
