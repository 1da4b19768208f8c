use rustalink_client::{ClientEvent, Config, NodeRegistry, common::logger};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logger::init(&config.logging);

    let (registry, mut events) = NodeRegistry::new(&config)?;

    for node_config in config.nodes.iter().cloned() {
        let label = format!("{}:{}", node_config.host, node_config.port);
        match registry.create(node_config).await {
            Ok(node) => info!("[{}] Connected to {}", node.identifier(), label),
            Err(e) => error!("Failed to connect to {}: {}", label, e),
        }
    }

    if registry.nodes().is_empty() {
        warn!("No nodes connected");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
        }
    }

    registry.shutdown().await;
    Ok(())
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::NodeReady { node, resumed } => info!(
            "[{}] Ready (session {:?}, resumed={})",
            node.identifier(),
            node.session_id().map(|s| s.0),
            resumed
        ),
        ClientEvent::NodeDisconnected { node, code, reason } => warn!(
            "[{}] Disconnected: code={:?}, reason='{}'",
            node.identifier(),
            code,
            reason
        ),
        ClientEvent::TrackStart(e) => info!(
            "[{}] Track started: {} - {}",
            e.player.guild_id(),
            e.track.author(),
            e.track.title()
        ),
        ClientEvent::TrackEnd(e) => info!(
            "[{}] Track ended: {} ({:?})",
            e.player.guild_id(),
            e.track.title(),
            e.reason
        ),
        ClientEvent::TrackException(e) => warn!(
            "[{}] Track exception on {}: {}",
            e.player.guild_id(),
            e.track.title(),
            e.exception.cause
        ),
        ClientEvent::TrackStuck(e) => warn!(
            "[{}] Track stuck: {} ({}ms)",
            e.player.guild_id(),
            e.track.title(),
            e.threshold_ms
        ),
        ClientEvent::VoiceClosed(e) => warn!(
            "[{}] Voice closed: code={}, reason='{}', by_remote={}",
            e.player.guild_id(),
            e.code,
            e.reason,
            e.by_remote
        ),
    }
}
