pub mod common;
pub mod configs;
pub mod events;
pub mod gateway;
pub mod node;
pub mod player;
pub mod protocol;

pub use common::{ClientError, HandshakeFailure, Result, Severity};
pub use configs::{ClientConfig, Config, NodeConfig, ReconnectConfig, ResumingConfig};
pub use events::ClientEvent;
pub use gateway::ConnectionState;
pub use node::{Node, NodeRegistry};
pub use player::{PlayOutcome, Player, VoiceServerUpdate, VoiceStateUpdate};
pub use protocol::{LoadResult, PlayerUpdate, Track, TrackInfo};
