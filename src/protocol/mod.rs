pub mod events;
pub mod models;
pub mod opcodes;
pub mod stats;
pub mod tracks;

pub use events::*;
pub use models::*;
pub use opcodes::*;
pub use stats::*;
pub use tracks::*;
