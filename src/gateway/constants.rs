/// Path of the event-stream upgrade endpoint.
pub const WEBSOCKET_PATH: &str = "/v4/websocket";

/// Time allowed for a receive task to close its socket during shutdown.
pub const SHUTDOWN_GRACE_MS: u64 = 500;

/// Upper bound for the exponent of the reconnect backoff.
pub const BACKOFF_MAX_EXPONENT: u32 = 16;
