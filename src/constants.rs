// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";

// Connection timing, in seconds
pub const DEFAULT_PONG_WAIT_SECS: u64 = 60;
pub const DEFAULT_WRITE_WAIT_SECS: u64 = 10;

/// Largest inbound frame payload accepted from a peer
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

// Queue capacities
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_REGISTER_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 1024;
