//! Chat Hub - real-time room-scoped messaging over WebSocket
//!
//! This library provides the connection registry, the room broadcaster and
//! the per-connection actors, plus the warp routes that host them.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
