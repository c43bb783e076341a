//! Core functionality of the messaging hub

pub mod client;
pub mod envelope;
pub mod hub;
pub mod room;

// Re-export main components for convenience
pub use client::{Client, ClientConfig, ClientId, ClientSession, Disconnect, Identity};
pub use envelope::{Envelope, EnvelopeKind, Frame};
pub use hub::{Hub, HubConfig, HubHandle};
pub use room::RoomIndex;
