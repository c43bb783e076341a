//! Wire envelope exchanged with connected peers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::core::client::Identity;
use crate::error::Result;

/// A serialized envelope, shared between every recipient of a broadcast
pub type Frame = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    JoinRoom,
    LeaveRoom,
    ChatMessage,
    /// Any type this server does not know about yet
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub room_id: String,
    /// Sender fields come from the connection's identity, never from the wire
    #[serde(skip_deserializing)]
    pub user_id: String,
    #[serde(skip_deserializing)]
    pub tenant_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Assigned on receipt; whatever the peer sent is ignored
    #[serde(skip_deserializing, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// An explicit null reads the same as an absent field
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Parse an inbound payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Overwrite sender fields with the connection's bound identity
    pub fn stamp(&mut self, identity: &Identity) {
        self.user_id.clone_from(&identity.user_id);
        self.tenant_id.clone_from(&identity.tenant_id);
        self.timestamp = Utc::now();
    }

    /// Serialize for fan-out
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }

    pub fn is_global(&self) -> bool {
        self.room_id.is_empty()
    }
}
