//! Live presence figures for the enclosing service

use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Reply};

use crate::core::hub::HubHandle;

#[derive(Debug, Serialize)]
pub struct RoomSize {
    pub room_id: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct HubStats {
    pub clients: usize,
}

/// Path segments arrive percent-encoded, so the room id is decoded first
pub async fn room_size(raw_room_id: String, hub: HubHandle) -> Result<reply::Response, warp::Rejection> {
    let room_id = match urlencoding::decode(&raw_room_id) {
        Ok(room_id) => room_id.into_owned(),
        Err(e) => {
            log::debug!("Room id {} is not valid UTF-8: {}", raw_room_id, e);
            return Ok(reply::with_status(
                reply::json(&serde_json::json!({ "error": "Room id is not valid UTF-8" })),
                StatusCode::BAD_REQUEST,
            )
            .into_response());
        }
    };

    match hub.room_size(room_id.clone()).await {
        Ok(size) => Ok(reply::json(&RoomSize { room_id, size }).into_response()),
        Err(e) => Ok(unavailable(e)),
    }
}

pub async fn hub_stats(hub: HubHandle) -> Result<reply::Response, warp::Rejection> {
    match hub.client_count().await {
        Ok(clients) => Ok(reply::json(&HubStats { clients }).into_response()),
        Err(e) => Ok(unavailable(e)),
    }
}

fn unavailable(e: crate::error::ChatHubError) -> reply::Response {
    log::error!("Stats request failed: {}", e);
    reply::with_status(
        reply::json(&serde_json::json!({ "error": e.to_string() })),
        StatusCode::SERVICE_UNAVAILABLE,
    )
    .into_response()
}
