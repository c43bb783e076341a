//! Request handlers for different server endpoints

pub mod auth;
pub mod stats;
pub mod websocket;

use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::token::TokenManager;
use crate::constants::WS_PATH;
use crate::core::client::{ClientConfig, Identity};
use crate::core::hub::HubHandle;

// Re-export the websocket handler
pub use websocket::handle_ws_client;

/// All routes served by the hub: the WebSocket endpoint, health and stats
pub fn routes(
    hub: HubHandle,
    tokens: Arc<TokenManager>,
    client_config: ClientConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_message_size = client_config.max_message_size;

    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(auth::with_identity(tokens))
        .and(warp::ws())
        .and(with_hub(hub.clone()))
        .and(warp::any().map(move || client_config.clone()))
        .map(
            move |identity: Identity, ws: warp::ws::Ws, hub: HubHandle, config: ClientConfig| {
                log::debug!("Upgrading connection for user {}", identity.user_id);
                ws.max_message_size(max_message_size)
                    .on_upgrade(move |socket| handle_ws_client(socket, identity, hub, config))
            },
        );

    let health_route = warp::path("health").and(warp::path::end()).map(|| "OK");

    let room_size_route = warp::path!("rooms" / String / "size")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(stats::room_size);

    let stats_route = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_hub(hub))
        .and_then(stats::hub_stats);

    ws_route
        .or(health_route)
        .or(room_size_route)
        .or(stats_route)
        .recover(handle_rejection)
}

// Helper function to include the hub handle in request
fn with_hub(hub: HubHandle) -> impl Filter<Extract = (HubHandle,), Error = Infallible> + Clone {
    warp::any().map(move || hub.clone())
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(auth::Unauthorized(reason)) = err.find::<auth::Unauthorized>() {
        (StatusCode::UNAUTHORIZED, reason.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    ))
}
