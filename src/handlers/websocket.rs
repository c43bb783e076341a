use futures_util::stream::StreamExt;
use log::{info, warn};
use warp::ws::WebSocket;

use crate::core::client::{Client, ClientConfig, Identity};
use crate::core::hub::HubHandle;

// Handle an upgraded WebSocket connection for an authenticated identity
pub async fn handle_ws_client(
    ws: WebSocket,
    identity: Identity,
    hub: HubHandle,
    config: ClientConfig,
) {
    let session = match hub.register(identity) {
        Ok(session) => session,
        Err(e) => {
            // No client exists yet; close the socket and stop here
            warn!("Connection refused: {}", e);
            if let Err(e) = ws.close().await {
                warn!("Failed to close refused connection: {}", e);
            }
            return;
        }
    };

    info!("Client connected: {} (user={})", session.id, session.identity.user_id);

    let (ws_tx, ws_rx) = ws.split();
    let client = Client::new(session, hub, config);
    client.run(ws_tx, ws_rx).await;
}
