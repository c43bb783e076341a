// End-to-end tests of the hub's routes through warp's test harness

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use warp::test::WsClient;
use warp::Filter;

use chat_hub::auth::{Claims, TokenManager};
use chat_hub::core::client::{ClientConfig, Identity};
use chat_hub::core::hub::{Hub, HubConfig, HubHandle};
use chat_hub::handlers::routes;

const SECRET: &str = "ws-test-signing-key-7c6b5a4f3e2d1c0b9a8z";

struct TestServer {
    hub: HubHandle,
    tokens: Arc<TokenManager>,
}

impl TestServer {
    fn start() -> Self {
        let (hub, _task) = Hub::spawn(&HubConfig::default());
        Self {
            hub,
            tokens: Arc::new(TokenManager::new(SECRET)),
        }
    }

    fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone + 'static
    {
        routes(self.hub.clone(), self.tokens.clone(), ClientConfig::default())
    }

    fn token(&self, user: &str, tenant: &str) -> String {
        self.tokens
            .generate_token(&Claims::new(user, tenant))
            .unwrap()
    }

    async fn connect(&self, user: &str) -> WsClient {
        warp::test::ws()
            .path("/ws")
            .header("authorization", format!("Bearer {}", self.token(user, "acme")))
            .handshake(self.routes())
            .await
            .expect("handshake")
    }

    async fn wait_for(&self, mut done: impl FnMut(usize, usize) -> bool, room_id: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let clients = self.hub.client_count().await.unwrap();
                let size = self.hub.room_size(room_id).await.unwrap();
                if done(clients, size) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("hub never reached the expected state");
    }
}

async fn recv_json(client: &mut WsClient) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("websocket error");
    serde_json::from_str(message.to_str().expect("text frame")).unwrap()
}

#[tokio::test]
async fn test_room_chat_over_websocket() {
    let server = TestServer::start();
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;

    alice
        .send_text(r#"{"type":"join_room","room_id":"support"}"#)
        .await;
    bob.send_text(r#"{"type":"join_room","room_id":"support"}"#)
        .await;
    server.wait_for(|_, size| size == 2, "support").await;

    alice
        .send_text(r#"{"type":"chat_message","room_id":"support","user_id":"bob","content":"hi bob"}"#)
        .await;

    let received = recv_json(&mut bob).await;
    assert_eq!(received["content"], "hi bob");
    assert_eq!(received["user_id"], "alice");
    assert_eq!(received["tenant_id"], "acme");
    assert!(received["timestamp"].is_string());
}

#[tokio::test]
async fn test_upgrade_without_token_is_rejected() {
    let server = TestServer::start();

    let result = warp::test::ws().path("/ws").handshake(server.routes()).await;
    assert!(result.is_err());

    let result = warp::test::ws()
        .path("/ws")
        .header("authorization", "Bearer not-a-jwt")
        .handshake(server.routes())
        .await;
    assert!(result.is_err());

    assert_eq!(server.hub.client_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unauthorized_response_body() {
    let server = TestServer::start();

    let response = warp::test::request()
        .path("/ws")
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .reply(&server.routes())
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_x_auth_token_header_is_accepted() {
    let server = TestServer::start();

    let client = warp::test::ws()
        .path("/ws")
        .header("x-auth-token", server.token("carol", "acme"))
        .handshake(server.routes())
        .await;
    assert!(client.is_ok());

    server.wait_for(|clients, _| clients == 1, "support").await;
}

#[tokio::test]
async fn test_disconnect_removes_client() {
    let server = TestServer::start();
    let mut alice = server.connect("alice").await;
    let dave = server.connect("dave").await;

    alice
        .send_text(r#"{"type":"join_room","room_id":"support"}"#)
        .await;
    server.wait_for(|clients, size| clients == 2 && size == 1, "support").await;

    drop(dave);
    server.wait_for(|clients, _| clients == 1, "support").await;
    assert_eq!(server.hub.room_size("support").await.unwrap(), 1);
}

#[tokio::test]
async fn test_health_and_stats_endpoints() {
    let server = TestServer::start();
    let mut alice = server.connect("alice").await;
    alice
        .send_text(r#"{"type":"join_room","room_id":"support"}"#)
        .await;
    server.wait_for(|_, size| size == 1, "support").await;

    let health = warp::test::request()
        .path("/health")
        .reply(&server.routes())
        .await;
    assert_eq!(health.status(), 200);
    assert_eq!(health.body(), "OK");

    let size = warp::test::request()
        .path("/rooms/support/size")
        .reply(&server.routes())
        .await;
    assert_eq!(size.status(), 200);
    let body: Value = serde_json::from_slice(size.body()).unwrap();
    assert_eq!(body["room_id"], "support");
    assert_eq!(body["size"], 1);

    let missing = warp::test::request()
        .path("/rooms/nowhere/size")
        .reply(&server.routes())
        .await;
    let body: Value = serde_json::from_slice(missing.body()).unwrap();
    assert_eq!(body["size"], 0);

    let stats = warp::test::request()
        .path("/stats")
        .reply(&server.routes())
        .await;
    let body: Value = serde_json::from_slice(stats.body()).unwrap();
    assert_eq!(body["clients"], 1);

    let unknown = warp::test::request()
        .path("/nope")
        .reply(&server.routes())
        .await;
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_saturated_admission_closes_socket() {
    let tokens = Arc::new(TokenManager::new(SECRET));
    let (hub, handle) = Hub::new(&HubConfig {
        register_queue_capacity: 1,
        ..HubConfig::default()
    });
    let _queued = handle.register(Identity::new("early", "acme")).unwrap();

    let token = tokens.generate_token(&Claims::new("late", "acme")).unwrap();
    let mut client = warp::test::ws()
        .path("/ws")
        .header("authorization", format!("Bearer {}", token))
        .handshake(routes(handle.clone(), tokens, ClientConfig::default()))
        .await
        .expect("handshake");

    let next = tokio::time::timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("refused connection was left open");
    if let Ok(message) = next {
        assert!(message.is_close());
    }

    tokio::spawn(hub.run());
    assert_eq!(handle.client_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_room_size_decodes_room_id() {
    let server = TestServer::start();
    let mut alice = server.connect("alice").await;
    alice
        .send_text(r#"{"type":"join_room","room_id":"team chat"}"#)
        .await;
    server.wait_for(|_, size| size == 1, "team chat").await;

    let response = warp::test::request()
        .path("/rooms/team%20chat/size")
        .reply(&server.routes())
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["room_id"], "team chat");
    assert_eq!(body["size"], 1);

    let invalid = warp::test::request()
        .path("/rooms/%FF/size")
        .reply(&server.routes())
        .await;
    assert_eq!(invalid.status(), 400);
}

#[tokio::test]
async fn test_rejection_status_codes() {
    let server = TestServer::start();

    let wrong_method = warp::test::request()
        .method("POST")
        .path("/stats")
        .reply(&server.routes())
        .await;
    assert_eq!(wrong_method.status(), 405);

    let not_upgraded = warp::test::request()
        .path("/ws")
        .header("authorization", format!("Bearer {}", server.token("alice", "acme")))
        .reply(&server.routes())
        .await;
    assert_eq!(not_upgraded.status(), 400);
    let body: Value = serde_json::from_slice(not_upgraded.body()).unwrap();
    assert!(body["error"].is_string());
}
