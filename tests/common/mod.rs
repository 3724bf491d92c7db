//! Shared harness for integration tests: boots the real router on an
//! ephemeral port against a temp data dir and speaks to it over real
//! WebSocket / HTTP clients.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use huddle_server::chat::typing::TypingTable;
use huddle_server::meeting::MeetingRegistry;
use huddle_server::state::AppState;
use huddle_server::ws::ConnectionRegistry;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

/// Start the full server (router, typing sweep, temp SQLite) on a random port.
pub async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = huddle_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = huddle_server::auth::jwt::load_or_generate_secret(&data_dir, "jwt_secret")
        .expect("Failed to generate JWT secret");
    let meeting_token_secret =
        huddle_server::auth::jwt::load_or_generate_secret(&data_dir, "meeting_token_secret")
            .expect("Failed to generate meeting token secret");

    let state = AppState {
        db,
        jwt_secret,
        meeting_token_secret,
        meeting_token_ttl_secs: 60,
        connections: ConnectionRegistry::new(),
        typing: TypingTable::new(),
        meetings: MeetingRegistry::new(),
    };

    huddle_server::chat::typing::spawn_expiry_sweep(
        state.typing.clone(),
        state.connections.clone(),
    );

    let app = huddle_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    TestServer { addr, state }
}

pub fn token_for(server: &TestServer, user_id: &str, display_name: &str) -> String {
    huddle_server::auth::jwt::issue_access_token(&server.state.jwt_secret, user_id, display_name)
        .expect("Failed to issue token")
}

/// Open an authenticated push channel for a user.
pub async fn connect_ws(server: &TestServer, user_id: &str, display_name: &str) -> WsClient {
    let token = token_for(server, user_id, display_name);
    let url = format!("ws://{}/ws?token={}", server.addr, token);
    let (ws, _) = connect_async(url).await.expect("WS connect failed");
    ws
}

/// Send a client event as a JSON text frame.
pub async fn send_json(ws: &mut WsClient, event: Value) {
    ws.send(Message::Text(event.to_string().into()))
        .await
        .expect("WS send failed");
}

/// Receive the next event of the given type, skipping unrelated frames.
/// Panics after 5 seconds without a match.
pub async fn recv_event(ws: &mut WsClient, event_type: &str) -> Value {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for '{}' event", event_type))
            .expect("WS stream ended")
            .expect("WS receive error");

        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(&text).expect("non-JSON frame");
            if value["type"] == event_type {
                return value;
            }
        }
    }
}

/// Assert that no event of the given type arrives within the window.
/// Unrelated frames are drained and ignored.
pub async fn assert_no_event(ws: &mut WsClient, event_type: &str, window_ms: u64) {
    let drain = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).expect("non-JSON frame");
                    assert_ne!(
                        value["type"], event_type,
                        "unexpected '{}' event: {}",
                        event_type, value
                    );
                }
                Some(Ok(_)) => {}
                _ => break,
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_millis(window_ms), drain).await;
}

/// REST helper: authenticated reqwest client call base.
pub fn api_url(server: &TestServer, path: &str) -> String {
    format!("http://{}{}", server.addr, path)
}
