//! End-to-end match over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use broadside::network::protocol::{ErrorCode, Reply, ServerMessage};
use broadside::{ClientId, GameServer, ServerConfig, ShotResult};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<GameServer>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = Arc::new(GameServer::new(ServerConfig::default()));
    {
        let server = server.clone();
        tokio::spawn(async move { server.run_with_listener(listener).await });
    }

    (server, url)
}

async fn connect(url: &str) -> (Ws, ClientId) {
    let (mut ws, _) = connect_async(url).await.unwrap();
    match recv(&mut ws).await {
        ServerMessage::Connected { client_id } => (ws, client_id),
        other => panic!("expected greeting, got {:?}", other),
    }
}

async fn send(ws: &mut Ws, frame: serde_json::Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(&text).unwrap();
        }
    }
}

async fn recv_reply(ws: &mut Ws) -> Reply {
    match recv(ws).await {
        ServerMessage::Reply(reply) => reply,
        other => panic!("expected reply, got {:?}", other),
    }
}

fn board(boats: [usize; 6]) -> Vec<&'static str> {
    let mut cells = vec!["water"; 36];
    for p in boats {
        cells[p] = "boat";
    }
    cells
}

#[tokio::test]
async fn test_full_match_over_websocket() {
    let (server, url) = start_server().await;
    let (mut alice, alice_id) = connect(&url).await;
    let (mut bob, bob_id) = connect(&url).await;
    assert_ne!(alice_id, bob_id);

    send(&mut alice, json!({ "type": "createGame", "ack": 1 })).await;
    let reply = recv_reply(&mut alice).await;
    assert!(reply.success);
    assert_eq!(reply.ack, Some(1));
    let session_id = reply.session_id.unwrap();
    assert_eq!(session_id.as_str().len(), 10);

    send(&mut bob, json!({ "type": "joinGame", "ack": 1, "sessionId": session_id })).await;
    assert!(recv_reply(&mut bob).await.success);

    send(
        &mut alice,
        json!({ "type": "submitBoard", "ack": 2, "sessionId": session_id, "board": board([0, 1, 2, 3, 4, 5]) }),
    )
    .await;
    let reply = recv_reply(&mut alice).await;
    assert_eq!(reply.players_ready, Some(1));
    assert_eq!(reply.total_players, Some(2));

    send(
        &mut bob,
        json!({ "type": "submitBoard", "ack": 2, "sessionId": session_id, "board": board([5, 11, 17, 23, 29, 35]) }),
    )
    .await;
    assert_eq!(recv_reply(&mut bob).await.players_ready, Some(2));

    for ws in [&mut alice, &mut bob] {
        match recv(ws).await {
            ServerMessage::GameStart(start) => {
                assert_eq!(start.participants, vec![alice_id, bob_id]);
                assert!(start.participants.contains(&start.starting_player));
            }
            other => panic!("expected gameStart, got {:?}", other),
        }
    }

    send(&mut alice, json!({ "type": "attack", "ack": 3, "sessionId": session_id, "position": 5 })).await;
    assert!(recv_reply(&mut alice).await.success);
    assert_eq!(recv(&mut bob).await, ServerMessage::OpponentAttack { position: 5 });

    for position in [5, 11, 17, 23, 29, 35] {
        send(
            &mut bob,
            json!({ "type": "attackResult", "sessionId": session_id, "position": position, "result": "hit" }),
        )
        .await;
    }

    for position in [5, 11, 17, 23, 29] {
        match recv(&mut alice).await {
            ServerMessage::AttackResult(outcome) => {
                assert_eq!(outcome.position, position);
                assert_eq!(outcome.result, ShotResult::Hit);
            }
            other => panic!("expected attackResult, got {:?}", other),
        }
    }

    for ws in [&mut alice, &mut bob] {
        match recv(ws).await {
            ServerMessage::GameOver(over) => assert_eq!(over.winner, alice_id),
            other => panic!("expected gameOver, got {:?}", other),
        }
    }

    send(&mut bob, json!({ "type": "joinGame", "ack": 9, "sessionId": session_id })).await;
    let reply = recv_reply(&mut bob).await;
    assert_eq!(reply.code, Some(ErrorCode::NotFound));
    assert_eq!(server.session_count().await, 0);

    server.shutdown();
    for ws in [&mut alice, &mut bob] {
        assert!(matches!(recv(ws).await, ServerMessage::Shutdown { .. }));
    }
}

#[tokio::test]
async fn test_malformed_frame_gets_error() {
    let (server, url) = start_server().await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    match recv(&mut ws).await {
        ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidMessage),
        other => panic!("expected error, got {:?}", other),
    }

    // Connection stays usable
    send(&mut ws, json!({ "type": "ping" })).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Pong { .. }));

    server.shutdown();
}

#[tokio::test]
async fn test_foreign_origin_rejected() {
    let (server, url) = start_server().await;

    let mut request = url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://evil.example"));
    assert!(connect_async(request).await.is_err());

    let mut request = url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://localhost:5173"));
    assert!(connect_async(request).await.is_ok());

    server.shutdown();
}
