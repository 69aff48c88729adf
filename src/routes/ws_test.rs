use std::net::SocketAddr;

use frames::{ClientEvent, Element, Point, decode_server_event, encode_client_event};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::*;
use crate::state::test_helpers::{rect, test_app_state};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = test_app_state();
    let app = crate::routes::app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, room: &str, id: &str) -> Client {
    let url = format!("ws://{addr}/ws?room={room}&id={id}&name={id}");
    let (client, _) = connect_async(url).await.expect("websocket connect failed");
    client
}

async fn recv(client: &mut Client) -> ServerEvent {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return decode_server_event(text.as_str()).expect("undecodable server event");
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let next = timeout(Duration::from_millis(100), client.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}

/// Wait for the server to end the connection.
async fn assert_closed(client: &mut Client) {
    loop {
        match timeout(Duration::from_secs(2), client.next()).await.expect("close timed out") {
            None | Some(Err(_) | Ok(WsMessage::Close(_))) => return,
            Some(Ok(_)) => {}
        }
    }
}

async fn send(client: &mut Client, event: &ClientEvent) {
    let json = encode_client_event(event).unwrap();
    client.send(WsMessage::Text(json.into())).await.unwrap();
}

/// Join and consume the `joined` / `users` / `elements` greeting.
async fn join(addr: SocketAddr, room: &str, id: &str) -> (Client, Vec<Element>) {
    let mut client = connect(addr, room, id).await;
    assert!(matches!(recv(&mut client).await, ServerEvent::Joined { .. }));
    assert!(matches!(recv(&mut client).await, ServerEvent::Users { .. }));
    let ServerEvent::Elements { elements } = recv(&mut client).await else {
        panic!("expected elements snapshot");
    };
    (client, elements)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// =============================================================================
// admission
// =============================================================================

#[tokio::test]
async fn upgrade_without_name_is_refused_with_400() {
    let (addr, _state) = spawn_relay().await;
    let err = connect_async(format!("ws://{addr}/ws?room=r1&id=p1")).await.unwrap_err();
    let tokio_tungstenite::tungstenite::Error::Http(response) = err else {
        panic!("expected http rejection, got {err:?}");
    };
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn greeting_is_joined_users_elements() {
    let (addr, _state) = spawn_relay().await;
    let mut client = connect(addr, "r1", "alice").await;

    assert_eq!(
        recv(&mut client).await,
        ServerEvent::Joined { room_id: "r1".into(), participant_id: "alice".into() }
    );
    let ServerEvent::Users { users } = recv(&mut client).await else {
        panic!("expected users");
    };
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "alice");
    assert_eq!(recv(&mut client).await, ServerEvent::Elements { elements: Vec::new() });
}

#[tokio::test]
async fn missing_room_gets_generated_token() {
    let (addr, _state) = spawn_relay().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/ws?id=p1&name=Ada")).await.unwrap();
    let ServerEvent::Joined { room_id, .. } = recv(&mut client).await else {
        panic!("expected joined");
    };
    assert_eq!(room_id.len(), 32);
}

#[tokio::test]
async fn reconnect_with_same_id_replaces_previous_connection() {
    let (addr, state) = spawn_relay().await;
    let (mut first, _) = join(addr, "r1", "alice").await;
    let (mut bob, _) = join(addr, "r1", "bob").await;
    recv(&mut first).await; // users

    let (mut second, _) = join(addr, "r1", "alice").await;
    assert!(matches!(recv(&mut bob).await, ServerEvent::Users { users } if users.len() == 2));
    assert_closed(&mut first).await;

    // The superseded connection's leave must not remove the new one.
    sleep(Duration::from_millis(100)).await;
    let ids: Vec<String> = state.registry.participants("r1").await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, ["alice", "bob"]);
    assert_silent(&mut bob).await;

    send(&mut bob, &ClientEvent::ElementAdd { element: rect("e1") }).await;
    assert_eq!(recv(&mut second).await, ServerEvent::ElementAdd { element: rect("e1") });
}

// =============================================================================
// relay
// =============================================================================

#[tokio::test]
async fn late_joiner_sees_snapshot_then_live_delete() {
    let (addr, state) = spawn_relay().await;
    let (mut alice, _) = join(addr, "r1", "alice").await;

    send(&mut alice, &ClientEvent::ElementAdd { element: rect("e1") }).await;
    wait_until(|| {
        let state = state.clone();
        async move { !state.registry.elements("r1").await.is_empty() }
    })
    .await;

    let (mut bob, elements) = join(addr, "r1", "bob").await;
    assert_eq!(elements, vec![rect("e1")]);
    assert!(matches!(recv(&mut alice).await, ServerEvent::Users { users } if users.len() == 2));

    send(&mut alice, &ClientEvent::ElementDelete { id: "e1".into() }).await;
    assert_eq!(recv(&mut bob).await, ServerEvent::ElementDelete { id: "e1".into() });
    assert!(state.registry.elements("r1").await.is_empty());
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn cursor_moves_reach_peers_with_sender_id() {
    let (addr, _state) = spawn_relay().await;
    let (mut alice, _) = join(addr, "r1", "alice").await;
    let (mut bob, _) = join(addr, "r1", "bob").await;
    recv(&mut alice).await; // users

    let position = Point::new(5.0, 6.0);
    send(&mut alice, &ClientEvent::CursorMove { position }).await;
    assert_eq!(recv(&mut bob).await, ServerEvent::CursorMove { participant_id: "alice".into(), position });
}

#[tokio::test]
async fn malformed_event_errors_sender_only() {
    let (addr, _state) = spawn_relay().await;
    let (mut alice, _) = join(addr, "r1", "alice").await;
    let (mut bob, _) = join(addr, "r1", "bob").await;
    recv(&mut alice).await; // users

    alice.send(WsMessage::Text("{\"type\":\"element-explode\"}".into())).await.unwrap();
    let ServerEvent::Error { code, .. } = recv(&mut alice).await else {
        panic!("expected error");
    };
    assert_eq!(code, "E_MALFORMED_EVENT");
    assert_silent(&mut bob).await;

    // The room keeps working.
    send(&mut alice, &ClientEvent::ElementAdd { element: rect("e1") }).await;
    assert_eq!(recv(&mut bob).await, ServerEvent::ElementAdd { element: rect("e1") });
}

#[tokio::test]
async fn invalid_element_is_rejected_and_not_applied() {
    let (addr, state) = spawn_relay().await;
    let (mut alice, _) = join(addr, "r1", "alice").await;

    let frame = serde_json::json!({
        "type": "element-add",
        "element": { "id": "e1", "kind": "rectangle", "x1": 0, "y1": 0, "x2": 1, "y2": 1, "strokeSize": -2 }
    });
    alice.send(WsMessage::Text(frame.to_string().into())).await.unwrap();

    let ServerEvent::Error { code, .. } = recv(&mut alice).await else {
        panic!("expected error");
    };
    assert_eq!(code, "E_INVALID_ELEMENT");
    assert!(state.registry.elements("r1").await.is_empty());
}

#[tokio::test]
async fn disconnect_updates_users_and_last_leave_destroys_room() {
    let (addr, state) = spawn_relay().await;
    let (mut alice, _) = join(addr, "r1", "alice").await;
    let (mut bob, _) = join(addr, "r1", "bob").await;
    recv(&mut alice).await; // users

    alice.close(None).await.unwrap();
    let ServerEvent::Users { users } = recv(&mut bob).await else {
        panic!("expected users");
    };
    assert_eq!(users.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), ["bob"]);

    bob.close(None).await.unwrap();
    wait_until(|| {
        let state = state.clone();
        async move { state.registry.room_count().await == 0 }
    })
    .await;
}

// =============================================================================
// health
// =============================================================================

#[tokio::test]
async fn healthz_returns_ok() {
    let (addr, _state) = spawn_relay().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
}
