// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the WebSocket transport against a loopback server.

#![cfg(feature = "websocket")]

use std::net::SocketAddr;
use std::time::Duration;

use brewlink::connection::{
    ConnectionConfig, ConnectionManager, ConnectionMode, ConnectionState, ReconnectPolicy,
};
use brewlink::protocol::WireMessage;
use brewlink::publisher::{SimulatedMachine, StatusPublisher};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

const WAIT: Duration = Duration::from_secs(5);

fn config(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig::new(ConnectionMode::direct(addr.to_string()))
        .with_reconnect(ReconnectPolicy::new(
            Duration::from_millis(50),
            Duration::from_secs(1),
        ))
}

async fn serve_once(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn connected_pair() -> (ConnectionManager, WebSocketStream<TcpStream>, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let manager = ConnectionManager::websocket(config(listener.local_addr().unwrap()));

    let (connected, server) = tokio::join!(manager.connect(), serve_once(&listener));
    connected.unwrap();
    (manager, server, listener)
}

fn watch_states(manager: &ConnectionManager) -> mpsc::UnboundedReceiver<ConnectionState> {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = manager.on_state_change(move |state| {
        let _ = tx.send(*state);
    });
    // Registrations stay until unsubscribed.
    drop(subscription);
    rx
}

async fn wait_for_state(states: &mut mpsc::UnboundedReceiver<ConnectionState>, wanted: ConnectionState) {
    timeout(WAIT, async {
        while let Some(state) = states.recv().await {
            if state == wanted {
                return;
            }
        }
        panic!("state stream ended before {wanted}");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"));
}

#[tokio::test]
async fn publisher_greeting_reaches_client() {
    let (manager, server, _listener) = connected_pair().await;
    assert!(manager.is_connected());

    let (tx, mut received) = mpsc::unbounded_channel();
    let _sub = manager.on_message(move |message| {
        let _ = tx.send(message.clone());
    });

    let (mut write, _read) = server.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(16);
    tokio::spawn(
        StatusPublisher::new(SimulatedMachine::new())
            .with_cadence(Duration::from_millis(50))
            .run(out_tx),
    );
    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if write.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
    });

    let first = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    let WireMessage::DeviceInfo(info) = first else {
        panic!("expected device_info, got {first:?}");
    };
    assert_eq!(info.device_id, "SIM-0001");

    let second = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    let WireMessage::Status(status) = second else {
        panic!("expected status, got {second:?}");
    };
    assert!(status.groups().is_all());

    let third = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(third.kind(), "status");
}

#[tokio::test]
async fn commands_reach_server() {
    let (manager, mut server, _listener) = connected_pair().await;

    assert!(manager.send("set_temp", serde_json::json!({"boiler": "brew", "temp": 94.0})));

    let frame = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = frame else {
        panic!("expected text frame, got {frame:?}");
    };
    let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"type": "set_temp", "boiler": "brew", "temp": 94.0})
    );
}

#[tokio::test]
async fn server_normal_close_disconnects() {
    let (manager, mut server, _listener) = connected_pair().await;
    let mut states = watch_states(&manager);

    server
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "shutting down".into(),
        }))
        .await
        .unwrap();

    wait_for_state(&mut states, ConnectionState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn client_disconnect_sends_normal_close() {
    let (manager, mut server, _listener) = connected_pair().await;

    manager.disconnect();

    let code = timeout(WAIT, async {
        while let Some(frame) = server.next().await {
            if let Ok(Message::Close(frame)) = frame {
                return frame.map(|f| f.code);
            }
        }
        None
    })
    .await
    .unwrap();
    assert_eq!(code, Some(CloseCode::Normal));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn dropped_socket_reconnects() {
    let (manager, server, listener) = connected_pair().await;
    let first_link = manager.link_id();
    let mut states = watch_states(&manager);

    drop(server);
    wait_for_state(&mut states, ConnectionState::Reconnecting).await;

    let _server = timeout(WAIT, serve_once(&listener)).await.unwrap();
    wait_for_state(&mut states, ConnectionState::Connected).await;

    assert_ne!(manager.link_id(), first_link);
    manager.disconnect();
}

#[tokio::test]
async fn server_ping_gets_single_pong() {
    let (manager, mut server, _listener) = connected_pair().await;

    server.send(Message::Ping(b"beat".to_vec().into())).await.unwrap();
    // Any pong reply is written before this marker frame
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.send("ping_marker", serde_json::json!({})));

    let pongs = timeout(WAIT, async {
        let mut pongs = Vec::new();
        while let Some(frame) = server.next().await {
            match frame.unwrap() {
                Message::Pong(data) => pongs.push(data.to_vec()),
                Message::Text(_) => return pongs,
                other => panic!("unexpected frame {other:?}"),
            }
        }
        pongs
    })
    .await
    .unwrap();

    assert_eq!(pongs, vec![b"beat".to_vec()]);
    manager.disconnect();
}
