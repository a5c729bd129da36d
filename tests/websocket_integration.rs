// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the push connection against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ryobi_gdo_lib::event::ConnectionEvent;
use ryobi_gdo_lib::protocol::{
    ConnectionState, ReconnectionPolicy, WebSocketClient, WebSocketConfig,
};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const DEVICE: &str = "c4be84986d2e";
const API_KEY: &str = "integration-secret";

type Session = WebSocketStream<TcpStream>;

/// Starts a server that hands every accepted session to the test.
async fn start_server() -> (String, mpsc::UnboundedReceiver<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(session) = tokio_tungstenite::accept_async(tcp).await
                && tx.send(session).is_err()
            {
                break;
            }
        }
    });

    (format!("ws://{addr}/api/wsrpc"), rx)
}

/// Returns an endpoint where nothing is listening.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/api/wsrpc")
}

fn config(endpoint: &str, initial_delay: Duration) -> WebSocketConfig {
    WebSocketConfig::builder()
        .endpoint(endpoint)
        .username("user@example.com")
        .api_key(API_KEY)
        .device_id(DEVICE)
        .connect_timeout(Duration::from_secs(2))
        .handshake_timeout(Duration::from_secs(2))
        .reconnection(
            ReconnectionPolicy::new()
                .with_initial_delay(initial_delay)
                .with_max_delay(initial_delay * 4),
        )
        .build()
        .unwrap()
}

fn spawn_run(client: &Arc<WebSocketClient>) -> JoinHandle<()> {
    let runner = Arc::clone(client);
    tokio::spawn(async move { runner.run().await })
}

async fn next_session(sessions: &mut mpsc::UnboundedReceiver<Session>) -> Session {
    tokio::time::timeout(Duration::from_secs(5), sessions.recv())
        .await
        .expect("client connects in time")
        .expect("server running")
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

async fn next_json(session: &mut Session) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), session.next())
            .await
            .expect("frame in time")
            .expect("session open")
            .expect("valid frame");

        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(session: &mut Session, value: &Value) {
    session
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Reads the auth and subscribe requests of a fresh session.
async fn expect_handshake(session: &mut Session) {
    let auth = next_json(session).await;
    assert_eq!(auth["method"], "srvWebSocketAuth");
    assert_eq!(auth["params"]["varName"], "user@example.com");
    assert_eq!(auth["params"]["apiKey"], API_KEY);

    let subscribe = next_json(session).await;
    assert_eq!(subscribe["method"], "wskSubscribe");
    assert_eq!(
        subscribe["params"]["topic"],
        format!("{DEVICE}.wskAttributeUpdateNtfy")
    );
}

fn door_notification(code: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "wskAttributeUpdateNtfy",
        "params": {
            "topic": format!("{DEVICE}.wskAttributeUpdateNtfy"),
            "varName": DEVICE,
            "garageDoor_7.doorState": { "value": code, "lastValue": 0 },
        },
    })
}

// ============================================================================
// Session Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn connects_receives_data_and_stops() {
        let (endpoint, mut sessions) = start_server().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(50)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        let mut session = next_session(&mut sessions).await;
        expect_handshake(&mut session).await;
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::state_changed(ConnectionState::Connected)
        );

        let reply = json!({ "jsonrpc": "2.0", "id": 1, "result": { "authorized": true } });
        send_json(&mut session, &reply).await;
        send_json(&mut session, &door_notification(1)).await;

        assert_eq!(next_event(&mut events).await, ConnectionEvent::data(reply));
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::data(door_notification(1))
        );

        client.close().await;
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::state_changed(ConnectionState::Stopped)
        );

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn reconnects_after_remote_close() {
        let (endpoint, mut sessions) = start_server().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(50)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        let mut first = next_session(&mut sessions).await;
        expect_handshake(&mut first).await;
        assert_eq!(
            next_event(&mut events).await.state(),
            Some(ConnectionState::Connected)
        );

        first.close(None).await.unwrap();

        match next_event(&mut events).await {
            ConnectionEvent::StateChanged { state, error } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert!(error.is_some());
            }
            other => panic!("Expected Disconnected, got {other:?}"),
        }

        let mut second = next_session(&mut sessions).await;
        expect_handshake(&mut second).await;
        assert_eq!(
            next_event(&mut events).await.state(),
            Some(ConnectionState::Connected)
        );
        assert_eq!(client.failed_attempts(), 0);

        client.close().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_while_running() {
        let (endpoint, mut sessions) = start_server().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(50)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        let mut session = next_session(&mut sessions).await;
        expect_handshake(&mut session).await;
        next_event(&mut events).await;

        client.close().await;
        client.close().await;

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();

        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::state_changed(ConnectionState::Stopped)
        );
        assert!(events.try_recv().is_err(), "only one Stopped event");
    }
}

// ============================================================================
// Failures and Backoff
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_keeps_retrying() {
        let endpoint = dead_endpoint().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(20)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        for _ in 0..3 {
            match next_event(&mut events).await {
                ConnectionEvent::StateChanged { state, error } => {
                    assert_eq!(state, ConnectionState::Disconnected);
                    assert!(error.is_some());
                }
                other => panic!("Expected Disconnected, got {other:?}"),
            }
        }
        assert!(client.failed_attempts() >= 2);

        client.close().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_api_key_ends_session() {
        let (endpoint, mut sessions) = start_server().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_secs(1)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        let mut session = next_session(&mut sessions).await;
        expect_handshake(&mut session).await;
        next_event(&mut events).await;

        let rejection = json!({ "jsonrpc": "2.0", "id": 1, "result": { "authorized": false } });
        send_json(&mut session, &rejection).await;

        assert_eq!(next_event(&mut events).await, ConnectionEvent::data(rejection));
        match next_event(&mut events).await {
            ConnectionEvent::StateChanged { state, error } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert!(error.unwrap().contains("rejected"));
            }
            other => panic!("Expected Disconnected, got {other:?}"),
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while client.failed_attempts() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("failure is counted");

        client.close().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();
    }
}

// ============================================================================
// Outbound Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn send_message_reaches_server() {
        let (endpoint, mut sessions) = start_server().await;
        let (client, mut events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(50)));
        let client = Arc::new(client);
        let task = spawn_run(&client);

        let mut session = next_session(&mut sessions).await;
        expect_handshake(&mut session).await;
        next_event(&mut events).await;

        assert!(
            client
                .send_message(7, 5, "doorCommand", Value::from(1))
                .await
        );

        let command = next_json(&mut session).await;
        assert_eq!(command["method"], "gdoModuleCommand");
        assert_eq!(
            command["params"],
            json!({ "portId": 7, "moduleType": 5, "moduleMsg": { "doorCommand": 1 } })
        );

        client.close().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after close")
            .unwrap();
    }

    #[tokio::test]
    async fn send_message_before_connect_is_dropped() {
        let endpoint = dead_endpoint().await;
        let (client, _events) = WebSocketClient::new(config(&endpoint, Duration::from_millis(50)));

        assert!(
            !client
                .send_message(7, 5, "doorCommand", Value::from(1))
                .await
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
