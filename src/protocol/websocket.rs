// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket client for the vendor push endpoint.
//!
//! [`WebSocketClient`] owns the lifecycle of the push connection:
//!
//! ```text
//! Disconnected --connect, auth, subscribe--> Connected
//! Connected --remote close, stream end, send failure--> Disconnected
//! any --close()--> Stopped (terminal)
//! ```
//!
//! [`WebSocketClient::run`] keeps reconnecting with backoff until
//! [`WebSocketClient::close`] is called. Every transition and every decoded
//! frame is reported on the event channel returned by
//! [`WebSocketClient::new`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use ryobi_gdo_lib::protocol::{WebSocketClient, WebSocketConfig};
//!
//! # async fn example() -> ryobi_gdo_lib::Result<()> {
//! let config = WebSocketConfig::builder()
//!     .username("user@example.com")
//!     .api_key("api-key")
//!     .device_id("c4be84986d2e")
//!     .build()?;
//!
//! let (client, _events) = WebSocketClient::new(config);
//! let client = Arc::new(client);
//!
//! let runner = Arc::clone(&client);
//! let task = tokio::spawn(async move { runner.run().await });
//!
//! // ... later
//! client.close().await;
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::error::ProtocolError;
use crate::event::ConnectionEvent;

use super::WebSocketConfig;
use super::messages;

/// Upper bound on the graceful close of a write half.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Write half of a session.
type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Lifecycle state of the push connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session is established. Initial state.
    #[default]
    Disconnected,
    /// Authenticated and subscribed.
    Connected,
    /// Closed by the operator. Terminal.
    Stopped,
}

impl ConnectionState {
    /// Returns true if the session is authenticated and subscribed.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true once the client has been closed.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended.
struct SessionEnd {
    error: ProtocolError,
    /// The failure was already reported by `websocket_send`.
    reported: bool,
}

impl SessionEnd {
    fn new(error: ProtocolError) -> Self {
        Self {
            error,
            reported: false,
        }
    }

    fn reported(error: ProtocolError) -> Self {
        Self {
            error,
            reported: true,
        }
    }
}

/// Durable, authenticated connection to the push endpoint.
///
/// The client is shared behind an `Arc`: one task drives [`run`](Self::run)
/// while device adapters call [`send_message`](Self::send_message) and the
/// operator eventually calls [`close`](Self::close).
pub struct WebSocketClient {
    config: WebSocketConfig,
    state: RwLock<ConnectionState>,
    failed_attempts: AtomicU32,
    request_id: AtomicU64,
    writer: tokio::sync::Mutex<Option<FrameSink>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
    /// Cancelled when the current session must end.
    session: Mutex<CancellationToken>,
}

impl WebSocketClient {
    /// Creates a disconnected client and the receiver for its events.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let client = Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            failed_attempts: AtomicU32::new(0),
            request_id: AtomicU64::new(1),
            writer: tokio::sync::Mutex::new(None),
            events,
            session: Mutex::new(cancel.child_token()),
            cancel,
        };
        (client, receiver)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Returns the number of consecutive failed connection attempts.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::Acquire)
    }

    /// Moves to `state` and emits exactly one state change event.
    ///
    /// Returns `false` without emitting anything once the client is
    /// [`Stopped`](ConnectionState::Stopped).
    pub fn set_state(&self, state: ConnectionState, error: Option<String>) -> bool {
        let mut current = self.state.write();
        if current.is_stopped() {
            tracing::trace!(requested = %state, "Ignoring state change after stop");
            return false;
        }

        *current = state;
        tracing::debug!(state = %state, error = ?error, "Push connection state changed");

        // Sent under the lock so events keep the order of the transitions
        let _ = self
            .events
            .send(ConnectionEvent::StateChanged { state, error });
        true
    }

    /// Connects and serves sessions until [`close`](Self::close) is called.
    ///
    /// Every ended session counts as a failed attempt and is followed by a
    /// backoff delay from the configured
    /// [`ReconnectionPolicy`](super::ReconnectionPolicy). The counter resets
    /// when a session reaches `Connected`.
    pub async fn run(&self) {
        tracing::info!(
            endpoint = %self.config.endpoint(),
            device_id = %self.config.device_id(),
            "Starting push connection"
        );

        while !self.state().is_stopped() {
            if let Err(e) = self.connect_and_serve().await {
                if self.state().is_stopped() {
                    break;
                }
                tracing::warn!(error = %e, "Push session ended");
            }

            let attempts = self.failed_attempts.fetch_add(1, Ordering::AcqRel) + 1;
            let delay = self
                .config
                .reconnection()
                .delay_for_attempt(attempts.saturating_sub(1));

            tracing::debug!(attempts, delay_ms = %delay.as_millis(), "Reconnecting after backoff");

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Push connection stopped");
    }

    /// Opens the transport and serves one session on it.
    async fn connect_and_serve(&self) -> Result<(), ProtocolError> {
        let connect = tokio_tungstenite::connect_async(self.config.endpoint().as_str());
        let timeout = self.config.connect_timeout();

        let connected = tokio::select! {
            () = self.cancel.cancelled() => return Err(ProtocolError::Stopped),
            result = tokio::time::timeout(timeout, connect) => result,
        };

        let stream = match connected {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                let error = ProtocolError::from(e);
                self.set_state(ConnectionState::Disconnected, Some(error.to_string()));
                return Err(error);
            }
            Err(_) => {
                let error = ProtocolError::Timeout(millis(timeout));
                self.set_state(ConnectionState::Disconnected, Some(error.to_string()));
                return Err(error);
            }
        };

        tracing::debug!(endpoint = %self.config.endpoint(), "Transport established");

        let (writer, reader) = stream.split();
        self.serve(writer, reader).await
    }

    /// Serves one session over an established transport.
    ///
    /// Authenticates, subscribes, reports `Connected`, then forwards every
    /// decoded text frame until the session ends. Always returns the reason
    /// the session ended.
    pub(crate) async fn serve<W, R>(&self, writer: W, mut reader: R) -> Result<(), ProtocolError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Send + 'static,
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send,
    {
        let session = self.cancel.child_token();
        *self.session.lock() = session.clone();
        *self.writer.lock().await = Some(Box::pin(writer));

        let end = match self.handshake(&session).await {
            Ok(()) => self.receive(&session, &mut reader).await,
            Err(end) => end,
        };

        self.finish_session(&session, end).await
    }

    async fn handshake(&self, session: &CancellationToken) -> Result<(), SessionEnd> {
        let timeout = self.config.handshake_timeout();
        let exchange = async { self.websocket_auth().await && self.websocket_subscribe().await };

        let sent = tokio::select! {
            () = session.cancelled() => return Err(self.cancelled_end()),
            result = tokio::time::timeout(timeout, exchange) => result,
        };

        match sent {
            Ok(true) => {}
            Ok(false) => {
                return Err(SessionEnd::reported(ProtocolError::ConnectionFailed(
                    "handshake could not be sent".to_string(),
                )));
            }
            Err(_) => return Err(SessionEnd::new(ProtocolError::Timeout(millis(timeout)))),
        }

        if !self.set_state(ConnectionState::Connected, None) {
            return Err(SessionEnd::new(ProtocolError::Stopped));
        }
        self.failed_attempts.store(0, Ordering::Release);

        tracing::info!(device_id = %self.config.device_id(), "Push connection established");
        Ok(())
    }

    async fn receive<R>(&self, session: &CancellationToken, reader: &mut R) -> SessionEnd
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send,
    {
        loop {
            let frame = tokio::select! {
                () = session.cancelled() => return self.cancelled_end(),
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let payload = match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring frame that is not valid JSON");
                            continue;
                        }
                    };

                    let rejected = messages::is_auth_rejection(&payload);
                    let _ = self.events.send(ConnectionEvent::DataReceived(payload));

                    if rejected {
                        tracing::error!("Push endpoint rejected the API key");
                        return SessionEnd::new(ProtocolError::AuthenticationRejected);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Push endpoint closed the connection");
                    return SessionEnd::new(ProtocolError::ConnectionClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::new(ProtocolError::from(e)),
                None => return SessionEnd::new(ProtocolError::ConnectionClosed),
            }
        }
    }

    /// Releases the transport and reports the drop.
    async fn finish_session(
        &self,
        session: &CancellationToken,
        end: SessionEnd,
    ) -> Result<(), ProtocolError> {
        // Pending writes give up the writer lock once the session is cancelled
        session.cancel();
        self.release_writer().await;

        if !end.reported && !matches!(end.error, ProtocolError::Stopped) {
            self.set_state(ConnectionState::Disconnected, Some(end.error.to_string()));
        }

        Err(end.error)
    }

    /// Takes the write half and closes it, bounded by [`CLOSE_TIMEOUT`].
    async fn release_writer(&self) {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::trace!(error = %e, "Closing write half failed"),
            Err(_) => tracing::debug!("Write half did not close in time, dropping it"),
        }
    }

    fn cancelled_end(&self) -> SessionEnd {
        if self.cancel.is_cancelled() {
            SessionEnd::new(ProtocolError::Stopped)
        } else {
            SessionEnd::reported(ProtocolError::ConnectionFailed("send failed".to_string()))
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends the `srvWebSocketAuth` request.
    async fn websocket_auth(&self) -> bool {
        let request = messages::auth_request(
            self.next_request_id(),
            self.config.username(),
            self.config.api_key().expose_secret(),
        );
        self.websocket_send(&request).await
    }

    /// Sends the `wskSubscribe` request for the configured device.
    async fn websocket_subscribe(&self) -> bool {
        let request = messages::subscribe_request(self.next_request_id(), self.config.device_id());
        self.websocket_send(&request).await
    }

    /// Sends a `gdoModuleCommand` to one module of the opener.
    ///
    /// Returns `false` without writing anything unless the client is
    /// `Connected`.
    pub async fn send_message(
        &self,
        module_id: u32,
        module_type: u32,
        command: &str,
        value: Value,
    ) -> bool {
        let state = self.state();
        if !state.is_connected() {
            tracing::debug!(state = %state, command, "Not connected, dropping command");
            return false;
        }

        let message =
            messages::module_command(self.next_request_id(), module_id, module_type, command, value);
        self.websocket_send(&message).await
    }

    /// Serializes and writes one frame.
    ///
    /// The write is bounded by the handshake timeout and abandoned as soon as
    /// the session ends. A failed or timed out write releases the transport,
    /// ends the current session and reports `Disconnected` with the failure.
    pub async fn websocket_send(&self, message: &Value) -> bool {
        tracing::debug!(message = %messages::redact_api_key(message), "Sending frame");

        let session = self.session.lock().clone();
        let timeout = self.config.handshake_timeout();
        let text = message.to_string();

        let write = async {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(sink) => sink
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(ProtocolError::from),
                None => Err(ProtocolError::ConnectionFailed(
                    "no open transport".to_string(),
                )),
            }
        };

        let error = tokio::select! {
            () = session.cancelled() => {
                tracing::debug!("Session ended before the frame was written");
                return false;
            }
            result = tokio::time::timeout(timeout, write) => match result {
                Ok(Ok(())) => return true,
                Ok(Err(e)) => e,
                Err(_) => ProtocolError::Timeout(millis(timeout)),
            },
        };

        tracing::warn!(error = %error, "Failed to send frame");
        session.cancel();
        drop(self.writer.lock().await.take());
        self.set_state(ConnectionState::Disconnected, Some(error.to_string()));
        false
    }

    /// Stops the client and releases the transport.
    ///
    /// Idempotent: only the first call reports `Stopped`.
    pub async fn close(&self) {
        if !self.set_state(ConnectionState::Stopped, None) {
            return;
        }

        tracing::info!("Closing push connection");
        self.cancel.cancel();
        self.release_writer().await;
    }
}

impl fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("endpoint", &self.config.endpoint().as_str())
            .field("device_id", &self.config.device_id())
            .field("state", &self.state())
            .field("failed_attempts", &self.failed_attempts())
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
