// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT connection that renders openers as Home Assistant entities.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{ProtocolError, Result};
use crate::manager::{BinarySensorEntity, BusCommand, CoverEntity, EntityFactory, SwitchEntity};

use super::discovery::{self, EntityKind};

/// Global counter for generating unique client IDs.
static BUS_CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Capacity of the bus command channel.
const COMMAND_CAPACITY: usize = 64;

/// Configuration for the MQTT entity bus.
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    host: String,
    port: u16,
    credentials: Option<(String, SecretString)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    discovery_prefix: String,
    base_topic: String,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            discovery_prefix: "homeassistant".to_string(),
            base_topic: "ryobi_gdo".to_string(),
        }
    }
}

/// MQTT connection publishing opener entities.
///
/// `MqttBus` is cheaply cloneable (via `Arc`). It implements
/// [`EntityFactory`]: every created entity announces itself with a retained
/// discovery config and then publishes retained state. Commands received on
/// `<base>/<device_id>/<entity>/set` are exposed as [`BusCommand`]s.
///
/// The background event loop stops on [`disconnect`](Self::disconnect) or
/// when the last clone (including those held by entities) is dropped.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ryobi_gdo_lib::bus::MqttBus;
/// use ryobi_gdo_lib::manager::{ApiClient, DeviceManager};
///
/// # async fn example(api: Arc<dyn ApiClient>) -> ryobi_gdo_lib::Result<()> {
/// let bus = MqttBus::builder()
///     .host("192.168.1.50")
///     .credentials("user", "password")
///     .build()
///     .await?;
///
/// let mut commands = bus.take_command_receiver().expect("first call");
/// let manager = Arc::new(DeviceManager::new(api, Arc::new(bus.clone())));
///
/// let router = Arc::clone(&manager);
/// tokio::spawn(async move {
///     while let Some(command) = commands.recv().await {
///         router.handle_bus_command(&command).await;
///     }
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MqttBus {
    inner: Arc<MqttBusInner>,
}

struct MqttBusInner {
    client: AsyncClient,
    config: MqttBusConfig,
    connected: AtomicBool,
    commands: Mutex<Option<mpsc::Receiver<BusCommand>>>,
    cancel: CancellationToken,
}

impl Drop for MqttBusInner {
    // The event loop task only holds a weak handle; stop it with the last bus
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl MqttBus {
    /// Creates a new builder for configuring the bus connection.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns whether the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns the base topic for state and command topics.
    #[must_use]
    pub fn base_topic(&self) -> &str {
        &self.inner.config.base_topic
    }

    /// Returns the Home Assistant discovery prefix.
    #[must_use]
    pub fn discovery_prefix(&self) -> &str {
        &self.inner.config.discovery_prefix
    }

    /// Takes the receiver of bus commands.
    ///
    /// Returns `None` after the first call.
    #[must_use]
    pub fn take_command_receiver(&self) -> Option<mpsc::Receiver<BusCommand>> {
        self.inner.commands.lock().take()
    }

    /// Publishes the retained discovery config of one entity.
    ///
    /// # Errors
    ///
    /// Returns error if the publish request cannot be queued.
    pub async fn announce(
        &self,
        kind: EntityKind,
        device_id: &str,
        device_name: &str,
    ) -> std::result::Result<(), ProtocolError> {
        let topic = discovery::discovery_topic(self.discovery_prefix(), kind, device_id);
        let payload = discovery::discovery_config(self.base_topic(), kind, device_id, device_name);

        tracing::debug!(topic = %topic, "Publishing discovery config");

        self.inner
            .client
            .publish(topic, QoS::AtLeastOnce, true, payload.to_string())
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Publishes the retained state of one entity.
    ///
    /// # Errors
    ///
    /// Returns error if the publish request cannot be queued.
    pub async fn publish_state(
        &self,
        kind: EntityKind,
        device_id: &str,
        payload: &str,
    ) -> std::result::Result<(), ProtocolError> {
        let topic = discovery::state_topic(self.base_topic(), kind, device_id);

        tracing::debug!(topic = %topic, payload, "Publishing entity state");

        self.inner
            .client
            .publish(topic, QoS::AtLeastOnce, true, payload.to_string())
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> std::result::Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.cancel.cancel();
        self.inner.connected.store(false, Ordering::Release);
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)
    }

    async fn entity(
        &self,
        kind: EntityKind,
        device_id: &str,
        device_name: &str,
    ) -> std::result::Result<MqttEntity, ProtocolError> {
        self.announce(kind, device_id, device_name).await?;
        Ok(MqttEntity {
            bus: self.clone(),
            kind,
            device_id: device_id.to_string(),
        })
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("base_topic", &self.inner.config.base_topic)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl EntityFactory for MqttBus {
    async fn cover(&self, device_id: &str, device_name: &str) -> Result<Box<dyn CoverEntity>> {
        let entity = self.entity(EntityKind::Door, device_id, device_name).await?;
        Ok(Box::new(entity))
    }

    async fn light_switch(
        &self,
        device_id: &str,
        device_name: &str,
    ) -> Result<Box<dyn SwitchEntity>> {
        let entity = self.entity(EntityKind::Light, device_id, device_name).await?;
        Ok(Box::new(entity))
    }

    async fn battery_sensor(
        &self,
        device_id: &str,
        device_name: &str,
    ) -> Result<Box<dyn BinarySensorEntity>> {
        let entity = self
            .entity(EntityKind::Battery, device_id, device_name)
            .await?;
        Ok(Box::new(entity))
    }
}

/// One entity published on the bus.
struct MqttEntity {
    bus: MqttBus,
    kind: EntityKind,
    device_id: String,
}

impl MqttEntity {
    async fn set(&self, active: bool) -> Result<()> {
        let (on, off) = self.kind.state_payloads();
        let payload = if active { on } else { off };
        self.bus
            .publish_state(self.kind, &self.device_id, payload)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CoverEntity for MqttEntity {
    async fn open(&self) -> Result<()> {
        self.set(true).await
    }

    async fn close(&self) -> Result<()> {
        self.set(false).await
    }
}

#[async_trait]
impl SwitchEntity for MqttEntity {
    async fn on(&self) -> Result<()> {
        self.set(true).await
    }

    async fn off(&self) -> Result<()> {
        self.set(false).await
    }
}

#[async_trait]
impl BinarySensorEntity for MqttEntity {
    async fn on(&self) -> Result<()> {
        self.set(true).await
    }

    async fn off(&self) -> Result<()> {
        self.set(false).await
    }
}

/// Builder for the MQTT entity bus.
///
/// # Examples
///
/// ```no_run
/// use ryobi_gdo_lib::bus::MqttBus;
/// use std::time::Duration;
///
/// # async fn example() -> ryobi_gdo_lib::Result<()> {
/// let bus = MqttBus::builder()
///     .host("192.168.1.50")
///     .port(1883)
///     .credentials("user", "password")
///     .keep_alive(Duration::from_secs(60))
///     .discovery_prefix("homeassistant")
///     .base_topic("garage")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    config: MqttBusConfig,
}

impl MqttBusBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), SecretString::from(password.into())));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the Home Assistant discovery prefix (default: `homeassistant`).
    #[must_use]
    pub fn discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.discovery_prefix = prefix.into();
        self
    }

    /// Sets the base topic for state and command topics (default: `ryobi_gdo`).
    #[must_use]
    pub fn base_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.base_topic = topic.into();
        self
    }

    /// Builds the bus, connects to the broker and subscribes to commands.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host or base topic is empty
    /// - Connection fails or times out
    /// - The command subscription cannot be queued
    pub async fn build(self) -> std::result::Result<MqttBus, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        if self.config.base_topic.is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "MQTT base topic is required".to_string(),
            ));
        }

        let counter = BUS_CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("ryobi_gdo_{}_{}", std::process::id(), counter);

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password.expose_secret());
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let bus = MqttBus {
            inner: Arc::new(MqttBusInner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
                commands: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();

        let weak = Arc::downgrade(&bus.inner);
        let cancel = bus.inner.cancel.clone();
        tokio::spawn(async move {
            handle_bus_events(event_loop, weak, cancel, command_tx, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    "Connected to MQTT broker"
                );
            }
            Ok(Err(_)) => {
                bus.inner.cancel.cancel();
                return Err(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                bus.inner.cancel.cancel();
                return Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )));
            }
        }

        Ok(bus)
    }
}

/// Turns a publish on a command topic into a [`BusCommand`].
fn route_command(
    base_topic: &str,
    commands: &mpsc::Sender<BusCommand>,
    topic: &str,
    payload: &[u8],
) {
    let Some((device_id, entity)) = discovery::parse_command_topic(base_topic, topic) else {
        return;
    };

    let Ok(payload) = std::str::from_utf8(payload) else {
        tracing::warn!(topic = %topic, "Ignoring command with non UTF-8 payload");
        return;
    };

    tracing::debug!(device_id, entity, payload, "Bus command received");

    if let Err(e) = commands.try_send(BusCommand::new(device_id, entity, payload)) {
        tracing::warn!(error = %e, "Dropping bus command");
    }
}

/// Drives the MQTT event loop until the bus is disconnected or dropped.
///
/// The command subscription is (re)issued on every ConnAck since the
/// session is clean.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    bus: Weak<MqttBusInner>,
    cancel: CancellationToken,
    commands: mpsc::Sender<BusCommand>,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = event_loop.poll() => event,
        };

        let Some(inner) = bus.upgrade() else {
            break;
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                inner.connected.store(true, Ordering::Release);

                let filter = discovery::command_filter(&inner.config.base_topic);
                if let Err(e) = inner.client.try_subscribe(&filter, QoS::AtLeastOnce) {
                    tracing::error!(error = %e, filter = %filter, "Failed to subscribe to commands");
                }

                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                route_command(
                    &inner.config.base_topic,
                    &commands,
                    &publish.topic,
                    &publish.payload,
                );
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                inner.connected.store(false, Ordering::Release);
            }
            Ok(_) => {}
            Err(e) => {
                inner.connected.store(false, Ordering::Release);
                drop(inner);

                if connack_tx.is_some() {
                    tracing::error!(error = %e, "MQTT connection failed");
                    break;
                }
                tracing::warn!(error = %e, "MQTT connection lost, retrying");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }

    tracing::debug!("MQTT event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_default_values() {
        let builder = MqttBusBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert!(builder.config.credentials.is_none());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.discovery_prefix, "homeassistant");
        assert_eq!(builder.config.base_topic, "ryobi_gdo");
    }

    #[test]
    fn builder_chain() {
        let builder = MqttBusBuilder::default()
            .host("192.168.1.50")
            .port(8883)
            .credentials("admin", "secret")
            .keep_alive(Duration::from_secs(45))
            .connection_timeout(Duration::from_secs(15))
            .discovery_prefix("ha")
            .base_topic("garage");

        assert_eq!(builder.config.host, "192.168.1.50");
        assert_eq!(builder.config.port, 8883);
        let (user, password) = builder.config.credentials.as_ref().unwrap();
        assert_eq!(user, "admin");
        assert_eq!(password.expose_secret(), "secret");
        assert_eq!(builder.config.keep_alive, Duration::from_secs(45));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(15));
        assert_eq!(builder.config.discovery_prefix, "ha");
        assert_eq!(builder.config.base_topic, "garage");
    }

    #[test]
    fn builder_debug_hides_password() {
        let builder = MqttBusBuilder::default().credentials("admin", "hunter2");
        assert!(!format!("{builder:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn builder_missing_host_fails() {
        let err = MqttBusBuilder::default().build().await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn builder_empty_base_topic_fails() {
        let err = MqttBusBuilder::default()
            .host("localhost")
            .base_topic("")
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn event_loop_stops_when_bus_dropped() {
        // Accepts the TCP connection but never answers the MQTT CONNECT
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (client, event_loop) =
            AsyncClient::new(MqttOptions::new("ryobi_gdo_drop_test", "127.0.0.1", port), 10);
        let inner = Arc::new(MqttBusInner {
            client,
            config: MqttBusConfig::default(),
            connected: AtomicBool::new(false),
            commands: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        let (command_tx, _command_rx) = mpsc::channel(1);
        let (connack_tx, _connack_rx) = oneshot::channel();

        let task = tokio::spawn(handle_bus_events(
            event_loop,
            Arc::downgrade(&inner),
            inner.cancel.clone(),
            command_tx,
            connack_tx,
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());

        drop(inner);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("event loop stops once the bus is gone")
            .unwrap();
        drop(listener);
    }

    #[test]
    fn route_command_parses_topic() {
        let (tx, mut rx) = mpsc::channel(4);

        route_command("ryobi_gdo", &tx, "ryobi_gdo/abc/door/set", b"OPEN");
        route_command("ryobi_gdo", &tx, "other/abc/door/set", b"OPEN");

        assert_eq!(rx.try_recv().unwrap(), BusCommand::new("abc", "door", "OPEN"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreachable_broker_fails() {
        let result = MqttBusBuilder::default()
            .host("127.0.0.1")
            .port(1)
            .connection_timeout(Duration::from_secs(2))
            .build()
            .await;

        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }
}
