// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ryobi_gdo_lib` - A Rust library bridging Ryobi garage door openers to a
//! local automation bus.
//!
//! The vendor cloud pushes device changes over a WebSocket. This library
//! keeps that push channel alive, decodes its notifications, and renders
//! each opener as a door cover, a light switch and a low battery sensor.
//!
//! # Components
//!
//! - [`protocol::WebSocketClient`]: authenticated, subscribed push
//!   connection with automatic reconnection
//! - [`telemetry::parse_attribute_update`]: turns one push message into an
//!   [`AttributeUpdate`]
//! - [`manager::DeviceManager`]: device registry that applies updates to
//!   entities and sends door and light commands
//! - [`bus::MqttBus`] (feature `mqtt`, on by default): Home Assistant MQTT
//!   discovery entities
//!
//! The vendor HTTP API (login, device listing) is a collaborator behind the
//! [`manager::ApiClient`] trait.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ryobi_gdo_lib::bus::MqttBus;
//! use ryobi_gdo_lib::manager::{ApiClient, DeviceManager};
//! use ryobi_gdo_lib::protocol::{WebSocketClient, WebSocketConfig};
//!
//! # async fn example(api: Arc<dyn ApiClient>, api_key: String) -> ryobi_gdo_lib::Result<()> {
//! let bus = MqttBus::builder().host("192.168.1.50").build().await?;
//! let commands = bus.take_command_receiver();
//! let manager = Arc::new(DeviceManager::new(api, Arc::new(bus)));
//!
//! let config = WebSocketConfig::builder()
//!     .username("user@example.com")
//!     .api_key(api_key)
//!     .device_id("c4be84986d2e")
//!     .build()?;
//! let (client, events) = WebSocketClient::new(config);
//! let client = Arc::new(client);
//!
//! manager
//!     .setup_device("c4be84986d2e", "Garage", Arc::clone(&client))
//!     .await?;
//!
//! let router = Arc::clone(&manager);
//! tokio::spawn(async move { router.process_events(events).await });
//! if let Some(commands) = commands {
//!     let router = Arc::clone(&manager);
//!     tokio::spawn(async move { router.process_bus_commands(commands).await });
//! }
//!
//! client.run().await;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "mqtt")]
pub mod bus;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod telemetry;
pub mod types;

pub use error::{ApiError, Error, ProtocolError, Result, SetupError};
pub use event::ConnectionEvent;
pub use manager::{Device, DeviceManager};
pub use protocol::{ConnectionState, ReconnectionPolicy, WebSocketClient, WebSocketConfig};
pub use state::{AttributeUpdate, DeviceSnapshot};
pub use types::{BatteryLevel, DoorState};
