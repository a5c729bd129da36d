// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events emitted by the push channel.
//!
//! A [`WebSocketClient`](crate::protocol::WebSocketClient) reports every
//! state transition and every decoded frame as a [`ConnectionEvent`] on an
//! `mpsc` channel handed out at construction. The consumer (usually a
//! [`DeviceManager`](crate::manager::DeviceManager)) drains it in order.
//!
//! # Examples
//!
//! ```no_run
//! use ryobi_gdo_lib::event::ConnectionEvent;
//! use ryobi_gdo_lib::protocol::{WebSocketClient, WebSocketConfig};
//!
//! # async fn example() -> ryobi_gdo_lib::Result<()> {
//! let config = WebSocketConfig::builder()
//!     .username("user@example.com")
//!     .api_key("api-key")
//!     .device_id("c4be84986d2e")
//!     .build()?;
//! let (client, mut events) = WebSocketClient::new(config);
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ConnectionEvent::StateChanged { state, error } => {
//!                 println!("connection {state:?} ({error:?})");
//!             }
//!             ConnectionEvent::DataReceived(payload) => println!("{payload}"),
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

mod connection_event;

pub use connection_event::ConnectionEvent;
