// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push channel to the vendor cloud.
//!
//! - [`WebSocketClient`]: connection state machine with reconnect loop
//! - [`WebSocketConfig`]: endpoint, credentials and timeouts
//! - [`ReconnectionPolicy`]: backoff between attempts
//! - [`messages`]: outbound JSON-RPC frames and log redaction

mod config;
pub mod messages;
mod websocket;

pub use config::{DEFAULT_ENDPOINT, ReconnectionPolicy, WebSocketConfig, WebSocketConfigBuilder};
pub use websocket::{ConnectionState, WebSocketClient};
