// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection event types.

use serde_json::Value;

use crate::protocol::ConnectionState;

/// Events emitted by a [`WebSocketClient`](crate::protocol::WebSocketClient).
///
/// Events are delivered in the order they happened on the wire: a
/// `StateChanged { state: Connected, .. }` always precedes the data frames of
/// that session, and the data frames precede the `Disconnected` that ends it.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::event::ConnectionEvent;
/// use ryobi_gdo_lib::protocol::ConnectionState;
///
/// let event = ConnectionEvent::state_changed(ConnectionState::Connected);
/// assert!(event.is_state_change());
/// assert_eq!(event.kind(), "websocket_state");
///
/// let event = ConnectionEvent::data(serde_json::json!({"method": "ping"}));
/// assert_eq!(event.kind(), "data");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The connection state changed.
    StateChanged {
        /// The new state.
        state: ConnectionState,
        /// Error message if the transition was caused by a failure.
        error: Option<String>,
    },

    /// A text frame was received and decoded as JSON.
    DataReceived(Value),
}

impl ConnectionEvent {
    /// Creates a state change event without an error.
    #[must_use]
    pub fn state_changed(state: ConnectionState) -> Self {
        Self::StateChanged { state, error: None }
    }

    /// Creates a state change event caused by a failure.
    #[must_use]
    pub fn state_changed_with_error(state: ConnectionState, error: impl Into<String>) -> Self {
        Self::StateChanged {
            state,
            error: Some(error.into()),
        }
    }

    /// Creates a data event.
    #[must_use]
    pub fn data(payload: Value) -> Self {
        Self::DataReceived(payload)
    }

    /// Returns the event kind label: `websocket_state` or `data`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "websocket_state",
            Self::DataReceived(_) => "data",
        }
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Returns the new state for state change events.
    #[must_use]
    pub fn state(&self) -> Option<ConnectionState> {
        match self {
            Self::StateChanged { state, .. } => Some(*state),
            Self::DataReceived(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changed_has_no_error() {
        let event = ConnectionEvent::state_changed(ConnectionState::Stopped);
        assert_eq!(
            event,
            ConnectionEvent::StateChanged {
                state: ConnectionState::Stopped,
                error: None,
            }
        );
        assert_eq!(event.state(), Some(ConnectionState::Stopped));
    }

    #[test]
    fn state_changed_with_error() {
        let event =
            ConnectionEvent::state_changed_with_error(ConnectionState::Disconnected, "send failed");

        if let ConnectionEvent::StateChanged { state, error } = event {
            assert_eq!(state, ConnectionState::Disconnected);
            assert_eq!(error.as_deref(), Some("send failed"));
        } else {
            panic!("Expected StateChanged event");
        }
    }

    #[test]
    fn data_event_has_no_state() {
        let event = ConnectionEvent::data(serde_json::json!({}));
        assert!(!event.is_state_change());
        assert_eq!(event.state(), None);
    }
}
