// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `ryobi_gdo_lib` library.
//!
//! Failures are split by where they happen: the vendor API collaborator
//! ([`ApiError`]), the push channel and entity bus transports
//! ([`ProtocolError`]), and per-device setup ([`SetupError`]). Malformed push
//! messages are not errors at all; the parser yields an empty update instead.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error reported by the vendor API client.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Error occurred on the push channel or the entity bus.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A device could not be set up.
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),
}

/// Errors reported by the vendor API collaborator.
///
/// Each kind carries a human readable message from the API client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Login or token validation failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The API could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The API does not know the requested device.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The API answered with something that could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors related to the push channel and entity bus transports.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// WebSocket transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote end closed the connection or the frame stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A required connection setting is missing or empty.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The push endpoint rejected the API key.
    #[error("authentication rejected by push endpoint")]
    AuthenticationRejected,

    /// The connection was closed by the operator.
    #[error("connection stopped")]
    Stopped,
}

/// Errors raised while setting up a single device.
///
/// A setup error is fatal for that device only; other devices and the shared
/// connection are unaffected.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The API client returned no initial state for the device.
    #[error("failed to get initial state for device {device_id}")]
    InitialStateUnavailable {
        /// The device that could not be set up.
        device_id: String,
    },

    /// The API client failed while resolving module addressing.
    #[error("api error during setup: {0}")]
    Api(#[from] ApiError),

    /// The entity bus refused to create an entity.
    #[error("entity creation failed: {0}")]
    Entity(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
