// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push channel configuration.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use ryobi_gdo_lib::protocol::{ReconnectionPolicy, WebSocketConfig};
//!
//! # fn example() -> Result<(), ryobi_gdo_lib::error::ProtocolError> {
//! let config = WebSocketConfig::builder()
//!     .username("user@example.com")
//!     .api_key("api-key")
//!     .device_id("c4be84986d2e")
//!     .connect_timeout(Duration::from_secs(5))
//!     .reconnection(ReconnectionPolicy::new().with_max_delay(Duration::from_secs(30)))
//!     .build()?;
//!
//! assert_eq!(config.endpoint().as_str(), "wss://tti.tiwiconnect.com/api/wsrpc");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ProtocolError;

/// Vendor push endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://tti.tiwiconnect.com/api/wsrpc";

/// Settings for one push channel connection.
///
/// Built with [`WebSocketConfig::builder`]. The API key is kept in a
/// [`SecretString`] and never shows up in `Debug` output.
#[derive(Debug)]
pub struct WebSocketConfig {
    endpoint: Url,
    username: String,
    api_key: SecretString,
    device_id: String,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    reconnection: ReconnectionPolicy,
}

impl WebSocketConfig {
    /// Creates a new builder with the vendor defaults.
    #[must_use]
    pub fn builder() -> WebSocketConfigBuilder {
        WebSocketConfigBuilder::default()
    }

    /// Returns the push endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the account e-mail sent as `varName` in the auth request.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Returns the device whose notifications are subscribed.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the timeout for establishing the transport.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the timeout for sending auth and subscribe.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn reconnection(&self) -> &ReconnectionPolicy {
        &self.reconnection
    }
}

/// Builder for [`WebSocketConfig`].
#[derive(Debug)]
pub struct WebSocketConfigBuilder {
    endpoint: String,
    username: String,
    api_key: SecretString,
    device_id: String,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    reconnection: ReconnectionPolicy,
}

impl Default for WebSocketConfigBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            username: String::new(),
            api_key: SecretString::from(String::new()),
            device_id: String::new(),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            reconnection: ReconnectionPolicy::default(),
        }
    }
}

impl WebSocketConfigBuilder {
    /// Sets the push endpoint (default: the vendor endpoint).
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the account e-mail.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the API key obtained from the vendor login.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::from(api_key.into());
        self
    }

    /// Sets the device to subscribe to.
    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Sets the connect timeout (default: 10 seconds).
    #[must_use]
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Sets the auth/subscribe handshake timeout (default: 10 seconds).
    #[must_use]
    pub fn handshake_timeout(mut self, duration: Duration) -> Self {
        self.handshake_timeout = duration;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// Validates the settings and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The endpoint is not a `ws://` or `wss://` URL
    /// - The username, API key or device id is empty
    pub fn build(self) -> Result<WebSocketConfig, ProtocolError> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ProtocolError::InvalidAddress(format!("{}: {e}", self.endpoint)))?;

        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ProtocolError::InvalidAddress(format!(
                "unsupported scheme '{}' in {}",
                endpoint.scheme(),
                self.endpoint
            )));
        }

        if self.username.is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "username is required".to_string(),
            ));
        }

        if self.api_key.expose_secret().is_empty() {
            return Err(ProtocolError::InvalidConfig("API key is required".to_string()));
        }

        if self.device_id.is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "device id is required".to_string(),
            ));
        }

        Ok(WebSocketConfig {
            endpoint,
            username: self.username,
            api_key: self.api_key,
            device_id: self.device_id,
            connect_timeout: self.connect_timeout,
            handshake_timeout: self.handshake_timeout,
            reconnection: self.reconnection,
        })
    }
}

/// Backoff between reconnection attempts.
///
/// The push channel retries forever; this policy only decides how long to
/// wait. Delays grow geometrically from `initial_delay` and are capped at
/// `max_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ryobi_gdo_lib::protocol::ReconnectionPolicy;
///
/// let policy = ReconnectionPolicy::new()
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(30));
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays. Values below 1.0 are
    /// treated as 1.0.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Creates a new reconnection policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial delay between retry attempts.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retry attempts.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given retry attempt (0-based).
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        // f64::max also maps NaN to 1.0
        let multiplier = f64::from(self.backoff_multiplier)
            .max(1.0)
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Whole nanoseconds keep every attempt at the precision of attempt 0
        #[allow(clippy::cast_precision_loss)]
        let initial_ns = self.initial_delay.as_nanos() as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_ns = self.max_delay.as_nanos() as f64;

        let delay_ns = initial_ns * multiplier;
        if delay_ns >= max_ns {
            return self.max_delay;
        }

        // Float to int casts saturate
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_nanos(delay_ns as u64);

        delay.max(self.initial_delay).min(self.max_delay)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
