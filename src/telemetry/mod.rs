// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of vendor push messages.
//!
//! The push endpoint delivers JSON-RPC style frames. Attribute changes arrive
//! as `wskAttributeUpdateNtfy` notifications on the topic
//! `<device_id>.wskAttributeUpdateNtfy`; everything else (auth replies,
//! subscription acks) is ignored by the parser.
//!
//! # Examples
//!
//! ```
//! use ryobi_gdo_lib::telemetry::{notification_device_id, parse_attribute_update};
//!
//! let message = serde_json::json!({
//!     "method": "wskAttributeUpdateNtfy",
//!     "params": {
//!         "topic": "c4be84986d2e.wskAttributeUpdateNtfy",
//!         "garageLight_7.lightState": { "value": true }
//!     }
//! });
//!
//! assert_eq!(notification_device_id(&message), Some("c4be84986d2e"));
//! assert_eq!(parse_attribute_update(&message).light_state(), Some(true));
//! ```

mod attribute_parser;

pub use attribute_parser::parse_attribute_update;

use serde_json::Value;

/// JSON-RPC method of attribute change notifications.
pub const ATTRIBUTE_UPDATE_METHOD: &str = "wskAttributeUpdateNtfy";

/// Returns the subscription topic for a device's attribute notifications.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::telemetry::attribute_topic;
///
/// assert_eq!(attribute_topic("abc"), "abc.wskAttributeUpdateNtfy");
/// ```
#[must_use]
pub fn attribute_topic(device_id: &str) -> String {
    format!("{device_id}.{ATTRIBUTE_UPDATE_METHOD}")
}

/// Returns true if the message is an attribute change notification.
#[must_use]
pub fn is_attribute_update(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some(ATTRIBUTE_UPDATE_METHOD)
}

/// Extracts the device id addressed by an attribute notification.
///
/// Uses the notification topic first and falls back to `params.varName`.
/// Returns `None` for any other kind of message.
#[must_use]
pub fn notification_device_id(message: &Value) -> Option<&str> {
    if !is_attribute_update(message) {
        return None;
    }

    let params = message.get("params")?;

    params
        .get("topic")
        .and_then(Value::as_str)
        .and_then(|topic| topic.strip_suffix(ATTRIBUTE_UPDATE_METHOD))
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|id| !id.is_empty())
        .or_else(|| params.get("varName").and_then(Value::as_str))
}
