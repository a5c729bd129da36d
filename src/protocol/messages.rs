// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound JSON-RPC frames of the push endpoint.

use serde_json::{Value, json};

use crate::telemetry::attribute_topic;

/// Authenticates the session with the account e-mail and API key.
pub const AUTH_METHOD: &str = "srvWebSocketAuth";

/// Subscribes to a device's attribute notifications.
pub const SUBSCRIBE_METHOD: &str = "wskSubscribe";

/// Sends a command to one module of the opener.
pub const MODULE_COMMAND_METHOD: &str = "gdoModuleCommand";

/// Field holding the API key in auth requests.
const API_KEY_FIELD: &str = "apiKey";

/// Builds the `srvWebSocketAuth` request.
#[must_use]
pub fn auth_request(id: u64, username: &str, api_key: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": AUTH_METHOD,
        "params": {
            "varName": username,
            "apiKey": api_key,
        },
    })
}

/// Builds the `wskSubscribe` request for a device.
#[must_use]
pub fn subscribe_request(id: u64, device_id: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": SUBSCRIBE_METHOD,
        "params": {
            "topic": attribute_topic(device_id),
        },
    })
}

/// Builds a `gdoModuleCommand` envelope.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::protocol::messages::module_command;
///
/// let frame = module_command(3, 7, 5, "doorCommand", 1.into());
/// assert_eq!(frame["params"]["portId"], 7);
/// assert_eq!(frame["params"]["moduleMsg"]["doorCommand"], 1);
/// ```
#[must_use]
pub fn module_command(
    id: u64,
    port_id: u32,
    module_type: u32,
    command: &str,
    value: Value,
) -> Value {
    let mut module_msg = serde_json::Map::new();
    module_msg.insert(command.to_string(), value);

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": MODULE_COMMAND_METHOD,
        "params": {
            "portId": port_id,
            "moduleType": module_type,
            "moduleMsg": module_msg,
        },
    })
}

/// Returns true if the frame is an auth reply with `authorized: false`.
#[must_use]
pub fn is_auth_rejection(message: &Value) -> bool {
    message.pointer("/result/authorized").and_then(Value::as_bool) == Some(false)
}

/// Serializes a frame for logging with every `apiKey` value blanked.
///
/// The input is left untouched; redaction happens on a copy.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::protocol::messages::{auth_request, redact_api_key};
///
/// let frame = auth_request(1, "user@example.com", "hunter2");
/// let logged = redact_api_key(&frame);
///
/// assert!(logged.contains(r#""apiKey":"""#));
/// assert!(!logged.contains("hunter2"));
/// assert_eq!(frame["params"]["apiKey"], "hunter2");
/// ```
#[must_use]
pub fn redact_api_key(message: &Value) -> String {
    let mut copy = message.clone();
    blank_api_keys(&mut copy);
    copy.to_string()
}

fn blank_api_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key == API_KEY_FIELD {
                    *field = Value::String(String::new());
                } else {
                    blank_api_keys(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(blank_api_keys),
        _ => {}
    }
}
