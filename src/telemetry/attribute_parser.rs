// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for `wskAttributeUpdateNtfy` push notifications.
//!
//! The vendor sends attribute changes in two shapes. Either every attribute
//! is a dotted key directly under `params`:
//!
//! ```json
//! {"method":"wskAttributeUpdateNtfy","params":{
//!     "topic":"c4be84986d2e.wskAttributeUpdateNtfy",
//!     "garageDoor_7.doorState":{"value":1,"lastValue":3}}}
//! ```
//!
//! or the attributes are grouped one level deeper under their module:
//!
//! ```json
//! {"method":"wskAttributeUpdateNtfy","params":{
//!     "topic":"c4be84986d2e.wskAttributeUpdateNtfy",
//!     "garageLight_7":{"lightState":{"value":true}}}}
//! ```
//!
//! Attribute values are either wrapped in a `{"value": ...}` object or sent
//! bare.

use serde_json::{Map, Value};

use crate::state::AttributeUpdate;
use crate::types::DoorState;

use super::ATTRIBUTE_UPDATE_METHOD;

/// Envelope keys under `params` that never carry attributes.
const ENVELOPE_KEYS: [&str; 4] = ["topic", "varName", "ts", "id"];

/// Raw attribute names recognised by the parser.
mod raw {
    pub const DOOR_STATE: &str = "doorState";
    pub const DOOR_POSITION: &str = "doorPosition";
    pub const LIGHT_STATE: &str = "lightState";
    pub const BATTERY: &str = "battery";
    pub const VACATION_MODE: &str = "vacationMode";
    pub const SAFETY_DEVICE: &str = "safetyDevice";
}

/// Decodes one push message into a normalized [`AttributeUpdate`].
///
/// This never fails. Messages that are not attribute notifications, or whose
/// payload cannot be understood, yield an empty update. The input is only
/// borrowed and is never modified.
///
/// A `doorPosition` attribute is never translated into a door state; a
/// position-only message produces no `door_state`.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::telemetry::parse_attribute_update;
/// use ryobi_gdo_lib::types::DoorState;
///
/// let message = serde_json::json!({
///     "method": "wskAttributeUpdateNtfy",
///     "params": {
///         "topic": "c4be84986d2e.wskAttributeUpdateNtfy",
///         "garageDoor_7.doorState": { "value": 1 },
///         "garageDoor_7.doorPosition": { "value": 100 }
///     }
/// });
///
/// let update = parse_attribute_update(&message);
/// assert_eq!(update.door_state(), Some(DoorState::Open));
/// assert_eq!(update.len(), 1);
/// ```
#[must_use]
pub fn parse_attribute_update(message: &Value) -> AttributeUpdate {
    if message.get("method").and_then(Value::as_str) != Some(ATTRIBUTE_UPDATE_METHOD) {
        return AttributeUpdate::new();
    }

    let Some(params) = message.get("params").and_then(Value::as_object) else {
        tracing::debug!("Attribute notification without params object");
        return AttributeUpdate::new();
    };

    let mut update = AttributeUpdate::new();

    for (key, value) in params {
        if ENVELOPE_KEYS.contains(&key.as_str()) {
            continue;
        }

        if is_known_attribute(attribute_name(key)) {
            update = apply_attribute(update, attribute_name(key), value);
        } else if let Some(module) = value.as_object() {
            update = apply_module(update, module);
        }
    }

    update
}

/// Applies every attribute found in a module container.
fn apply_module(update: AttributeUpdate, module: &Map<String, Value>) -> AttributeUpdate {
    module.iter().fold(update, |acc, (key, value)| {
        apply_attribute(acc, attribute_name(key), value)
    })
}

/// Strips the `<module>_<port>.` prefix from a dotted attribute key.
fn attribute_name(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

fn is_known_attribute(name: &str) -> bool {
    matches!(
        name,
        raw::DOOR_STATE
            | raw::DOOR_POSITION
            | raw::LIGHT_STATE
            | raw::BATTERY
            | raw::VACATION_MODE
            | raw::SAFETY_DEVICE
    )
}

/// Unwraps `{"value": x}` into `x`; bare values are returned as is.
fn attribute_value(value: &Value) -> &Value {
    value.get("value").unwrap_or(value)
}

/// Accepts booleans as well as the 0/1 integers some firmware sends.
fn as_flag(value: &Value) -> Option<bool> {
    value
        .as_bool()
        .or_else(|| value.as_i64().map(|n| n != 0))
}

fn apply_attribute(update: AttributeUpdate, name: &str, value: &Value) -> AttributeUpdate {
    let value = attribute_value(value);

    match name {
        raw::DOOR_STATE => match value.as_i64().map(DoorState::from_code) {
            Some(DoorState::Unknown) | None => {
                tracing::debug!(value = %value, "Ignoring unrecognised door state");
                update
            }
            Some(state) => update.with_door_state(state),
        },
        raw::DOOR_POSITION => {
            tracing::trace!(value = %value, "Door position is not a door state");
            update
        }
        raw::LIGHT_STATE => match as_flag(value) {
            Some(on) => update.with_light_state(on),
            None => update,
        },
        raw::BATTERY => match value.as_i64() {
            Some(percent) => update.with_battery_level(percent),
            None => update,
        },
        raw::VACATION_MODE => match as_flag(value) {
            Some(enabled) => update.with_vacation_mode(enabled),
            None => update,
        },
        raw::SAFETY_DEVICE => match value.as_i64() {
            Some(reading) => update.with_safety(reading),
            None => update,
        },
        _ => update,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const TOPIC: &str = "c4be84986d2e.wskAttributeUpdateNtfy";

    fn notification(params: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": ATTRIBUTE_UPDATE_METHOD,
            "params": params,
        })
    }

    #[test]
    fn light_state_on() {
        let message = notification(json!({
            "topic": TOPIC,
            "varName": "c4be84986d2e",
            "garageLight_7.lightState": { "value": true, "lastValue": false },
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.light_state(), Some(true));
    }

    #[test]
    fn light_state_off_from_integer() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageLight_7.lightState": { "value": 0 },
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.light_state(), Some(false));
    }

    #[test]
    fn door_state_open() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7.doorState": { "value": 1 },
        }));

        assert_eq!(
            parse_attribute_update(&message).door_state(),
            Some(DoorState::Open)
        );
    }

    #[test]
    fn door_state_closed() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7.doorState": { "value": 0 },
        }));

        assert_eq!(
            parse_attribute_update(&message).door_state(),
            Some(DoorState::Closed)
        );
    }

    #[test]
    fn door_position_only_never_sets_door_state() {
        for position in [0, 1, 2, 50, 100] {
            let message = notification(json!({
                "topic": TOPIC,
                "garageDoor_7.doorPosition": { "value": position },
            }));

            let update = parse_attribute_update(&message);
            assert_eq!(update.door_state(), None, "position {position}");
            assert!(update.is_empty());
        }
    }

    #[test]
    fn door_state_with_position_yields_only_state() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7.doorState": { "value": 1 },
            "garageDoor_7.doorPosition": { "value": 37 },
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.door_state(), Some(DoorState::Open));
        assert_eq!(update.len(), 1);
    }

    #[test]
    fn nested_module_variant() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7": {
                "doorState": { "value": 3 },
                "vacationMode": { "value": 1 },
            },
            "backupCharger_8": { "battery": 64 },
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.door_state(), Some(DoorState::Opening));
        assert_eq!(update.vacation_mode(), Some(true));
        assert_eq!(update.battery_level(), Some(64));
    }

    #[test]
    fn bare_values_and_aux_keys() {
        let message = notification(json!({
            "doorState": 4,
            "battery": 15,
            "safetyDevice": 2,
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.door_state(), Some(DoorState::Fault));
        assert_eq!(update.battery_level(), Some(15));
        assert_eq!(update.safety(), Some(2));
    }

    #[test]
    fn unknown_door_code_is_omitted() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7.doorState": { "value": 99 },
            "garageLight_7.lightState": { "value": true },
        }));

        let update = parse_attribute_update(&message);
        assert_eq!(update.door_state(), None);
        assert_eq!(update.light_state(), Some(true));
    }

    #[test]
    fn non_notification_returns_empty() {
        let auth_reply = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "authorized": true, "varName": "user@example.com" },
        });

        assert!(parse_attribute_update(&auth_reply).is_empty());
    }

    #[test]
    fn malformed_payloads_return_empty() {
        let cases = [
            json!(null),
            json!("text"),
            json!([1, 2, 3]),
            json!({ "method": ATTRIBUTE_UPDATE_METHOD }),
            json!({ "method": ATTRIBUTE_UPDATE_METHOD, "params": 5 }),
            notification(json!({ "garageDoor_7.doorState": { "value": "open" } })),
            notification(json!({ "garageDoor_7": "not a module" })),
        ];

        for message in cases {
            assert!(parse_attribute_update(&message).is_empty(), "{message}");
        }
    }

    #[test]
    fn parsing_is_pure() {
        let message = notification(json!({
            "topic": TOPIC,
            "garageDoor_7.doorState": { "value": 0 },
            "garageLight_7.lightState": { "value": true },
        }));
        let before = message.clone();

        let first = parse_attribute_update(&message);
        let second = parse_attribute_update(&message);

        assert_eq!(first, second);
        assert_eq!(message, before);
    }
}
