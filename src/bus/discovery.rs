// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic layout and Home Assistant discovery payloads.
//!
//! For a device `abc` with base topic `ryobi_gdo` and discovery prefix
//! `homeassistant`:
//!
//! | Entity  | Discovery config                                  | State / command                 |
//! |---------|---------------------------------------------------|---------------------------------|
//! | door    | `homeassistant/cover/abc_door/config`             | `ryobi_gdo/abc/door/state`, `.../set` |
//! | light   | `homeassistant/switch/abc_light/config`           | `ryobi_gdo/abc/light/state`, `.../set` |
//! | battery | `homeassistant/binary_sensor/abc_battery/config`  | `ryobi_gdo/abc/battery/state`   |

use serde_json::{Value, json};

/// The three entities published for every opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Door cover.
    Door,
    /// Light switch.
    Light,
    /// Low battery binary sensor.
    Battery,
}

impl EntityKind {
    /// Returns the object id used in topics.
    #[must_use]
    pub const fn object_id(self) -> &'static str {
        match self {
            Self::Door => "door",
            Self::Light => "light",
            Self::Battery => "battery",
        }
    }

    /// Returns the Home Assistant component.
    #[must_use]
    pub const fn component(self) -> &'static str {
        match self {
            Self::Door => "cover",
            Self::Light => "switch",
            Self::Battery => "binary_sensor",
        }
    }

    /// Returns the state payloads for the active and inactive state.
    #[must_use]
    pub const fn state_payloads(self) -> (&'static str, &'static str) {
        match self {
            Self::Door => ("open", "closed"),
            Self::Light | Self::Battery => ("ON", "OFF"),
        }
    }

    const fn accepts_commands(self) -> bool {
        matches!(self, Self::Door | Self::Light)
    }

    const fn display_name(self) -> &'static str {
        match self {
            Self::Door => "Door",
            Self::Light => "Light",
            Self::Battery => "Battery low",
        }
    }
}

/// `<prefix>/<component>/<device_id>_<object>/config`
#[must_use]
pub fn discovery_topic(prefix: &str, kind: EntityKind, device_id: &str) -> String {
    format!(
        "{prefix}/{}/{device_id}_{}/config",
        kind.component(),
        kind.object_id()
    )
}

/// `<base>/<device_id>/<object>/state`
#[must_use]
pub fn state_topic(base: &str, kind: EntityKind, device_id: &str) -> String {
    format!("{base}/{device_id}/{}/state", kind.object_id())
}

/// `<base>/<device_id>/<object>/set`
#[must_use]
pub fn command_topic(base: &str, kind: EntityKind, device_id: &str) -> String {
    format!("{base}/{device_id}/{}/set", kind.object_id())
}

/// Wildcard matching every command topic under `base`.
#[must_use]
pub fn command_filter(base: &str) -> String {
    format!("{base}/+/+/set")
}

/// Splits a command topic into `(device_id, object)`.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::bus::parse_command_topic;
///
/// assert_eq!(
///     parse_command_topic("ryobi_gdo", "ryobi_gdo/abc/door/set"),
///     Some(("abc", "door"))
/// );
/// assert_eq!(parse_command_topic("ryobi_gdo", "ryobi_gdo/abc/door/state"), None);
/// ```
#[must_use]
pub fn parse_command_topic<'a>(base: &str, topic: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = topic.strip_prefix(base)?.strip_prefix('/')?;
    let mut parts = rest.split('/');

    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(device_id), Some(object), Some("set"), None)
            if !device_id.is_empty() && !object.is_empty() =>
        {
            Some((device_id, object))
        }
        _ => None,
    }
}

/// Builds the retained discovery config of one entity.
#[must_use]
pub fn discovery_config(
    base: &str,
    kind: EntityKind,
    device_id: &str,
    device_name: &str,
) -> Value {
    let (active, inactive) = kind.state_payloads();

    let mut config = json!({
        "name": kind.display_name(),
        "unique_id": format!("{device_id}_{}", kind.object_id()),
        "state_topic": state_topic(base, kind, device_id),
        "device": {
            "identifiers": [device_id],
            "name": device_name,
            "manufacturer": "Ryobi",
            "model": "Garage Door Opener",
        },
    });

    match kind {
        EntityKind::Door => {
            config["device_class"] = json!("garage");
            config["payload_open"] = json!("OPEN");
            config["payload_close"] = json!("CLOSE");
            config["payload_stop"] = Value::Null;
            config["state_open"] = json!(active);
            config["state_closed"] = json!(inactive);
        }
        EntityKind::Light => {
            config["payload_on"] = json!(active);
            config["payload_off"] = json!(inactive);
        }
        EntityKind::Battery => {
            config["device_class"] = json!("battery");
            config["payload_on"] = json!(active);
            config["payload_off"] = json!(inactive);
        }
    }

    if kind.accepts_commands() {
        config["command_topic"] = json!(command_topic(base, kind, device_id));
    }

    config
}
