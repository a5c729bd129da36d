// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT entity bus (requires the `mqtt` feature).
//!
//! [`MqttBus`] renders each opener as three Home Assistant entities using
//! MQTT discovery: a `cover` for the door, a `switch` for the light and a
//! `binary_sensor` for a low backup battery. It implements
//! [`EntityFactory`](crate::manager::EntityFactory), so it can be handed
//! straight to a [`DeviceManager`](crate::manager::DeviceManager).

mod discovery;
mod mqtt;

pub use discovery::{
    EntityKind, command_filter, command_topic, discovery_config, discovery_topic,
    parse_command_topic, state_topic,
};
pub use mqtt::{MqttBus, MqttBusBuilder, MqttBusConfig};
