// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Initial device state fetched from the vendor API.

use serde::{Deserialize, Serialize};

use crate::types::DoorState;

/// Point-in-time state of an opener as returned by the API client.
///
/// All fields are optional because the API only reports what the opener
/// exposes. Used once at setup to seed the entity adapters.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::state::DeviceSnapshot;
///
/// let snapshot = DeviceSnapshot::default();
/// assert!(snapshot.door_state.is_none());
/// assert!(snapshot.device_name.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSnapshot {
    /// Current door state.
    pub door_state: Option<DoorState>,
    /// Whether the opener light is on.
    pub light_state: Option<bool>,
    /// Backup battery level in percent.
    pub battery_level: Option<i64>,
    /// Raw safety device reading.
    pub safety: Option<i64>,
    /// Whether vacation mode is enabled.
    pub vacation_mode: Option<bool>,
    /// Name configured in the vendor app.
    pub device_name: Option<String>,
}
