// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized attribute updates.
//!
//! An [`AttributeUpdate`] is what one vendor push message means once it has
//! been decoded: a partial set of semantic device fields. Every field is
//! optional because a message usually carries a single attribute.
//!
//! # Examples
//!
//! ```
//! use ryobi_gdo_lib::state::AttributeUpdate;
//! use ryobi_gdo_lib::types::DoorState;
//!
//! let update = AttributeUpdate::new()
//!     .with_door_state(DoorState::Open)
//!     .with_light_state(true);
//!
//! assert_eq!(update.door_state(), Some(DoorState::Open));
//! assert_eq!(update.len(), 2);
//! ```

use crate::types::{BatteryLevel, DoorState};

use super::DeviceSnapshot;

/// Semantic device fields decoded from one push message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AttributeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    door_state: Option<DoorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    light_state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vacation_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety: Option<i64>,
}

impl AttributeUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the door state.
    #[must_use]
    pub fn with_door_state(mut self, state: DoorState) -> Self {
        self.door_state = Some(state);
        self
    }

    /// Sets the light state.
    #[must_use]
    pub fn with_light_state(mut self, on: bool) -> Self {
        self.light_state = Some(on);
        self
    }

    /// Sets the battery level in percent.
    #[must_use]
    pub fn with_battery_level(mut self, percent: i64) -> Self {
        self.battery_level = Some(percent);
        self
    }

    /// Sets the vacation mode flag.
    #[must_use]
    pub fn with_vacation_mode(mut self, enabled: bool) -> Self {
        self.vacation_mode = Some(enabled);
        self
    }

    /// Sets the raw safety device reading.
    #[must_use]
    pub fn with_safety(mut self, value: i64) -> Self {
        self.safety = Some(value);
        self
    }

    /// Returns the door state, if the message carried one.
    #[must_use]
    pub fn door_state(&self) -> Option<DoorState> {
        self.door_state
    }

    /// Returns the light state, if the message carried one.
    #[must_use]
    pub fn light_state(&self) -> Option<bool> {
        self.light_state
    }

    /// Returns the battery level in percent, if the message carried one.
    #[must_use]
    pub fn battery_level(&self) -> Option<i64> {
        self.battery_level
    }

    /// Returns the battery level as a [`BatteryLevel`].
    #[must_use]
    pub fn battery(&self) -> Option<BatteryLevel> {
        self.battery_level.map(BatteryLevel::new)
    }

    /// Returns the vacation mode flag, if present.
    #[must_use]
    pub fn vacation_mode(&self) -> Option<bool> {
        self.vacation_mode
    }

    /// Returns the raw safety device reading, if present.
    #[must_use]
    pub fn safety(&self) -> Option<i64> {
        self.safety
    }

    /// Returns true if no attribute was recognised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of populated attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        [
            self.door_state.is_some(),
            self.light_state.is_some(),
            self.battery_level.is_some(),
            self.vacation_mode.is_some(),
            self.safety.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

impl From<&DeviceSnapshot> for AttributeUpdate {
    fn from(snapshot: &DeviceSnapshot) -> Self {
        Self {
            door_state: snapshot.door_state,
            light_state: snapshot.light_state,
            battery_level: snapshot.battery_level,
            vacation_mode: snapshot.vacation_mode,
            safety: snapshot.safety,
        }
    }
}
