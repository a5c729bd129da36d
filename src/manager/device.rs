// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device entity adapter.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::protocol::WebSocketClient;
use crate::state::AttributeUpdate;
use crate::types::{BatteryLevel, DoorState};

use super::entity::{BinarySensorEntity, CoverEntity, SwitchEntity};

/// Module command that moves the door.
const DOOR_COMMAND: &str = "doorCommand";

/// Module command that switches the light.
const LIGHT_COMMAND: &str = "lightState";

/// One garage door opener and its entities.
///
/// Created by [`DeviceManager::setup_device`](super::DeviceManager::setup_device).
/// Attribute updates are translated into entity calls; door and light
/// commands are sent through the shared push connection.
pub struct Device {
    device_id: String,
    device_name: String,
    module_id: u32,
    module_type: u32,
    connection: Arc<WebSocketClient>,
    cover: Box<dyn CoverEntity>,
    light: Box<dyn SwitchEntity>,
    battery: Box<dyn BinarySensorEntity>,
}

impl Device {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device_id: String,
        device_name: String,
        module_id: u32,
        module_type: u32,
        connection: Arc<WebSocketClient>,
        cover: Box<dyn CoverEntity>,
        light: Box<dyn SwitchEntity>,
        battery: Box<dyn BinarySensorEntity>,
    ) -> Self {
        Self {
            device_id,
            device_name,
            module_id,
            module_type,
            connection,
            cover,
            light,
            battery,
        }
    }

    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Returns the port id of the opener module.
    #[must_use]
    pub fn module_id(&self) -> u32 {
        self.module_id
    }

    /// Returns the opener module type.
    #[must_use]
    pub fn module_type(&self) -> u32 {
        self.module_type
    }

    /// Returns the push connection used for commands.
    #[must_use]
    pub fn connection(&self) -> &Arc<WebSocketClient> {
        &self.connection
    }

    /// Reflects a door state on the cover.
    ///
    /// Only `open` and `closed` change the cover. Moving and fault states
    /// are accepted and leave the cover as it is.
    ///
    /// # Errors
    ///
    /// Returns the entity bus error if the cover could not be updated.
    pub async fn update_door_state(&self, state: DoorState) -> Result<()> {
        match state {
            DoorState::Open => self.cover.open().await,
            DoorState::Closed => self.cover.close().await,
            DoorState::Closing | DoorState::Opening | DoorState::Fault | DoorState::Unknown => {
                tracing::debug!(
                    device_id = %self.device_id,
                    state = %state,
                    "Door state has no cover counterpart"
                );
                Ok(())
            }
        }
    }

    /// Reflects the light state on the switch.
    ///
    /// # Errors
    ///
    /// Returns the entity bus error if the switch could not be updated.
    pub async fn update_light_state(&self, is_on: bool) -> Result<()> {
        if is_on {
            self.light.on().await
        } else {
            self.light.off().await
        }
    }

    /// Turns the low battery sensor on below 20 %, off otherwise.
    ///
    /// # Errors
    ///
    /// Returns the entity bus error if the sensor could not be updated.
    pub async fn update_battery_level(&self, percent: i64) -> Result<()> {
        if BatteryLevel::new(percent).is_low() {
            self.battery.on().await
        } else {
            self.battery.off().await
        }
    }

    /// Applies every populated field of an update to the entities.
    ///
    /// All fields are applied even if one entity fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first entity bus error.
    pub async fn apply(&self, update: &AttributeUpdate) -> Result<()> {
        let mut first_error = None;

        if let Some(state) = update.door_state() {
            keep_first(&mut first_error, self.update_door_state(state).await);
        }

        if let Some(on) = update.light_state() {
            keep_first(&mut first_error, self.update_light_state(on).await);
        }

        if let Some(percent) = update.battery_level() {
            keep_first(&mut first_error, self.update_battery_level(percent).await);
        }

        if update.vacation_mode().is_some() || update.safety().is_some() {
            tracing::trace!(
                device_id = %self.device_id,
                vacation_mode = ?update.vacation_mode(),
                safety = ?update.safety(),
                "Auxiliary attributes received"
            );
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Asks the opener to open the door.
    ///
    /// Returns whether the command was written to the push connection.
    pub async fn open_door(&self) -> bool {
        self.send(DOOR_COMMAND, Value::from(1)).await
    }

    /// Asks the opener to close the door.
    ///
    /// Returns whether the command was written to the push connection.
    pub async fn close_door(&self) -> bool {
        self.send(DOOR_COMMAND, Value::from(0)).await
    }

    /// Switches the opener light.
    ///
    /// Returns whether the command was written to the push connection.
    pub async fn set_light(&self, on: bool) -> bool {
        self.send(LIGHT_COMMAND, Value::Bool(on)).await
    }

    async fn send(&self, command: &str, value: Value) -> bool {
        tracing::debug!(device_id = %self.device_id, command, value = %value, "Sending device command");
        self.connection
            .send_message(self.module_id, self.module_type, command, value)
            .await
    }
}

fn keep_first(slot: &mut Option<crate::Error>, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Entity update failed");
        slot.get_or_insert(e);
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("module_id", &self.module_id)
            .field("module_type", &self.module_type)
            .finish_non_exhaustive()
    }
}
