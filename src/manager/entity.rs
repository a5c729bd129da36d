// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entities rendered on the automation bus.
//!
//! Each opener is exposed as three entities: a cover for the door, a switch
//! for the light and a binary sensor for a low backup battery.

use async_trait::async_trait;

use crate::error::Result;

/// Door entity.
#[async_trait]
pub trait CoverEntity: Send + Sync {
    /// Reports the cover as open.
    async fn open(&self) -> Result<()>;

    /// Reports the cover as closed.
    async fn close(&self) -> Result<()>;
}

/// Light entity.
#[async_trait]
pub trait SwitchEntity: Send + Sync {
    /// Reports the switch as on.
    async fn on(&self) -> Result<()>;

    /// Reports the switch as off.
    async fn off(&self) -> Result<()>;
}

/// Low battery entity.
#[async_trait]
pub trait BinarySensorEntity: Send + Sync {
    /// Reports the sensor as on.
    async fn on(&self) -> Result<()>;

    /// Reports the sensor as off.
    async fn off(&self) -> Result<()>;
}

/// Creates the entities of one device on the automation bus.
///
/// The factory owns the bus connection and its settings.
#[async_trait]
pub trait EntityFactory: Send + Sync {
    /// Creates the door cover.
    async fn cover(&self, device_id: &str, device_name: &str) -> Result<Box<dyn CoverEntity>>;

    /// Creates the light switch.
    async fn light_switch(&self, device_id: &str, device_name: &str)
    -> Result<Box<dyn SwitchEntity>>;

    /// Creates the low battery sensor.
    async fn battery_sensor(
        &self,
        device_id: &str,
        device_name: &str,
    ) -> Result<Box<dyn BinarySensorEntity>>;
}

/// A command issued by the automation bus for one device entity.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::manager::BusCommand;
///
/// let command = BusCommand::new("c4be84986d2e", "door", "OPEN");
/// assert_eq!(command.entity, "door");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCommand {
    /// Target device.
    pub device_id: String,
    /// Target entity: `door` or `light`.
    pub entity: String,
    /// Raw command payload, e.g. `OPEN`, `CLOSE`, `ON`, `OFF`.
    pub payload: String,
}

impl BusCommand {
    /// Creates a bus command.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        entity: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            entity: entity.into(),
            payload: payload.into(),
        }
    }
}
