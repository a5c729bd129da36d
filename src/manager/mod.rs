// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for garage door openers.
//!
//! # Overview
//!
//! The [`DeviceManager`] sits between the push connection and the automation
//! bus:
//!
//! - **Setup**: fetches a device's initial state through an [`ApiClient`] and
//!   creates its entities through an [`EntityFactory`]
//! - **Inbound**: decodes push notifications and applies them to the
//!   matching [`Device`]
//! - **Outbound**: turns [`BusCommand`]s into door and light commands on the
//!   push connection
//!
//! The HTTP API client and the automation bus are collaborators supplied by
//! the caller. With the `mqtt` feature, [`crate::bus::MqttBus`] provides a
//! ready-made [`EntityFactory`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use ryobi_gdo_lib::manager::{ApiClient, DeviceManager, EntityFactory};
//!
//! # async fn example(
//! #     api: Arc<dyn ApiClient>,
//! #     entities: Arc<dyn EntityFactory>,
//! # ) {
//! let manager = DeviceManager::new(api, entities);
//!
//! if let Some(device) = manager.get_device("c4be84986d2e").await {
//!     device.open_door().await;
//! }
//! # }
//! ```

mod api;
mod device;
mod device_manager;
mod entity;
#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiClient;
pub use device::Device;
pub use device_manager::DeviceManager;
pub use entity::{BinarySensorEntity, BusCommand, CoverEntity, EntityFactory, SwitchEntity};
