// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary to the vendor HTTP API.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::state::DeviceSnapshot;

/// Vendor API operations needed to set up a device.
///
/// The HTTP login and device listing live outside this crate; the manager
/// only needs module addressing and an initial state snapshot.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Returns the port id of the opener module of a device.
    async fn get_module(&self, device_id: &str) -> Result<u32, ApiError>;

    /// Returns the module type of the opener module of a device.
    async fn get_module_type(&self, device_id: &str) -> Result<u32, ApiError>;

    /// Fetches the current device state.
    ///
    /// `Ok(None)` means the API answered but had no state for the device.
    async fn update_device(&self, device_id: &str) -> Result<Option<DeviceSnapshot>, ApiError>;
}
