// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state values.
//!
//! - [`AttributeUpdate`]: the decoded meaning of one push message
//! - [`DeviceSnapshot`]: the initial state fetched from the vendor API

mod attribute_update;
mod device_snapshot;

pub use attribute_update::AttributeUpdate;
pub use device_snapshot::DeviceSnapshot;
