// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Door state reported by the opener.

use std::fmt;

/// State of the garage door as reported in `doorState` attributes.
///
/// The vendor encodes the state as a small integer. Conversion from an
/// integer is total: codes outside the known range map to
/// [`DoorState::Unknown`].
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::types::DoorState;
///
/// assert_eq!(DoorState::from_code(1), DoorState::Open);
/// assert_eq!(DoorState::from_code(99), DoorState::Unknown);
/// assert_eq!(DoorState::Closing.as_str(), "closing");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    /// Door is fully closed.
    Closed,
    /// Door is fully open.
    Open,
    /// Door is moving down.
    Closing,
    /// Door is moving up.
    Opening,
    /// Opener reported a fault.
    Fault,
    /// Code not recognised.
    Unknown,
}

impl DoorState {
    /// Maps a vendor code to a door state.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Closed,
            1 => Self::Open,
            2 => Self::Closing,
            3 => Self::Opening,
            4 => Self::Fault,
            _ => Self::Unknown,
        }
    }

    /// Returns the vendor code, or `None` for [`DoorState::Unknown`].
    #[must_use]
    pub const fn code(self) -> Option<u8> {
        match self {
            Self::Closed => Some(0),
            Self::Open => Some(1),
            Self::Closing => Some(2),
            Self::Opening => Some(3),
            Self::Fault => Some(4),
            Self::Unknown => None,
        }
    }

    /// Returns the lowercase literal used on the automation bus.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Opening => "opening",
            Self::Fault => "fault",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if the door is at rest in a fully open or closed position.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Open | Self::Closed)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<i64> for DoorState {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}
