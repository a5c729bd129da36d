// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backup battery charge level.

use std::fmt;

/// Charge of the opener's backup battery, in percent.
///
/// # Examples
///
/// ```
/// use ryobi_gdo_lib::types::BatteryLevel;
///
/// assert!(BatteryLevel::new(15).is_low());
/// assert!(!BatteryLevel::new(75).is_low());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BatteryLevel(i64);

impl BatteryLevel {
    /// Levels strictly below this percentage raise the low-battery alert.
    pub const LOW_THRESHOLD: i64 = 20;

    /// Creates a battery level from a raw percentage.
    ///
    /// The value is kept as reported; the vendor occasionally sends values
    /// outside 0-100 and those still compare against the threshold.
    #[must_use]
    pub const fn new(percent: i64) -> Self {
        Self(percent)
    }

    /// Returns the raw percentage.
    #[must_use]
    pub const fn percent(self) -> i64 {
        self.0
    }

    /// Returns true if the low-battery alert should be raised.
    #[must_use]
    pub const fn is_low(self) -> bool {
        self.0 < Self::LOW_THRESHOLD
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl From<i64> for BatteryLevel {
    fn from(percent: i64) -> Self {
        Self::new(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary() {
        assert!(BatteryLevel::new(19).is_low());
        assert!(!BatteryLevel::new(20).is_low());
        assert!(BatteryLevel::new(0).is_low());
    }

    #[test]
    fn display_with_percent_sign() {
        assert_eq!(BatteryLevel::new(42).to_string(), "42%");
    }
}
