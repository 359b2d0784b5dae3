// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recovery Window
//!
//! Validated number of days a deleted secret remains recoverable. The
//! backing service accepts 7 through 30 days inclusive; anything else is
//! rejected at construction so an invalid window can never be staged.

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Minimum recovery window supported by the secret manager, in days.
pub const MIN_RECOVERY_WINDOW_DAYS: i64 = 7;

/// Maximum recovery window supported by the secret manager, in days.
pub const MAX_RECOVERY_WINDOW_DAYS: i64 = 30;

/// A validated recovery window for staged secret deletions.
///
/// Self-validating value object: the inner value is guaranteed to be in
/// `7..=30` for the lifetime of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecoveryWindow(i64);

impl RecoveryWindow {
    /// Creates a recovery window, rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InvalidRecoveryWindow`] when `days` is outside
    /// `7..=30`.
    pub fn new(days: i64) -> Result<Self, StageError> {
        if (MIN_RECOVERY_WINDOW_DAYS..=MAX_RECOVERY_WINDOW_DAYS).contains(&days) {
            Ok(Self(days))
        } else {
            Err(StageError::InvalidRecoveryWindow { days })
        }
    }

    /// The window length in days.
    pub fn days(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for RecoveryWindow {
    type Error = StageError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<RecoveryWindow> for i64 {
    fn from(window: RecoveryWindow) -> i64 {
        window.0
    }
}

impl std::fmt::Display for RecoveryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} days", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert_eq!(RecoveryWindow::new(7).unwrap().days(), 7);
        assert_eq!(RecoveryWindow::new(30).unwrap().days(), 30);
        assert_eq!(RecoveryWindow::new(14).unwrap().days(), 14);
    }

    #[test]
    fn test_rejects_out_of_range() {
        for days in [0, 6, 31, -1, 365] {
            let err = RecoveryWindow::new(days).unwrap_err();
            assert_eq!(err.kind(), "invalid_recovery_window");
        }
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let ok: RecoveryWindow = serde_json::from_str("14").unwrap();
        assert_eq!(ok.days(), 14);
        assert!(serde_json::from_str::<RecoveryWindow>("3").is_err());
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&RecoveryWindow::new(9).unwrap()).unwrap();
        assert_eq!(json, "9");
    }
}
