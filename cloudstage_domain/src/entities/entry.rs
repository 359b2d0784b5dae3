// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staged Entry
//!
//! This module provides the [`Entry`] entity: one pending value mutation for
//! one (service, name) pair, together with its [`Operation`] discriminator
//! and the optional [`DeleteOptions`] the secret manager supports.
//!
//! ## Invariants
//!
//! - `operation == Delete` ⇒ `value` is absent
//! - `operation == Create` ⇒ `base_modified_at` is absent (no baseline
//!   exists for a resource being created)
//! - `delete_options` is present only when the backend supports them
//!
//! Entries are constructed through [`Entry::create`], [`Entry::update`] and
//! [`Entry::delete`], which make the invariants unrepresentable rather than
//! checked after the fact.
//!
//! ## Lifecycle
//!
//! An entry is created by one of `add`/`edit`/`delete`, mutated by a later
//! use case landing on the same key, and destroyed by a successful apply,
//! an explicit reset, an auto-unstage (the value equals the remote), or a
//! `delete` converting a pending create into nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::services::datetime_serde;
use crate::value_objects::RecoveryWindow;

/// The kind of pending mutation an [`Entry`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The resource does not exist remotely and will be created.
    Create,
    /// The resource exists remotely and its value will be replaced.
    Update,
    /// The resource exists remotely and will be deleted.
    Delete,
}

impl Operation {
    /// Stable schema name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deletion options for backends that support them (the secret manager).
///
/// `force` skips the recovery window entirely; otherwise the resource stays
/// recoverable for `recovery_window` days (validated to 7..=30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Delete immediately without a recovery window.
    #[serde(default)]
    pub force: bool,
    /// Recovery window in days; ignored when `force` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_window: Option<RecoveryWindow>,
}

impl DeleteOptions {
    /// Force deletion without a recovery window.
    pub fn force() -> Self {
        Self {
            force: true,
            recovery_window: None,
        }
    }

    /// Deletion with a validated recovery window.
    pub fn with_window(window: RecoveryWindow) -> Self {
        Self {
            force: false,
            recovery_window: Some(window),
        }
    }
}

/// A pending value mutation for one (service, name) pair.
///
/// Independent of any staged tag mutation on the same key; see
/// [`TagEntry`](crate::entities::TagEntry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The pending mutation kind.
    pub operation: Operation,

    /// The new value; present only for create and update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Optional description attached to the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When this entry was staged.
    #[serde(with = "datetime_serde")]
    pub staged_at: DateTime<Utc>,

    /// Remote last-modified observed when staging began; the basis for
    /// conflict detection. Absent for creates.
    #[serde(
        default,
        with = "datetime_serde::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_modified_at: Option<DateTime<Utc>>,

    /// Deletion options; present only when the backend supports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_options: Option<DeleteOptions>,
}

impl Entry {
    /// A pending create. Creates never carry a baseline.
    pub fn create(value: impl Into<String>, description: Option<String>, staged_at: DateTime<Utc>) -> Self {
        Self {
            operation: Operation::Create,
            value: Some(value.into()),
            description,
            staged_at,
            base_modified_at: None,
            delete_options: None,
        }
    }

    /// A pending update anchored to the remote baseline observed when the
    /// user first decided to mutate.
    pub fn update(
        value: impl Into<String>,
        description: Option<String>,
        staged_at: DateTime<Utc>,
        base_modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            operation: Operation::Update,
            value: Some(value.into()),
            description,
            staged_at,
            base_modified_at,
            delete_options: None,
        }
    }

    /// A pending delete. Deletes never carry a value.
    pub fn delete(
        staged_at: DateTime<Utc>,
        base_modified_at: Option<DateTime<Utc>>,
        delete_options: Option<DeleteOptions>,
    ) -> Self {
        Self {
            operation: Operation::Delete,
            value: None,
            description: None,
            staged_at,
            base_modified_at,
            delete_options,
        }
    }

    /// Whether this entry is a pending create.
    pub fn is_create(&self) -> bool {
        self.operation == Operation::Create
    }

    /// Whether this entry is a pending delete.
    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }

    /// Scrubs the secret-bearing fields in place.
    ///
    /// Used by the agent daemon before releasing state memory.
    pub fn zeroize_value(&mut self) {
        if let Some(value) = self.value.as_mut() {
            value.zeroize();
        }
        if let Some(description) = self.description.as_mut() {
            description.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_create_has_no_baseline() {
        let entry = Entry::create("v1", None, t0());
        assert_eq!(entry.operation, Operation::Create);
        assert_eq!(entry.value.as_deref(), Some("v1"));
        assert!(entry.base_modified_at.is_none());
    }

    #[test]
    fn test_delete_has_no_value() {
        let entry = Entry::delete(t0(), Some(t0()), Some(DeleteOptions::force()));
        assert_eq!(entry.operation, Operation::Delete);
        assert!(entry.value.is_none());
        assert!(entry.delete_options.unwrap().force);
    }

    #[test]
    fn test_serde_omits_absent_fields() {
        let entry = Entry::delete(t0(), None, None);
        let json = serde_json::to_value(&entry).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("value"));
        assert!(!obj.contains_key("description"));
        assert!(!obj.contains_key("base_modified_at"));
        assert!(!obj.contains_key("delete_options"));
        assert_eq!(obj["operation"], "delete");
    }

    #[test]
    fn test_serde_round_trip() {
        let entry = Entry::update("w", Some("desc".into()), t0(), Some(t0()));
        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_zeroize_clears_value() {
        let mut entry = Entry::create("hunter2", Some("secret note".into()), t0());
        entry.zeroize_value();
        assert_eq!(entry.value.as_deref(), Some(""));
        assert_eq!(entry.description.as_deref(), Some(""));
    }
}
