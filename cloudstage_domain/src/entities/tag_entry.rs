// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staged Tag Entry
//!
//! This module provides the [`TagEntry`] entity: pending tag mutations for
//! one (service, name) pair, staged independently of any value mutation on
//! the same key.
//!
//! ## Invariant
//!
//! No key ever appears in both `add` and `remove` of the same entry. When a
//! later action would cause an overlap, the newer side wins and the key is
//! deleted from the opposite side. The merge methods maintain this; the
//! invariant is also re-checked on deserialization of persisted state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;

/// Pending tag mutations for one (service, name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tags to set, keyed by tag name. Insertion order is irrelevant; the
    /// map is ordered for stable serialization.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,

    /// Tag keys to remove.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove: BTreeSet<String>,

    /// When this tag entry was first staged or last merged into.
    #[serde(with = "datetime_serde")]
    pub staged_at: DateTime<Utc>,

    /// Remote last-modified observed when tag staging began.
    #[serde(
        default,
        with = "datetime_serde::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_modified_at: Option<DateTime<Utc>>,
}

impl TagEntry {
    /// An empty tag entry anchored at `staged_at`.
    pub fn new(staged_at: DateTime<Utc>, base_modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            add: BTreeMap::new(),
            remove: BTreeSet::new(),
            staged_at,
            base_modified_at,
        }
    }

    /// Merges tags to set. Each key is removed from the `remove` side
    /// first: the newer action wins.
    pub fn merge_add(&mut self, tags: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in tags {
            self.remove.remove(&key);
            self.add.insert(key, value);
        }
    }

    /// Merges keys to remove. Each key is deleted from the `add` side
    /// first: the newer action wins.
    pub fn merge_remove(&mut self, keys: impl IntoIterator<Item = String>) {
        for key in keys {
            self.add.remove(&key);
            self.remove.insert(key);
        }
    }

    /// Whether nothing remains staged in this entry.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Number of staged tag operations (sets plus removals).
    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }

    /// Whether the add/remove sides are disjoint.
    ///
    /// Always true for entries built through the merge methods; checked
    /// explicitly when accepting persisted or wire state.
    pub fn is_disjoint(&self) -> bool {
        self.add.keys().all(|key| !self.remove.contains(key))
    }

    /// Scrubs tag values in place before memory release.
    pub fn zeroize_values(&mut self) {
        use zeroize::Zeroize;
        for value in self.add.values_mut() {
            value.zeroize();
        }
    }
}
