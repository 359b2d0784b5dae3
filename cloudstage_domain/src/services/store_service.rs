// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Store Port
//!
//! The single boundary through which staged state is read and mutated.
//! Two implementations exist: the encrypted file store (persistent,
//! portable) and the agent store (fast, locked memory behind the daemon
//! socket). Use cases depend only on this trait, so staged work moves
//! between the two without touching any staging logic.
//!
//! Every mutating method is one store transaction: it either persists in
//! full or leaves the store untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::entities::{Entry, State, TagEntry};
use crate::error::StageError;
use crate::value_objects::Service;

/// Merge policy when writing a whole state into a store that may already
/// hold one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Destination ∪ source; source wins on key collisions.
    Merge,
    /// Destination is fully replaced.
    Overwrite,
}

/// Why a store is being emptied; affects logging only, never control
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnstageHint {
    /// The staged set was discarded on purpose.
    Reset,
    /// The staged set was persisted elsewhere first.
    Persist,
}

/// A store owning one staged [`State`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the whole state without modifying the store.
    async fn load(&self) -> Result<State, StageError>;

    /// Reads the state, optionally restricted to one service, removing the
    /// returned portion unless `keep`.
    async fn drain(&self, service: Option<Service>, keep: bool) -> Result<State, StageError>;

    /// Writes a whole state into the store.
    ///
    /// [`MergeMode::Overwrite`] replaces the stored state;
    /// [`MergeMode::Merge`] unions it in, the incoming state winning on
    /// key collisions.
    async fn write_state(&self, state: State, mode: MergeMode) -> Result<(), StageError>;

    /// Inserts or replaces one entry.
    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> Result<(), StageError>;

    /// Removes one entry.
    ///
    /// # Errors
    ///
    /// [`StageError::NotStaged`] when the key holds no entry.
    async fn unstage_entry(&self, service: Service, name: &str) -> Result<(), StageError>;

    /// Inserts or replaces one tag entry.
    async fn stage_tag(&self, service: Service, name: &str, tags: TagEntry) -> Result<(), StageError>;

    /// Removes one tag entry.
    ///
    /// # Errors
    ///
    /// [`StageError::NotStaged`] when the key holds no tag entry.
    async fn unstage_tag(&self, service: Service, name: &str) -> Result<(), StageError>;

    /// Lists staged entries for one service.
    async fn list_entries(&self, service: Service) -> Result<BTreeMap<String, Entry>, StageError>;

    /// Lists staged tag entries for one service.
    async fn list_tags(&self, service: Service) -> Result<BTreeMap<String, TagEntry>, StageError>;

    /// Empties the store, or one service's portion of it.
    async fn unstage_all(&self, service: Option<Service>, hint: UnstageHint) -> Result<(), StageError>;

    /// The staged entry at (service, name), if any.
    async fn get_entry(&self, service: Service, name: &str) -> Result<Option<Entry>, StageError> {
        Ok(self.list_entries(service).await?.remove(name))
    }

    /// The staged tag entry at (service, name), if any.
    async fn get_tag(&self, service: Service, name: &str) -> Result<Option<TagEntry>, StageError> {
        Ok(self.list_tags(service).await?.remove(name))
    }
}
