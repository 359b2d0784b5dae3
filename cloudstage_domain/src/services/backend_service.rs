// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Backend Strategy Port
//!
//! This module defines the contract the staging core consumes from remote
//! backend adapters. One implementation exists per [`Service`]; the
//! adapters themselves (name parsing rules, API clients, pagination) live
//! outside this crate and are injected at the use-case boundary.
//!
//! The staging core only ever needs five remote operations (fetch the
//! current value, fetch the last-modified instant, fetch a pinned version,
//! apply one entry, apply one tag entry) plus capability flags and
//! user-facing labels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Entry, TagEntry};
use crate::error::StageError;
use crate::value_objects::Service;

/// A value fetched at a pinned version or label.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// The value at that version.
    pub value: String,
    /// The version id or label it was resolved to.
    pub label: String,
    /// When the version was written.
    pub last_modified: DateTime<Utc>,
}

/// The current remote value fetched as an edit baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct EditFetchResult {
    /// The current value.
    pub value: String,
    /// The current version id.
    pub version: String,
    /// The current description, if the backend tracks one.
    pub description: Option<String>,
    /// When the value was last modified; the conflict-detection baseline.
    pub last_modified: DateTime<Utc>,
}

/// Remote backend contract for one service.
///
/// All fetch methods return `Ok(None)` for a resource that does not exist;
/// errors are reserved for real failures (auth, transport, throttling).
#[async_trait]
pub trait BackendStrategy: Send + Sync {
    /// The service this strategy backs.
    fn service(&self) -> Service;

    /// Human-readable service label (for example "parameter store").
    fn service_name(&self) -> &'static str {
        self.service().label()
    }

    /// What one resource is called in messages (for example "parameter").
    fn item_name(&self) -> &'static str {
        self.service().item_label()
    }

    /// Whether the backend accepts delete options (force, recovery
    /// window).
    fn has_delete_options(&self) -> bool {
        false
    }

    /// Normalizes raw user input into a canonical resource name.
    fn parse_name(&self, raw: &str) -> Result<String, StageError>;

    /// Splits raw input into a canonical name and whether it pins a
    /// version.
    fn parse_spec(&self, raw: &str) -> Result<(String, bool), StageError>;

    /// Fetches the current value and baseline metadata for a name.
    async fn fetch_current_value(&self, name: &str) -> Result<Option<EditFetchResult>, StageError>;

    /// Fetches only the last-modified instant for a name.
    async fn fetch_last_modified(&self, name: &str) -> Result<Option<DateTime<Utc>>, StageError>;

    /// Fetches the value at a pinned version spec.
    async fn fetch_version(&self, spec: &str) -> Result<Option<FetchResult>, StageError>;

    /// Applies one staged entry against the remote.
    async fn apply(&self, name: &str, entry: &Entry) -> Result<(), StageError>;

    /// Applies one staged tag entry against the remote.
    async fn apply_tags(&self, name: &str, tags: &TagEntry) -> Result<(), StageError>;
}
