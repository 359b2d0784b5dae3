// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staged State
//!
//! This module provides the [`State`] aggregate: the whole staged set for
//! one identity (account, region). It is a tree of ordered mappings:
//! service → name → [`Entry`] for pending value mutations, and service →
//! name → [`TagEntry`] for pending tag mutations, plus a schema version.
//!
//! ## Schema
//!
//! Persisted and wire form (version 2):
//!
//! ```json
//! { "version": 2,
//!   "entries": { "param": { "<name>": { … } }, "secret": { … } },
//!   "tags":    { "param": { "<name>": { … } }, "secret": { … } } }
//! ```
//!
//! Readers reject any other version with `SchemaUnknown`. Both service
//! keys are always present, so serialization is byte-stable across
//! round trips.
//!
//! ## Ownership
//!
//! A `State` instance is owned by whichever store holds it; it moves by
//! value at the use-case boundary. The agent daemon keeps the only
//! long-lived mutable instance; clients receive copies over the socket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Entry, TagEntry};
use crate::error::StageError;
use crate::value_objects::Service;

/// Current schema version of persisted and wire state.
pub const STATE_VERSION: u32 = 2;

/// The whole staged set: pending entries and tag entries for every
/// service, plus the schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Schema version; always [`STATE_VERSION`] for states built by this
    /// crate.
    pub version: u32,

    /// Pending value mutations, service → name → entry.
    #[serde(default)]
    pub entries: BTreeMap<Service, BTreeMap<String, Entry>>,

    /// Pending tag mutations, service → name → tag entry. Independent of
    /// `entries`.
    #[serde(default)]
    pub tags: BTreeMap<Service, BTreeMap<String, TagEntry>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// An empty state at the current schema version, with both service
    /// mappings present.
    pub fn new() -> Self {
        let mut state = Self {
            version: STATE_VERSION,
            entries: BTreeMap::new(),
            tags: BTreeMap::new(),
        };
        state.normalize();
        state
    }

    /// Ensures both service keys exist in both mappings.
    ///
    /// Keeps serialization stable regardless of which services have been
    /// touched.
    pub fn normalize(&mut self) {
        for service in Service::ALL {
            self.entries.entry(service).or_default();
            self.tags.entry(service).or_default();
        }
    }

    /// Whether every inner mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty) && self.tags.values().all(BTreeMap::is_empty)
    }

    /// Total number of staged entries across services.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Total number of staged tag entries across services.
    pub fn tag_count(&self) -> usize {
        self.tags.values().map(BTreeMap::len).sum()
    }

    /// The staged entry at (service, name), if any.
    pub fn entry(&self, service: Service, name: &str) -> Option<&Entry> {
        self.entries.get(&service).and_then(|m| m.get(name))
    }

    /// The staged tag entry at (service, name), if any.
    pub fn tag(&self, service: Service, name: &str) -> Option<&TagEntry> {
        self.tags.get(&service).and_then(|m| m.get(name))
    }

    /// All staged entries for one service.
    pub fn entries_for(&self, service: Service) -> BTreeMap<String, Entry> {
        self.entries.get(&service).cloned().unwrap_or_default()
    }

    /// All staged tag entries for one service.
    pub fn tags_for(&self, service: Service) -> BTreeMap<String, TagEntry> {
        self.tags.get(&service).cloned().unwrap_or_default()
    }

    /// Inserts or replaces the entry at (service, name).
    pub fn insert_entry(&mut self, service: Service, name: impl Into<String>, entry: Entry) {
        self.entries.entry(service).or_default().insert(name.into(), entry);
    }

    /// Removes and returns the entry at (service, name).
    pub fn remove_entry(&mut self, service: Service, name: &str) -> Option<Entry> {
        self.entries.get_mut(&service).and_then(|m| m.remove(name))
    }

    /// Inserts or replaces the tag entry at (service, name).
    pub fn insert_tag(&mut self, service: Service, name: impl Into<String>, tags: TagEntry) {
        self.tags.entry(service).or_default().insert(name.into(), tags);
    }

    /// Removes and returns the tag entry at (service, name).
    pub fn remove_tag(&mut self, service: Service, name: &str) -> Option<TagEntry> {
        self.tags.get_mut(&service).and_then(|m| m.remove(name))
    }

    /// Extracts a copy of the staged set restricted to one service.
    pub fn extract_service(&self, service: Service) -> State {
        let mut extracted = State::new();
        if let Some(entries) = self.entries.get(&service) {
            extracted.entries.insert(service, entries.clone());
        }
        if let Some(tags) = self.tags.get(&service) {
            extracted.tags.insert(service, tags.clone());
        }
        extracted
    }

    /// Removes everything staged for one service, returning whether
    /// anything was removed.
    pub fn remove_service(&mut self, service: Service) -> bool {
        let had_entries = self.entries.get(&service).is_some_and(|m| !m.is_empty());
        let had_tags = self.tags.get(&service).is_some_and(|m| !m.is_empty());
        self.entries.insert(service, BTreeMap::new());
        self.tags.insert(service, BTreeMap::new());
        had_entries || had_tags
    }

    /// Merges `source` into `self`; on key collisions the source wins.
    pub fn merge(&mut self, source: State) {
        for (service, entries) in source.entries {
            let target = self.entries.entry(service).or_default();
            for (name, entry) in entries {
                target.insert(name, entry);
            }
        }
        for (service, tags) in source.tags {
            let target = self.tags.entry(service).or_default();
            for (name, tag_entry) in tags {
                target.insert(name, tag_entry);
            }
        }
    }

    /// Replaces one service's staged set with the same service's set from
    /// `source`, leaving the other service untouched.
    pub fn replace_service(&mut self, service: Service, source: &State) {
        self.entries
            .insert(service, source.entries.get(&service).cloned().unwrap_or_default());
        self.tags
            .insert(service, source.tags.get(&service).cloned().unwrap_or_default());
    }

    /// Validates schema version and structural invariants.
    ///
    /// # Errors
    ///
    /// - [`StageError::SchemaUnknown`] for any version other than
    ///   [`STATE_VERSION`]
    /// - [`StageError::ConflictingState`] when a persisted tag entry has
    ///   overlapping add/remove sides
    pub fn validate(&self) -> Result<(), StageError> {
        if self.version != STATE_VERSION {
            return Err(StageError::SchemaUnknown { version: self.version });
        }
        for (service, tags) in &self.tags {
            for (name, tag_entry) in tags {
                if !tag_entry.is_disjoint() {
                    return Err(StageError::ConflictingState(format!(
                        "{} {} has overlapping tag add/remove sets",
                        service, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encodes this state as schema JSON.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, StageError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes and validates schema JSON.
    pub fn from_json_slice(bytes: &[u8]) -> Result<State, StageError> {
        let mut state: State = serde_json::from_slice(bytes)?;
        state.validate()?;
        state.normalize();
        Ok(state)
    }

    /// Scrubs every staged value in place.
    ///
    /// Used by the agent daemon on shutdown and before overwriting held
    /// state.
    pub fn zeroize_values(&mut self) {
        for entries in self.entries.values_mut() {
            for entry in entries.values_mut() {
                entry.zeroize_value();
            }
        }
        for tags in self.tags.values_mut() {
            for tag_entry in tags.values_mut() {
                tag_entry.zeroize_values();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn sample_state() -> State {
        let mut state = State::new();
        state.insert_entry(Service::Param, "/app/url", Entry::create("https://x", None, t0()));
        state.insert_entry(
            Service::Secret,
            "db-password",
            Entry::update("hunter2", None, t0(), Some(t0())),
        );
        let mut tags = TagEntry::new(t0(), None);
        tags.merge_add(vec![("env".to_string(), "prod".to_string())]);
        state.insert_tag(Service::Param, "/app/url", tags);
        state
    }

    #[test]
    fn test_new_state_is_empty_and_normalized() {
        let state = State::new();
        assert!(state.is_empty());
        assert_eq!(state.version, STATE_VERSION);
        for service in Service::ALL {
            assert!(state.entries.contains_key(&service));
            assert!(state.tags.contains_key(&service));
        }
    }

    #[test]
    fn test_counts() {
        let state = sample_state();
        assert_eq!(state.entry_count(), 2);
        assert_eq!(state.tag_count(), 1);
        assert!(!state.is_empty());
    }

    #[test]
    fn test_remove_entry_returns_it() {
        let mut state = sample_state();
        let removed = state.remove_entry(Service::Param, "/app/url").unwrap();
        assert!(removed.is_create());
        assert!(state.remove_entry(Service::Param, "/app/url").is_none());
    }

    #[test]
    fn test_extract_merge_isomorphism() {
        let full = sample_state();

        let mut remainder = full.clone();
        remainder.remove_service(Service::Param);
        let extracted = full.extract_service(Service::Param);

        let mut rebuilt = remainder;
        rebuilt.merge(extracted);
        assert_eq!(rebuilt, full);
    }

    #[test]
    fn test_merge_source_wins_on_collision() {
        let mut dest = State::new();
        dest.insert_entry(Service::Param, "/a", Entry::create("old", None, t0()));

        let mut source = State::new();
        source.insert_entry(Service::Param, "/a", Entry::create("new", None, t0()));

        dest.merge(source);
        assert_eq!(
            dest.entry(Service::Param, "/a").unwrap().value.as_deref(),
            Some("new")
        );
    }

    #[test]
    fn test_replace_service_preserves_other_service() {
        let mut dest = sample_state();
        let incoming = State::new();
        dest.replace_service(Service::Param, &incoming);

        assert!(dest.entries_for(Service::Param).is_empty());
        assert!(dest.tags_for(Service::Param).is_empty());
        assert_eq!(dest.entries_for(Service::Secret).len(), 1);
    }

    #[test]
    fn test_schema_round_trip_is_stable() {
        let state = sample_state();
        let first = state.to_json_vec().unwrap();
        let reloaded = State::from_json_slice(&first).unwrap();
        let second = reloaded.to_json_vec().unwrap();
        assert_eq!(first, second);
        assert_eq!(reloaded, state);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut state = sample_state();
        state.version = 3;
        let bytes = serde_json::to_vec(&state).unwrap();
        let err = State::from_json_slice(&bytes).unwrap_err();
        assert_eq!(err.kind(), "schema_unknown");
    }

    #[test]
    fn test_overlapping_tags_rejected_on_load() {
        let raw = serde_json::json!({
            "version": 2,
            "entries": {},
            "tags": {
                "param": {
                    "/a": {
                        "add": {"env": "prod"},
                        "remove": ["env"],
                        "staged_at": "2025-01-15T10:00:00+00:00"
                    }
                }
            }
        });
        let err = State::from_json_slice(raw.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "conflicting_state");
    }

    #[test]
    fn test_zeroize_values_scrubs_everything() {
        let mut state = sample_state();
        state.zeroize_values();
        assert_eq!(
            state.entry(Service::Secret, "db-password").unwrap().value.as_deref(),
            Some("")
        );
        let tags = state.tag(Service::Param, "/app/url").unwrap();
        assert!(tags.add.values().all(String::is_empty));
    }
}
