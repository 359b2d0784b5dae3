// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory State Store
//!
//! The store the agent daemon custodies: one [`State`] behind a single
//! mutex. Every operation takes the lock, mutates, and releases; no two
//! RPCs ever observe a torn state, and no lock is held across an await
//! point.
//!
//! The daemon tracks a write generation so its auto-shutdown timer can
//! tell "still empty since I was scheduled" from "emptied again after
//! other writes".

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::{Entry, Service, StageError, State, TagEntry};

/// Mutex-guarded [`StateStore`] holding the agent's staged set.
pub struct MemoryStateStore {
    state: Mutex<State>,
    generation: AtomicU64,
}

impl MemoryStateStore {
    /// An empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether the held state is empty (non-blocking snapshot).
    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// The current write generation. Bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Scrubs all staged values and resets to an empty state.
    ///
    /// The daemon calls this on shutdown so secret material does not
    /// outlive the process's locked pages.
    pub fn zeroize_and_clear(&self) {
        let mut state = self.state.lock();
        state.zeroize_values();
        *state = State::new();
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut State) -> Result<T, StageError>) -> Result<T, StageError> {
        let mut state = self.state.lock();
        let result = f(&mut state)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(result)
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<State, StageError> {
        Ok(self.state.lock().clone())
    }

    async fn drain(&self, service: Option<Service>, keep: bool) -> Result<State, StageError> {
        if keep {
            let state = self.state.lock();
            return Ok(match service {
                None => state.clone(),
                Some(service) => state.extract_service(service),
            });
        }
        self.mutate(|state| match service {
            None => {
                let drained = state.clone();
                *state = State::new();
                Ok(drained)
            }
            Some(service) => {
                let extracted = state.extract_service(service);
                state.remove_service(service);
                Ok(extracted)
            }
        })
    }

    async fn write_state(&self, incoming: State, mode: MergeMode) -> Result<(), StageError> {
        self.mutate(|state| {
            match mode {
                MergeMode::Overwrite => {
                    state.zeroize_values();
                    *state = incoming;
                    state.normalize();
                }
                MergeMode::Merge => state.merge(incoming),
            }
            Ok(())
        })
    }

    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> Result<(), StageError> {
        self.mutate(|state| {
            if let Some(mut old) = state.remove_entry(service, name) {
                old.zeroize_value();
            }
            state.insert_entry(service, name, entry);
            Ok(())
        })
    }

    async fn unstage_entry(&self, service: Service, name: &str) -> Result<(), StageError> {
        self.mutate(|state| match state.remove_entry(service, name) {
            Some(mut removed) => {
                removed.zeroize_value();
                Ok(())
            }
            None => Err(StageError::not_staged(name)),
        })
    }

    async fn stage_tag(&self, service: Service, name: &str, tags: TagEntry) -> Result<(), StageError> {
        self.mutate(|state| {
            state.insert_tag(service, name, tags);
            Ok(())
        })
    }

    async fn unstage_tag(&self, service: Service, name: &str) -> Result<(), StageError> {
        self.mutate(|state| match state.remove_tag(service, name) {
            Some(_) => Ok(()),
            None => Err(StageError::not_staged(name)),
        })
    }

    async fn list_entries(&self, service: Service) -> Result<BTreeMap<String, Entry>, StageError> {
        Ok(self.state.lock().entries_for(service))
    }

    async fn list_tags(&self, service: Service) -> Result<BTreeMap<String, TagEntry>, StageError> {
        Ok(self.state.lock().tags_for(service))
    }

    async fn unstage_all(&self, service: Option<Service>, hint: UnstageHint) -> Result<(), StageError> {
        self.mutate(|state| {
            match service {
                None => {
                    state.zeroize_values();
                    *state = State::new();
                }
                Some(service) => {
                    state.remove_service(service);
                }
            }
            debug!(?hint, "agent state unstaged");
            Ok(())
        })
    }
}
