// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cloudstage Domain
//!
//! The domain layer of the cloudstage staging core. It holds the staged
//! state model, the transition state machine, the ports the application
//! layer depends on, and the error system, and nothing else: no I/O, no
//! sockets, no files, no clocks.
//!
//! ## Module Structure
//!
//! - [`entities`] - [`State`](entities::State), [`Entry`](entities::Entry),
//!   [`TagEntry`](entities::TagEntry): the staged set and its members
//! - [`value_objects`] - [`Service`](value_objects::Service) and
//!   [`RecoveryWindow`](value_objects::RecoveryWindow): immutable,
//!   self-validating values
//! - [`services`] - the transition engine, the
//!   [`BackendStrategy`](services::BackendStrategy) and
//!   [`StateStore`](services::StateStore) ports, and RFC3339 serde
//! - [`error`] - the tagged [`StageError`](error::StageError) with stable
//!   machine kinds
//!
//! ## Business Rules
//!
//! The invariants this layer enforces at all times:
//!
//! - A pending delete never carries a value; a pending create never
//!   carries a baseline.
//! - A tag entry's add and remove sides are disjoint; the newer action
//!   wins on overlap.
//! - Persisted state carries schema version 2; unknown versions are
//!   rejected.
//! - Entries and tag entries for the same key are independently staged.
//! - Re-editing preserves the earliest observed remote baseline.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use entities::{DeleteOptions, Entry, Operation, State, TagEntry, STATE_VERSION};
pub use error::{StageError, StashPhase};
pub use services::{BackendStrategy, EditFetchResult, FetchResult, MergeMode, StateStore, UnstageHint};
pub use value_objects::{RecoveryWindow, Service};
