// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transition Engine
//!
//! The staging state machine. Given the staged state at one
//! (service, name), the remote existence, and an action, the engine yields
//! the new staged state or a typed error. The whole action table lives in
//! two pure functions, [`transition_entry`] for value mutations and
//! [`transition_tags`] for tag mutations, so every legal and illegal
//! combination is covered by exhaustive matching and unit tests.
//!
//! ## Entry action table
//!
//! | Staged \ Action       | Add            | Edit                         | Delete                      | Reset   |
//! |-----------------------|----------------|------------------------------|-----------------------------|---------|
//! | nothing, absent       | stage create   | skip if empty, else create   | `ResourceNotFound`          | no-op   |
//! | nothing, exists       | `CannotAddToExisting` | skip if equal, else update | stage delete            | no-op   |
//! | create, absent        | re-edit create | re-edit create               | unstage (never staged)      | unstage |
//! | create, exists        | `ConflictingState` | `ConflictingState`       | `ConflictingState`          | unstage |
//! | update, exists        | `AlreadyStagedForUpdate` | unstage if equal, else update | convert to delete | unstage |
//! | delete, exists        | `AlreadyStagedForDeletion` | revive as update   | re-stage with new options   | unstage |
//!
//! ## Baseline preservation
//!
//! When re-editing a staged update or delete, the *earliest* observed
//! `base_modified_at` is kept; it is never overwritten with a newer remote
//! timestamp. This anchors the conflict window to when the user first
//! decided to mutate.
//!
//! ## Purity
//!
//! The engine performs no I/O and takes the current instant as an
//! argument. Atomic read/apply/write sequencing is the application-layer
//! executor's job.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::entities::{DeleteOptions, Entry, Operation, TagEntry};
use crate::error::StageError;

/// Capabilities of the backend the action targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendCaps {
    /// Whether the backend accepts delete options (force, recovery
    /// window).
    pub has_delete_options: bool,
}

/// What the remote side currently holds for a name.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteExistence {
    /// The resource does not exist remotely.
    Absent,
    /// The resource exists with this value and last-modified instant.
    Exists {
        value: String,
        last_modified: DateTime<Utc>,
    },
}

impl RemoteExistence {
    /// The remote last-modified instant, when the resource exists.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            RemoteExistence::Absent => None,
            RemoteExistence::Exists { last_modified, .. } => Some(*last_modified),
        }
    }
}

/// A value-mutation action against one (service, name).
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction {
    /// Stage the creation of a resource that must not exist remotely.
    Add {
        value: String,
        description: Option<String>,
    },
    /// Stage a value change, creating the resource if absent.
    Edit {
        value: String,
        description: Option<String>,
    },
    /// Stage the deletion of an existing resource.
    Delete { options: Option<DeleteOptions> },
    /// Drop whatever is staged for the name.
    Reset,
}

/// A tag-mutation action against one (service, name).
#[derive(Debug, Clone, PartialEq)]
pub enum TagAction {
    /// Set these tags (key → value).
    Add(BTreeMap<String, String>),
    /// Remove these tag keys.
    Remove(BTreeSet<String>),
}

/// Why an entry left the staged set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnstageReason {
    /// The user asked for a reset.
    Reset,
    /// Deleting a pending create removes it instead of staging a delete.
    PendingCreateDeleted,
    /// The staged value now equals the remote value.
    MatchesRemote,
}

/// Why an action deliberately changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Reset with nothing staged.
    NothingStaged,
    /// Edit with an empty value against a nonexistent resource.
    EmptyValueOnAbsent,
    /// The requested value already equals the remote value.
    AlreadyMatchesRemote,
    /// Tag removal with no matching staged or remote key.
    NothingToRemove,
    /// The action carried no keys or values.
    EmptyInput,
}

/// Outcome of running one action through the table.
///
/// The application-layer executor persists exactly one of these per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Persist this entry at the key.
    StageEntry(Entry),
    /// Remove the pending entry at the key.
    UnstageEntry(UnstageReason),
    /// Persist this tag entry at the key.
    StageTag(TagEntry),
    /// Remove the pending tag entry (merged down to empty).
    UnstageTag,
    /// Leave the store untouched.
    Skip(SkipReason),
}

impl Transition {
    /// Whether the outcome removed a previously staged item.
    pub fn is_unstage(&self) -> bool {
        matches!(self, Transition::UnstageEntry(_) | Transition::UnstageTag)
    }

    /// Whether the outcome left the store untouched.
    pub fn is_skip(&self) -> bool {
        matches!(self, Transition::Skip(_))
    }
}

/// Runs one value-mutation action through the table.
///
/// `staged` is the current entry at the key, `remote` the backend's view
/// of the name, `now` the instant to stamp on newly staged entries.
///
/// # Errors
///
/// The transition error kinds of the table: `CannotAddToExisting`,
/// `CannotEditDelete`, `AlreadyStagedForUpdate`,
/// `AlreadyStagedForDeletion`, `ResourceNotFound`, `ConflictingState`.
pub fn transition_entry(
    name: &str,
    staged: Option<&Entry>,
    remote: &RemoteExistence,
    action: EntryAction,
    caps: BackendCaps,
    now: DateTime<Utc>,
) -> Result<Transition, StageError> {
    let Some(existing) = staged else {
        return transition_unstaged(name, remote, action, caps, now);
    };

    match (existing.operation, action) {
        // --- pending create ---
        (Operation::Create, EntryAction::Reset) => Ok(Transition::UnstageEntry(UnstageReason::Reset)),
        (Operation::Create, action) => {
            if matches!(remote, RemoteExistence::Exists { .. }) {
                // A staged create means nothing exists remotely; if the
                // resource appeared, staged and remote state disagree.
                return Err(StageError::ConflictingState(name.to_string()));
            }
            match action {
                EntryAction::Add { value, description } | EntryAction::Edit { value, description } => {
                    // Re-edit of the draft; the operation stays create.
                    Ok(Transition::StageEntry(Entry::create(
                        value,
                        description.or_else(|| existing.description.clone()),
                        now,
                    )))
                }
                EntryAction::Delete { .. } => Ok(Transition::UnstageEntry(UnstageReason::PendingCreateDeleted)),
                EntryAction::Reset => unreachable!("handled above"),
            }
        }

        // --- pending update ---
        (Operation::Update, EntryAction::Add { .. }) => {
            Err(StageError::AlreadyStagedForUpdate(name.to_string()))
        }
        (Operation::Update, EntryAction::Edit { value, description }) => match remote {
            RemoteExistence::Exists { value: current, .. } if *current == value => {
                Ok(Transition::UnstageEntry(UnstageReason::MatchesRemote))
            }
            _ => Ok(Transition::StageEntry(Entry::update(
                value,
                description.or_else(|| existing.description.clone()),
                now,
                existing.base_modified_at.or_else(|| remote.last_modified()),
            ))),
        },
        (Operation::Update, EntryAction::Delete { options }) => Ok(Transition::StageEntry(Entry::delete(
            now,
            existing.base_modified_at.or_else(|| remote.last_modified()),
            delete_options_for(caps, options),
        ))),
        (Operation::Update, EntryAction::Reset) => Ok(Transition::UnstageEntry(UnstageReason::Reset)),

        // --- pending delete ---
        (Operation::Delete, EntryAction::Add { .. }) => {
            Err(StageError::AlreadyStagedForDeletion(name.to_string()))
        }
        (Operation::Delete, EntryAction::Edit { value, description }) => match remote {
            // Reviving needs a live remote baseline.
            RemoteExistence::Absent => Err(StageError::CannotEditDelete(name.to_string())),
            RemoteExistence::Exists { .. } => Ok(Transition::StageEntry(Entry::update(
                value,
                description,
                now,
                existing.base_modified_at.or_else(|| remote.last_modified()),
            ))),
        },
        (Operation::Delete, EntryAction::Delete { options }) => {
            // Idempotent re-stage; only the options are refreshed.
            Ok(Transition::StageEntry(Entry::delete(
                now,
                existing.base_modified_at.or_else(|| remote.last_modified()),
                delete_options_for(caps, options),
            )))
        }
        (Operation::Delete, EntryAction::Reset) => Ok(Transition::UnstageEntry(UnstageReason::Reset)),
    }
}

fn transition_unstaged(
    name: &str,
    remote: &RemoteExistence,
    action: EntryAction,
    caps: BackendCaps,
    now: DateTime<Utc>,
) -> Result<Transition, StageError> {
    match action {
        EntryAction::Add { value, description } => match remote {
            RemoteExistence::Absent => Ok(Transition::StageEntry(Entry::create(value, description, now))),
            RemoteExistence::Exists { .. } => Err(StageError::CannotAddToExisting(name.to_string())),
        },
        EntryAction::Edit { value, description } => match remote {
            RemoteExistence::Absent if value.is_empty() => Ok(Transition::Skip(SkipReason::EmptyValueOnAbsent)),
            RemoteExistence::Absent => Ok(Transition::StageEntry(Entry::create(value, description, now))),
            RemoteExistence::Exists { value: current, .. } if *current == value => {
                Ok(Transition::Skip(SkipReason::AlreadyMatchesRemote))
            }
            RemoteExistence::Exists { last_modified, .. } => Ok(Transition::StageEntry(Entry::update(
                value,
                description,
                now,
                Some(*last_modified),
            ))),
        },
        EntryAction::Delete { options } => match remote {
            RemoteExistence::Absent => Err(StageError::ResourceNotFound(name.to_string())),
            RemoteExistence::Exists { last_modified, .. } => Ok(Transition::StageEntry(Entry::delete(
                now,
                Some(*last_modified),
                delete_options_for(caps, options),
            ))),
        },
        EntryAction::Reset => Ok(Transition::Skip(SkipReason::NothingStaged)),
    }
}

/// Delete options are carried only for backends that support them.
fn delete_options_for(caps: BackendCaps, options: Option<DeleteOptions>) -> Option<DeleteOptions> {
    if caps.has_delete_options {
        options
    } else {
        None
    }
}

/// Runs one tag-mutation action through the table.
///
/// Tag entries are staged independently of value entries; the staged entry
/// participates only as a guard (tags cannot be staged on a pending
/// deletion, and a pending create stands in for a missing remote).
///
/// # Errors
///
/// `StagedForDeletion` when the key has a pending delete;
/// `ResourceNotFound` when the remote is absent and no pending create
/// stands in for it.
pub fn transition_tags(
    name: &str,
    staged_entry: Option<&Entry>,
    staged_tags: Option<&TagEntry>,
    remote: &RemoteExistence,
    action: TagAction,
    now: DateTime<Utc>,
) -> Result<Transition, StageError> {
    if staged_entry.is_some_and(Entry::is_delete) {
        return Err(StageError::StagedForDeletion(name.to_string()));
    }

    let pending_create = staged_entry.is_some_and(Entry::is_create);
    let remote_absent = matches!(remote, RemoteExistence::Absent);
    if remote_absent && !pending_create {
        return Err(StageError::ResourceNotFound(name.to_string()));
    }

    let mut merged = match staged_tags {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.staged_at = now;
            // Earliest observed baseline wins, as for entries.
            merged.base_modified_at = existing.base_modified_at.or_else(|| remote.last_modified());
            merged
        }
        None => TagEntry::new(now, remote.last_modified()),
    };

    match action {
        TagAction::Add(tags) => {
            if tags.is_empty() {
                return Ok(Transition::Skip(SkipReason::EmptyInput));
            }
            merged.merge_add(tags);
            Ok(Transition::StageTag(merged))
        }
        TagAction::Remove(keys) => {
            if keys.is_empty() {
                return Ok(Transition::Skip(SkipReason::EmptyInput));
            }
            if remote_absent {
                // Pending create with no remote: there is nothing remote to
                // untag, so removal only prunes keys staged for addition.
                let staged_keys: Vec<String> =
                    keys.into_iter().filter(|key| merged.add.contains_key(key)).collect();
                if staged_keys.is_empty() {
                    return Ok(Transition::Skip(SkipReason::NothingToRemove));
                }
                for key in staged_keys {
                    merged.add.remove(&key);
                }
            } else {
                merged.merge_remove(keys);
            }
            if merged.is_empty() {
                Ok(Transition::UnstageTag)
            } else {
                Ok(Transition::StageTag(merged))
            }
        }
    }
}
