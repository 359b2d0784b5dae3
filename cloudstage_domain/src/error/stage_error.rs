// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the tagged error type for the cloudstage staging
//! core. Every failure surfaced by the transition engine, the stores, the
//! agent protocol, and the batch operations is one of these kinds, each with
//! a stable machine name that survives the wire protocol round trip.
//!
//! ## Error Categories
//!
//! ### Transition Errors
//! Raised by the staging state machine when an action is illegal for the
//! current staged state:
//! - **CannotAddToExisting**: `add` against a resource that already exists
//! - **CannotEditDelete**: `edit` cannot revive a deletion with no baseline
//! - **AlreadyStagedForUpdate** / **AlreadyStagedForDeletion**: `add` over a
//!   pending mutation
//! - **StagedForDeletion**: tag operations against a pending deletion
//! - **ResourceNotFound**: the remote resource does not exist
//! - **InvalidRecoveryWindow**: delete options outside the supported range
//! - **ConflictingState**: staged and remote state disagree in a way the
//!   table declares impossible
//!
//! ### Store Errors
//! - **NotStaged**: a key lookup missed; recoverable whenever the caller's
//!   intent is "check if present"
//! - **Conflict**: apply-time base-mismatch (optimistic concurrency)
//! - **SchemaUnknown**: persisted state with an unrecognized version
//! - **Decrypt**: bad passphrase or tampered envelope
//! - **Io**: file system failures
//!
//! ### Protocol Errors
//! - **DaemonUnreachable**, **PeerAuth**, **ProtocolVersion**
//!
//! ### Aggregate Errors
//! Batch operations report partial outcomes without discarding them:
//! - **StashPush** / **StashPop** carry the failing phase and whether the
//!   failure is non-fatal (the transfer already happened)
//! - **ApplyPartial** carries the per-class success/failure counts
//!
//! ## Propagation Policy
//!
//! Errors are always surfaced to the use-case layer with phase context
//! wrapped in. Non-fatal stash errors are returned *alongside* a success
//! output so callers can warn without pretending the operation failed.

use thiserror::Error;

/// Phase of a stash transfer in which a failure occurred.
///
/// The `Clear` (push) and `Delete` (pop) phases run after the state has
/// already been transferred, so failures there are non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StashPhase {
    Load,
    Write,
    Clear,
    Delete,
}

impl StashPhase {
    /// Stable machine name for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            StashPhase::Load => "load",
            StashPhase::Write => "write",
            StashPhase::Clear => "clear",
            StashPhase::Delete => "delete",
        }
    }

    /// Whether a failure in this phase leaves the transfer itself intact.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, StashPhase::Clear | StashPhase::Delete)
    }
}

impl std::fmt::Display for StashPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific errors for the staging core.
///
/// Each variant represents one failure mode with a stable machine name
/// (see [`StageError::kind`]). Variants carry enough context to be
/// actionable without ever embedding secret values.
#[derive(Error, Debug, Clone)]
pub enum StageError {
    // === Transition errors ===
    #[error("'{0}' already exists; use edit instead of add")]
    CannotAddToExisting(String),

    #[error("'{0}' is staged for deletion and has no baseline to edit")]
    CannotEditDelete(String),

    #[error("'{0}' is already staged for update; edit or reset it first")]
    AlreadyStagedForUpdate(String),

    #[error("'{0}' is already staged for deletion; reset it first")]
    AlreadyStagedForDeletion(String),

    #[error("'{0}' is staged for deletion; tag operations are blocked")]
    StagedForDeletion(String),

    #[error("'{0}' does not exist")]
    ResourceNotFound(String),

    #[error("recovery window must be between 7 and 30 days, got {days}")]
    InvalidRecoveryWindow { days: i64 },

    #[error("conflicting staged state for '{0}'")]
    ConflictingState(String),

    // === Store errors ===
    #[error("'{0}' is not staged")]
    NotStaged(String),

    #[error("staged base is stale for: {}", names.join(", "))]
    Conflict { names: Vec<String> },

    #[error("unknown state schema version {version}")]
    SchemaUnknown { version: u32 },

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // === Protocol errors ===
    #[error("agent daemon unreachable: {0}")]
    DaemonUnreachable(String),

    #[error("peer authentication failed: {0}")]
    PeerAuth(String),

    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersion { expected: u32, actual: u32 },

    // === Aggregate errors ===
    #[error("stash push failed during {phase}: {message}")]
    StashPush {
        phase: StashPhase,
        non_fatal: bool,
        message: String,
    },

    #[error("stash pop failed during {phase}: {message}")]
    StashPop {
        phase: StashPhase,
        non_fatal: bool,
        message: String,
    },

    #[error(
        "apply finished with failures: {entry_ok} entries ok, {entry_fail} failed, \
         {tag_ok} tags ok, {tag_fail} failed"
    )]
    ApplyPartial {
        entry_ok: usize,
        entry_fail: usize,
        tag_ok: usize,
        tag_fail: usize,
    },

    // === System errors ===
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StageError {
    /// Creates a new not-staged error.
    pub fn not_staged(name: impl Into<String>) -> Self {
        Self::NotStaged(name.into())
    }

    /// Creates a new IO error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a new decryption error.
    pub fn decrypt(msg: impl Into<String>) -> Self {
        Self::Decrypt(msg.into())
    }

    /// Creates a new backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a new daemon-unreachable error.
    pub fn daemon_unreachable(msg: impl Into<String>) -> Self {
        Self::DaemonUnreachable(msg.into())
    }

    /// Wraps an error in a stash-push phase.
    pub fn stash_push(phase: StashPhase, source: &StageError) -> Self {
        Self::StashPush {
            phase,
            non_fatal: phase.is_non_fatal(),
            message: source.to_string(),
        }
    }

    /// Wraps an error in a stash-pop phase.
    pub fn stash_pop(phase: StashPhase, source: &StageError) -> Self {
        Self::StashPop {
            phase,
            non_fatal: phase.is_non_fatal(),
            message: source.to_string(),
        }
    }

    /// Stable machine name of this error kind.
    ///
    /// These names are the wire representation of errors in the agent
    /// protocol and must not change across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::CannotAddToExisting(_) => "cannot_add_to_existing",
            StageError::CannotEditDelete(_) => "cannot_edit_delete",
            StageError::AlreadyStagedForUpdate(_) => "already_staged_for_update",
            StageError::AlreadyStagedForDeletion(_) => "already_staged_for_deletion",
            StageError::StagedForDeletion(_) => "staged_for_deletion",
            StageError::ResourceNotFound(_) => "resource_not_found",
            StageError::InvalidRecoveryWindow { .. } => "invalid_recovery_window",
            StageError::ConflictingState(_) => "conflicting_state",
            StageError::NotStaged(_) => "not_staged",
            StageError::Conflict { .. } => "conflict",
            StageError::SchemaUnknown { .. } => "schema_unknown",
            StageError::Decrypt(_) => "decrypt",
            StageError::Io(_) => "io",
            StageError::Serialization(_) => "serialization",
            StageError::DaemonUnreachable(_) => "daemon_unreachable",
            StageError::PeerAuth(_) => "peer_auth",
            StageError::ProtocolVersion { .. } => "protocol_version",
            StageError::StashPush { .. } => "stash_push",
            StageError::StashPop { .. } => "stash_pop",
            StageError::ApplyPartial { .. } => "apply_partial",
            StageError::Cancelled(_) => "cancelled",
            StageError::Backend(_) => "backend",
        }
    }

    /// Whether the caller may treat this error as "nothing there" rather
    /// than a real failure.
    pub fn is_not_staged(&self) -> bool {
        matches!(self, StageError::NotStaged(_))
    }

    /// Whether this error was raised by the transition state machine.
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            StageError::CannotAddToExisting(_)
                | StageError::CannotEditDelete(_)
                | StageError::AlreadyStagedForUpdate(_)
                | StageError::AlreadyStagedForDeletion(_)
                | StageError::StagedForDeletion(_)
                | StageError::ResourceNotFound(_)
                | StageError::InvalidRecoveryWindow { .. }
                | StageError::ConflictingState(_)
        )
    }

    /// Whether the operation partially succeeded and the output alongside
    /// this error is still meaningful.
    pub fn is_non_fatal(&self) -> bool {
        match self {
            StageError::StashPush { non_fatal, .. } | StageError::StashPop { non_fatal, .. } => *non_fatal,
            StageError::ApplyPartial { .. } => true,
            _ => false,
        }
    }

    /// Reconstructs an error from its wire representation.
    ///
    /// Kinds that carry structured payloads the wire format does not
    /// preserve collapse into their closest message-only form.
    pub fn from_wire(kind: &str, message: &str) -> Self {
        match kind {
            "cannot_add_to_existing" => StageError::CannotAddToExisting(message.to_string()),
            "cannot_edit_delete" => StageError::CannotEditDelete(message.to_string()),
            "already_staged_for_update" => StageError::AlreadyStagedForUpdate(message.to_string()),
            "already_staged_for_deletion" => StageError::AlreadyStagedForDeletion(message.to_string()),
            "staged_for_deletion" => StageError::StagedForDeletion(message.to_string()),
            "resource_not_found" => StageError::ResourceNotFound(message.to_string()),
            "conflicting_state" => StageError::ConflictingState(message.to_string()),
            "not_staged" => StageError::NotStaged(message.to_string()),
            "decrypt" => StageError::Decrypt(message.to_string()),
            "io" => StageError::Io(message.to_string()),
            "serialization" => StageError::Serialization(message.to_string()),
            "daemon_unreachable" => StageError::DaemonUnreachable(message.to_string()),
            "peer_auth" => StageError::PeerAuth(message.to_string()),
            "cancelled" => StageError::Cancelled(message.to_string()),
            "backend" => StageError::Backend(message.to_string()),
            _ => StageError::Io(format!("{}: {}", kind, message)),
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        StageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::Serialization(err.to_string())
    }
}
