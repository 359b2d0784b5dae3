// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Edit Use Case
//!
//! Stages a value change. Editing captures the remote last-modified as the
//! conflict baseline on first touch and preserves it across re-edits. An
//! edit that lands back on the remote value auto-unstages; an edit that
//! matches the remote from a clean slate auto-skips. Editing a pending
//! deletion revives it as an update.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{BackendCaps, EntryAction, SkipReason, StateStore, Transition, UnstageReason};
use cloudstage_domain::{BackendStrategy, StageError};

use crate::application::services::TransitionExecutor;
use crate::application::use_cases::remote_existence;

/// Input for [`EditUseCase`].
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// Raw resource name; normalized through the backend's parser.
    pub name: String,
    /// The new value.
    pub value: String,
    /// Optional replacement description; `None` preserves the staged one.
    pub description: Option<String>,
}

/// Outcome of an edit.
#[derive(Debug, Clone)]
pub struct EditOutput {
    /// Canonical resource name.
    pub name: String,
    /// A mutation is now staged.
    pub staged: bool,
    /// A previously staged mutation was removed (the value matches the
    /// remote again).
    pub unstaged: bool,
    /// Nothing was staged because the edit is a no-op.
    pub skipped: bool,
}

/// Stages value changes.
pub struct EditUseCase {
    backend: Arc<dyn BackendStrategy>,
    executor: TransitionExecutor,
}

impl EditUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(store),
        }
    }

    pub async fn execute(&self, request: EditRequest) -> Result<EditOutput, StageError> {
        let name = self.backend.parse_name(&request.name)?;
        let remote = remote_existence(&*self.backend, &name).await?;
        let caps = BackendCaps {
            has_delete_options: self.backend.has_delete_options(),
        };

        let transition = self
            .executor
            .execute_entry(
                self.backend.service(),
                &name,
                &remote,
                EntryAction::Edit {
                    value: request.value,
                    description: request.description,
                },
                caps,
            )
            .await?;

        let output = EditOutput {
            staged: matches!(transition, Transition::StageEntry(_)),
            unstaged: matches!(transition, Transition::UnstageEntry(UnstageReason::MatchesRemote)),
            skipped: matches!(
                transition,
                Transition::Skip(SkipReason::AlreadyMatchesRemote | SkipReason::EmptyValueOnAbsent)
            ),
            name,
        };
        if output.staged {
            info!(name = %output.name, item = self.backend.item_name(), "edit staged");
        } else if output.unstaged {
            info!(name = %output.name, "edit matches remote; unstaged");
        }
        Ok(output)
    }
}
