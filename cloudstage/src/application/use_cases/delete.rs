// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delete Use Case
//!
//! Stages the deletion of an existing resource. Deleting a pending create
//! removes the draft instead of staging anything (`unstaged` in the
//! output); re-deleting refreshes the delete options idempotently.
//!
//! Delete options only exist for backends that support them; the recovery
//! window is validated to 7..=30 days before any staging happens.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{BackendCaps, EntryAction, StateStore, Transition, UnstageReason};
use cloudstage_domain::{BackendStrategy, DeleteOptions, RecoveryWindow, StageError};

use crate::application::services::TransitionExecutor;
use crate::application::use_cases::remote_existence;

/// Input for [`DeleteUseCase`].
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// Raw resource name; normalized through the backend's parser.
    pub name: String,
    /// Delete immediately without a recovery window.
    pub force: bool,
    /// Recovery window in days (7..=30); meaningful only when the backend
    /// supports delete options and `force` is off.
    pub recovery_window_days: Option<i64>,
}

/// Outcome of a delete.
#[derive(Debug, Clone)]
pub struct DeleteOutput {
    /// Canonical resource name.
    pub name: String,
    /// A deletion is now staged.
    pub staged: bool,
    /// A pending create was removed instead of staging a deletion.
    pub unstaged: bool,
}

/// Stages resource deletions.
pub struct DeleteUseCase {
    backend: Arc<dyn BackendStrategy>,
    executor: TransitionExecutor,
}

impl DeleteUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(store),
        }
    }

    pub async fn execute(&self, request: DeleteRequest) -> Result<DeleteOutput, StageError> {
        let name = self.backend.parse_name(&request.name)?;
        let options = self.build_options(&request)?;
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
                EntryAction::Delete { options },
                caps,
            )
            .await?;

        let output = DeleteOutput {
            staged: matches!(transition, Transition::StageEntry(_)),
            unstaged: matches!(transition, Transition::UnstageEntry(UnstageReason::PendingCreateDeleted)),
            name,
        };
        if output.staged {
            info!(name = %output.name, item = self.backend.item_name(), "deletion staged");
        } else if output.unstaged {
            info!(name = %output.name, "pending create removed instead of staging deletion");
        }
        Ok(output)
    }

    fn build_options(&self, request: &DeleteRequest) -> Result<Option<DeleteOptions>, StageError> {
        if !self.backend.has_delete_options() {
            return Ok(None);
        }
        if request.force {
            return Ok(Some(DeleteOptions::force()));
        }
        match request.recovery_window_days {
            Some(days) => Ok(Some(DeleteOptions::with_window(RecoveryWindow::new(days)?))),
            None => Ok(Some(DeleteOptions {
                force: false,
                recovery_window: None,
            })),
        }
    }
}
