// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Add Use Case
//!
//! Stages the creation of a resource that must not exist remotely. A
//! repeated add against the same pending create re-edits the draft; an
//! add against an existing remote resource is rejected with
//! `CannotAddToExisting`.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{BackendCaps, EntryAction, StateStore, Transition};
use cloudstage_domain::{BackendStrategy, StageError};

use crate::application::services::TransitionExecutor;
use crate::application::use_cases::remote_existence;

/// Input for [`AddUseCase`].
#[derive(Debug, Clone)]
pub struct AddRequest {
    /// Raw resource name; normalized through the backend's parser.
    pub name: String,
    /// The value to create.
    pub value: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Outcome of an add.
#[derive(Debug, Clone)]
pub struct AddOutput {
    /// Canonical resource name.
    pub name: String,
    /// Whether a create is now staged (false only for degenerate no-ops).
    pub staged: bool,
}

/// Stages resource creations.
pub struct AddUseCase {
    backend: Arc<dyn BackendStrategy>,
    executor: TransitionExecutor,
}

impl AddUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(store),
        }
    }

    pub async fn execute(&self, request: AddRequest) -> Result<AddOutput, StageError> {
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
                EntryAction::Add {
                    value: request.value,
                    description: request.description,
                },
                caps,
            )
            .await?;

        let staged = matches!(transition, Transition::StageEntry(_));
        if staged {
            info!(%name, item = self.backend.item_name(), "create staged");
        }
        Ok(AddOutput { name, staged })
    }
}
