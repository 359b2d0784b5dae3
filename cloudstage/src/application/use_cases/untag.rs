// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Untag Use Case
//!
//! Stages tag removals for one resource. Removing a key that is only
//! staged for addition prunes it; on a pending create with no remote,
//! keys that appear nowhere are silently dropped. A tag entry merged down
//! to empty leaves the staged set.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{SkipReason, StateStore, TagAction, Transition};
use cloudstage_domain::{BackendStrategy, StageError};

use crate::application::services::TransitionExecutor;
use crate::application::use_cases::remote_existence;

/// Input for [`UntagUseCase`].
#[derive(Debug, Clone)]
pub struct UntagRequest {
    /// Raw resource name; normalized through the backend's parser.
    pub name: String,
    /// Tag keys to remove.
    pub keys: BTreeSet<String>,
}

/// Outcome of an untag staging.
#[derive(Debug, Clone)]
pub struct UntagOutput {
    /// Canonical resource name.
    pub name: String,
    /// A tag mutation is now staged.
    pub staged: bool,
    /// The staged tag entry was removed entirely (merged down to empty).
    pub cleared: bool,
    /// Nothing matched and the operation was silently dropped.
    pub skipped: bool,
}

/// Stages tag removals.
pub struct UntagUseCase {
    backend: Arc<dyn BackendStrategy>,
    executor: TransitionExecutor,
}

impl UntagUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(store),
        }
    }

    pub async fn execute(&self, request: UntagRequest) -> Result<UntagOutput, StageError> {
        let name = self.backend.parse_name(&request.name)?;
        let remote = remote_existence(&*self.backend, &name).await?;

        let transition = self
            .executor
            .execute_tags(self.backend.service(), &name, &remote, TagAction::Remove(request.keys))
            .await?;

        let output = UntagOutput {
            staged: matches!(transition, Transition::StageTag(_)),
            cleared: matches!(transition, Transition::UnstageTag),
            skipped: matches!(transition, Transition::Skip(SkipReason::NothingToRemove)),
            name,
        };
        if output.staged {
            info!(name = %output.name, "tag removals staged");
        } else if output.cleared {
            info!(name = %output.name, "staged tags cleared");
        }
        Ok(output)
    }
}
