// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Apply Use Case
//!
//! Pushes the staged set to the remote for one service:
//!
//! 1. List staged entries and tags (optionally one name; a filtered name
//!    with nothing staged is `NotStaged`).
//! 2. Unless bypassed, gate on the conflict detector (entries only; tags
//!    have no value-conflict notion).
//! 3. Execute entries in bounded parallel, then tags, with per-item
//!    accounting: successes leave the staged set, failures stay.
//! 4. A nonzero failure count yields an `ApplyPartial` error *alongside*
//!    the output, never instead of it.

use std::sync::Arc;

use tracing::info;

use cloudstage_bootstrap::signals::ShutdownToken;
use cloudstage_domain::services::StateStore;
use cloudstage_domain::{BackendStrategy, StageError};

use crate::application::services::{ApplyExecutor, ConflictDetector, EntryApplyStatus, TagApplyStatus};

/// Input for [`ApplyUseCase`].
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    /// Restrict the apply to one name.
    pub name: Option<String>,
    /// Skip the stale-baseline gate.
    pub ignore_conflicts: bool,
}

/// Per-item results and aggregate accounting for one apply.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutput {
    pub entry_results: std::collections::BTreeMap<String, EntryApplyStatus>,
    pub tag_results: std::collections::BTreeMap<String, TagApplyStatus>,
    pub entry_succeeded: usize,
    pub entry_failed: usize,
    pub tag_succeeded: usize,
    pub tag_failed: usize,
    /// `ApplyPartial`, present when any item failed. The output remains
    /// valid; callers decide how loudly to fail.
    pub partial_error: Option<StageError>,
}

/// Applies the staged set against the remote backend.
pub struct ApplyUseCase {
    backend: Arc<dyn BackendStrategy>,
    store: Arc<dyn StateStore>,
}

impl ApplyUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self { backend, store }
    }

    pub async fn execute(&self, request: ApplyRequest, cancel: &ShutdownToken) -> Result<ApplyOutput, StageError> {
        let service = self.backend.service();
        let mut entries = self.store.list_entries(service).await?;
        let mut tags = self.store.list_tags(service).await?;

        if let Some(raw) = &request.name {
            let name = self.backend.parse_name(raw)?;
            entries.retain(|key, _| *key == name);
            tags.retain(|key, _| *key == name);
            if entries.is_empty() && tags.is_empty() {
                return Err(StageError::not_staged(name));
            }
        }

        if !request.ignore_conflicts {
            let conflicts = ConflictDetector::new(Arc::clone(&self.backend)).detect(&entries).await;
            if !conflicts.is_empty() {
                return Err(StageError::Conflict { names: conflicts });
            }
        }

        let executor = ApplyExecutor::new(Arc::clone(&self.backend), Arc::clone(&self.store));
        let entry_results = executor.apply_entries(service, entries, cancel).await;
        let tag_results = executor.apply_tags(service, tags, cancel).await;

        let entry_succeeded = entry_results.values().filter(|s| s.is_success()).count();
        let entry_failed = entry_results.len() - entry_succeeded;
        let tag_succeeded = tag_results.values().filter(|s| s.is_success()).count();
        let tag_failed = tag_results.len() - tag_succeeded;

        let partial_error = (entry_failed + tag_failed > 0).then(|| StageError::ApplyPartial {
            entry_ok: entry_succeeded,
            entry_fail: entry_failed,
            tag_ok: tag_succeeded,
            tag_fail: tag_failed,
        });

        info!(
            service = %service,
            entry_succeeded,
            entry_failed,
            tag_succeeded,
            tag_failed,
            "apply finished"
        );

        Ok(ApplyOutput {
            entry_results,
            tag_results,
            entry_succeeded,
            entry_failed,
            tag_succeeded,
            tag_failed,
            partial_error,
        })
    }
}
