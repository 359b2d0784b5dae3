// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stash Pop Use Case
//!
//! The inverse of stash push: moves state from the file store back into
//! the agent. Three phases: **load** the file (keeping it pending
//! success), **write** into the agent under the requested mode, **delete**
//! the file's transferred portion (unless `keep`). The delete phase is
//! non-fatal for the same reason the push's clear phase is: the transfer
//! already happened.
//!
//! The deprecated `--force` flag is an alias for `mode=Overwrite`; there
//! is no separate code path.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::{Service, StageError, StashPhase};

/// Input for [`StashPopUseCase`].
#[derive(Debug, Clone)]
pub struct StashPopRequest {
    /// Merge or overwrite the agent's state.
    pub mode: MergeMode,
    /// Restrict the pop to one service.
    pub service: Option<Service>,
    /// Leave the file in place after popping.
    pub keep: bool,
}

/// Outcome of a stash pop.
#[derive(Debug, Clone)]
pub struct StashPopOutput {
    /// Entries transferred.
    pub entry_count: usize,
    /// Tag entries transferred.
    pub tag_count: usize,
    /// Whether the transfer merged into content the agent already held for
    /// the transferred scope.
    pub merged: bool,
    /// Non-fatal delete-phase failure; the transfer itself succeeded.
    pub warning: Option<StageError>,
}

/// Moves staged state from the file store to the agent.
pub struct StashPopUseCase {
    agent: Arc<dyn StateStore>,
    file: Arc<dyn StateStore>,
}

impl StashPopUseCase {
    pub fn new(agent: Arc<dyn StateStore>, file: Arc<dyn StateStore>) -> Self {
        Self { agent, file }
    }

    pub async fn execute(&self, request: StashPopRequest) -> Result<StashPopOutput, StageError> {
        // load phase: the file survives until the agent holds the state.
        let stashed = self
            .file
            .drain(request.service, true)
            .await
            .map_err(|e| StageError::stash_pop(StashPhase::Load, &e))?;
        if stashed.is_empty() {
            let nothing = StageError::not_staged("stash is empty");
            return Err(StageError::stash_pop(StashPhase::Load, &nothing));
        }

        let mode = match request.service {
            Some(_) => MergeMode::Merge,
            None => request.mode,
        };
        // The merge flag only reflects the portion being transferred: a
        // filtered pop ignores what the agent holds for the other service.
        let merged = match mode {
            MergeMode::Overwrite => false,
            MergeMode::Merge => {
                let destination = self.agent.load().await.unwrap_or_default();
                match request.service {
                    Some(service) => {
                        !destination.entries_for(service).is_empty() || !destination.tags_for(service).is_empty()
                    }
                    None => !destination.is_empty(),
                }
            }
        };

        let entry_count = stashed.entry_count();
        let tag_count = stashed.tag_count();

        // write phase
        self.agent
            .write_state(stashed, mode)
            .await
            .map_err(|e| StageError::stash_pop(StashPhase::Write, &e))?;

        // delete phase: non-fatal once the agent owns the state.
        let warning = if request.keep {
            None
        } else {
            self.file
                .unstage_all(request.service, UnstageHint::Persist)
                .await
                .err()
                .map(|e| StageError::stash_pop(StashPhase::Delete, &e))
        };

        info!(entry_count, tag_count, merged, "stash popped");
        Ok(StashPopOutput {
            entry_count,
            tag_count,
            merged,
            warning,
        })
    }
}
