// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stash Push Use Case
//!
//! Moves staged state from the agent (locked memory) into the file store
//! (persistent, optionally encrypted). Three phases:
//!
//! 1. **load** - read the agent's state, keeping it in place pending
//!    success
//! 2. **write** - write it into the file under the requested mode
//! 3. **clear** - empty the agent (unless `keep`)
//!
//! The clear phase runs after the state is already durable, so its
//! failures are non-fatal: the caller receives the output *and* the
//! error. Load and write failures abort with both stores untouched.
//!
//! A service filter always preserves the destination's other service;
//! filtered pushes behave as merges at the service level regardless of
//! the requested mode.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::{Service, StageError, StashPhase};

/// Input for [`StashPushUseCase`].
#[derive(Debug, Clone)]
pub struct StashPushRequest {
    /// Merge or overwrite the destination file.
    pub mode: MergeMode,
    /// Restrict the push to one service.
    pub service: Option<Service>,
    /// Leave the agent state in place after pushing.
    pub keep: bool,
}

/// Outcome of a stash push.
#[derive(Debug, Clone)]
pub struct StashPushOutput {
    /// Entries transferred.
    pub entry_count: usize,
    /// Tag entries transferred.
    pub tag_count: usize,
    /// Whether the transfer merged into content the file already held for
    /// the transferred scope.
    pub merged: bool,
    /// Non-fatal clear-phase failure; the transfer itself succeeded.
    pub warning: Option<StageError>,
}

/// Moves staged state from the agent to the file store.
pub struct StashPushUseCase {
    agent: Arc<dyn StateStore>,
    file: Arc<dyn StateStore>,
}

impl StashPushUseCase {
    pub fn new(agent: Arc<dyn StateStore>, file: Arc<dyn StateStore>) -> Self {
        Self { agent, file }
    }

    pub async fn execute(&self, request: StashPushRequest) -> Result<StashPushOutput, StageError> {
        // load phase: snapshot without clearing; the agent keeps the state
        // until the transfer is durable.
        let staged = self
            .agent
            .drain(request.service, true)
            .await
            .map_err(|e| StageError::stash_push(StashPhase::Load, &e))?;
        if staged.is_empty() {
            let nothing = StageError::not_staged("nothing staged to push");
            return Err(StageError::stash_push(StashPhase::Load, &nothing));
        }

        // A service filter only ever touches that service in the file.
        let mode = match request.service {
            Some(_) => MergeMode::Merge,
            None => request.mode,
        };
        // The merge flag only reflects the portion being transferred: a
        // filtered push ignores what the file holds for the other service.
        let merged = match mode {
            MergeMode::Overwrite => false,
            MergeMode::Merge => {
                let destination = self.file.load().await.unwrap_or_default();
                match request.service {
                    Some(service) => {
                        !destination.entries_for(service).is_empty() || !destination.tags_for(service).is_empty()
                    }
                    None => !destination.is_empty(),
                }
            }
        };

        let entry_count = staged.entry_count();
        let tag_count = staged.tag_count();

        // write phase
        self.file
            .write_state(staged, mode)
            .await
            .map_err(|e| StageError::stash_push(StashPhase::Write, &e))?;

        // clear phase: the state is durable; a failure here is worth a
        // warning, not a rollback.
        let warning = if request.keep {
            None
        } else {
            self.agent
                .unstage_all(request.service, UnstageHint::Persist)
                .await
                .err()
                .map(|e| StageError::stash_push(StashPhase::Clear, &e))
        };

        info!(entry_count, tag_count, merged, "stash pushed");
        Ok(StashPushOutput {
            entry_count,
            tag_count,
            merged,
            warning,
        })
    }
}
