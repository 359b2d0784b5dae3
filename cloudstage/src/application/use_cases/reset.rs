// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reset Use Case
//!
//! Drops staged work without applying it: one name's entry and tags, one
//! service's whole staged set, or everything. A pure store operation: no
//! backend is consulted, and resetting something that was never staged is
//! a no-op, not an error.

use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{StateStore, UnstageHint};
use cloudstage_domain::{Service, StageError};

/// Input for [`ResetUseCase`].
#[derive(Debug, Clone)]
pub struct ResetRequest {
    /// Restrict the reset to one service.
    pub service: Option<Service>,
    /// Restrict the reset to one name (requires `service`).
    pub name: Option<String>,
}

/// Outcome of a reset.
#[derive(Debug, Clone, Default)]
pub struct ResetOutput {
    /// Entries removed from the staged set.
    pub entries_reset: usize,
    /// Tag entries removed from the staged set.
    pub tags_reset: usize,
}

/// Discards staged work.
pub struct ResetUseCase {
    store: Arc<dyn StateStore>,
}

impl ResetUseCase {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, request: ResetRequest) -> Result<ResetOutput, StageError> {
        match (&request.service, &request.name) {
            (Some(service), Some(name)) => self.reset_name(*service, name).await,
            (_, None) => self.reset_all(request.service).await,
            (None, Some(_)) => Err(StageError::io("resetting a single name requires a service")),
        }
    }

    async fn reset_name(&self, service: Service, name: &str) -> Result<ResetOutput, StageError> {
        let mut output = ResetOutput::default();
        match self.store.unstage_entry(service, name).await {
            Ok(()) => output.entries_reset = 1,
            Err(e) if e.is_not_staged() => {}
            Err(e) => return Err(e),
        }
        match self.store.unstage_tag(service, name).await {
            Ok(()) => output.tags_reset = 1,
            Err(e) if e.is_not_staged() => {}
            Err(e) => return Err(e),
        }
        info!(
            %service,
            name,
            entries = output.entries_reset,
            tags = output.tags_reset,
            "staged work reset"
        );
        Ok(output)
    }

    async fn reset_all(&self, service: Option<Service>) -> Result<ResetOutput, StageError> {
        // Count first so the output reflects what actually went away.
        let state = self.store.load().await?;
        let counted = match service {
            Some(service) => state.extract_service(service),
            None => state,
        };
        let output = ResetOutput {
            entries_reset: counted.entry_count(),
            tags_reset: counted.tag_count(),
        };

        self.store.unstage_all(service, UnstageHint::Reset).await?;
        info!(
            entries = output.entries_reset,
            tags = output.tags_reset,
            "staged set reset"
        );
        Ok(output)
    }
}
