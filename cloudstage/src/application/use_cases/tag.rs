// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tag Use Case
//!
//! Stages tag additions for one resource, independently of any staged
//! value mutation on the same name. Tagging something staged for deletion
//! is blocked; tagging a nonexistent resource is allowed only when a
//! pending create stands in for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use cloudstage_domain::services::{StateStore, TagAction, Transition};
use cloudstage_domain::{BackendStrategy, StageError};

use crate::application::services::TransitionExecutor;
use crate::application::use_cases::remote_existence;

/// Input for [`TagUseCase`].
#[derive(Debug, Clone)]
pub struct TagRequest {
    /// Raw resource name; normalized through the backend's parser.
    pub name: String,
    /// Tags to set, key → value.
    pub tags: BTreeMap<String, String>,
}

/// Outcome of a tag staging.
#[derive(Debug, Clone)]
pub struct TagOutput {
    /// Canonical resource name.
    pub name: String,
    /// A tag mutation is now staged.
    pub staged: bool,
    /// Number of keys staged for addition after the merge.
    pub add_count: usize,
}

/// Stages tag additions.
pub struct TagUseCase {
    backend: Arc<dyn BackendStrategy>,
    executor: TransitionExecutor,
}

impl TagUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(store),
        }
    }

    pub async fn execute(&self, request: TagRequest) -> Result<TagOutput, StageError> {
        let name = self.backend.parse_name(&request.name)?;
        let remote = remote_existence(&*self.backend, &name).await?;

        let transition = self
            .executor
            .execute_tags(self.backend.service(), &name, &remote, TagAction::Add(request.tags))
            .await?;

        let (staged, add_count) = match &transition {
            Transition::StageTag(tags) => (true, tags.add.len()),
            _ => (false, 0),
        };
        if staged {
            info!(%name, add_count, item = self.backend.item_name(), "tags staged");
        }
        Ok(TagOutput {
            name,
            staged,
            add_count,
        })
    }
}
