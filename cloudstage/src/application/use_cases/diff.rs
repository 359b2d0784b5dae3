// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Diff Use Case
//!
//! Compares the staged set against the current remote state. Remote
//! values are fetched in bounded parallel; classification then runs
//! sequentially because some outcomes mutate the store:
//!
//! - missing remote + pending create → create record
//! - missing remote + pending update → auto-unstage, "item no longer exists"
//! - missing remote + pending delete → auto-unstage, "already deleted"
//! - present remote + pending update with equal value → auto-unstage,
//!   "identical to current"
//! - fetch error on a pending create → create record (nothing remote to
//!   compare anyway)
//! - any other fetch error → warning record carrying the error text
//! - otherwise → a change record with both sides
//!
//! Rendering the textual diff is out of scope; records carry the data.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::info;

use cloudstage_domain::services::StateStore;
use cloudstage_domain::{BackendStrategy, EditFetchResult, Entry, Operation, StageError};

use crate::application::services::MAX_PARALLEL_FETCHES;

/// Input for [`DiffUseCase`].
#[derive(Debug, Clone, Default)]
pub struct DiffRequest {
    /// Restrict the diff to one name.
    pub name: Option<String>,
}

/// One classified staged-versus-remote comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffRecord {
    /// A pending create with nothing remote to compare against.
    Create {
        name: String,
        value: String,
        description: Option<String>,
    },
    /// A pending mutation with both sides present.
    Change {
        name: String,
        remote_value: String,
        entry: Entry,
    },
    /// The staged item was removed because it became a no-op.
    Unstaged { name: String, warning: String },
    /// The remote could not be compared.
    Warning { name: String, message: String },
}

impl DiffRecord {
    /// The name this record describes.
    pub fn name(&self) -> &str {
        match self {
            DiffRecord::Create { name, .. }
            | DiffRecord::Change { name, .. }
            | DiffRecord::Unstaged { name, .. }
            | DiffRecord::Warning { name, .. } => name,
        }
    }
}

/// The classified diff, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct DiffOutput {
    pub records: Vec<DiffRecord>,
}

/// Diffs staged entries against the remote.
pub struct DiffUseCase {
    backend: Arc<dyn BackendStrategy>,
    store: Arc<dyn StateStore>,
}

impl DiffUseCase {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self { backend, store }
    }

    pub async fn execute(&self, request: DiffRequest) -> Result<DiffOutput, StageError> {
        let service = self.backend.service();
        let mut entries = self.store.list_entries(service).await?;
        if let Some(raw) = &request.name {
            let name = self.backend.parse_name(raw)?;
            entries.retain(|key, _| *key == name);
            if entries.is_empty() {
                return Err(StageError::not_staged(name));
            }
        }

        let width = entries.len().clamp(1, MAX_PARALLEL_FETCHES);
        let fetched: Vec<(String, Entry, Result<Option<EditFetchResult>, StageError>)> = stream::iter(entries)
            .map(|(name, entry)| {
                let backend = Arc::clone(&self.backend);
                async move {
                    let current = backend.fetch_current_value(&name).await;
                    (name, entry, current)
                }
            })
            .buffer_unordered(width)
            .collect()
            .await;

        let mut records = Vec::with_capacity(fetched.len());
        for (name, entry, current) in fetched {
            records.push(self.classify(service, name, entry, current).await?);
        }
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(DiffOutput { records })
    }

    async fn classify(
        &self,
        service: cloudstage_domain::Service,
        name: String,
        entry: Entry,
        current: Result<Option<EditFetchResult>, StageError>,
    ) -> Result<DiffRecord, StageError> {
        let record = match (current, entry.operation) {
            (Ok(None), Operation::Create) | (Err(_), Operation::Create) => DiffRecord::Create {
                value: entry.value.clone().unwrap_or_default(),
                description: entry.description.clone(),
                name,
            },
            (Ok(None), Operation::Update) => {
                self.auto_unstage(service, &name).await?;
                DiffRecord::Unstaged {
                    warning: format!("{} no longer exists", self.backend.item_name()),
                    name,
                }
            }
            (Ok(None), Operation::Delete) => {
                self.auto_unstage(service, &name).await?;
                DiffRecord::Unstaged {
                    warning: "already deleted".to_string(),
                    name,
                }
            }
            (Ok(Some(remote)), Operation::Update)
                if entry.value.as_deref() == Some(remote.value.as_str()) =>
            {
                self.auto_unstage(service, &name).await?;
                DiffRecord::Unstaged {
                    warning: "identical to current".to_string(),
                    name,
                }
            }
            (Ok(Some(_)), Operation::Create) => DiffRecord::Warning {
                message: format!("{} now exists remotely; staged create conflicts", self.backend.item_name()),
                name,
            },
            (Ok(Some(remote)), _) => DiffRecord::Change {
                remote_value: remote.value,
                entry,
                name,
            },
            (Err(e), _) => DiffRecord::Warning {
                message: e.to_string(),
                name,
            },
        };
        Ok(record)
    }

    async fn auto_unstage(&self, service: cloudstage_domain::Service, name: &str) -> Result<(), StageError> {
        info!(name, "auto-unstaging no-op entry");
        match self.store.unstage_entry(service, name).await {
            Err(e) if e.is_not_staged() => Ok(()),
            other => other,
        }
    }
}
