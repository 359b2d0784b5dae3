// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Conflict Detector
//!
//! Optimistic-concurrency gate for apply: fetches the remote
//! last-modified instant for every staged entry in bounded parallel and
//! flags the names whose baseline has gone stale
//! (`base_modified_at < remote`).
//!
//! Entries without a baseline (pending creates) cannot conflict. A fetch
//! failure is treated as a non-conflict; apply will surface the real
//! error on the item itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use cloudstage_domain::{BackendStrategy, Entry};

/// Upper bound on concurrent last-modified fetches.
pub const MAX_PARALLEL_FETCHES: usize = 16;

/// Detects stale staged baselines against the remote.
pub struct ConflictDetector {
    backend: Arc<dyn BackendStrategy>,
}

impl ConflictDetector {
    pub fn new(backend: Arc<dyn BackendStrategy>) -> Self {
        Self { backend }
    }

    /// Returns the sorted names whose staged baseline is older than the
    /// remote's current last-modified.
    pub async fn detect(&self, entries: &BTreeMap<String, Entry>) -> Vec<String> {
        let candidates: Vec<_> = entries
            .iter()
            .filter_map(|(name, entry)| entry.base_modified_at.map(|base| (name.clone(), base)))
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let width = candidates.len().min(MAX_PARALLEL_FETCHES);
        let mut conflicts: Vec<String> = stream::iter(candidates)
            .map(|(name, base)| {
                let backend = Arc::clone(&self.backend);
                async move {
                    match backend.fetch_last_modified(&name).await {
                        Ok(Some(remote)) if remote > base => Some(name),
                        Ok(_) => None,
                        Err(e) => {
                            debug!(%name, "last-modified fetch failed, not treated as conflict: {}", e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(width)
            .filter_map(|hit| async move { hit })
            .collect()
            .await;
        conflicts.sort();
        conflicts
    }
}
