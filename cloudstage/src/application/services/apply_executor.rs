// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Apply Executor
//!
//! Bounded-parallel execution of staged items against the backend with
//! per-name result classification. Each item is independent: a success is
//! unstaged from the store immediately, a failure stays staged, and
//! neither rolls the other back. Semantics are at-least-once per item
//! (at-most-once given idempotent backend operations).
//!
//! Cancellation stops further dispatch; items already in flight finish
//! and keep their results.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use cloudstage_bootstrap::signals::ShutdownToken;
use cloudstage_domain::{BackendStrategy, Entry, Operation, Service, StateStore, TagEntry};

/// Upper bound on concurrent backend calls.
pub const MAX_PARALLEL_APPLIES: usize = 16;

/// Per-entry apply outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryApplyStatus {
    Created,
    Updated,
    Deleted,
    Failed(String),
}

impl EntryApplyStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, EntryApplyStatus::Failed(_))
    }
}

/// Per-tag-entry apply outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagApplyStatus {
    Ok,
    Failed(String),
}

impl TagApplyStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TagApplyStatus::Ok)
    }
}

/// Executes staged items in parallel and unstages successes.
pub struct ApplyExecutor {
    backend: Arc<dyn BackendStrategy>,
    store: Arc<dyn StateStore>,
}

impl ApplyExecutor {
    pub fn new(backend: Arc<dyn BackendStrategy>, store: Arc<dyn StateStore>) -> Self {
        Self { backend, store }
    }

    /// Applies entries; returns a result per dispatched name.
    pub async fn apply_entries(
        &self,
        service: Service,
        entries: BTreeMap<String, Entry>,
        cancel: &ShutdownToken,
    ) -> BTreeMap<String, EntryApplyStatus> {
        let width = entries.len().clamp(1, MAX_PARALLEL_APPLIES);
        stream::iter(entries)
            .map(|(name, entry)| {
                let backend = Arc::clone(&self.backend);
                let store = Arc::clone(&self.store);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        debug!(%name, "apply cancelled before dispatch");
                        return None;
                    }
                    let status = match backend.apply(&name, &entry).await {
                        Ok(()) => {
                            unstage_applied(&*store, service, &name, true).await;
                            match entry.operation {
                                Operation::Create => EntryApplyStatus::Created,
                                Operation::Update => EntryApplyStatus::Updated,
                                Operation::Delete => EntryApplyStatus::Deleted,
                            }
                        }
                        Err(e) => {
                            debug!(%name, "entry apply failed: {}", e);
                            EntryApplyStatus::Failed(e.to_string())
                        }
                    };
                    Some((name, status))
                }
            })
            .buffer_unordered(width)
            .filter_map(|item| async move { item })
            .collect()
            .await
    }

    /// Applies tag entries; returns a result per dispatched name.
    pub async fn apply_tags(
        &self,
        service: Service,
        tags: BTreeMap<String, TagEntry>,
        cancel: &ShutdownToken,
    ) -> BTreeMap<String, TagApplyStatus> {
        let width = tags.len().clamp(1, MAX_PARALLEL_APPLIES);
        stream::iter(tags)
            .map(|(name, tag_entry)| {
                let backend = Arc::clone(&self.backend);
                let store = Arc::clone(&self.store);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        debug!(%name, "tag apply cancelled before dispatch");
                        return None;
                    }
                    let status = match backend.apply_tags(&name, &tag_entry).await {
                        Ok(()) => {
                            unstage_applied(&*store, service, &name, false).await;
                            TagApplyStatus::Ok
                        }
                        Err(e) => {
                            debug!(%name, "tag apply failed: {}", e);
                            TagApplyStatus::Failed(e.to_string())
                        }
                    };
                    Some((name, status))
                }
            })
            .buffer_unordered(width)
            .filter_map(|item| async move { item })
            .collect()
            .await
    }
}

/// Unstages a successfully applied item; an already-missing key is fine.
async fn unstage_applied(store: &dyn StateStore, service: Service, name: &str, is_entry: bool) {
    let result = if is_entry {
        store.unstage_entry(service, name).await
    } else {
        store.unstage_tag(service, name).await
    };
    if let Err(e) = result {
        if !e.is_not_staged() {
            // The remote mutation happened; staying staged only risks a
            // duplicate apply, which the backend tolerates.
            warn!(%name, "applied but could not unstage: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::stores::MemoryStateStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use cloudstage_domain::{EditFetchResult, FetchResult, StageError};
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    struct FakeBackend {
        fail_names: Vec<String>,
        applied: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn failing(names: &[&str]) -> Self {
            Self {
                fail_names: names.iter().map(|n| n.to_string()).collect(),
                applied: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BackendStrategy for FakeBackend {
        fn service(&self) -> Service {
            Service::Param
        }

        fn parse_name(&self, raw: &str) -> Result<String, StageError> {
            Ok(raw.to_string())
        }

        fn parse_spec(&self, raw: &str) -> Result<(String, bool), StageError> {
            Ok((raw.to_string(), false))
        }

        async fn fetch_current_value(&self, _name: &str) -> Result<Option<EditFetchResult>, StageError> {
            Ok(None)
        }

        async fn fetch_last_modified(&self, _name: &str) -> Result<Option<DateTime<Utc>>, StageError> {
            Ok(None)
        }

        async fn fetch_version(&self, _spec: &str) -> Result<Option<FetchResult>, StageError> {
            Ok(None)
        }

        async fn apply(&self, name: &str, _entry: &Entry) -> Result<(), StageError> {
            if self.fail_names.iter().any(|n| n == name) {
                return Err(StageError::backend("rejected"));
            }
            self.applied.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn apply_tags(&self, name: &str, _tags: &TagEntry) -> Result<(), StageError> {
            if self.fail_names.iter().any(|n| n == name) {
                return Err(StageError::backend("rejected"));
            }
            Ok(())
        }
    }

    async fn seeded_store() -> Arc<MemoryStateStore> {
        let store = Arc::new(MemoryStateStore::new());
        store
            .stage_entry(Service::Param, "/ok", Entry::update("v1", None, t0(), Some(t0())))
            .await
            .unwrap();
        store
            .stage_entry(Service::Param, "/bad", Entry::update("v2", None, t0(), Some(t0())))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_partial_failure_accounting() {
        let store = seeded_store().await;
        let backend = Arc::new(FakeBackend::failing(&["/bad"]));
        let executor = ApplyExecutor::new(
            Arc::clone(&backend) as Arc<dyn BackendStrategy>,
            Arc::clone(&store) as Arc<dyn StateStore>,
        );

        let entries = store.list_entries(Service::Param).await.unwrap();
        let results = executor
            .apply_entries(Service::Param, entries, &ShutdownToken::new())
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["/ok"], EntryApplyStatus::Updated);
        assert!(matches!(results["/bad"], EntryApplyStatus::Failed(_)));

        // Success unstaged, failure left staged.
        let remaining = store.list_entries(Service::Param).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("/bad"));
    }

    #[tokio::test]
    async fn test_classification_follows_operation() {
        let store = Arc::new(MemoryStateStore::new());
        store
            .stage_entry(Service::Param, "/new", Entry::create("v", None, t0()))
            .await
            .unwrap();
        store
            .stage_entry(Service::Param, "/gone", Entry::delete(t0(), Some(t0()), None))
            .await
            .unwrap();

        let backend = Arc::new(FakeBackend::failing(&[]));
        let executor = ApplyExecutor::new(
            backend as Arc<dyn BackendStrategy>,
            Arc::clone(&store) as Arc<dyn StateStore>,
        );
        let entries = store.list_entries(Service::Param).await.unwrap();
        let results = executor
            .apply_entries(Service::Param, entries, &ShutdownToken::new())
            .await;

        assert_eq!(results["/new"], EntryApplyStatus::Created);
        assert_eq!(results["/gone"], EntryApplyStatus::Deleted);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_dispatches_nothing() {
        let store = seeded_store().await;
        let backend = Arc::new(FakeBackend::failing(&[]));
        let executor = ApplyExecutor::new(
            backend as Arc<dyn BackendStrategy>,
            Arc::clone(&store) as Arc<dyn StateStore>,
        );

        let cancel = ShutdownToken::new();
        cancel.cancel();
        let entries = store.list_entries(Service::Param).await.unwrap();
        let results = executor.apply_entries(Service::Param, entries, &cancel).await;
        assert!(results.is_empty());
        assert_eq!(store.list_entries(Service::Param).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tag_apply_unstages_on_success() {
        let store = Arc::new(MemoryStateStore::new());
        let mut tags = TagEntry::new(t0(), None);
        tags.merge_add(vec![("env".to_string(), "prod".to_string())]);
        store.stage_tag(Service::Param, "/a", tags).await.unwrap();

        let backend = Arc::new(FakeBackend::failing(&[]));
        let executor = ApplyExecutor::new(
            backend as Arc<dyn BackendStrategy>,
            Arc::clone(&store) as Arc<dyn StateStore>,
        );
        let staged = store.list_tags(Service::Param).await.unwrap();
        let results = executor.apply_tags(Service::Param, staged, &ShutdownToken::new()).await;

        assert_eq!(results["/a"], TagApplyStatus::Ok);
        assert!(store.is_empty());
    }
}
