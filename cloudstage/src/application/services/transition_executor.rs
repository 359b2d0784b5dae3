// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transition Executor
//!
//! Drives the pure transition engine against a [`StateStore`]: read the
//! staged entry (and tag entry, for tag actions), run the table, persist
//! the outcome with exactly one store mutation. On a transition error the
//! store is untouched; there is no partial write to roll back because
//! every outcome maps onto a single atomic store operation.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use cloudstage_domain::services::{
    transition_entry, transition_tags, BackendCaps, EntryAction, RemoteExistence, StateStore, TagAction,
    Transition,
};
use cloudstage_domain::{Service, StageError};

/// Executes staging transitions atomically against one store.
pub struct TransitionExecutor {
    store: Arc<dyn StateStore>,
}

impl TransitionExecutor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Runs a value-mutation action and persists its outcome.
    pub async fn execute_entry(
        &self,
        service: Service,
        name: &str,
        remote: &RemoteExistence,
        action: EntryAction,
        caps: BackendCaps,
    ) -> Result<Transition, StageError> {
        let staged = self.store.get_entry(service, name).await?;
        let transition = transition_entry(name, staged.as_ref(), remote, action, caps, Utc::now())?;
        self.persist(service, name, &transition).await?;
        Ok(transition)
    }

    /// Runs a tag-mutation action and persists its outcome.
    pub async fn execute_tags(
        &self,
        service: Service,
        name: &str,
        remote: &RemoteExistence,
        action: TagAction,
    ) -> Result<Transition, StageError> {
        let staged_entry = self.store.get_entry(service, name).await?;
        let staged_tags = self.store.get_tag(service, name).await?;
        let transition = transition_tags(
            name,
            staged_entry.as_ref(),
            staged_tags.as_ref(),
            remote,
            action,
            Utc::now(),
        )?;
        self.persist(service, name, &transition).await?;
        Ok(transition)
    }

    async fn persist(&self, service: Service, name: &str, transition: &Transition) -> Result<(), StageError> {
        match transition {
            Transition::StageEntry(entry) => self.store.stage_entry(service, name, entry.clone()).await,
            Transition::StageTag(tags) => self.store.stage_tag(service, name, tags.clone()).await,
            Transition::UnstageEntry(reason) => {
                debug!(%service, name, ?reason, "unstaging entry");
                match self.store.unstage_entry(service, name).await {
                    Err(e) if e.is_not_staged() => Ok(()),
                    other => other,
                }
            }
            Transition::UnstageTag => match self.store.unstage_tag(service, name).await {
                Err(e) if e.is_not_staged() => Ok(()),
                other => other,
            },
            Transition::Skip(reason) => {
                debug!(%service, name, ?reason, "nothing to stage");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::stores::MemoryStateStore;
    use chrono::{DateTime, TimeZone};
    use cloudstage_domain::services::{SkipReason, UnstageReason};
    use cloudstage_domain::Operation;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn exists(value: &str) -> RemoteExistence {
        RemoteExistence::Exists {
            value: value.to_string(),
            last_modified: t0(),
        }
    }

    fn executor() -> (Arc<MemoryStateStore>, TransitionExecutor) {
        let store = Arc::new(MemoryStateStore::new());
        let executor = TransitionExecutor::new(Arc::clone(&store) as Arc<dyn StateStore>);
        (store, executor)
    }

    #[tokio::test]
    async fn test_add_persists_entry() {
        let (store, executor) = executor();
        let transition = executor
            .execute_entry(
                Service::Param,
                "/a",
                &RemoteExistence::Absent,
                EntryAction::Add {
                    value: "v1".to_string(),
                    description: None,
                },
                BackendCaps::default(),
            )
            .await
            .unwrap();

        assert!(matches!(transition, Transition::StageEntry(_)));
        let staged = store.get_entry(Service::Param, "/a").await.unwrap().unwrap();
        assert_eq!(staged.operation, Operation::Create);
    }

    #[tokio::test]
    async fn test_failed_transition_leaves_store_untouched() {
        let (store, executor) = executor();
        let err = executor
            .execute_entry(
                Service::Param,
                "/a",
                &exists("old"),
                EntryAction::Add {
                    value: "v1".to_string(),
                    description: None,
                },
                BackendCaps::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cannot_add_to_existing");
        assert!(store.is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[tokio::test]
    async fn test_edit_then_edit_back_unstages() {
        let (store, executor) = executor();
        executor
            .execute_entry(
                Service::Param,
                "/a",
                &exists("v"),
                EntryAction::Edit {
                    value: "w".to_string(),
                    description: None,
                },
                BackendCaps::default(),
            )
            .await
            .unwrap();
        assert!(!store.is_empty());

        let transition = executor
            .execute_entry(
                Service::Param,
                "/a",
                &exists("v"),
                EntryAction::Edit {
                    value: "v".to_string(),
                    description: None,
                },
                BackendCaps::default(),
            )
            .await
            .unwrap();
        assert_eq!(transition, Transition::UnstageEntry(UnstageReason::MatchesRemote));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_skip_writes_nothing() {
        let (store, executor) = executor();
        let transition = executor
            .execute_entry(
                Service::Param,
                "/a",
                &exists("v"),
                EntryAction::Edit {
                    value: "v".to_string(),
                    description: None,
                },
                BackendCaps::default(),
            )
            .await
            .unwrap();
        assert_eq!(transition, Transition::Skip(SkipReason::AlreadyMatchesRemote));
        assert_eq!(store.generation(), 0);
    }

    #[tokio::test]
    async fn test_tag_merge_lands_in_store() {
        let (store, executor) = executor();
        executor
            .execute_tags(
                Service::Param,
                "/a",
                &exists("v"),
                TagAction::Add([("env".to_string(), "prod".to_string())].into_iter().collect()),
            )
            .await
            .unwrap();
        executor
            .execute_tags(
                Service::Param,
                "/a",
                &exists("v"),
                TagAction::Remove(["env".to_string()].into_iter().collect()),
            )
            .await
            .unwrap();

        let tags = store.get_tag(Service::Param, "/a").await.unwrap().unwrap();
        assert!(tags.add.is_empty());
        assert!(tags.remove.contains("env"));
    }
}
