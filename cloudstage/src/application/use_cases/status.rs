// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Status Use Case
//!
//! A pure read of the staged set: entries and tag entries, optionally
//! filtered to one service or one name. Rendering is the presentation
//! layer's job; this only enumerates.

use std::collections::BTreeMap;
use std::sync::Arc;

use cloudstage_domain::services::StateStore;
use cloudstage_domain::{Entry, Service, StageError, TagEntry};

/// Input for [`StatusUseCase`].
#[derive(Debug, Clone, Default)]
pub struct StatusRequest {
    /// Restrict to one service.
    pub service: Option<Service>,
    /// Restrict to one name.
    pub name: Option<String>,
}

/// The enumerated staged set.
#[derive(Debug, Clone, Default)]
pub struct StatusOutput {
    /// Staged entries, service → name → entry.
    pub entries: BTreeMap<Service, BTreeMap<String, Entry>>,
    /// Staged tag entries, service → name → tag entry.
    pub tags: BTreeMap<Service, BTreeMap<String, TagEntry>>,
}

impl StatusOutput {
    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty) && self.tags.values().all(BTreeMap::is_empty)
    }

    /// Total staged entries in the output.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Total staged tag entries in the output.
    pub fn tag_count(&self) -> usize {
        self.tags.values().map(BTreeMap::len).sum()
    }
}

/// Enumerates the staged set.
pub struct StatusUseCase {
    store: Arc<dyn StateStore>,
}

impl StatusUseCase {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, request: StatusRequest) -> Result<StatusOutput, StageError> {
        let services: Vec<Service> = match request.service {
            Some(service) => vec![service],
            None => Service::ALL.to_vec(),
        };

        let mut output = StatusOutput::default();
        for service in services {
            let mut entries = self.store.list_entries(service).await?;
            let mut tags = self.store.list_tags(service).await?;
            if let Some(name) = &request.name {
                entries.retain(|key, _| key == name);
                tags.retain(|key, _| key == name);
            }
            output.entries.insert(service, entries);
            output.tags.insert(service, tags);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::stores::MemoryStateStore;
    use chrono::{TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    async fn seeded() -> StatusUseCase {
        let store = Arc::new(MemoryStateStore::new());
        store
            .stage_entry(Service::Param, "/a", Entry::create("1", None, t0()))
            .await
            .unwrap();
        store
            .stage_entry(Service::Param, "/b", Entry::create("2", None, t0()))
            .await
            .unwrap();
        store
            .stage_entry(Service::Secret, "s", Entry::create("3", None, t0()))
            .await
            .unwrap();
        StatusUseCase::new(store as Arc<dyn StateStore>)
    }

    #[tokio::test]
    async fn test_status_enumerates_everything() {
        let use_case = seeded().await;
        let output = use_case.execute(StatusRequest::default()).await.unwrap();
        assert_eq!(output.entry_count(), 3);
        assert!(!output.is_empty());
    }

    #[tokio::test]
    async fn test_status_service_filter() {
        let use_case = seeded().await;
        let output = use_case
            .execute(StatusRequest {
                service: Some(Service::Param),
                name: None,
            })
            .await
            .unwrap();
        assert_eq!(output.entry_count(), 2);
        assert!(!output.entries.contains_key(&Service::Secret));
    }

    #[tokio::test]
    async fn test_status_name_filter() {
        let use_case = seeded().await;
        let output = use_case
            .execute(StatusRequest {
                service: None,
                name: Some("/a".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(output.entry_count(), 1);
        assert!(output.entries[&Service::Param].contains_key("/a"));
    }
}
