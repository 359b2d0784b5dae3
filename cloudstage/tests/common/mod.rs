// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for integration tests: an in-memory backend strategy
//! with scriptable remote state and failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use cloudstage_domain::{
    BackendStrategy, EditFetchResult, Entry, FetchResult, Operation, Service, StageError, TagEntry,
};

/// A fixed instant for seeding remote state.
pub fn t(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, secs).unwrap()
}

#[derive(Clone)]
pub struct RemoteItem {
    pub value: String,
    pub last_modified: DateTime<Utc>,
}

/// What the backend saw applied, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedOp {
    Entry(String, Operation),
    Tags(String, usize, usize),
}

/// Scriptable in-memory [`BackendStrategy`].
pub struct MemoryBackend {
    service: Service,
    remote: Mutex<BTreeMap<String, RemoteItem>>,
    fail_applies: Mutex<HashSet<String>>,
    pub applied: Mutex<Vec<AppliedOp>>,
}

impl MemoryBackend {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            remote: Mutex::new(BTreeMap::new()),
            fail_applies: Mutex::new(HashSet::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn param() -> Self {
        Self::new(Service::Param)
    }

    /// Seeds a remote value.
    pub fn seed(&self, name: &str, value: &str, last_modified: DateTime<Utc>) {
        self.remote.lock().unwrap().insert(
            name.to_string(),
            RemoteItem {
                value: value.to_string(),
                last_modified,
            },
        );
    }

    /// Bumps only the remote last-modified (out-of-band mutation).
    pub fn touch(&self, name: &str, last_modified: DateTime<Utc>) {
        if let Some(item) = self.remote.lock().unwrap().get_mut(name) {
            item.last_modified = last_modified;
        }
    }

    /// Makes apply fail for one name.
    pub fn fail_apply(&self, name: &str) {
        self.fail_applies.lock().unwrap().insert(name.to_string());
    }

    pub fn remote_value(&self, name: &str) -> Option<String> {
        self.remote.lock().unwrap().get(name).map(|item| item.value.clone())
    }

    pub fn applied_ops(&self) -> Vec<AppliedOp> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendStrategy for MemoryBackend {
    fn service(&self) -> Service {
        self.service
    }

    fn has_delete_options(&self) -> bool {
        self.service == Service::Secret
    }

    fn parse_name(&self, raw: &str) -> Result<String, StageError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(StageError::ResourceNotFound(raw.to_string()));
        }
        Ok(name.to_string())
    }

    fn parse_spec(&self, raw: &str) -> Result<(String, bool), StageError> {
        match raw.split_once('#') {
            Some((name, _)) => Ok((name.to_string(), true)),
            None => Ok((raw.to_string(), false)),
        }
    }

    async fn fetch_current_value(&self, name: &str) -> Result<Option<EditFetchResult>, StageError> {
        Ok(self.remote.lock().unwrap().get(name).map(|item| EditFetchResult {
            value: item.value.clone(),
            version: "1".to_string(),
            description: None,
            last_modified: item.last_modified,
        }))
    }

    async fn fetch_last_modified(&self, name: &str) -> Result<Option<DateTime<Utc>>, StageError> {
        Ok(self.remote.lock().unwrap().get(name).map(|item| item.last_modified))
    }

    async fn fetch_version(&self, spec: &str) -> Result<Option<FetchResult>, StageError> {
        let (name, _) = self.parse_spec(spec)?;
        Ok(self.remote.lock().unwrap().get(&name).map(|item| FetchResult {
            value: item.value.clone(),
            label: "1".to_string(),
            last_modified: item.last_modified,
        }))
    }

    async fn apply(&self, name: &str, entry: &Entry) -> Result<(), StageError> {
        if self.fail_applies.lock().unwrap().contains(name) {
            return Err(StageError::backend(format!("apply rejected for {}", name)));
        }
        let mut remote = self.remote.lock().unwrap();
        match entry.operation {
            Operation::Create | Operation::Update => {
                remote.insert(
                    name.to_string(),
                    RemoteItem {
                        value: entry.value.clone().unwrap_or_default(),
                        last_modified: entry.staged_at,
                    },
                );
            }
            Operation::Delete => {
                remote.remove(name);
            }
        }
        self.applied
            .lock()
            .unwrap()
            .push(AppliedOp::Entry(name.to_string(), entry.operation));
        Ok(())
    }

    async fn apply_tags(&self, name: &str, tags: &TagEntry) -> Result<(), StageError> {
        if self.fail_applies.lock().unwrap().contains(name) {
            return Err(StageError::backend(format!("tag apply rejected for {}", name)));
        }
        self.applied
            .lock()
            .unwrap()
            .push(AppliedOp::Tags(name.to_string(), tags.add.len(), tags.remove.len()));
        Ok(())
    }
}
