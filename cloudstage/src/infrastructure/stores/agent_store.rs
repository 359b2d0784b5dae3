// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent State Store
//!
//! [`StateStore`] over the agent daemon's socket. Read paths treat an
//! unreachable daemon as an empty staged set (capability discovery: no
//! daemon means nothing staged); mutating paths ensure the daemon is
//! running first, auto-spawning it through the launcher when allowed.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::{Entry, Service, StageError, State, TagEntry};

use crate::infrastructure::daemon::client::{AgentClient, DEFAULT_TIMEOUT};
use crate::infrastructure::daemon::launcher::AgentLauncher;
use crate::infrastructure::daemon::protocol::{Request, Response};

/// Daemon-backed [`StateStore`].
pub struct AgentStateStore {
    client: AgentClient,
    launcher: Option<AgentLauncher>,
    deadline: Duration,
}

impl AgentStateStore {
    /// A store that only talks to an already-running daemon.
    pub fn new(client: AgentClient) -> Self {
        Self {
            client,
            launcher: None,
            deadline: DEFAULT_TIMEOUT,
        }
    }

    /// A store that spawns the daemon on demand for mutations.
    pub fn with_launcher(client: AgentClient, launcher: AgentLauncher) -> Self {
        Self {
            client,
            launcher: Some(launcher),
            deadline: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-command deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn reachable(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    async fn ensure_running(&self) -> Result<(), StageError> {
        match &self.launcher {
            Some(launcher) => launcher.ensure_running().await,
            None => self.client.ping().await,
        }
    }

    async fn expect_ok(&self, request: Request) -> Result<(), StageError> {
        match self.client.send(&request, self.deadline).await? {
            Response::Ok => Ok(()),
            other => Err(StageError::daemon_unreachable(format!(
                "unexpected agent reply: {:?}",
                other
            ))),
        }
    }

    async fn expect_state(&self, request: Request) -> Result<State, StageError> {
        match self.client.send(&request, self.deadline).await? {
            Response::State { state } => Ok(state),
            other => Err(StageError::daemon_unreachable(format!(
                "unexpected agent reply: {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl StateStore for AgentStateStore {
    async fn load(&self) -> Result<State, StageError> {
        if !self.reachable().await {
            return Ok(State::new());
        }
        self.expect_state(Request::GetState).await
    }

    async fn drain(&self, service: Option<Service>, keep: bool) -> Result<State, StageError> {
        if !self.reachable().await {
            return Ok(State::new());
        }
        self.expect_state(Request::Drain { service, keep }).await
    }

    async fn write_state(&self, state: State, mode: MergeMode) -> Result<(), StageError> {
        self.ensure_running().await?;
        let request = match mode {
            MergeMode::Overwrite => Request::SetState { state },
            MergeMode::Merge => Request::WriteState { state },
        };
        self.expect_ok(request).await
    }

    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> Result<(), StageError> {
        self.ensure_running().await?;
        self.expect_ok(Request::StageEntry {
            service,
            name: name.to_string(),
            entry,
        })
        .await
    }

    async fn unstage_entry(&self, service: Service, name: &str) -> Result<(), StageError> {
        if !self.reachable().await {
            return Err(StageError::not_staged(name));
        }
        self.expect_ok(Request::UnstageEntry {
            service,
            name: name.to_string(),
        })
        .await
    }

    async fn stage_tag(&self, service: Service, name: &str, tags: TagEntry) -> Result<(), StageError> {
        self.ensure_running().await?;
        self.expect_ok(Request::StageTag {
            service,
            name: name.to_string(),
            tags,
        })
        .await
    }

    async fn unstage_tag(&self, service: Service, name: &str) -> Result<(), StageError> {
        if !self.reachable().await {
            return Err(StageError::not_staged(name));
        }
        self.expect_ok(Request::UnstageTag {
            service,
            name: name.to_string(),
        })
        .await
    }

    async fn list_entries(&self, service: Service) -> Result<BTreeMap<String, Entry>, StageError> {
        if !self.reachable().await {
            return Ok(BTreeMap::new());
        }
        match self.client.send(&Request::ListEntries { service }, self.deadline).await? {
            Response::Entries { entries } => Ok(entries),
            other => Err(StageError::daemon_unreachable(format!(
                "unexpected agent reply: {:?}",
                other
            ))),
        }
    }

    async fn list_tags(&self, service: Service) -> Result<BTreeMap<String, TagEntry>, StageError> {
        if !self.reachable().await {
            return Ok(BTreeMap::new());
        }
        match self.client.send(&Request::ListTags { service }, self.deadline).await? {
            Response::Tags { tags } => Ok(tags),
            other => Err(StageError::daemon_unreachable(format!(
                "unexpected agent reply: {:?}",
                other
            ))),
        }
    }

    async fn unstage_all(&self, service: Option<Service>, hint: UnstageHint) -> Result<(), StageError> {
        if !self.reachable().await {
            return Ok(());
        }
        self.expect_ok(Request::UnstageAll { service, hint }).await
    }
}
