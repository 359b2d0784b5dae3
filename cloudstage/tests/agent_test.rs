// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-process agent daemon tests: socket lifecycle, staging over the
//! wire, and auto-shutdown on emptiness (with a shortened grace period).

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use cloudstage::infrastructure::daemon::client::AgentClient;
use cloudstage::infrastructure::daemon::protocol::{Request, Response};
use cloudstage::infrastructure::daemon::server::{AgentConfig, AgentServer};
use cloudstage::infrastructure::stores::AgentStateStore;
use cloudstage_bootstrap::platform::{create_platform, Platform};
use cloudstage_domain::services::{StateStore, UnstageHint};
use cloudstage_domain::{Entry, Service};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
}

struct RunningAgent {
    _dir: tempfile::TempDir,
    client: AgentClient,
    handle: tokio::task::JoinHandle<Result<(), cloudstage_domain::StageError>>,
}

async fn start_agent(grace: Duration, manual_mode: bool) -> RunningAgent {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let platform: Arc<dyn Platform> = Arc::from(create_platform());

    let server = AgentServer::new(
        AgentConfig {
            socket_path: socket_path.clone(),
            grace_period: grace,
            manual_mode,
        },
        platform,
    );
    let handle = tokio::spawn(server.run());

    let client = AgentClient::new(socket_path);
    for _ in 0..50 {
        if client.ping().await.is_ok() {
            return RunningAgent {
                _dir: dir,
                client,
                handle,
            };
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("agent did not come up");
}

#[tokio::test]
async fn test_ping_and_staging_over_the_wire() {
    let agent = start_agent(Duration::from_secs(60), false).await;
    let store = AgentStateStore::new(agent.client.clone());

    store
        .stage_entry(Service::Param, "/a", Entry::create("v1", None, t0()))
        .await
        .unwrap();

    let entries = store.list_entries(Service::Param).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries["/a"].value.as_deref(), Some("v1"));

    let state = store.load().await.unwrap();
    assert_eq!(state.entry_count(), 1);

    // Unstaging a missing key round-trips the typed error.
    let err = store.unstage_entry(Service::Param, "/missing").await.unwrap_err();
    assert!(err.is_not_staged());

    // Explicit shutdown for cleanliness.
    agent
        .client
        .send(&Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    agent.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_auto_shutdown_after_unstage_all() {
    let agent = start_agent(Duration::from_millis(150), false).await;
    let store = AgentStateStore::new(agent.client.clone());

    store
        .stage_entry(Service::Param, "/a", Entry::create("v1", None, t0()))
        .await
        .unwrap();
    store.unstage_all(None, UnstageHint::Reset).await.unwrap();

    // Within the grace period (plus slack) the daemon exits on its own.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(agent.client.ping().await.is_err());
    agent.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_write_during_grace_cancels_shutdown() {
    let agent = start_agent(Duration::from_millis(200), false).await;
    let store = AgentStateStore::new(agent.client.clone());

    store
        .stage_entry(Service::Param, "/a", Entry::create("v1", None, t0()))
        .await
        .unwrap();
    store.unstage_all(None, UnstageHint::Reset).await.unwrap();

    // Re-stage before the grace period elapses.
    tokio::time::sleep(Duration::from_millis(50)).await;
    store
        .stage_entry(Service::Param, "/b", Entry::create("v2", None, t0()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(agent.client.ping().await.is_ok(), "daemon must absorb the follow-up");

    agent
        .client
        .send(&Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    agent.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_manual_mode_disables_auto_shutdown() {
    let agent = start_agent(Duration::from_millis(100), true).await;
    let store = AgentStateStore::new(agent.client.clone());

    store
        .stage_entry(Service::Param, "/a", Entry::create("v1", None, t0()))
        .await
        .unwrap();
    store.unstage_all(None, UnstageHint::Persist).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(agent.client.ping().await.is_ok());

    agent
        .client
        .send(&Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    agent.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_drain_over_the_wire() {
    let agent = start_agent(Duration::from_secs(60), false).await;
    let store = AgentStateStore::new(agent.client.clone());

    store
        .stage_entry(Service::Param, "/a", Entry::create("v1", None, t0()))
        .await
        .unwrap();

    let kept = store.drain(None, true).await.unwrap();
    assert_eq!(kept.entry_count(), 1);
    assert_eq!(store.load().await.unwrap().entry_count(), 1);

    let drained = store.drain(None, false).await.unwrap();
    assert_eq!(drained.entry_count(), 1);
    assert!(store.load().await.unwrap().is_empty());

    agent
        .client
        .send(&Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    agent.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreachable_daemon_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let client = AgentClient::new(dir.path().join("agent.sock"));
    let store = AgentStateStore::new(client.clone());

    assert!(client.ping().await.is_err());
    assert!(store.load().await.unwrap().is_empty());
    assert!(store.list_entries(Service::Param).await.unwrap().is_empty());
    assert!(store
        .unstage_entry(Service::Param, "/a")
        .await
        .unwrap_err()
        .is_not_staged());
}

#[tokio::test]
async fn test_get_state_wire_shape() {
    let agent = start_agent(Duration::from_secs(60), false).await;

    let response = agent
        .client
        .send(&Request::GetState, Duration::from_secs(1))
        .await
        .unwrap();
    match response {
        Response::State { state } => assert!(state.is_empty()),
        other => panic!("unexpected response {:?}", other),
    }

    agent
        .client
        .send(&Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    agent.handle.await.unwrap().unwrap();
}
