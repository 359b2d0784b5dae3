// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end staging scenarios over the file store: stage with the
//! use-case façade, inspect, and apply against a scriptable backend.

mod common;

use std::sync::Arc;

use common::{t, AppliedOp, MemoryBackend};

use cloudstage::application::use_cases::{
    AddRequest, AddUseCase, ApplyRequest, ApplyUseCase, DeleteRequest, DeleteUseCase, DiffRecord, DiffRequest,
    DiffUseCase, EditRequest, EditUseCase, TagRequest, TagUseCase,
};
use cloudstage::infrastructure::stores::FileStateStore;
use cloudstage_bootstrap::signals::ShutdownToken;
use cloudstage_domain::services::StateStore;
use cloudstage_domain::{BackendStrategy, Operation, Service, StageError};

fn fixture() -> (tempfile::TempDir, Arc<MemoryBackend>, Arc<dyn StateStore>) {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MemoryBackend::param());
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir.path().join("stage.json")));
    (dir, backend, store)
}

fn add_use_case(backend: &Arc<MemoryBackend>, store: &Arc<dyn StateStore>) -> AddUseCase {
    AddUseCase::new(Arc::clone(backend) as Arc<dyn BackendStrategy>, Arc::clone(store))
}

fn edit_use_case(backend: &Arc<MemoryBackend>, store: &Arc<dyn StateStore>) -> EditUseCase {
    EditUseCase::new(Arc::clone(backend) as Arc<dyn BackendStrategy>, Arc::clone(store))
}

async fn apply(backend: &Arc<MemoryBackend>, store: &Arc<dyn StateStore>, ignore_conflicts: bool) -> Result<cloudstage::application::use_cases::ApplyOutput, StageError> {
    ApplyUseCase::new(Arc::clone(backend) as Arc<dyn BackendStrategy>, Arc::clone(store))
        .execute(
            ApplyRequest {
                name: None,
                ignore_conflicts,
            },
            &ShutdownToken::new(),
        )
        .await
}

#[tokio::test]
async fn test_add_on_absent_then_apply() {
    let (_dir, backend, store) = fixture();

    let output = add_use_case(&backend, &store)
        .execute(AddRequest {
            name: "/a".to_string(),
            value: "v1".to_string(),
            description: None,
        })
        .await
        .unwrap();
    assert!(output.staged);

    let staged = store.get_entry(Service::Param, "/a").await.unwrap().unwrap();
    assert_eq!(staged.operation, Operation::Create);
    assert_eq!(staged.value.as_deref(), Some("v1"));

    let result = apply(&backend, &store, false).await.unwrap();
    assert_eq!(result.entry_succeeded, 1);
    assert_eq!(result.entry_failed, 0);
    assert!(result.partial_error.is_none());

    assert_eq!(
        backend.applied_ops(),
        vec![AppliedOp::Entry("/a".to_string(), Operation::Create)]
    );
    assert_eq!(backend.remote_value("/a").as_deref(), Some("v1"));
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_on_existing_is_rejected() {
    let (_dir, backend, store) = fixture();
    backend.seed("/a", "old", t(0));

    let err = add_use_case(&backend, &store)
        .execute(AddRequest {
            name: "/a".to_string(),
            value: "v1".to_string(),
            description: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "cannot_add_to_existing");
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_auto_skip_and_auto_unstage() {
    let (_dir, backend, store) = fixture();
    backend.seed("/a", "v", t(0));
    let edit = edit_use_case(&backend, &store);

    // Same value as remote: nothing staged.
    let output = edit
        .execute(EditRequest {
            name: "/a".to_string(),
            value: "v".to_string(),
            description: None,
        })
        .await
        .unwrap();
    assert!(output.skipped);
    assert!(store.load().await.unwrap().is_empty());

    // A real change captures the baseline.
    let output = edit
        .execute(EditRequest {
            name: "/a".to_string(),
            value: "w".to_string(),
            description: None,
        })
        .await
        .unwrap();
    assert!(output.staged);
    let staged = store.get_entry(Service::Param, "/a").await.unwrap().unwrap();
    assert_eq!(staged.operation, Operation::Update);
    assert_eq!(staged.base_modified_at, Some(t(0)));

    // Editing back to the remote value removes the pending update.
    let output = edit
        .execute(EditRequest {
            name: "/a".to_string(),
            value: "v".to_string(),
            description: None,
        })
        .await
        .unwrap();
    assert!(output.unstaged);
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_on_pending_create_unstages() {
    let (_dir, backend, store) = fixture();

    add_use_case(&backend, &store)
        .execute(AddRequest {
            name: "/a".to_string(),
            value: "v1".to_string(),
            description: None,
        })
        .await
        .unwrap();

    let output = DeleteUseCase::new(Arc::clone(&backend) as Arc<dyn BackendStrategy>, Arc::clone(&store))
        .execute(DeleteRequest {
            name: "/a".to_string(),
            force: false,
            recovery_window_days: None,
        })
        .await
        .unwrap();

    assert!(output.unstaged);
    assert!(!output.staged);
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conflict_detection_blocks_apply() {
    let (_dir, backend, store) = fixture();
    backend.seed("/a", "v", t(0));

    edit_use_case(&backend, &store)
        .execute(EditRequest {
            name: "/a".to_string(),
            value: "w".to_string(),
            description: None,
        })
        .await
        .unwrap();

    // Remote mutates behind our back.
    backend.touch("/a", t(10));

    let err = apply(&backend, &store, false).await.unwrap_err();
    match err {
        StageError::Conflict { names } => assert_eq!(names, vec!["/a".to_string()]),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert!(store.get_entry(Service::Param, "/a").await.unwrap().is_some());

    // Bypassing the gate applies and unstages.
    let output = apply(&backend, &store, true).await.unwrap();
    assert_eq!(output.entry_succeeded, 1);
    assert!(store.load().await.unwrap().is_empty());
    assert_eq!(backend.remote_value("/a").as_deref(), Some("w"));
}

#[tokio::test]
async fn test_partial_apply_accounting() {
    let (_dir, backend, store) = fixture();
    backend.seed("/ok", "old1", t(0));
    backend.seed("/bad", "old2", t(0));
    backend.fail_apply("/bad");
    let edit = edit_use_case(&backend, &store);

    for (name, value) in [("/ok", "v1"), ("/bad", "v2")] {
        edit.execute(EditRequest {
            name: name.to_string(),
            value: value.to_string(),
            description: None,
        })
        .await
        .unwrap();
    }

    let output = apply(&backend, &store, false).await.unwrap();
    assert_eq!(output.entry_succeeded, 1);
    assert_eq!(output.entry_failed, 1);
    let partial = output.partial_error.expect("partial failure must surface");
    assert_eq!(partial.kind(), "apply_partial");

    let remaining = store.list_entries(Service::Param).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key("/bad"));
}

#[tokio::test]
async fn test_apply_filtered_name_with_nothing_staged() {
    let (_dir, backend, store) = fixture();
    let err = ApplyUseCase::new(Arc::clone(&backend) as Arc<dyn BackendStrategy>, Arc::clone(&store))
        .execute(
            ApplyRequest {
                name: Some("/missing".to_string()),
                ignore_conflicts: false,
            },
            &ShutdownToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_staged());
}

#[tokio::test]
async fn test_tags_are_applied_separately_from_entries() {
    let (_dir, backend, store) = fixture();
    backend.seed("/a", "v", t(0));

    TagUseCase::new(Arc::clone(&backend) as Arc<dyn BackendStrategy>, Arc::clone(&store))
        .execute(TagRequest {
            name: "/a".to_string(),
            tags: [("env".to_string(), "prod".to_string())].into_iter().collect(),
        })
        .await
        .unwrap();

    let output = apply(&backend, &store, false).await.unwrap();
    assert_eq!(output.tag_succeeded, 1);
    assert_eq!(output.entry_succeeded, 0);
    assert_eq!(
        backend.applied_ops(),
        vec![AppliedOp::Tags("/a".to_string(), 1, 0)]
    );
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_diff_auto_unstages_noop_entries() {
    let (_dir, backend, store) = fixture();
    backend.seed("/same", "v", t(0));
    backend.seed("/changed", "old", t(0));
    let edit = edit_use_case(&backend, &store);

    edit.execute(EditRequest {
        name: "/same".to_string(),
        value: "w".to_string(),
        description: None,
    })
    .await
    .unwrap();
    edit.execute(EditRequest {
        name: "/changed".to_string(),
        value: "new".to_string(),
        description: None,
    })
    .await
    .unwrap();

    // Remote catches up with one staged edit out-of-band.
    backend.seed("/same", "w", t(5));

    let output = DiffUseCase::new(Arc::clone(&backend) as Arc<dyn BackendStrategy>, Arc::clone(&store))
        .execute(DiffRequest::default())
        .await
        .unwrap();

    assert_eq!(output.records.len(), 2);
    match &output.records[0] {
        DiffRecord::Change {
            name, remote_value, ..
        } => {
            assert_eq!(name, "/changed");
            assert_eq!(remote_value, "old");
        }
        other => panic!("expected change record, got {:?}", other),
    }
    match &output.records[1] {
        DiffRecord::Unstaged { name, warning } => {
            assert_eq!(name, "/same");
            assert!(warning.contains("identical"));
        }
        other => panic!("expected unstaged record, got {:?}", other),
    }

    // The no-op edit is gone from the staged set.
    let remaining = store.list_entries(Service::Param).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key("/changed"));
}
