// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Use Cases
//!
//! The staging façade: one thin orchestrator per user-visible operation.
//! Each use case parses the raw name through the backend's parser, fetches
//! whatever baseline the transition needs, builds an action, runs it
//! through the [`TransitionExecutor`](crate::application::services::TransitionExecutor),
//! and translates the outcome into an output struct. No staging logic
//! lives here; that is the domain engine's job.

mod add;
mod apply;
mod delete;
mod diff;
mod edit;
mod reset;
mod stash_pop;
mod stash_push;
mod status;
mod tag;
mod untag;

pub use add::{AddOutput, AddRequest, AddUseCase};
pub use apply::{ApplyOutput, ApplyRequest, ApplyUseCase};
pub use delete::{DeleteOutput, DeleteRequest, DeleteUseCase};
pub use diff::{DiffOutput, DiffRecord, DiffRequest, DiffUseCase};
pub use edit::{EditOutput, EditRequest, EditUseCase};
pub use reset::{ResetOutput, ResetRequest, ResetUseCase};
pub use stash_pop::{StashPopOutput, StashPopRequest, StashPopUseCase};
pub use stash_push::{StashPushOutput, StashPushRequest, StashPushUseCase};
pub use status::{StatusOutput, StatusRequest, StatusUseCase};
pub use tag::{TagOutput, TagRequest, TagUseCase};
pub use untag::{UntagOutput, UntagRequest, UntagUseCase};

use cloudstage_domain::services::RemoteExistence;
use cloudstage_domain::{BackendStrategy, StageError};

/// Resolves the backend's view of a name into the transition engine's
/// remote-existence form.
pub(crate) async fn remote_existence(
    backend: &dyn BackendStrategy,
    name: &str,
) -> Result<RemoteExistence, StageError> {
    Ok(match backend.fetch_current_value(name).await? {
        Some(current) => RemoteExistence::Exists {
            value: current.value,
            last_modified: current.last_modified,
        },
        None => RemoteExistence::Absent,
    })
}
