// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services shared by the use cases: atomic transition
//! execution, conflict detection, and parallel apply.

mod apply_executor;
mod conflict_detector;
mod transition_executor;

pub use apply_executor::{ApplyExecutor, EntryApplyStatus, TagApplyStatus, MAX_PARALLEL_APPLIES};
pub use conflict_detector::{ConflictDetector, MAX_PARALLEL_FETCHES};
pub use transition_executor::TransitionExecutor;
