// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects of the staging domain.
//!
//! Value objects are immutable, identity-free, and self-validating. They
//! enforce their invariants at construction so the rest of the domain never
//! sees an illegal value.

mod recovery_window;
mod service;

pub use recovery_window::{RecoveryWindow, MAX_RECOVERY_WINDOW_DAYS, MIN_RECOVERY_WINDOW_DAYS};
pub use service::Service;
