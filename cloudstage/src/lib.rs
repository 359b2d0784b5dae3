// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cloudstage
//!
//! Staging core for a Git-like CLI over cloud configuration stores. Users
//! iteratively stage `add`/`edit`/`delete`/`tag`/`untag` operations
//! against the parameter store and the secret manager, inspect the staged
//! set with `status`/`diff`, and `apply` the batch to the remote. Staged
//! work lives either in the agent daemon (fast, locked memory) or in an
//! encrypted stash file (persistent, portable) and moves between the two
//! with stash push/pop.
//!
//! ## Layers
//!
//! - [`application`] - use cases (the staging façade, apply, stash,
//!   status/diff) and shared services (transition executor, conflict
//!   detector, apply executor)
//! - [`infrastructure`] - the file store and envelope codec, the agent
//!   daemon (server, client, launcher, wire protocol), the in-memory
//!   store, and path/environment configuration
//!
//! The state model, transition engine, ports, and error taxonomy live in
//! the `cloudstage-domain` crate; platform concerns live in
//! `cloudstage-bootstrap`.

pub mod application;
pub mod infrastructure;
