// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cloudstage Bootstrap
//!
//! The bootstrap layer sits outside the application layers and owns what a
//! process needs before (and after) the application runs: platform
//! abstraction, secure memory containers, shutdown signal plumbing, and
//! exit codes.
//!
//! ## Modules
//!
//! - [`platform`] - OS abstraction: permissions, memory locking, socket
//!   peer credentials, user directories, detached spawning
//! - [`secure`] - zero-on-drop containers for passphrases and keys
//! - [`signals`] - SIGTERM/SIGINT wiring into a shutdown token
//! - [`exit_code`] - BSD `sysexits.h` exit codes

pub mod exit_code;
pub mod platform;
pub mod secure;
pub mod signals;

pub use exit_code::ExitCode;
pub use platform::{create_platform, PeerCredentials, Platform, PlatformError};
pub use secure::{Passphrase, SecureBytes};
pub use signals::{spawn_signal_listener, ShutdownToken};
