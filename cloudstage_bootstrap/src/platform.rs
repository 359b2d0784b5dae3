// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform Abstraction Module
//!
//! Platform-specific operating system functionality behind one trait, so
//! the rest of the workspace never needs conditional compilation.
//!
//! ## Architecture Pattern
//!
//! - **Interface**: the [`Platform`] trait defines the contract
//! - **Implementations**: `UnixPlatform` (Linux + macOS) and
//!   `WindowsPlatform`
//! - **Selection**: compile-time via `#[cfg]`, through
//!   [`create_platform`]
//!
//! The staging core leans on this layer for the pieces a cloud-credential
//! tool actually needs from the OS: owner-only file permissions, process
//! memory locking for the agent daemon, Unix-socket peer credentials, the
//! per-user state and runtime directories, and detached process spawning
//! for the daemon launcher.
//!
//! The agent daemon itself is Unix-only; the Windows implementation
//! reports `NotSupported` for the socket-adjacent operations while keeping
//! the file-store paths working.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

// Re-export implementations
#[cfg(unix)]
pub use unix::UnixPlatform;

#[cfg(windows)]
pub use windows::WindowsPlatform;

/// Platform-specific errors
#[derive(Debug, Error)]
pub enum PlatformError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature not supported on this platform
    #[error("Not supported on this platform: {0}")]
    NotSupported(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Generic platform error
    #[error("Platform error: {0}")]
    Other(String),
}

/// Credentials of the peer on a connected Unix socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Effective user id of the peer process.
    pub uid: u32,
    /// Effective group id of the peer process.
    pub gid: u32,
}

/// Platform abstraction trait for OS-specific operations
///
/// All methods are stateless and thread-safe; fallible operations return
/// `Result`. Implementations use native APIs (`libc` on Unix, the Windows
/// API on Windows) with standard-library fallbacks where those suffice.
pub trait Platform: Send + Sync {
    /// System page size in bytes.
    fn page_size(&self) -> usize;

    /// Effective user id of the current process.
    ///
    /// The daemon compares this against socket peers.
    fn effective_uid(&self) -> u32;

    /// Locks all current and future pages of the process into RAM.
    ///
    /// Used by the agent daemon so staged secret values cannot be paged
    /// to swap.
    fn lock_process_memory(&self) -> Result<(), PlatformError>;

    /// Undoes [`Platform::lock_process_memory`].
    fn unlock_process_memory(&self) -> Result<(), PlatformError>;

    /// Reads the peer credentials of a connected Unix-domain socket.
    #[cfg(unix)]
    fn peer_credentials(&self, fd: std::os::unix::io::RawFd) -> Result<PeerCredentials, PlatformError>;

    /// The current user's home directory.
    fn home_dir(&self) -> Result<PathBuf, PlatformError>;

    /// The per-user runtime directory for sockets, or `None` when the
    /// platform does not provide one.
    fn runtime_dir(&self) -> Option<PathBuf>;

    /// Sets file permissions (chmod semantics; no-op on Windows).
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), PlatformError>;

    /// Spawns a fully detached child process (new session, null stdio).
    ///
    /// Used by the daemon launcher; the child outlives the caller.
    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<u32, PlatformError>;
}

/// Creates the platform implementation for the current OS.
pub fn create_platform() -> Box<dyn Platform> {
    #[cfg(unix)]
    {
        Box::new(UnixPlatform::new())
    }

    #[cfg(windows)]
    {
        Box::new(WindowsPlatform::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_platform() {
        let platform = create_platform();
        assert!(platform.page_size() >= 512);
    }
}
