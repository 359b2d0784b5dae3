// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Identity-Scoped Path Layout
//!
//! Every staged set belongs to one (account, region) identity supplied by
//! the outer layer. State and sockets hang off that pair:
//!
//! ```text
//! <home>/.cloudstage/<account_id>/<region>/stage.json     (file store)
//! <runtime>/<account_id>/<region>/agent.sock              (agent socket)
//! ```
//!
//! The runtime root is `$XDG_RUNTIME_DIR` when the platform provides one,
//! otherwise a 0700 `run/` directory under the state root. All created
//! directories are owner-only.

use std::path::PathBuf;

use cloudstage_bootstrap::platform::Platform;
use cloudstage_domain::StageError;

/// File name of the persisted staged state.
pub const STATE_FILE_NAME: &str = "stage.json";

/// File name of the agent daemon's Unix socket.
pub const SOCKET_FILE_NAME: &str = "agent.sock";

/// Directory under the user's home that roots all cloudstage state.
const STATE_DIR_NAME: &str = ".cloudstage";

/// The (account, region) pair a staged set belongs to.
///
/// Identity discovery itself is the outer layer's job; the core only
/// requires that both components are non-empty and contain no path
/// separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: String,
    pub region: String,
}

impl Identity {
    /// Builds an identity, rejecting values that cannot form a path
    /// component.
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Result<Self, StageError> {
        let account_id = account_id.into();
        let region = region.into();
        for (label, value) in [("account id", &account_id), ("region", &region)] {
            if value.is_empty() {
                return Err(StageError::io(format!("{} must not be empty", label)));
            }
            if value.contains(['/', '\\']) || value == "." || value == ".." {
                return Err(StageError::io(format!("{} '{}' is not a valid path component", label, value)));
            }
        }
        Ok(Self { account_id, region })
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account_id, self.region)
    }
}

/// Resolved root directories for state files and sockets.
pub struct StagePaths {
    state_root: PathBuf,
    runtime_root: PathBuf,
}

impl StagePaths {
    /// Discovers the roots from the platform's home and runtime
    /// directories.
    pub fn discover(platform: &dyn Platform) -> Result<Self, StageError> {
        let home = platform
            .home_dir()
            .map_err(|e| StageError::io(format!("cannot resolve home directory: {}", e)))?;
        let state_root = home.join(STATE_DIR_NAME);
        let runtime_root = platform
            .runtime_dir()
            .unwrap_or_else(|| state_root.join("run"));
        Ok(Self {
            state_root,
            runtime_root,
        })
    }

    /// Builds paths over explicit roots (tests, custom layouts).
    pub fn with_roots(state_root: PathBuf, runtime_root: PathBuf) -> Self {
        Self {
            state_root,
            runtime_root,
        }
    }

    /// The stage file for one identity.
    pub fn state_file(&self, identity: &Identity) -> PathBuf {
        self.identity_dir(&self.state_root, identity).join(STATE_FILE_NAME)
    }

    /// The agent socket for one identity.
    pub fn socket_path(&self, identity: &Identity) -> PathBuf {
        self.identity_dir(&self.runtime_root, identity).join(SOCKET_FILE_NAME)
    }

    /// Creates the state directory chain for an identity with owner-only
    /// permissions, returning the leaf directory.
    pub fn ensure_state_dir(&self, platform: &dyn Platform, identity: &Identity) -> Result<PathBuf, StageError> {
        self.ensure_identity_dir(platform, &self.state_root, identity)
    }

    /// Creates the runtime directory chain for an identity with owner-only
    /// permissions, returning the leaf directory.
    pub fn ensure_runtime_dir(&self, platform: &dyn Platform, identity: &Identity) -> Result<PathBuf, StageError> {
        self.ensure_identity_dir(platform, &self.runtime_root, identity)
    }

    fn identity_dir(&self, root: &PathBuf, identity: &Identity) -> PathBuf {
        root.join(&identity.account_id).join(&identity.region)
    }

    fn ensure_identity_dir(
        &self,
        platform: &dyn Platform,
        root: &PathBuf,
        identity: &Identity,
    ) -> Result<PathBuf, StageError> {
        let leaf = self.identity_dir(root, identity);
        std::fs::create_dir_all(&leaf).map_err(|e| StageError::io(format!("cannot create {}: {}", leaf.display(), e)))?;
        // Owner-only on every component we own, from the root down.
        let mut dir = root.clone();
        for component in [None, Some(&identity.account_id), Some(&identity.region)] {
            if let Some(part) = component {
                dir = dir.join(part);
            }
            platform
                .set_permissions(&dir, 0o700)
                .map_err(|e| StageError::io(format!("cannot restrict {}: {}", dir.display(), e)))?;
        }
        Ok(leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rejects_path_separators() {
        assert!(Identity::new("123", "us-east-1").is_ok());
        assert!(Identity::new("", "us-east-1").is_err());
        assert!(Identity::new("123", "").is_err());
        assert!(Identity::new("../123", "us-east-1").is_err());
        assert!(Identity::new("123", "us/east").is_err());
        assert!(Identity::new("..", "us-east-1").is_err());
    }

    #[test]
    fn test_layout() {
        let paths = StagePaths::with_roots(PathBuf::from("/home/u/.cloudstage"), PathBuf::from("/run/user/1000"));
        let identity = Identity::new("123456789012", "us-east-1").unwrap();

        assert_eq!(
            paths.state_file(&identity),
            PathBuf::from("/home/u/.cloudstage/123456789012/us-east-1/stage.json")
        );
        assert_eq!(
            paths.socket_path(&identity),
            PathBuf::from("/run/user/1000/123456789012/us-east-1/agent.sock")
        );
    }

    #[test]
    fn test_runtime_fallback_under_state_root() {
        struct NoRuntime;
        impl Platform for NoRuntime {
            fn page_size(&self) -> usize {
                4096
            }
            fn effective_uid(&self) -> u32 {
                1000
            }
            fn lock_process_memory(&self) -> Result<(), cloudstage_bootstrap::PlatformError> {
                Ok(())
            }
            fn unlock_process_memory(&self) -> Result<(), cloudstage_bootstrap::PlatformError> {
                Ok(())
            }
            #[cfg(unix)]
            fn peer_credentials(
                &self,
                _fd: std::os::unix::io::RawFd,
            ) -> Result<cloudstage_bootstrap::PeerCredentials, cloudstage_bootstrap::PlatformError> {
                Err(cloudstage_bootstrap::PlatformError::NotSupported("test".into()))
            }
            fn home_dir(&self) -> Result<PathBuf, cloudstage_bootstrap::PlatformError> {
                Ok(PathBuf::from("/home/u"))
            }
            fn runtime_dir(&self) -> Option<PathBuf> {
                None
            }
            fn set_permissions(&self, _path: &std::path::Path, _mode: u32) -> Result<(), cloudstage_bootstrap::PlatformError> {
                Ok(())
            }
            fn spawn_detached(
                &self,
                _program: &std::path::Path,
                _args: &[String],
            ) -> Result<u32, cloudstage_bootstrap::PlatformError> {
                Err(cloudstage_bootstrap::PlatformError::NotSupported("test".into()))
            }
        }

        let paths = StagePaths::discover(&NoRuntime).unwrap();
        let identity = Identity::new("123", "eu-west-1").unwrap();
        assert_eq!(
            paths.socket_path(&identity),
            PathBuf::from("/home/u/.cloudstage/run/123/eu-west-1/agent.sock")
        );
    }
}
