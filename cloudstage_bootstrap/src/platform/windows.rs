// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Windows Platform Implementation
//!
//! Windows implementation of the [`Platform`] trait. The file-store paths
//! and permissions work; the agent daemon's Unix-socket machinery (peer
//! credentials, process-wide memory locking) is not available and reports
//! `NotSupported`.

use std::path::{Path, PathBuf};

use super::{Platform, PlatformError};

/// Windows platform implementation.
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for WindowsPlatform {
    fn page_size(&self) -> usize {
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

        unsafe {
            let mut info: SYSTEM_INFO = std::mem::zeroed();
            GetSystemInfo(&mut info);
            if info.dwPageSize > 0 {
                info.dwPageSize as usize
            } else {
                4096
            }
        }
    }

    fn effective_uid(&self) -> u32 {
        // Windows has no numeric uid; the daemon is Unix-only and never
        // consults this on Windows.
        0
    }

    fn lock_process_memory(&self) -> Result<(), PlatformError> {
        Err(PlatformError::NotSupported(
            "process-wide memory locking is not available on Windows".to_string(),
        ))
    }

    fn unlock_process_memory(&self) -> Result<(), PlatformError> {
        Err(PlatformError::NotSupported(
            "process-wide memory locking is not available on Windows".to_string(),
        ))
    }

    fn home_dir(&self) -> Result<PathBuf, PlatformError> {
        match std::env::var_os("USERPROFILE") {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
            _ => Err(PlatformError::Other("USERPROFILE is not set".to_string())),
        }
    }

    fn runtime_dir(&self) -> Option<PathBuf> {
        None
    }

    fn set_permissions(&self, _path: &Path, _mode: u32) -> Result<(), PlatformError> {
        // Unix mode bits do not map onto Windows ACLs; per-user profile
        // directories are already private.
        Ok(())
    }

    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<u32, PlatformError> {
        use std::os::windows::process::CommandExt;
        use std::process::{Command, Stdio};

        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP)
            .spawn()?;
        Ok(child.id())
    }
}
