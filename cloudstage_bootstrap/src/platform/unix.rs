// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unix Platform Implementation
//!
//! POSIX implementation of the [`Platform`] trait for Linux and macOS,
//! using `libc` directly for the calls the standard library does not
//! cover: `mlockall` for the agent daemon's memory hygiene,
//! `SO_PEERCRED`/`getpeereid` for socket peer authentication, and
//! `setsid` for detached daemon spawning.

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use super::{PeerCredentials, Platform, PlatformError};

/// POSIX platform implementation (Linux + macOS).
pub struct UnixPlatform;

impl UnixPlatform {
    pub fn new() -> Self {
        Self
    }

    fn page_size_impl() -> usize {
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                size as usize
            } else {
                4096 // Default fallback
            }
        }
    }
}

impl Default for UnixPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for UnixPlatform {
    fn page_size(&self) -> usize {
        Self::page_size_impl()
    }

    fn effective_uid(&self) -> u32 {
        unsafe { libc::geteuid() }
    }

    fn lock_process_memory(&self) -> Result<(), PlatformError> {
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc == 0 {
            Ok(())
        } else {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                Err(PlatformError::PermissionDenied(format!(
                    "mlockall failed: {} (RLIMIT_MEMLOCK too low?)",
                    err
                )))
            } else {
                Err(PlatformError::Io(err))
            }
        }
    }

    fn unlock_process_memory(&self) -> Result<(), PlatformError> {
        let rc = unsafe { libc::munlockall() };
        if rc == 0 {
            Ok(())
        } else {
            Err(PlatformError::Io(std::io::Error::last_os_error()))
        }
    }

    #[cfg(target_os = "linux")]
    fn peer_credentials(&self, fd: RawFd) -> Result<PeerCredentials, PlatformError> {
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if rc == 0 {
            Ok(PeerCredentials {
                uid: cred.uid,
                gid: cred.gid,
            })
        } else {
            Err(PlatformError::Io(std::io::Error::last_os_error()))
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn peer_credentials(&self, fd: RawFd) -> Result<PeerCredentials, PlatformError> {
        let mut uid: libc::uid_t = 0;
        let mut gid: libc::gid_t = 0;
        let rc = unsafe { libc::getpeereid(fd, &mut uid, &mut gid) };
        if rc == 0 {
            Ok(PeerCredentials { uid, gid })
        } else {
            Err(PlatformError::Io(std::io::Error::last_os_error()))
        }
    }

    fn home_dir(&self) -> Result<PathBuf, PlatformError> {
        match std::env::var_os("HOME") {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
            _ => Err(PlatformError::Other("HOME is not set".to_string())),
        }
    }

    fn runtime_dir(&self) -> Option<PathBuf> {
        std::env::var_os("XDG_RUNTIME_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), PlatformError> {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let permissions = fs::Permissions::from_mode(mode);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }

    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<u32, PlatformError> {
        use std::os::unix::process::CommandExt;
        use std::process::{Command, Stdio};

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Detach from the controlling terminal and our session so the
        // child survives the caller's exit.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn()?;
        Ok(child.id())
    }
}
