// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File State Store
//!
//! The persistent half of the dual-backed store: schema JSON at
//! `<state-root>/<account>/<region>/stage.json`, optionally wrapped in the
//! AES-GCM envelope when a passphrase is supplied.
//!
//! ## Atomicity
//!
//! Every write lands in `stage.json.tmp` in the same directory, is
//! fsync'd, and is renamed over the target. A crash leaves either the old
//! file or the new one, never a torn mix. Concurrent writers to the same
//! file are not supported; the rename keeps them from corrupting each
//! other but the last rename wins.
//!
//! ## Permissions
//!
//! Parent directories are created 0700 and the file is written 0600; the
//! staged set can contain secret values even when unencrypted.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use cloudstage_bootstrap::secure::Passphrase;
use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::{Entry, Service, StageError, State, TagEntry};

use crate::infrastructure::codec::envelope;

/// File-backed [`StateStore`] with optional envelope encryption.
pub struct FileStateStore {
    path: PathBuf,
    passphrase: Option<Passphrase>,
}

impl FileStateStore {
    /// A store over `path`, written in plaintext schema JSON.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            passphrase: None,
        }
    }

    /// A store over `path`, sealed with the envelope on write and opened
    /// with the same passphrase on read.
    pub fn with_passphrase(path: PathBuf, passphrase: Passphrase) -> Self {
        Self {
            path,
            passphrase: Some(passphrase),
        }
    }

    /// The file this store owns.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Whether the on-disk file carries the encryption envelope.
    ///
    /// Detection needs no passphrase; a missing file reads as not
    /// encrypted.
    pub async fn is_encrypted(&self) -> Result<bool, StageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(envelope::is_encrypted(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StageError::io(format!("cannot read {}: {}", self.path.display(), e))),
        }
    }

    async fn read_state(&self) -> Result<State, StageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(State::new()),
            Err(e) => return Err(StageError::io(format!("cannot read {}: {}", self.path.display(), e))),
        };

        let plaintext = if envelope::is_encrypted(&bytes) {
            let passphrase = self
                .passphrase
                .as_ref()
                .ok_or_else(|| StageError::decrypt("stage file is encrypted; passphrase required"))?;
            envelope::decrypt(&bytes, passphrase)?
        } else {
            bytes
        };

        State::from_json_slice(&plaintext)
    }

    async fn persist(&self, state: &State) -> Result<(), StageError> {
        let plaintext = state.to_json_vec()?;
        let payload = match &self.passphrase {
            Some(passphrase) => envelope::encrypt(&plaintext, passphrase)?,
            None => plaintext,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::io(format!("cannot create {}: {}", parent.display(), e)))?;
            restrict_dir(parent).await?;
        }

        let tmp = self.tmp_path();
        let mut file = open_private(&tmp).await?;
        file.write_all(&payload)
            .await
            .map_err(|e| StageError::io(format!("cannot write {}: {}", tmp.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| StageError::io(format!("cannot fsync {}: {}", tmp.display(), e)))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StageError::io(format!("cannot replace {}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "stage file written");
        Ok(())
    }

    async fn remove_file(&self) -> Result<(), StageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StageError::io(format!("cannot remove {}: {}", self.path.display(), e))),
        }
    }

    /// Persists the state, or removes the file when the state is empty.
    async fn persist_or_remove(&self, state: &State) -> Result<(), StageError> {
        if state.is_empty() {
            self.remove_file().await
        } else {
            self.persist(state).await
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "stage.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
async fn open_private(path: &PathBuf) -> Result<tokio::fs::File, StageError> {
    use std::os::unix::fs::OpenOptionsExt;
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
        .map_err(|e| StageError::io(format!("cannot open {}: {}", path.display(), e)))
}

#[cfg(not(unix))]
async fn open_private(path: &PathBuf) -> Result<tokio::fs::File, StageError> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| StageError::io(format!("cannot open {}: {}", path.display(), e)))
}

#[cfg(unix)]
async fn restrict_dir(dir: &std::path::Path) -> Result<(), StageError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .await
        .map_err(|e| StageError::io(format!("cannot restrict {}: {}", dir.display(), e)))
}

#[cfg(not(unix))]
async fn restrict_dir(_dir: &std::path::Path) -> Result<(), StageError> {
    Ok(())
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<State, StageError> {
        self.read_state().await
    }

    async fn drain(&self, service: Option<Service>, keep: bool) -> Result<State, StageError> {
        let state = self.read_state().await?;
        match service {
            None => {
                if !keep {
                    self.remove_file().await?;
                }
                Ok(state)
            }
            Some(service) => {
                let extracted = state.extract_service(service);
                if !keep {
                    let mut remainder = state;
                    remainder.remove_service(service);
                    self.persist_or_remove(&remainder).await?;
                }
                Ok(extracted)
            }
        }
    }

    async fn write_state(&self, state: State, mode: MergeMode) -> Result<(), StageError> {
        let merged = match mode {
            MergeMode::Overwrite => state,
            MergeMode::Merge => {
                let mut current = self.read_state().await?;
                current.merge(state);
                current
            }
        };
        self.persist(&merged).await
    }

    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> Result<(), StageError> {
        let mut state = self.read_state().await?;
        state.insert_entry(service, name, entry);
        self.persist(&state).await
    }

    async fn unstage_entry(&self, service: Service, name: &str) -> Result<(), StageError> {
        let mut state = self.read_state().await?;
        if state.remove_entry(service, name).is_none() {
            return Err(StageError::not_staged(name));
        }
        self.persist_or_remove(&state).await
    }

    async fn stage_tag(&self, service: Service, name: &str, tags: TagEntry) -> Result<(), StageError> {
        let mut state = self.read_state().await?;
        state.insert_tag(service, name, tags);
        self.persist(&state).await
    }

    async fn unstage_tag(&self, service: Service, name: &str) -> Result<(), StageError> {
        let mut state = self.read_state().await?;
        if state.remove_tag(service, name).is_none() {
            return Err(StageError::not_staged(name));
        }
        self.persist_or_remove(&state).await
    }

    async fn list_entries(&self, service: Service) -> Result<BTreeMap<String, Entry>, StageError> {
        Ok(self.read_state().await?.entries_for(service))
    }

    async fn list_tags(&self, service: Service) -> Result<BTreeMap<String, TagEntry>, StageError> {
        Ok(self.read_state().await?.tags_for(service))
    }

    async fn unstage_all(&self, service: Option<Service>, hint: UnstageHint) -> Result<(), StageError> {
        match service {
            None => {
                debug!(?hint, path = %self.path.display(), "stage file drained");
                self.remove_file().await
            }
            Some(service) => {
                let mut state = self.read_state().await?;
                state.remove_service(service);
                debug!(?hint, %service, path = %self.path.display(), "service unstaged");
                self.persist_or_remove(&state).await
            }
        }
    }
}
