// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Daemon Server
//!
//! The in-memory custodian of staged state: a single-tenant RPC server on
//! a Unix-domain socket. Each accepted connection runs on its own task;
//! every state access goes through the [`MemoryStateStore`]'s one mutex,
//! so no two commands mutate concurrently. The daemon never calls the
//! remote backend; it is a passive state holder.
//!
//! ## Security
//!
//! - Socket file mode 0600, in a 0700 per-identity runtime directory
//! - Peer credentials checked on every connection: the effective uid must
//!   match the daemon's
//! - Process memory locked (`mlockall`) so staged secrets cannot reach
//!   swap; best-effort, with a warning when the rlimit forbids it
//! - On every exit path the held state is zeroized before release and the
//!   socket is unlinked
//!
//! ## Lifecycle
//!
//! After any mutation that leaves the state empty (and unless manual mode
//! is on), shutdown is scheduled after a short grace period that absorbs
//! immediate follow-ups; any write that leaves a non-empty state
//! invalidates the pending timer by bumping the store generation. The
//! `Shutdown` command, SIGTERM and SIGINT converge on the same token.
//!
//! Two racing spawners cannot produce two daemons: the socket bind is
//! create-or-fail, and the loser confirms a live peer with a ping before
//! quietly exiting.

use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use cloudstage_bootstrap::platform::Platform;
use cloudstage_bootstrap::signals::{spawn_signal_listener, ShutdownToken};
use cloudstage_domain::services::{MergeMode, StateStore, UnstageHint};
use cloudstage_domain::StageError;

use crate::infrastructure::daemon::client::AgentClient;
use crate::infrastructure::daemon::protocol::{read_frame, write_frame, Request, Response, PROTOCOL_VERSION};
use crate::infrastructure::stores::MemoryStateStore;

/// Grace period between the state becoming empty and auto-shutdown.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Configuration for one agent daemon instance.
pub struct AgentConfig {
    /// Socket path; the parent directory must already exist with
    /// owner-only permissions.
    pub socket_path: PathBuf,
    /// Auto-shutdown grace period.
    pub grace_period: Duration,
    /// When true, the daemon never shuts itself down on emptiness.
    pub manual_mode: bool,
}

impl AgentConfig {
    /// Config with the default grace period and lifecycle read from the
    /// environment.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            grace_period: DEFAULT_GRACE_PERIOD,
            manual_mode: crate::infrastructure::config::manual_mode(),
        }
    }
}

/// The agent daemon.
pub struct AgentServer {
    config: AgentConfig,
    store: Arc<MemoryStateStore>,
    platform: Arc<dyn Platform>,
    shutdown: ShutdownToken,
}

impl AgentServer {
    pub fn new(config: AgentConfig, platform: Arc<dyn Platform>) -> Self {
        Self {
            config,
            store: Arc::new(MemoryStateStore::new()),
            platform,
            shutdown: ShutdownToken::new(),
        }
    }

    /// The shutdown token; tests and embedders may cancel it directly.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Runs the daemon until shutdown. Returns `Ok(())` both on a normal
    /// shutdown and when another live daemon already owns the socket.
    pub async fn run(self) -> Result<(), StageError> {
        let listener = match self.bind().await? {
            Some(listener) => listener,
            None => {
                info!("another agent already serves this socket; exiting");
                return Ok(());
            }
        };

        if let Err(e) = self.platform.lock_process_memory() {
            warn!("cannot lock process memory: {}; staged values may reach swap", e);
        }
        spawn_signal_listener(self.shutdown.clone());
        info!(socket = %self.config.socket_path.display(), "agent ready");

        let ctx = Arc::new(ConnectionContext {
            store: Arc::clone(&self.store),
            platform: Arc::clone(&self.platform),
            shutdown: self.shutdown.clone(),
            grace_period: self.config.grace_period,
            manual_mode: self.config.manual_mode,
        });

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            ctx.serve_connection(stream).await;
                        });
                    }
                    Err(e) => warn!("accept failed: {}", e),
                },
            }
        }

        self.teardown().await;
        Ok(())
    }

    /// Binds the socket create-or-fail. `Ok(None)` means a live daemon
    /// already owns it.
    async fn bind(&self) -> Result<Option<UnixListener>, StageError> {
        let path = &self.config.socket_path;
        match UnixListener::bind(path) {
            Ok(listener) => {
                self.restrict_socket()?;
                Ok(Some(listener))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                // Lost the bind race, or a previous daemon died without
                // unlinking. A ping tells the two cases apart.
                if AgentClient::new(path.clone()).ping().await.is_ok() {
                    return Ok(None);
                }
                debug!(socket = %path.display(), "removing stale socket");
                tokio::fs::remove_file(path)
                    .await
                    .map_err(|e| StageError::io(format!("cannot remove stale socket: {}", e)))?;
                let listener = UnixListener::bind(path)
                    .map_err(|e| StageError::io(format!("cannot bind {}: {}", path.display(), e)))?;
                self.restrict_socket()?;
                Ok(Some(listener))
            }
            Err(e) => Err(StageError::io(format!("cannot bind {}: {}", path.display(), e))),
        }
    }

    fn restrict_socket(&self) -> Result<(), StageError> {
        self.platform
            .set_permissions(&self.config.socket_path, 0o600)
            .map_err(|e| StageError::io(format!("cannot restrict socket: {}", e)))
    }

    async fn teardown(&self) {
        self.store.zeroize_and_clear();
        if let Err(e) = tokio::fs::remove_file(&self.config.socket_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("cannot unlink socket: {}", e);
            }
        }
        if let Err(e) = self.platform.unlock_process_memory() {
            debug!("cannot unlock process memory: {}", e);
        }
        info!("agent stopped");
    }
}

struct ConnectionContext {
    store: Arc<MemoryStateStore>,
    platform: Arc<dyn Platform>,
    shutdown: ShutdownToken,
    grace_period: Duration,
    manual_mode: bool,
}

impl ConnectionContext {
    async fn serve_connection(&self, mut stream: UnixStream) {
        if let Err(reason) = self.authenticate(&stream) {
            warn!("rejecting connection: {}", reason);
            let response = Response::from_error(&StageError::PeerAuth(reason));
            let _ = write_frame(&mut stream, &response).await;
            return;
        }

        loop {
            let request = match read_frame::<_, Request>(&mut stream).await {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    let _ = write_frame(&mut stream, &Response::from_error(&e)).await;
                    break;
                }
            };

            let wants_shutdown = matches!(request, Request::Shutdown);
            let response = self.handle(request).await;
            if write_frame(&mut stream, &response).await.is_err() {
                break;
            }
            if wants_shutdown {
                info!("shutdown requested over the socket");
                self.shutdown.cancel();
                break;
            }
        }
    }

    fn authenticate(&self, stream: &UnixStream) -> Result<(), String> {
        let peer = self
            .platform
            .peer_credentials(stream.as_raw_fd())
            .map_err(|e| format!("cannot read peer credentials: {}", e))?;
        let own_uid = self.platform.effective_uid();
        if peer.uid != own_uid {
            return Err(format!("peer uid {} does not match daemon uid {}", peer.uid, own_uid));
        }
        Ok(())
    }

    async fn handle(&self, request: Request) -> Response {
        let mutation = request.is_mutation();
        let farewell = match &request {
            Request::UnstageAll {
                hint: UnstageHint::Reset,
                ..
            } => "staged set reset",
            Request::UnstageAll {
                hint: UnstageHint::Persist,
                ..
            } => "staged set persisted elsewhere",
            _ => "staged set empty",
        };

        let response = self.dispatch(request).await;
        if mutation && matches!(response, Response::Ok | Response::State { .. }) {
            self.maybe_schedule_shutdown(farewell);
        }
        response
    }

    async fn dispatch(&self, request: Request) -> Response {
        let result = match request {
            Request::Ping => {
                return Response::Pong {
                    protocol_version: PROTOCOL_VERSION,
                }
            }
            Request::GetState => {
                return match self.store.load().await {
                    Ok(state) => Response::State { state },
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::Drain { service, keep } => {
                return match self.store.drain(service, keep).await {
                    Ok(state) => Response::State { state },
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::ListEntries { service } => {
                return match self.store.list_entries(service).await {
                    Ok(entries) => Response::Entries { entries },
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::ListTags { service } => {
                return match self.store.list_tags(service).await {
                    Ok(tags) => Response::Tags { tags },
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::SetState { state } => self.store.write_state(state, MergeMode::Overwrite).await,
            Request::WriteState { state } => self.store.write_state(state, MergeMode::Merge).await,
            Request::StageEntry { service, name, entry } => self.store.stage_entry(service, &name, entry).await,
            Request::UnstageEntry { service, name } => self.store.unstage_entry(service, &name).await,
            Request::StageTag { service, name, tags } => self.store.stage_tag(service, &name, tags).await,
            Request::UnstageTag { service, name } => self.store.unstage_tag(service, &name).await,
            Request::UnstageAll { service, hint } => self.store.unstage_all(service, hint).await,
            Request::Shutdown => Ok(()),
        };
        match result {
            Ok(()) => Response::Ok,
            Err(e) => Response::from_error(&e),
        }
    }

    /// Schedules auto-shutdown when the state just became empty.
    ///
    /// Any later mutation bumps the store generation and the timer stands
    /// down. The hint-derived farewell only changes the log line.
    fn maybe_schedule_shutdown(&self, farewell: &'static str) {
        if self.manual_mode || !self.store.is_empty() {
            return;
        }
        let generation = self.store.generation();
        let store = Arc::clone(&self.store);
        let token = self.shutdown.clone();
        let grace = self.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if store.generation() == generation && store.is_empty() && !token.is_cancelled() {
                info!("{}; shutting down", farewell);
                token.cancel();
            }
        });
    }
}
