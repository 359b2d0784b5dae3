// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Client
//!
//! Thin wrapper that serializes commands to the agent socket. Each call
//! opens a fresh connection, sends one frame, and reads one reply under a
//! deadline; cancellation or timeout cuts the in-flight read and the
//! caller never observes partial state.
//!
//! A failed [`AgentClient::ping`] means "no daemon" to callers doing fast
//! reads: nothing staged, not a store error.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UnixStream;

use cloudstage_domain::StageError;

use crate::infrastructure::daemon::protocol::{read_frame, write_frame, Request, Response, PROTOCOL_VERSION};

/// Hard timeout for liveness probes.
pub const PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Default deadline for ordinary commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one agent socket.
#[derive(Clone)]
pub struct AgentClient {
    socket_path: PathBuf,
}

impl AgentClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// The socket this client talks to.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Liveness and version probe with a short hard timeout.
    pub async fn ping(&self) -> Result<(), StageError> {
        match self.request(&Request::Ping, PING_TIMEOUT).await? {
            Response::Pong { protocol_version } if protocol_version == PROTOCOL_VERSION => Ok(()),
            Response::Pong { protocol_version } => Err(StageError::ProtocolVersion {
                expected: PROTOCOL_VERSION,
                actual: protocol_version,
            }),
            other => Err(StageError::daemon_unreachable(format!(
                "unexpected ping reply: {:?}",
                other
            ))),
        }
    }

    /// Sends one command and returns the reply, converting wire errors
    /// back into their [`StageError`] kinds.
    pub async fn send(&self, request: &Request, deadline: Duration) -> Result<Response, StageError> {
        match self.request(request, deadline).await? {
            Response::Error { kind, message } => Err(StageError::from_wire(&kind, &message)),
            response => Ok(response),
        }
    }

    async fn request(&self, request: &Request, deadline: Duration) -> Result<Response, StageError> {
        tokio::time::timeout(deadline, self.round_trip(request))
            .await
            .map_err(|_| StageError::daemon_unreachable(format!("agent did not reply within {:?}", deadline)))?
    }

    async fn round_trip(&self, request: &Request) -> Result<Response, StageError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| StageError::daemon_unreachable(format!("{}: {}", self.socket_path.display(), e)))?;
        write_frame(&mut stream, request).await?;
        match read_frame::<_, Response>(&mut stream).await? {
            Some(response) => Ok(response),
            None => Err(StageError::daemon_unreachable("agent closed the connection")),
        }
    }
}
