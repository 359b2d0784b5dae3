// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Wire Protocol
//!
//! Length-prefixed JSON frames over the agent's Unix socket. Each frame is
//! a big-endian `u32` length followed by one serialized [`Request`] or
//! [`Response`]. State payloads use the same schema as the persisted file
//! (plaintext; the socket is local, 0600, and peer-authenticated).
//!
//! Frames are capped at 64 MiB to bound allocation against a corrupt
//! length prefix; real staged states are orders of magnitude smaller.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use cloudstage_domain::services::UnstageHint;
use cloudstage_domain::{Entry, Service, StageError, State, TagEntry};

/// Version of this wire protocol; carried in every pong.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// A command sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "snake_case")]
pub enum Request {
    /// Liveness and version probe.
    Ping,
    /// Read the whole held state.
    GetState,
    /// Replace the whole held state.
    SetState { state: State },
    /// Merge a state into the held one (incoming wins on collisions).
    WriteState { state: State },
    /// Insert or replace one entry.
    StageEntry {
        service: Service,
        name: String,
        entry: Entry,
    },
    /// Remove one entry.
    UnstageEntry { service: Service, name: String },
    /// Insert or replace one tag entry.
    StageTag {
        service: Service,
        name: String,
        tags: TagEntry,
    },
    /// Remove one tag entry.
    UnstageTag { service: Service, name: String },
    /// List entries for one service.
    ListEntries { service: Service },
    /// List tag entries for one service.
    ListTags { service: Service },
    /// Empty the held state, or one service's portion. The hint flavors
    /// the daemon's farewell log line and nothing else.
    UnstageAll {
        service: Option<Service>,
        hint: UnstageHint,
    },
    /// Read the state, optionally filtered, removing the returned portion
    /// unless `keep`.
    Drain {
        service: Option<Service>,
        keep: bool,
    },
    /// Ask the daemon to exit.
    Shutdown,
}

impl Request {
    /// Whether this command can change the held state.
    pub fn is_mutation(&self) -> bool {
        match self {
            Request::SetState { .. }
            | Request::WriteState { .. }
            | Request::StageEntry { .. }
            | Request::UnstageEntry { .. }
            | Request::StageTag { .. }
            | Request::UnstageTag { .. }
            | Request::UnstageAll { .. } => true,
            Request::Drain { keep, .. } => !keep,
            Request::Ping
            | Request::GetState
            | Request::ListEntries { .. }
            | Request::ListTags { .. }
            | Request::Shutdown => false,
        }
    }

}

/// A reply sent by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Reply to [`Request::Ping`].
    Pong { protocol_version: u32 },
    /// The command succeeded with nothing to return.
    Ok,
    /// A whole state.
    State { state: State },
    /// Entries for one service.
    Entries { entries: BTreeMap<String, Entry> },
    /// Tag entries for one service.
    Tags { tags: BTreeMap<String, TagEntry> },
    /// The command failed; `kind` is the stable machine name from the
    /// error taxonomy.
    Error { kind: String, message: String },
}

impl Response {
    /// Wraps a [`StageError`] for the wire.
    pub fn from_error(err: &StageError) -> Self {
        Response::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Writes one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), StageError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len()).map_err(|_| StageError::io("frame too large"))?;
    if len > MAX_FRAME_LEN {
        return Err(StageError::io("frame too large"));
    }
    writer.write_all(&len.to_be_bytes()).await.map_err(io_err)?;
    writer.write_all(&payload).await.map_err(io_err)?;
    writer.flush().await.map_err(io_err)?;
    Ok(())
}

/// Reads one frame; `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, StageError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_err(e)),
    }
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(StageError::io(format!("oversized frame ({} bytes)", len)));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(io_err)?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

fn io_err(e: std::io::Error) -> StageError {
    StageError::io(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &Request::Ping).await.unwrap();
        write_frame(
            &mut buffer,
            &Request::UnstageEntry {
                service: Service::Param,
                name: "/a".to_string(),
            },
        )
        .await
        .unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        let first: Request = read_frame(&mut cursor).await.unwrap().unwrap();
        assert!(matches!(first, Request::Ping));
        let second: Request = read_frame(&mut cursor).await.unwrap().unwrap();
        match second {
            Request::UnstageEntry { service, name } => {
                assert_eq!(service, Service::Param);
                assert_eq!(name, "/a");
            }
            other => panic!("unexpected request {:?}", other),
        }
        let end: Option<Request> = read_frame(&mut cursor).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buffer);
        let err = read_frame::<_, Request>(&mut cursor).await.unwrap_err();
        assert!(err.to_string().contains("oversized"));
    }

    #[test]
    fn test_mutation_classification() {
        assert!(!Request::Ping.is_mutation());
        assert!(!Request::GetState.is_mutation());
        assert!(!Request::Shutdown.is_mutation());
        assert!(Request::UnstageAll {
            service: None,
            hint: UnstageHint::Reset
        }
        .is_mutation());
        assert!(Request::Drain {
            service: None,
            keep: false
        }
        .is_mutation());
        assert!(!Request::Drain {
            service: None,
            keep: true
        }
        .is_mutation());
    }

    #[test]
    fn test_error_response_carries_machine_kind() {
        let response = Response::from_error(&StageError::not_staged("/a"));
        match response {
            Response::Error { kind, .. } => assert_eq!(kind, "not_staged"),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_wire_shape_is_tagged() {
        let json = serde_json::to_value(&Request::ListEntries { service: Service::Secret }).unwrap();
        assert_eq!(json["command"], "list_entries");
        assert_eq!(json["payload"]["service"], "secret");

        let json = serde_json::to_value(&Response::Pong {
            protocol_version: PROTOCOL_VERSION,
        })
        .unwrap();
        assert_eq!(json["status"], "pong");
    }
}
