// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Launcher
//!
//! Spawns the agent daemon on demand. `ensure_running` pings first, forks
//! a detached process running the current binary in agent mode, then polls
//! the socket with exponential backoff (~3 s total). Two racing launchers
//! converge: the daemon's socket bind is create-or-fail and the loser's
//! poll finds the winner.
//!
//! `DAEMON_AUTO_START=0` turns the spawn into a hard
//! `DaemonUnreachable`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use cloudstage_bootstrap::platform::Platform;
use cloudstage_domain::StageError;

use crate::infrastructure::config;
use crate::infrastructure::daemon::client::AgentClient;

/// Poll delays after a spawn; roughly three seconds in total.
const BACKOFF_DELAYS_MS: [u64; 6] = [50, 100, 200, 400, 800, 1600];

/// On-demand spawner for the agent daemon.
pub struct AgentLauncher {
    platform: Arc<dyn Platform>,
    client: AgentClient,
    /// Binary to exec; normally the current executable.
    program: PathBuf,
    /// Arguments that put the binary into foreground agent mode.
    args: Vec<String>,
}

impl AgentLauncher {
    pub fn new(platform: Arc<dyn Platform>, client: AgentClient, program: PathBuf, args: Vec<String>) -> Self {
        Self {
            platform,
            client,
            program,
            args,
        }
    }

    /// Ensures a daemon is serving the socket, spawning one if allowed.
    pub async fn ensure_running(&self) -> Result<(), StageError> {
        if self.client.ping().await.is_ok() {
            return Ok(());
        }

        if !config::auto_start_enabled() {
            return Err(StageError::daemon_unreachable(
                "agent is not running and auto-start is disabled",
            ));
        }

        info!(program = %self.program.display(), "starting agent daemon");
        self.platform
            .spawn_detached(&self.program, &self.args)
            .map_err(|e| StageError::daemon_unreachable(format!("cannot spawn agent: {}", e)))?;

        for delay_ms in BACKOFF_DELAYS_MS {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match self.client.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => debug!("agent not up yet: {}", e),
            }
        }

        Err(StageError::daemon_unreachable(
            "agent did not come up within the startup window",
        ))
    }
}
