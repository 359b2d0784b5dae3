// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cloudstage Binary
//!
//! Minimal command skeleton around the staging core. The full CLI command
//! tree (backend-facing add/edit/delete/tag/untag/diff/apply, prompts,
//! pagination, colors) lives in the outer distribution, which consumes
//! the use cases as a library. This binary carries what the core's own
//! lifecycle needs:
//!
//! - `agent` - the daemon in the foreground (the launcher re-execs the
//!   current binary with this subcommand)
//! - `status` / `reset` - store-local operations with no backend
//! - `stash push` / `stash pop` - state transfer between agent and file
//!
//! The stash file is sealed when `CLOUDSTAGE_PASSPHRASE` is set.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cloudstage_bootstrap::platform::{create_platform, Platform};
use cloudstage_bootstrap::secure::Passphrase;
use cloudstage_bootstrap::ExitCode;
use cloudstage_domain::services::{MergeMode, StateStore};
use cloudstage_domain::Service;

use cloudstage::application::use_cases::{
    ResetRequest, ResetUseCase, StashPopRequest, StashPopUseCase, StashPushRequest, StashPushUseCase,
    StatusRequest, StatusUseCase,
};
use cloudstage::infrastructure::config::{Identity, StagePaths};
use cloudstage::infrastructure::stores::FileStateStore;

/// Environment variable holding the stash file passphrase.
const ENV_PASSPHRASE: &str = "CLOUDSTAGE_PASSPHRASE";

#[derive(Parser)]
#[command(name = "cloudstage", version, about = "Staging core for cloud configuration stores")]
struct Cli {
    /// Account the staged set belongs to.
    #[arg(long)]
    account_id: String,

    /// Region the staged set belongs to.
    #[arg(long)]
    region: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent daemon in the foreground.
    Agent,

    /// Show the staged set.
    Status {
        /// Restrict to one service (param or secret).
        #[arg(long)]
        service: Option<CliService>,
        /// Restrict to one name.
        #[arg(long)]
        name: Option<String>,
        /// Read the stash file instead of the agent.
        #[arg(long)]
        file: bool,
    },

    /// Discard staged work.
    Reset {
        #[arg(long)]
        service: Option<CliService>,
        #[arg(long)]
        name: Option<String>,
        /// Reset the stash file instead of the agent.
        #[arg(long)]
        file: bool,
    },

    /// Move staged state between the agent and the stash file.
    Stash {
        #[command(subcommand)]
        command: StashCommands,
    },
}

#[derive(Subcommand)]
enum StashCommands {
    /// Agent → file.
    Push {
        #[arg(long, value_enum, default_value_t = CliMode::Merge)]
        mode: CliMode,
        #[arg(long)]
        service: Option<CliService>,
        /// Keep the agent state after pushing.
        #[arg(long)]
        keep: bool,
    },
    /// File → agent.
    Pop {
        #[arg(long, value_enum, default_value_t = CliMode::Merge)]
        mode: CliMode,
        #[arg(long)]
        service: Option<CliService>,
        /// Keep the stash file after popping.
        #[arg(long)]
        keep: bool,
        /// Deprecated alias for --mode overwrite.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliService {
    Param,
    Secret,
}

impl From<CliService> for Service {
    fn from(service: CliService) -> Service {
        match service {
            CliService::Param => Service::Param,
            CliService::Secret => Service::Secret,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMode {
    Merge,
    Overwrite,
}

impl From<CliMode> for MergeMode {
    fn from(mode: CliMode) -> MergeMode {
        match mode {
            CliMode::Merge => MergeMode::Merge,
            CliMode::Overwrite => MergeMode::Overwrite,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {:#}", e);
        ExitCode::Error.exit();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let platform: Arc<dyn Platform> = Arc::from(create_platform());
    let identity = Identity::new(&cli.account_id, &cli.region)?;
    let paths = StagePaths::discover(&*platform)?;

    match cli.command {
        Commands::Agent => run_agent(platform, &paths, &identity).await,
        Commands::Status { service, name, file } => {
            let store = select_store(&platform, &paths, &identity, file)?;
            let output = StatusUseCase::new(store)
                .execute(StatusRequest {
                    service: service.map(Into::into),
                    name,
                })
                .await?;
            if output.is_empty() {
                println!("nothing staged");
                return Ok(());
            }
            for (service, entries) in &output.entries {
                for (name, entry) in entries {
                    println!("{}\t{}\t{}", service, entry.operation, name);
                }
            }
            for (service, tags) in &output.tags {
                for (name, tag_entry) in tags {
                    println!(
                        "{}\ttags\t{} (+{} -{})",
                        service,
                        name,
                        tag_entry.add.len(),
                        tag_entry.remove.len()
                    );
                }
            }
            Ok(())
        }
        Commands::Reset { service, name, file } => {
            let store = select_store(&platform, &paths, &identity, file)?;
            let output = ResetUseCase::new(store)
                .execute(ResetRequest {
                    service: service.map(Into::into),
                    name,
                })
                .await?;
            println!("reset {} entries, {} tag sets", output.entries_reset, output.tags_reset);
            Ok(())
        }
        Commands::Stash { command } => run_stash(platform, &paths, &identity, command).await,
    }
}

#[cfg(unix)]
async fn run_agent(platform: Arc<dyn Platform>, paths: &StagePaths, identity: &Identity) -> Result<()> {
    use cloudstage::infrastructure::daemon::server::{AgentConfig, AgentServer};

    paths.ensure_runtime_dir(&*platform, identity)?;
    let config = AgentConfig::new(paths.socket_path(identity));
    AgentServer::new(config, platform).run().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn run_agent(_platform: Arc<dyn Platform>, _paths: &StagePaths, _identity: &Identity) -> Result<()> {
    anyhow::bail!("the agent daemon requires Unix domain sockets; use the stash file on this platform")
}

async fn run_stash(
    platform: Arc<dyn Platform>,
    paths: &StagePaths,
    identity: &Identity,
    command: StashCommands,
) -> Result<()> {
    let agent = agent_store(&platform, paths, identity, true)?;
    let file = file_store(&platform, paths, identity)?;

    match command {
        StashCommands::Push { mode, service, keep } => {
            let output = StashPushUseCase::new(agent, file)
                .execute(StashPushRequest {
                    mode: mode.into(),
                    service: service.map(Into::into),
                    keep,
                })
                .await?;
            if let Some(warning) = &output.warning {
                warn!("{}", warning);
            }
            println!(
                "pushed {} entries, {} tag sets{}",
                output.entry_count,
                output.tag_count,
                if output.merged { " (merged)" } else { "" }
            );
            Ok(())
        }
        StashCommands::Pop {
            mode,
            service,
            keep,
            force,
        } => {
            let mode = if force { MergeMode::Overwrite } else { mode.into() };
            let output = StashPopUseCase::new(agent, file)
                .execute(StashPopRequest {
                    mode,
                    service: service.map(Into::into),
                    keep,
                })
                .await?;
            if let Some(warning) = &output.warning {
                warn!("{}", warning);
            }
            println!(
                "popped {} entries, {} tag sets{}",
                output.entry_count,
                output.tag_count,
                if output.merged { " (merged)" } else { "" }
            );
            Ok(())
        }
    }
}

/// The store a command targets: the agent by default, the stash file with
/// `--file`.
fn select_store(
    platform: &Arc<dyn Platform>,
    paths: &StagePaths,
    identity: &Identity,
    file: bool,
) -> Result<Arc<dyn StateStore>> {
    if file {
        file_store(platform, paths, identity)
    } else {
        agent_store(platform, paths, identity, false)
    }
}

fn file_store(platform: &Arc<dyn Platform>, paths: &StagePaths, identity: &Identity) -> Result<Arc<dyn StateStore>> {
    paths.ensure_state_dir(&**platform, identity)?;
    let path = paths.state_file(identity);
    let store = match std::env::var(ENV_PASSPHRASE) {
        Ok(secret) if !secret.is_empty() => FileStateStore::with_passphrase(path, Passphrase::from(secret)),
        _ => FileStateStore::new(path),
    };
    Ok(Arc::new(store))
}

#[cfg(unix)]
fn agent_store(
    platform: &Arc<dyn Platform>,
    paths: &StagePaths,
    identity: &Identity,
    spawn_on_demand: bool,
) -> Result<Arc<dyn StateStore>> {
    use cloudstage::infrastructure::daemon::client::AgentClient;
    use cloudstage::infrastructure::daemon::launcher::AgentLauncher;
    use cloudstage::infrastructure::stores::AgentStateStore;

    paths.ensure_runtime_dir(&**platform, identity)?;
    let client = AgentClient::new(paths.socket_path(identity));
    let store = if spawn_on_demand {
        use anyhow::Context;
        let program = std::env::current_exe().context("cannot locate the current executable")?;
        let args = vec![
            "--account-id".to_string(),
            identity.account_id.clone(),
            "--region".to_string(),
            identity.region.clone(),
            "agent".to_string(),
        ];
        let launcher = AgentLauncher::new(Arc::clone(platform), client.clone(), program, args);
        AgentStateStore::with_launcher(client, launcher)
    } else {
        AgentStateStore::new(client)
    };
    Ok(Arc::new(store))
}

#[cfg(not(unix))]
fn agent_store(
    _platform: &Arc<dyn Platform>,
    _paths: &StagePaths,
    _identity: &Identity,
    _spawn_on_demand: bool,
) -> Result<Arc<dyn StateStore>> {
    anyhow::bail!("the agent daemon requires Unix domain sockets; use --file on this platform")
}
