//! Command dispatch.

pub mod args;
mod config;
mod project;
mod sync;

use std::sync::Arc;

use repolink_core::{
    Clock, HttpSyncBackend, JsonFileStore, StaticAuthProvider, SyncCoordinator, SystemClock,
};
use tracing::info;

use crate::config::Config;
use crate::error::CliError;
use args::{Cli, Command, ProjectCommands, SyncCommands};

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Config {
            server,
            token,
            data_path,
            show,
        } => config::handle_config(
            config,
            cli.config.as_deref(),
            config::ConfigChanges {
                server,
                token,
                data_path,
            },
            show,
        ),
        Command::Sync { command } => {
            let config = config.with_env_overrides();
            let coordinator = open(&config).await?;
            match command {
                SyncCommands::Push => sync::handle_push(&coordinator).await,
                SyncCommands::Pull => sync::handle_pull(&coordinator).await,
                SyncCommands::Status => sync::handle_status(&coordinator, &config).await,
            }
        }
        Command::Project { command } => {
            let coordinator = open(&config.with_env_overrides()).await?;
            match command {
                ProjectCommands::List => project::handle_list(&coordinator).await,
                ProjectCommands::Edit {
                    remote_id,
                    repo,
                    owner,
                    branch,
                    title,
                    private,
                } => {
                    let edit = project::ProjectEdit {
                        repo,
                        owner,
                        branch,
                        title,
                        private,
                    };
                    project::handle_edit(&coordinator, &remote_id, edit).await
                }
            }
        }
    }
}

/// Wire the engine to the on-disk registry and the HTTP backend.
async fn open(config: &Config) -> Result<SyncCoordinator, CliError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let coordinator = SyncCoordinator::new(
        Arc::new(JsonFileStore::new(config.data_path.clone())),
        Arc::new(HttpSyncBackend::new(&config.sync)?),
        Arc::new(StaticAuthProvider::from_option(config.auth_token.clone())),
        clock.clone(),
        config.sync.clone(),
    );

    if coordinator.detector().record_install(clock.now()).await? {
        info!("Recorded install date for {}", config.data_path.display());
    }
    Ok(coordinator)
}
