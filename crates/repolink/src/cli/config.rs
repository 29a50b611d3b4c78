//! `repolink config`.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CliError;

#[derive(Debug, Default)]
pub struct ConfigChanges {
    pub server: Option<String>,
    pub token: Option<String>,
    pub data_path: Option<PathBuf>,
}

impl ConfigChanges {
    fn is_empty(&self) -> bool {
        self.server.is_none() && self.token.is_none() && self.data_path.is_none()
    }
}

/// Handle the config command - show or update configuration.
pub fn handle_config(
    config: Config,
    path: Option<&Path>,
    changes: ConfigChanges,
    show: bool,
) -> Result<(), CliError> {
    if changes.is_empty() {
        print_config(&config);
        return Ok(());
    }

    let (new_config, applied) = apply_changes(config, changes);
    match path {
        Some(path) => new_config.save_to(path)?,
        None => new_config.save()?,
    }

    println!("Configuration updated:");
    for change in applied {
        println!("  {}", change);
    }
    if show {
        println!();
        print_config(&new_config);
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Server URL: {}", config.sync.server_url);
    println!(
        "Token: {}",
        if config.auth_token.is_some() {
            "set"
        } else {
            "(not set)"
        }
    );
    println!("Data path: {}", config.data_path.display());
    println!(
        "Timeouts: {}s request, {}s connect",
        config.sync.request_timeout_secs, config.sync.connect_timeout_secs
    );
    println!("Race window: {}ms", config.sync.race_window_ms);
    println!(
        "Inward gate: at most {} project(s), {:?} on storage errors",
        config.sync.inward_gate_max_projects, config.sync.inward_gate_on_storage_error
    );
}

fn apply_changes(mut config: Config, changes: ConfigChanges) -> (Config, Vec<String>) {
    let mut applied = Vec::new();

    if let Some(server) = changes.server {
        applied.push(format!("Server URL: {}", server));
        config.sync.server_url = server;
    }
    if let Some(token) = changes.token {
        if token.is_empty() {
            config.auth_token = None;
            applied.push("Token: cleared".to_string());
        } else {
            config.auth_token = Some(token);
            applied.push("Token: set".to_string());
        }
    }
    if let Some(data_path) = changes.data_path {
        applied.push(format!("Data path: {}", data_path.display()));
        config.data_path = data_path;
    }

    (config, applied)
}
