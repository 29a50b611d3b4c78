use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "repolink")]
#[command(about = "Keep project ⇄ GitHub repository links in sync with the backend")]
#[command(version)]
pub struct Cli {
    /// Use this config file instead of ~/.config/repolink/config.toml
    #[arg(long, global = true, env = "REPOLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run sync passes against the backend
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Inspect and edit tracked projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Show or change configuration
    Config {
        /// Backend base URL
        #[arg(long)]
        server: Option<String>,

        /// Backend bearer token
        #[arg(long)]
        token: Option<String>,

        /// Path of the local registry document
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Print the current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Outward pass: send local projects to the backend
    Push,
    /// Inward pass: merge backend projects into the local registry
    Pull,
    /// Show sync state and gate decisions
    Status,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List tracked projects
    List,

    /// Edit a project's settings
    Edit {
        /// Remote id of the project
        remote_id: String,

        /// Repository name
        #[arg(long)]
        repo: Option<String>,

        /// Repository owner
        #[arg(long)]
        owner: Option<String>,

        /// Target branch
        #[arg(long)]
        branch: Option<String>,

        /// Project title
        #[arg(long)]
        title: Option<String>,

        /// Whether the repository is private
        #[arg(long)]
        private: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_edit() {
        let cli = Cli::try_parse_from([
            "repolink",
            "project",
            "edit",
            "abc",
            "--branch",
            "dev",
            "--private",
            "true",
        ])
        .unwrap();

        match cli.command {
            Command::Project {
                command:
                    ProjectCommands::Edit {
                        remote_id,
                        branch,
                        private,
                        repo,
                        ..
                    },
            } => {
                assert_eq!(remote_id, "abc");
                assert_eq!(branch.as_deref(), Some("dev"));
                assert_eq!(private, Some(true));
                assert!(repo.is_none());
            }
            _ => panic!("expected project edit"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["repolink", "sync", "push", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Command::Sync {
                command: SyncCommands::Push
            }
        ));
    }

    #[test]
    fn test_unknown_sync_command_rejected() {
        assert!(Cli::try_parse_from(["repolink", "sync", "start"]).is_err());
    }
}
