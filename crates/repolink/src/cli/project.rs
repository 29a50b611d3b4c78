//! `repolink project list|edit`.
//!
//! `edit` is the settings-save path: it writes the legacy entry the UI reads
//! and records the edit so the next inward write-back leaves it alone.

use std::collections::HashSet;

use repolink_core::types::{LocalEdit, ProjectField, is_sentinel};
use repolink_core::validate::{check_remote_id, is_valid_repo_name};
use repolink_core::{Clock, SyncCoordinator};

use crate::error::CliError;

/// Requested changes; `None` leaves a field alone.
#[derive(Debug, Default)]
pub struct ProjectEdit {
    pub repo: Option<String>,
    pub owner: Option<String>,
    pub branch: Option<String>,
    pub title: Option<String>,
    pub private: Option<bool>,
}

/// What an edit actually changed.
#[derive(Debug, Default, PartialEq)]
pub struct EditResult {
    pub fields: Vec<ProjectField>,
    pub owner_changed: bool,
}

/// Handle the list command.
pub async fn handle_list(coordinator: &SyncCoordinator) -> Result<(), CliError> {
    let store = coordinator.store();
    let canonical = store
        .load_canonical(coordinator.clock().now())
        .await?
        .projects;
    let legacy = store.load_legacy().await?;

    if canonical.is_empty() && legacy.is_empty() {
        println!("No projects tracked.");
        return Ok(());
    }

    let mut listed = HashSet::new();
    for project in &canonical {
        listed.insert(project.remote_id.as_str());
        let owner = if project.repo_owner.is_empty() {
            "?"
        } else {
            project.repo_owner.as_str()
        };
        println!(
            "{}  {}/{}@{}  [{:?}] {}{}",
            project.remote_id,
            owner,
            project.repo_name,
            project.branch,
            project.sync_status,
            project.display_name,
            if project.is_private { " (private)" } else { "" }
        );
    }
    for (remote_id, entry) in &legacy {
        if listed.contains(remote_id.as_str()) {
            continue;
        }
        let note = if is_sentinel(remote_id) {
            "import placeholder"
        } else {
            "not migrated yet"
        };
        println!(
            "{}  {}@{}  ({}) {}",
            remote_id, entry.repo_name, entry.branch, note, entry.project_title
        );
    }
    Ok(())
}

/// Handle the edit command.
pub async fn handle_edit(
    coordinator: &SyncCoordinator,
    remote_id: &str,
    edit: ProjectEdit,
) -> Result<(), CliError> {
    let result = apply_edit(coordinator, remote_id, edit).await?;
    if result.fields.is_empty() && !result.owner_changed {
        println!("No changes made.");
        return Ok(());
    }
    println!("Updated {}:", remote_id);
    for field in &result.fields {
        println!("  {:?}", field);
    }
    if result.owner_changed {
        println!("  Owner");
    }
    Ok(())
}

pub async fn apply_edit(
    coordinator: &SyncCoordinator,
    remote_id: &str,
    edit: ProjectEdit,
) -> Result<EditResult, CliError> {
    check_remote_id(remote_id)?;
    if let Some(repo) = &edit.repo
        && !is_valid_repo_name(repo)
    {
        return Err(CliError::InvalidInput(format!(
            "Invalid repository name: {:?}",
            repo
        )));
    }
    if let Some(branch) = &edit.branch
        && (branch.is_empty() || branch.chars().any(char::is_whitespace))
    {
        return Err(CliError::InvalidInput(format!(
            "Invalid branch name: {:?}",
            branch
        )));
    }

    let local = LocalEdit {
        repo_name: edit.repo,
        branch: edit.branch,
        title: edit.title,
        is_private: edit.private,
    };
    let mut result = EditResult {
        fields: coordinator.save_local_edit(remote_id, &local).await?,
        owner_changed: false,
    };

    if let Some(owner) = edit.owner {
        result.owner_changed = coordinator.update_repo_owner(remote_id, &owner).await?;
    }

    Ok(result)
}
