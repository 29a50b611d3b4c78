//! `repolink sync push|pull|status`.

use repolink_core::{Clock, SyncCoordinator, SyncDirection, SyncPhase, SyncResponse};

use crate::config::Config;
use crate::error::CliError;

/// Handle the push command - run one outward pass.
pub async fn handle_push(coordinator: &SyncCoordinator) -> Result<(), CliError> {
    match coordinator.perform_outward_sync().await? {
        Some(response) => {
            println!("Push complete.");
            print_summary(&response);
        }
        None => print_skip_reason(coordinator, SyncDirection::Outward).await,
    }
    Ok(())
}

/// Handle the pull command - run one inward pass.
pub async fn handle_pull(coordinator: &SyncCoordinator) -> Result<(), CliError> {
    match coordinator.perform_inward_sync().await? {
        Some(response) => {
            println!("Pull complete.");
            print_summary(&response);
        }
        None => print_skip_reason(coordinator, SyncDirection::Inward).await,
    }
    Ok(())
}

fn print_summary(response: &SyncResponse) {
    println!("  Updated on server: {}", response.updated_projects.len());
    println!("  Deleted on server: {}", response.deleted_projects.len());
    println!("  Conflicts: {}", response.conflicts.len());
    for conflict in &response.conflicts {
        println!(
            "    {} ({}): {}",
            conflict.project.remote_id, conflict.conflict_kind, conflict.message
        );
    }
}

async fn print_skip_reason(coordinator: &SyncCoordinator, direction: SyncDirection) {
    if coordinator.last_phase(direction) == SyncPhase::Done {
        println!("Stored project records were upgraded. Run the command again to sync.");
        return;
    }
    if direction == SyncDirection::Inward && !coordinator.should_perform_inward_sync().await {
        println!(
            "Pull skipped: more than {} project(s) are tracked locally.",
            coordinator.settings().inward_gate_max_projects
        );
        println!("Import additional projects explicitly instead.");
        return;
    }
    println!("Sync skipped: not signed in.");
    println!("Set a token first:");
    println!("  repolink config --token <token>");
}

/// Handle the status command - show sync state.
pub async fn handle_status(coordinator: &SyncCoordinator, config: &Config) -> Result<(), CliError> {
    let store = coordinator.store();
    let now = coordinator.clock().now();

    println!("Sync Status");
    println!("===========");
    println!();
    println!("Server: {}", coordinator.settings().server_url);
    println!(
        "Account: {}",
        if config.auth_token.is_some() {
            "signed in"
        } else {
            "(not signed in)"
        }
    );
    println!("Data: {}", config.data_path.display());

    match store.last_sync_timestamp().await? {
        Some(at) => println!("Last sync: {}", at.to_rfc3339()),
        None => println!("Last sync: (never)"),
    }
    match store.install_date().await? {
        Some(at) => println!("Installed: {}", at.to_rfc3339()),
        None => println!("Installed: (unknown)"),
    }

    let legacy = store.load_legacy().await?;
    let canonical = store.load_canonical(now).await?;
    println!();
    println!("Projects");
    println!("  Legacy settings entries: {}", legacy.len());
    println!("  Canonical projects: {}", canonical.projects.len());
    if canonical.upgraded > 0 {
        println!("  Awaiting schema upgrade: {}", canonical.upgraded);
    }
    println!(
        "  Tracked (distinct): {}",
        store.tracked_project_count(now).await?
    );

    println!();
    println!(
        "Fresh install: {}",
        if coordinator.detector().is_fresh_install().await {
            "yes (outward sync will not signal deletions)"
        } else {
            "no"
        }
    );
    println!(
        "Inward sync: {}",
        if coordinator.should_perform_inward_sync().await {
            "allowed"
        } else {
            "skipped (too many tracked projects)"
        }
    );

    let recent = coordinator.guard().get_recent_changes().await?;
    if !recent.is_empty() {
        println!();
        println!("Recently edited (protected from write-back):");
        for (id, change) in recent {
            println!(
                "  {} {:?} ({}s ago)",
                id,
                change.fields,
                change.age.num_seconds()
            );
        }
    }
    Ok(())
}
