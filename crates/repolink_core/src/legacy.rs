//! Legacy settings map ⇄ canonical project list.
//!
//! The legacy map is still what UI surfaces read and edit, so it is
//! authoritative for `repoName`, `branch`, title and `isPrivate` when moving
//! data into the canonical list. Writing back goes the other way and yields
//! to recent user edits tracked by [`RaceWindowGuard`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::fresh_install::FreshInstallDetector;
use crate::race_guard::RaceWindowGuard;
use crate::resolver::dedupe_by_remote_id;
use crate::store::ProjectStore;
use crate::types::{CanonicalProject, LegacyProjectEntry, SyncStatus, is_sentinel};

/// What one `migrate_legacy_to_canonical` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Schema-incomplete records upgraded in this call.
    pub backfilled: usize,
    /// Canonical projects created from legacy entries.
    pub created: usize,
    /// Canonical projects overwritten from legacy entries.
    pub updated: usize,
}

impl MigrationOutcome {
    /// True when the call only upgraded stored records. Callers end the sync
    /// pass there; the upgrade is the pass's work.
    pub fn backfilled(&self) -> bool {
        self.backfilled > 0
    }
}

/// What one `push_canonical_to_legacy` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyPushOutcome {
    /// Legacy entries created or changed.
    pub written: usize,
    /// Projects left alone because of a recent local edit.
    pub protected: usize,
}

/// Two-way converter between the legacy settings map and canonical projects.
#[derive(Clone)]
pub struct LegacyFormatBridge {
    store: ProjectStore,
    clock: Arc<dyn Clock>,
    guard: RaceWindowGuard,
    detector: FreshInstallDetector,
}

impl LegacyFormatBridge {
    /// Create a bridge over `store`.
    pub fn new(
        store: ProjectStore,
        clock: Arc<dyn Clock>,
        guard: RaceWindowGuard,
        detector: FreshInstallDetector,
    ) -> Self {
        Self {
            store,
            clock,
            guard,
            detector,
        }
    }

    /// Bring every legacy entry into the canonical list.
    ///
    /// Stored records in an older schema are upgraded first; if any were, the
    /// upgraded list is saved and nothing else happens in this call.
    pub async fn migrate_legacy_to_canonical(&self) -> Result<MigrationOutcome> {
        let now = self.clock.now();
        let loaded = self.store.load_canonical(now).await?;

        if loaded.upgraded > 0 {
            self.store.save_canonical(&loaded.projects).await?;
            info!(
                "Backfilled {} schema-incomplete project record(s)",
                loaded.upgraded
            );
            return Ok(MigrationOutcome {
                backfilled: loaded.upgraded,
                ..MigrationOutcome::default()
            });
        }

        let legacy = self.store.load_legacy().await?;
        let (mut projects, duplicates) = dedupe_by_remote_id(loaded.projects);
        let mut outcome = MigrationOutcome {
            updated: duplicates,
            ..MigrationOutcome::default()
        };

        let mut index: HashMap<String, usize> = projects
            .iter()
            .enumerate()
            .map(|(i, p)| (p.remote_id.clone(), i))
            .collect();

        for (remote_id, entry) in &legacy {
            if is_sentinel(remote_id) {
                continue;
            }
            match index.get(remote_id) {
                Some(&i) => {
                    let project = &mut projects[i];
                    if differs_from_legacy(project, entry) {
                        project.repo_name = entry.repo_name.clone();
                        project.branch = entry.branch.clone();
                        project.display_name = entry.project_title.clone();
                        project.is_private = entry.is_private;
                        project.last_modified = now;
                        project.version += 1;
                        project.sync_status = SyncStatus::Pending;
                        outcome.updated += 1;
                    }
                }
                None => {
                    index.insert(remote_id.clone(), projects.len());
                    projects.push(CanonicalProject::from_legacy(remote_id, entry, now));
                    outcome.created += 1;
                }
            }
        }

        if outcome.created + outcome.updated > 0 {
            self.store.save_canonical(&projects).await?;
            debug!(
                "Migrated legacy settings: {} created, {} updated",
                outcome.created, outcome.updated
            );
            if let Err(e) = self
                .detector
                .record_projects_created(outcome.created as u64)
                .await
            {
                warn!("Failed to bump lifetime project count: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Write every canonical project into the legacy map, keeping extended
    /// metadata already present there. Projects with a recent local edit are
    /// skipped whole.
    pub async fn push_canonical_to_legacy(&self) -> Result<LegacyPushOutcome> {
        let projects = self.store.load_canonical(self.clock.now()).await?.projects;
        // The save below replaces the whole document, so legacy is read after
        // the edit records: an edit recorded by then is already in this read.
        let recent = self.guard.get_recent_changes().await?;
        let mut legacy = self.store.load_legacy().await?;

        let mut outcome = LegacyPushOutcome::default();
        for project in &projects {
            if is_sentinel(&project.remote_id) {
                continue;
            }
            if recent.contains_key(&project.remote_id) || recent.contains_key(&project.id) {
                debug!(
                    "Skipping legacy write for {}: edited within race window",
                    project.remote_id
                );
                outcome.protected += 1;
                continue;
            }

            let entry = legacy.entry(project.remote_id.clone()).or_default();
            if differs_from_legacy(project, entry) {
                entry.repo_name = project.repo_name.clone();
                entry.branch = project.branch.clone();
                entry.project_title = project.display_name.clone();
                entry.is_private = project.is_private;
                outcome.written += 1;
            }
        }

        if outcome.written > 0 {
            self.store.save_legacy(&legacy).await?;
        }
        Ok(outcome)
    }
}

fn differs_from_legacy(project: &CanonicalProject, entry: &LegacyProjectEntry) -> bool {
    project.repo_name != entry.repo_name
        || project.branch != entry.branch
        || project.display_name != entry.project_title
        || project.is_private != entry.is_private
}
