//! Directional merge and deletion classification.
//!
//! Inward sync is additive: server projects are merged into the local set by
//! remote id and nothing local is removed. Outward sync may signal deletions
//! by omission, but only from an established install.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::fresh_install::FreshInstallDetector;
use crate::types::{BackendProject, CanonicalProject, SyncStatus, is_sentinel};
use crate::validate::is_valid_remote_id;

/// Outgoing set for one outward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OutwardPlan {
    /// Projects to send.
    pub outgoing: Vec<CanonicalProject>,
    /// Remote ids present in the canonical set but gone from the legacy map.
    pub deletion_candidates: Vec<String>,
    /// Whether the install was classified fresh.
    pub fresh_install: bool,
}

impl OutwardPlan {
    /// True when candidates were left out of the payload.
    pub fn signals_deletions(&self) -> bool {
        !self.fresh_install && !self.deletion_candidates.is_empty()
    }
}

/// Result of an inward merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Merged set, local order first then new server projects.
    pub projects: Vec<CanonicalProject>,
    /// Server projects with no local counterpart.
    pub inserted: usize,
    /// Local projects whose fields changed.
    pub updated: usize,
}

/// Merges local and remote project sets per direction.
#[derive(Clone)]
pub struct ConflictResolver {
    detector: FreshInstallDetector,
}

impl ConflictResolver {
    /// Create a resolver consulting `detector` for outward deletions.
    pub fn new(detector: FreshInstallDetector) -> Self {
        Self { detector }
    }

    /// Additive inward merge keyed by remote id.
    ///
    /// Matched projects take server values but keep their local `id`, and
    /// keep the local `repoName`/`branch` where the server sends them empty.
    /// Unmatched server projects are inserted with `id = remoteId`.
    pub fn merge_server_into_local(
        &self,
        local: Vec<CanonicalProject>,
        server: &[BackendProject],
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        let (mut projects, _) = dedupe_by_remote_id(local);
        let mut index: HashMap<String, usize> = projects
            .iter()
            .enumerate()
            .map(|(i, p)| (p.remote_id.clone(), i))
            .collect();
        let mut outcome = MergeOutcome::default();

        for incoming in server {
            if is_sentinel(&incoming.remote_id) || !is_valid_remote_id(&incoming.remote_id) {
                debug!("Ignoring server project with id {:?}", incoming.remote_id);
                continue;
            }
            match index.get(&incoming.remote_id) {
                Some(&i) => {
                    if apply_server_fields(&mut projects[i], incoming, now) {
                        outcome.updated += 1;
                    }
                }
                None => {
                    index.insert(incoming.remote_id.clone(), projects.len());
                    projects.push(CanonicalProject::from_backend(incoming, now));
                    outcome.inserted += 1;
                }
            }
        }

        outcome.projects = projects;
        outcome
    }

    /// Split the canonical set into what goes out and what counts as deleted.
    ///
    /// A canonical project whose remote id is not in `legacy_ids` is a
    /// deletion candidate. From a fresh install candidates stay in the
    /// payload; otherwise they are left out, which the backend reads as a
    /// deletion.
    pub async fn classify_outward_deletions(
        &self,
        legacy_ids: &HashSet<String>,
        canonical: &[CanonicalProject],
    ) -> OutwardPlan {
        let deletion_candidates: Vec<String> = canonical
            .iter()
            .filter(|p| !is_sentinel(&p.remote_id) && !legacy_ids.contains(&p.remote_id))
            .map(|p| p.remote_id.clone())
            .collect();

        if deletion_candidates.is_empty() {
            return OutwardPlan {
                outgoing: canonical.to_vec(),
                deletion_candidates,
                fresh_install: false,
            };
        }

        let fresh_install = self.detector.is_fresh_install().await;
        let outgoing = if fresh_install {
            info!(
                "Fresh install: keeping {} deletion candidate(s) in outward payload",
                deletion_candidates.len()
            );
            canonical.to_vec()
        } else {
            info!(
                "Signalling deletion of {} project(s): {:?}",
                deletion_candidates.len(),
                deletion_candidates
            );
            canonical
                .iter()
                .filter(|p| !deletion_candidates.contains(&p.remote_id))
                .cloned()
                .collect()
        };

        OutwardPlan {
            outgoing,
            deletion_candidates,
            fresh_install,
        }
    }
}

/// Returns true when any field changed.
fn apply_server_fields(
    local: &mut CanonicalProject,
    server: &BackendProject,
    now: DateTime<Utc>,
) -> bool {
    let mut merged = local.clone();
    merged.display_name = server.display_name.clone();
    merged.repo_owner = server.repo_owner.clone();
    if !server.repo_name.is_empty() {
        merged.repo_name = server.repo_name.clone();
    }
    if !server.branch.is_empty() {
        merged.branch = server.branch.clone();
    }
    merged.is_private = server.is_private;
    if !server.metadata.is_empty() {
        merged.metadata = server.metadata.clone();
    }
    merged.sync_status = SyncStatus::Synced;

    let changed = merged.display_name != local.display_name
        || merged.repo_owner != local.repo_owner
        || merged.repo_name != local.repo_name
        || merged.branch != local.branch
        || merged.is_private != local.is_private
        || merged.metadata != local.metadata;
    if changed {
        merged.last_modified = server.last_modified.unwrap_or(now);
        merged.version += 1;
    }
    *local = merged;
    changed
}

/// Drop later entries that repeat a remote id. Returns the count dropped.
pub fn dedupe_by_remote_id(projects: Vec<CanonicalProject>) -> (Vec<CanonicalProject>, usize) {
    let before = projects.len();
    let mut seen = HashSet::new();
    let kept: Vec<_> = projects
        .into_iter()
        .filter(|p| seen.insert(p.remote_id.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
