//! Data model shared by every component of the engine.
//!
//! Field names on the wire and in storage are camelCase so documents written
//! by other clients of the same stores deserialize unchanged.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Remote id of a transient, never-synced import placeholder.
pub const SENTINEL_REMOTE_ID: &str = "github.com";

/// Schema version written with every stored canonical record.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Whether `remote_id` is the import placeholder.
pub fn is_sentinel(remote_id: &str) -> bool {
    remote_id == SENTINEL_REMOTE_ID
}

/// Sync state of a canonical project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Created or edited locally, not yet acknowledged by the backend.
    #[default]
    Pending,
    /// Matches the backend as of the last inward merge.
    Synced,
    /// The backend reported a conflict for this project.
    Conflict,
}

/// Optional repository metadata carried alongside a project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Primary language reported by GitHub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Repository description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sha of the last pushed commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,
    /// Message of the last pushed commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_message: Option<String>,
    /// When the last commit was pushed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_at: Option<DateTime<Utc>>,
}

impl ProjectMetadata {
    /// True when no metadata field is set.
    pub fn is_empty(&self) -> bool {
        *self == ProjectMetadata::default()
    }
}

/// Authoritative stored representation of a tracked repo link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProject {
    /// Stable local key referenced by UI surfaces.
    pub id: String,
    /// Backend join key. Unique within the canonical set.
    pub remote_id: String,
    /// Human-readable project title.
    pub display_name: String,
    /// GitHub account owning the repository.
    #[serde(default)]
    pub repo_owner: String,
    /// Repository name.
    #[serde(default)]
    pub repo_name: String,
    /// Target branch.
    #[serde(default)]
    pub branch: String,
    /// Whether the repository is private.
    #[serde(default)]
    pub is_private: bool,
    /// Last local or merged modification.
    pub last_modified: DateTime<Utc>,
    /// Sync state.
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Local revision counter, never sent to the backend.
    #[serde(default = "initial_version")]
    pub version: u32,
    /// Extended metadata.
    #[serde(default, skip_serializing_if = "ProjectMetadata::is_empty")]
    pub metadata: ProjectMetadata,
}

fn initial_version() -> u32 {
    1
}

impl CanonicalProject {
    /// Build a fresh pending project from legacy settings.
    pub fn from_legacy(remote_id: &str, entry: &LegacyProjectEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: remote_id.to_string(),
            remote_id: remote_id.to_string(),
            display_name: entry.project_title.clone(),
            repo_owner: String::new(),
            repo_name: entry.repo_name.clone(),
            branch: entry.branch.clone(),
            is_private: entry.is_private,
            last_modified: now,
            sync_status: SyncStatus::Pending,
            version: 1,
            metadata: ProjectMetadata::default(),
        }
    }

    /// Build a local project from a server project that has no local counterpart.
    /// A nameless server project is named after its id.
    pub fn from_backend(project: &BackendProject, now: DateTime<Utc>) -> Self {
        let display_name = if project.display_name.is_empty() {
            project.remote_id.clone()
        } else {
            project.display_name.clone()
        };
        Self {
            id: project.remote_id.clone(),
            remote_id: project.remote_id.clone(),
            display_name,
            repo_owner: project.repo_owner.clone(),
            repo_name: project.repo_name.clone(),
            branch: project.branch.clone(),
            is_private: project.is_private,
            last_modified: project.last_modified.unwrap_or(now),
            sync_status: SyncStatus::Synced,
            version: 1,
            metadata: project.metadata.clone(),
        }
    }
}

/// One entry of the older per-project settings map, keyed by remote id.
///
/// Unknown fields (extended metadata written by UI surfaces) are carried
/// opaquely in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProjectEntry {
    /// Repository name.
    #[serde(default)]
    pub repo_name: String,
    /// Target branch.
    #[serde(default)]
    pub branch: String,
    /// Project title shown in the UI.
    #[serde(default)]
    pub project_title: String,
    /// Whether the repository is private.
    #[serde(default)]
    pub is_private: bool,
    /// Extended metadata carried opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Legacy settings map, in document order.
pub type LegacySettings = IndexMap<String, LegacyProjectEntry>;

/// A user edit of one legacy entry; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalEdit {
    pub repo_name: Option<String>,
    pub branch: Option<String>,
    pub title: Option<String>,
    pub is_private: Option<bool>,
}

impl LocalEdit {
    /// Apply to `entry`, returning the fields whose value actually changed.
    pub fn apply(&self, entry: &mut LegacyProjectEntry) -> Vec<ProjectField> {
        let mut changed = Vec::new();
        if let Some(repo_name) = &self.repo_name
            && entry.repo_name != *repo_name
        {
            entry.repo_name = repo_name.clone();
            changed.push(ProjectField::RepoName);
        }
        if let Some(branch) = &self.branch
            && entry.branch != *branch
        {
            entry.branch = branch.clone();
            changed.push(ProjectField::Branch);
        }
        if let Some(title) = &self.title
            && entry.project_title != *title
        {
            entry.project_title = title.clone();
            changed.push(ProjectField::Title);
        }
        if let Some(is_private) = self.is_private
            && entry.is_private != is_private
        {
            entry.is_private = is_private;
            changed.push(ProjectField::IsPrivate);
        }
        changed
    }
}

/// Backend-safe view of a project. Local-only fields (`id`, `version`) are
/// not representable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProject {
    /// Join key.
    pub remote_id: String,
    /// Human-readable title.
    #[serde(default)]
    pub display_name: String,
    /// GitHub account owning the repository.
    #[serde(default)]
    pub repo_owner: String,
    /// Repository name.
    #[serde(default)]
    pub repo_name: String,
    /// Target branch.
    #[serde(default)]
    pub branch: String,
    /// Whether the repository is private.
    #[serde(default)]
    pub is_private: bool,
    /// Last modification as known by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Sync state as known by the sender.
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Extended metadata.
    #[serde(default, skip_serializing_if = "ProjectMetadata::is_empty")]
    pub metadata: ProjectMetadata,
}

impl From<&CanonicalProject> for BackendProject {
    fn from(project: &CanonicalProject) -> Self {
        Self {
            remote_id: project.remote_id.clone(),
            display_name: project.display_name.clone(),
            repo_owner: project.repo_owner.clone(),
            repo_name: project.repo_name.clone(),
            branch: project.branch.clone(),
            is_private: project.is_private,
            last_modified: Some(project.last_modified),
            sync_status: project.sync_status,
            metadata: project.metadata.clone(),
        }
    }
}

/// How the backend should settle conflicting fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Backend decides; used by outward sync.
    AutoResolve,
    /// Local values win. Reserved.
    KeepLocal,
    /// Server values win; used by inward sync.
    KeepRemote,
}

/// Body of `POST /sync-projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Outgoing projects, already filtered and stripped.
    pub local_projects: Vec<BackendProject>,
    /// Last successful sync, if any.
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    /// Requested conflict policy.
    pub conflict_resolution: ConflictResolution,
}

/// A conflict reported by the backend. Passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// The project the conflict concerns.
    pub project: BackendProject,
    /// Backend-defined conflict kind.
    pub conflict_kind: String,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

/// Successful response of `POST /sync-projects`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Backend acknowledgement flag.
    #[serde(default)]
    pub success: bool,
    /// Projects as the backend now holds them.
    #[serde(default)]
    pub updated_projects: Vec<BackendProject>,
    /// Conflicts the backend could not settle.
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
    /// Remote ids the backend deleted.
    #[serde(default)]
    pub deleted_projects: Vec<String>,
}

/// User-editable fields tracked by the race window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectField {
    /// `repoName`
    RepoName,
    /// `branch`
    Branch,
    /// `projectTitle` / `displayName`
    Title,
    /// `isPrivate`
    IsPrivate,
}

/// A recent local edit of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChangeRecord {
    /// Edited project (legacy key / remote id).
    pub project_id: String,
    /// Fields touched by the edit.
    pub changed_fields: Vec<ProjectField>,
    /// When the edit was saved.
    pub timestamp: DateTime<Utc>,
}

impl RecentChangeRecord {
    /// Age of the record relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }
}
