//! Key-value store seam and typed project storage.
//!
//! The underlying store only offers whole-document `get`/`set`; there are no
//! field-level updates or transactions. [`ProjectStore`] layers typed access
//! to the engine's keys on top of any [`KeyValueStore`].
//!
//! Canonical records are stored with an explicit `schemaVersion` tag and
//! upgraded on load by per-version dispatch (see [`StoredProject`]).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::types::{
    CURRENT_SCHEMA_VERSION, CanonicalProject, LegacySettings, ProjectMetadata,
    RecentChangeRecord, SyncStatus, is_sentinel,
};

/// A set of stored documents keyed by name.
pub type ValueMap = serde_json::Map<String, Value>;

/// Canonical project list.
pub const PROJECTS_KEY: &str = "projects";
/// Legacy per-project settings map.
pub const LEGACY_SETTINGS_KEY: &str = "projectSettings";
/// Timestamp of the last successful sync, either direction.
pub const LAST_SYNC_KEY: &str = "lastSyncTimestamp";
/// When this install was first set up.
pub const INSTALL_DATE_KEY: &str = "installDate";
/// Number of projects ever created on this install.
pub const LIFETIME_PROJECT_COUNT_KEY: &str = "lifetimeProjectCount";
/// Recent local edits, one record per project.
pub const RECENT_CHANGES_KEY: &str = "recentProjectChanges";

/// Durable local key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<ValueMap>;

    /// Write every entry of `values`, replacing whole documents.
    async fn set(&self, values: ValueMap) -> Result<()>;
}

// ==================== MemoryStore ====================

/// In-memory store.
///
/// Clones share the same documents. Reads and writes can be made to fail,
/// and every successful `set` is logged for assertions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<ValueMap>>,
    writes: Arc<Mutex<Vec<ValueMap>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (builder pattern). Not recorded as a write.
    pub fn with_value(self, key: &str, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Overwrite a document directly. Not recorded as a write.
    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(key.to_string(), value);
        }
    }

    /// Current value of a document.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(key).cloned())
    }

    /// Every value written to `key`, oldest first.
    pub fn writes_to(&self, key: &str) -> Vec<Value> {
        self.writes
            .lock()
            .map(|writes| {
                writes
                    .iter()
                    .filter_map(|batch| batch.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make subsequent reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

fn poisoned<T>(_: T) -> SyncError {
    SyncError::Storage("memory store lock poisoned".to_string())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<ValueMap> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Storage("read rejected".to_string()));
        }
        let documents = self.documents.lock().map_err(poisoned)?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                documents
                    .get(*key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect())
    }

    async fn set(&self, values: ValueMap) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Storage("write rejected".to_string()));
        }
        {
            let mut documents = self.documents.lock().map_err(poisoned)?;
            for (key, value) in &values {
                documents.insert(key.clone(), value.clone());
            }
        }
        self.writes.lock().map_err(poisoned)?.push(values);
        Ok(())
    }
}

// ==================== JsonFileStore ====================

/// Store backed by a single JSON object on disk.
///
/// Every `set` rewrites the whole file through a temp file and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Store rooted at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<ValueMap> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(ValueMap::new()),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => Ok(map),
                _ => Err(SyncError::Storage(format!(
                    "{} does not contain a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ValueMap::new()),
            Err(e) => Err(SyncError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<ValueMap> {
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|value| (key.to_string(), value)))
            .collect())
    }

    async fn set(&self, values: ValueMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.extend(values);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&Value::Object(all))?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// ==================== Schema-versioned records ====================

/// Canonical record as written before `displayName` existed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectV1 {
    id: String,
    #[serde(default)]
    remote_id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    repo_owner: String,
    #[serde(default)]
    repo_name: String,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    sync_status: SyncStatus,
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    metadata: ProjectMetadata,
}

/// A stored canonical record, tagged by `schemaVersion`.
///
/// Records without a tag predate versioning and are version 1.
#[derive(Debug, Clone)]
pub enum StoredProject {
    /// `schemaVersion: 1` (or untagged).
    V1(ProjectV1),
    /// `schemaVersion: 2`, the current layout.
    V2(CanonicalProject),
}

impl StoredProject {
    /// Dispatch on the record's schema tag.
    pub fn decode(value: Value) -> Result<Self> {
        let version = value
            .get("schemaVersion")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        match version {
            1 => Ok(StoredProject::V1(serde_json::from_value(value)?)),
            2 => Ok(StoredProject::V2(serde_json::from_value(value)?)),
            other => Err(SyncError::Storage(format!(
                "Unsupported project schema version {}",
                other
            ))),
        }
    }

    /// Upgrade to the current layout. The flag is true when an upgrade step ran.
    pub fn upgrade(self, now: DateTime<Utc>) -> (CanonicalProject, bool) {
        match self {
            StoredProject::V2(project) => (project, false),
            StoredProject::V1(old) => {
                let remote_id = old.remote_id.unwrap_or_else(|| old.id.clone());
                let display_name = old.display_name.unwrap_or_else(|| old.id.clone());
                let project = CanonicalProject {
                    id: old.id,
                    remote_id,
                    display_name,
                    repo_owner: old.repo_owner,
                    repo_name: old.repo_name,
                    branch: old.branch,
                    is_private: old.is_private,
                    last_modified: old.last_modified.unwrap_or(now),
                    sync_status: old.sync_status,
                    version: old.version.unwrap_or(1),
                    metadata: old.metadata,
                };
                (project, true)
            }
        }
    }

    /// Serialize `project` in the current layout.
    pub fn encode(project: &CanonicalProject) -> Result<Value> {
        let mut value = serde_json::to_value(project)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "schemaVersion".to_string(),
                Value::from(CURRENT_SCHEMA_VERSION),
            );
        }
        Ok(value)
    }
}

/// Canonical projects as loaded, after upgrades.
#[derive(Debug, Clone, Default)]
pub struct LoadedProjects {
    /// Projects in stored order, all in the current layout.
    pub projects: Vec<CanonicalProject>,
    /// How many records needed an upgrade step.
    pub upgraded: usize,
}

// ==================== ProjectStore ====================

/// Typed access to the engine's documents.
#[derive(Clone)]
pub struct ProjectStore {
    kv: Arc<dyn KeyValueStore>,
}

fn take<T: DeserializeOwned>(map: &mut ValueMap, key: &str) -> Result<Option<T>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

impl ProjectStore {
    /// Wrap a key-value store.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn get_one<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut map = self.kv.get(&[key]).await?;
        take(&mut map, key)
    }

    async fn set_one(&self, key: &str, value: Value) -> Result<()> {
        let mut map = ValueMap::new();
        map.insert(key.to_string(), value);
        self.kv.set(map).await
    }

    /// Load the canonical list, upgrading older records in memory.
    pub async fn load_canonical(&self, now: DateTime<Utc>) -> Result<LoadedProjects> {
        let records: Vec<Value> = self.get_one(PROJECTS_KEY).await?.unwrap_or_default();
        let mut loaded = LoadedProjects::default();
        for record in records {
            let (project, upgraded) = StoredProject::decode(record)?.upgrade(now);
            if upgraded {
                debug!("Upgraded project record {} to current schema", project.id);
                loaded.upgraded += 1;
            }
            loaded.projects.push(project);
        }
        Ok(loaded)
    }

    /// Replace the canonical list.
    pub async fn save_canonical(&self, projects: &[CanonicalProject]) -> Result<()> {
        let records = projects
            .iter()
            .map(StoredProject::encode)
            .collect::<Result<Vec<_>>>()?;
        self.set_one(PROJECTS_KEY, Value::Array(records)).await
    }

    /// Load the legacy settings map.
    pub async fn load_legacy(&self) -> Result<LegacySettings> {
        Ok(self.get_one(LEGACY_SETTINGS_KEY).await?.unwrap_or_default())
    }

    /// Replace the legacy settings map.
    pub async fn save_legacy(&self, settings: &LegacySettings) -> Result<()> {
        self.set_one(LEGACY_SETTINGS_KEY, serde_json::to_value(settings)?)
            .await
    }

    /// Timestamp of the last successful sync.
    pub async fn last_sync_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_one(LAST_SYNC_KEY).await
    }

    /// Record a successful sync.
    pub async fn set_last_sync_timestamp(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_one(LAST_SYNC_KEY, serde_json::to_value(at)?).await
    }

    /// When this install was set up.
    pub async fn install_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_one(INSTALL_DATE_KEY).await
    }

    /// Stamp the install date.
    pub async fn set_install_date(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_one(INSTALL_DATE_KEY, serde_json::to_value(at)?).await
    }

    /// Number of projects ever created on this install.
    pub async fn lifetime_project_count(&self) -> Result<Option<u64>> {
        self.get_one(LIFETIME_PROJECT_COUNT_KEY).await
    }

    /// Overwrite the lifetime project counter.
    pub async fn set_lifetime_project_count(&self, count: u64) -> Result<()> {
        self.set_one(LIFETIME_PROJECT_COUNT_KEY, Value::from(count))
            .await
    }

    /// Recent local edits keyed by project id.
    pub async fn recent_changes(&self) -> Result<BTreeMap<String, RecentChangeRecord>> {
        Ok(self.get_one(RECENT_CHANGES_KEY).await?.unwrap_or_default())
    }

    /// Replace the recent edit records.
    pub async fn save_recent_changes(
        &self,
        records: &BTreeMap<String, RecentChangeRecord>,
    ) -> Result<()> {
        self.set_one(RECENT_CHANGES_KEY, serde_json::to_value(records)?)
            .await
    }

    /// Distinct remote ids across legacy ∪ canonical, sentinel excluded.
    pub async fn tracked_project_count(&self, now: DateTime<Utc>) -> Result<usize> {
        let legacy = self.load_legacy().await?;
        let canonical = self.load_canonical(now).await?;
        Ok(distinct_tracked(&legacy, &canonical.projects))
    }
}

/// Count distinct remote ids across both representations.
pub fn distinct_tracked(legacy: &LegacySettings, canonical: &[CanonicalProject]) -> usize {
    legacy
        .keys()
        .map(String::as_str)
        .chain(canonical.iter().map(|p| p.remote_id.as_str()))
        .filter(|id| !is_sentinel(id))
        .collect::<HashSet<_>>()
        .len()
}
