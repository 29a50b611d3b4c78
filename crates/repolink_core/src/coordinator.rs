//! Top-level sync orchestration.
//!
//! Each direction is one linear pass:
//!
//! ```text
//! Idle → Gating → Migrating → Requesting → Merging → Persisting → Done
//!                                                        ↘ Failed (from any step)
//! ```
//!
//! A pass that is gated out returns `Ok(None)` and goes back to `Idle`. Only
//! one pass per direction runs at a time, and the storage-touching span of
//! both directions is serialized by a shared lock, since the store only
//! offers whole-document reads and writes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::backend::SyncBackend;
use crate::cache::TokenCache;
use crate::clock::Clock;
use crate::config::{InwardGateFallback, SyncSettings};
use crate::error::{Result, SyncError};
use crate::fresh_install::FreshInstallDetector;
use crate::legacy::LegacyFormatBridge;
use crate::race_guard::RaceWindowGuard;
use crate::resolver::ConflictResolver;
use crate::store::{KeyValueStore, ProjectStore};
use crate::types::{
    BackendProject, CanonicalProject, ConflictResolution, LocalEdit, ProjectField, SyncRequest,
    SyncResponse, SyncStatus, is_sentinel,
};
use crate::validate::{check_remote_id, is_valid_remote_id, is_valid_repo_owner};

/// Sync direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local → remote.
    Outward,
    /// Remote → local.
    Inward,
}

impl SyncDirection {
    fn slot(self) -> usize {
        match self {
            SyncDirection::Outward => 0,
            SyncDirection::Inward => 1,
        }
    }
}

/// Step of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No pass running, or the last one was gated out.
    #[default]
    Idle,
    /// Checking auth and eligibility.
    Gating,
    /// Normalizing legacy settings into canonical projects.
    Migrating,
    /// Waiting on the backend.
    Requesting,
    /// Merging the server response (inward only).
    Merging,
    /// Writing results to local storage.
    Persisting,
    /// Last pass succeeded.
    Done,
    /// Last pass failed.
    Failed,
}

/// Drives outward and inward sync passes.
pub struct SyncCoordinator {
    store: ProjectStore,
    backend: Arc<dyn SyncBackend>,
    auth: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    tokens: TokenCache,
    guard: RaceWindowGuard,
    detector: FreshInstallDetector,
    bridge: LegacyFormatBridge,
    resolver: ConflictResolver,
    outward_flight: Mutex<()>,
    inward_flight: Mutex<()>,
    state: Mutex<()>,
    phases: std::sync::Mutex<[SyncPhase; 2]>,
}

impl SyncCoordinator {
    /// Wire a coordinator from its collaborators.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        backend: Arc<dyn SyncBackend>,
        auth: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        let store = ProjectStore::new(kv);
        let guard = RaceWindowGuard::new(store.clone(), clock.clone(), settings.race_window());
        let detector = FreshInstallDetector::new(store.clone(), clock.clone(), &settings);
        let bridge = LegacyFormatBridge::new(
            store.clone(),
            clock.clone(),
            guard.clone(),
            detector.clone(),
        );
        let resolver = ConflictResolver::new(detector.clone());
        let tokens = TokenCache::new(settings.token_cache_ttl(), clock.clone());

        Self {
            store,
            backend,
            auth,
            clock,
            settings,
            tokens,
            guard,
            detector,
            bridge,
            resolver,
            outward_flight: Mutex::new(()),
            inward_flight: Mutex::new(()),
            state: Mutex::new(()),
            phases: std::sync::Mutex::new([SyncPhase::Idle; 2]),
        }
    }

    /// Typed storage the coordinator works on.
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Recent-edit tracker; the settings-save path records edits here.
    pub fn guard(&self) -> &RaceWindowGuard {
        &self.guard
    }

    /// Fresh-install classifier.
    pub fn detector(&self) -> &FreshInstallDetector {
        &self.detector
    }

    /// Legacy settings bridge.
    pub fn bridge(&self) -> &LegacyFormatBridge {
        &self.bridge
    }

    /// Merge and deletion classifier.
    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Clock shared by every component.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Active settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Phase the last (or current) pass of `direction` reached.
    pub fn last_phase(&self, direction: SyncDirection) -> SyncPhase {
        self.phases
            .lock()
            .map(|phases| phases[direction.slot()])
            .unwrap_or_default()
    }

    fn set_phase(&self, direction: SyncDirection, phase: SyncPhase) {
        debug!("{:?} sync: {:?}", direction, phase);
        if let Ok(mut phases) = self.phases.lock() {
            phases[direction.slot()] = phase;
        }
    }

    fn finish<T>(&self, direction: SyncDirection, result: &Result<Option<T>>) {
        match result {
            Ok(_) => self.set_phase(direction, SyncPhase::Done),
            Err(e) => {
                warn!("{:?} sync failed: {}", direction, e);
                self.set_phase(direction, SyncPhase::Failed);
            }
        }
    }

    // ==================== Gating ====================

    /// Whether an inward pass may run: at most `inward_gate_max_projects`
    /// distinct projects tracked across legacy and canonical storage.
    pub async fn should_perform_inward_sync(&self) -> bool {
        match self.store.tracked_project_count(self.clock.now()).await {
            Ok(count) => {
                let allowed = count <= self.settings.inward_gate_max_projects;
                debug!(
                    "Inward gate: {} tracked project(s) -> {}",
                    count,
                    if allowed { "allow" } else { "skip" }
                );
                allowed
            }
            Err(e) => {
                let allowed =
                    self.settings.inward_gate_on_storage_error == InwardGateFallback::Permissive;
                warn!(
                    "Inward gate could not read storage ({}), falling back to {}",
                    e,
                    if allowed { "allow" } else { "skip" }
                );
                allowed
            }
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.auth.get_auth_state().await.is_authenticated
    }

    /// Runs the migration step. Returns true when the pass should stop here
    /// because stored records were backfilled.
    async fn migrate(&self, direction: SyncDirection) -> bool {
        self.set_phase(direction, SyncPhase::Migrating);
        match self.bridge.migrate_legacy_to_canonical().await {
            Ok(outcome) if outcome.backfilled() => {
                info!(
                    "{:?} sync: backfilled {} record(s), ending pass",
                    direction, outcome.backfilled
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Legacy migration failed, continuing: {}", e);
                false
            }
        }
    }

    // ==================== Outward ====================

    /// Push the local project set to the backend.
    ///
    /// Returns `Ok(None)` when signed out, when another outward pass is
    /// running, or when the pass only backfilled stored records. Server
    /// `updatedProjects` are never written locally in this direction.
    pub async fn perform_outward_sync(&self) -> Result<Option<SyncResponse>> {
        let direction = SyncDirection::Outward;
        let Ok(_flight) = self.outward_flight.try_lock() else {
            debug!("Outward sync already in progress");
            return Ok(None);
        };

        self.set_phase(direction, SyncPhase::Gating);
        if !self.is_authenticated().await {
            info!("Outward sync skipped: not signed in");
            self.set_phase(direction, SyncPhase::Idle);
            return Ok(None);
        }

        let result = self.run_outward().await;
        self.finish(direction, &result);
        result
    }

    async fn run_outward(&self) -> Result<Option<SyncResponse>> {
        let direction = SyncDirection::Outward;
        let _state = self.state.lock().await;

        if self.migrate(direction).await {
            return Ok(None);
        }

        let canonical = self.store.load_canonical(self.clock.now()).await?.projects;
        let legacy_ids: HashSet<String> = self.store.load_legacy().await?.into_keys().collect();
        let plan = self
            .resolver
            .classify_outward_deletions(&legacy_ids, &canonical)
            .await;

        self.set_phase(direction, SyncPhase::Requesting);
        let response = self
            .sync_with_backend(&plan.outgoing, ConflictResolution::AutoResolve)
            .await?;
        log_response(direction, &response);

        self.set_phase(direction, SyncPhase::Persisting);
        if plan.signals_deletions() {
            let remaining: Vec<CanonicalProject> = canonical
                .into_iter()
                .filter(|p| !plan.deletion_candidates.contains(&p.remote_id))
                .collect();
            self.store.save_canonical(&remaining).await?;
            info!(
                "Removed {} deleted project(s) from local storage",
                plan.deletion_candidates.len()
            );
        }
        self.store.set_last_sync_timestamp(self.clock.now()).await?;

        Ok(Some(response))
    }

    // ==================== Inward ====================

    /// Pull the backend's project set and merge it additively.
    ///
    /// Returns `Ok(None)` when the inward gate refuses, when signed out, when
    /// another inward pass is running, or when the pass only backfilled
    /// stored records.
    pub async fn perform_inward_sync(&self) -> Result<Option<SyncResponse>> {
        let direction = SyncDirection::Inward;
        let Ok(_flight) = self.inward_flight.try_lock() else {
            debug!("Inward sync already in progress");
            return Ok(None);
        };

        self.set_phase(direction, SyncPhase::Gating);
        if !self.should_perform_inward_sync().await {
            info!("Inward sync skipped: more projects tracked than the gate allows");
            self.set_phase(direction, SyncPhase::Idle);
            return Ok(None);
        }
        if !self.is_authenticated().await {
            info!("Inward sync skipped: not signed in");
            self.set_phase(direction, SyncPhase::Idle);
            return Ok(None);
        }

        let result = self.run_inward().await;
        self.finish(direction, &result);
        result
    }

    async fn run_inward(&self) -> Result<Option<SyncResponse>> {
        let direction = SyncDirection::Inward;
        let _state = self.state.lock().await;

        if self.migrate(direction).await {
            return Ok(None);
        }

        let local = self.store.load_canonical(self.clock.now()).await?.projects;

        self.set_phase(direction, SyncPhase::Requesting);
        let response = self
            .sync_with_backend(&local, ConflictResolution::KeepRemote)
            .await?;
        log_response(direction, &response);
        if !response.deleted_projects.is_empty() {
            debug!(
                "Inward merge is additive; ignoring {} server deletion(s)",
                response.deleted_projects.len()
            );
        }

        self.set_phase(direction, SyncPhase::Merging);
        let merged =
            self.resolver
                .merge_server_into_local(local, &response.updated_projects, self.clock.now());

        self.set_phase(direction, SyncPhase::Persisting);
        self.store.save_canonical(&merged.projects).await?;
        info!(
            "Inward merge: {} new, {} updated, {} total",
            merged.inserted,
            merged.updated,
            merged.projects.len()
        );
        match self.bridge.push_canonical_to_legacy().await {
            Ok(pushed) => debug!(
                "Legacy write-back: {} written, {} protected",
                pushed.written, pushed.protected
            ),
            Err(e) => warn!("Legacy write-back failed, continuing: {}", e),
        }
        self.store.set_last_sync_timestamp(self.clock.now()).await?;

        Ok(Some(response))
    }

    // ==================== Backend call ====================

    /// Send `projects` to the backend with the given conflict policy.
    ///
    /// Sentinel and malformed remote ids are dropped and local-only fields
    /// stripped before anything goes on the wire.
    pub async fn sync_with_backend(
        &self,
        projects: &[CanonicalProject],
        resolution: ConflictResolution,
    ) -> Result<SyncResponse> {
        let token = self.token().await?;
        let request = self.build_request(projects, resolution).await?;

        match self.backend.sync_projects(&request, &token).await {
            Ok(response) if !response.success => Err(SyncError::Server {
                status: 200,
                message: "backend reported an unsuccessful sync".to_string(),
            }),
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_unauthorized() {
                    debug!("Backend rejected token; dropping cached token");
                    self.tokens.invalidate();
                }
                Err(e)
            }
        }
    }

    /// Build the wire request for `projects`.
    pub async fn build_request(
        &self,
        projects: &[CanonicalProject],
        resolution: ConflictResolution,
    ) -> Result<SyncRequest> {
        let local_projects: Vec<BackendProject> = projects
            .iter()
            .filter(|p| {
                let keep = !is_sentinel(&p.remote_id) && is_valid_remote_id(&p.remote_id);
                if !keep {
                    debug!("Not sending project with id {:?}", p.remote_id);
                }
                keep
            })
            .map(BackendProject::from)
            .collect();

        Ok(SyncRequest {
            local_projects,
            last_sync_timestamp: self.store.last_sync_timestamp().await?,
            conflict_resolution: resolution,
        })
    }

    // ==================== Local edits ====================

    /// Settings-save path: apply `edit` to the legacy entry of `remote_id`
    /// and record the changed fields with the race guard. Runs under the
    /// same lock as sync passes, so a write-back never lands between the two
    /// writes. Returns the fields that changed.
    pub async fn save_local_edit(
        &self,
        remote_id: &str,
        edit: &LocalEdit,
    ) -> Result<Vec<ProjectField>> {
        check_remote_id(remote_id)?;

        let _state = self.state.lock().await;
        let mut legacy = self.store.load_legacy().await?;
        let changed = edit.apply(legacy.entry(remote_id.to_string()).or_default());
        if changed.is_empty() {
            return Ok(changed);
        }
        self.store.save_legacy(&legacy).await?;
        self.guard
            .record_change(remote_id, &changed, self.clock.now())
            .await?;
        debug!("Saved local edit of {}: {:?}", remote_id, changed);
        Ok(changed)
    }

    /// Set the GitHub owner of a canonical project. The owner is not part of
    /// the legacy map, so the canonical record is edited directly and marked
    /// pending. Returns false when no project has `remote_id` or the owner is
    /// already `owner`.
    pub async fn update_repo_owner(&self, remote_id: &str, owner: &str) -> Result<bool> {
        check_remote_id(remote_id)?;
        if !is_valid_repo_owner(owner) {
            return Err(SyncError::Validation(format!("repository owner {:?}", owner)));
        }

        let _state = self.state.lock().await;
        let now = self.clock.now();
        let mut projects = self.store.load_canonical(now).await?.projects;
        let Some(project) = projects.iter_mut().find(|p| p.remote_id == remote_id) else {
            return Ok(false);
        };
        if project.repo_owner == owner {
            return Ok(false);
        }
        project.repo_owner = owner.to_string();
        project.last_modified = now;
        project.version += 1;
        project.sync_status = SyncStatus::Pending;
        self.store.save_canonical(&projects).await?;
        Ok(true)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }
        match self.auth.get_auth_token().await {
            Some(token) if !token.is_empty() => {
                self.tokens.put(&token);
                Ok(token)
            }
            _ => Err(SyncError::Authentication(
                "no auth token available".to_string(),
            )),
        }
    }
}

fn log_response(direction: SyncDirection, response: &SyncResponse) {
    info!(
        "{:?} sync: {} updated, {} conflict(s), {} deleted",
        direction,
        response.updated_projects.len(),
        response.conflicts.len(),
        response.deleted_projects.len()
    );
    for conflict in &response.conflicts {
        warn!(
            "Conflict on {} ({}): {}",
            conflict.project.remote_id, conflict.conflict_kind, conflict.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthState, StaticAuthProvider};
    use crate::store::{LEGACY_SETTINGS_KEY, MemoryStore};
    use crate::test_utils::{ManualClock, RecordingBackend, canonical, server_project};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuth {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl AuthProvider for CountingAuth {
        async fn get_auth_token(&self) -> Option<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Some("tok".to_string())
        }

        async fn get_auth_state(&self) -> AuthState {
            AuthState {
                is_authenticated: true,
            }
        }
    }

    fn coordinator_with(
        kv: &MemoryStore,
        backend: Arc<RecordingBackend>,
        auth: Arc<dyn AuthProvider>,
        settings: SyncSettings,
    ) -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::new(kv.clone()),
            backend,
            auth,
            Arc::new(ManualClock::default()),
            settings,
        )
    }

    #[tokio::test]
    async fn test_request_strips_and_filters() {
        let kv = MemoryStore::new();
        let coordinator = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::new()),
            Arc::new(StaticAuthProvider::new("tok")),
            SyncSettings::default(),
        );
        let projects = vec![
            canonical("ok_1", "a", "main"),
            canonical("github.com", "b", "main"),
            canonical("has.dot", "c", "main"),
        ];
        let request = coordinator
            .build_request(&projects, ConflictResolution::AutoResolve)
            .await
            .unwrap();
        assert_eq!(request.local_projects.len(), 1);

        let wire = serde_json::to_value(&request).unwrap();
        let sent = &wire["localProjects"][0];
        assert_eq!(sent["remoteId"], json!("ok_1"));
        assert!(sent.get("id").is_none());
        assert!(sent.get("version").is_none());
        assert_eq!(wire["conflictResolution"], json!("auto-resolve"));
        assert_eq!(wire["lastSyncTimestamp"], json!(null));
    }

    #[tokio::test]
    async fn test_token_is_cached_until_unauthorized() {
        let kv = MemoryStore::new();
        let backend = Arc::new(RecordingBackend::new());
        let auth = Arc::new(CountingAuth {
            fetches: AtomicUsize::new(0),
        });
        let coordinator =
            coordinator_with(&kv, backend.clone(), auth.clone(), SyncSettings::default());

        coordinator
            .sync_with_backend(&[], ConflictResolution::AutoResolve)
            .await
            .unwrap();
        coordinator
            .sync_with_backend(&[], ConflictResolution::AutoResolve)
            .await
            .unwrap();
        assert_eq!(auth.fetches.load(Ordering::SeqCst), 1);

        backend.push_result(Err(SyncError::Server {
            status: 401,
            message: "expired".to_string(),
        }));
        let err = coordinator
            .sync_with_backend(&[], ConflictResolution::AutoResolve)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());

        coordinator
            .sync_with_backend(&[], ConflictResolution::AutoResolve)
            .await
            .unwrap();
        assert_eq!(auth.fetches.load(Ordering::SeqCst), 2);
        assert!(backend.calls().iter().all(|c| c.token == "tok"));
    }

    #[tokio::test]
    async fn test_missing_token_is_authentication_error() {
        struct SignedInWithoutToken;

        #[async_trait]
        impl AuthProvider for SignedInWithoutToken {
            async fn get_auth_token(&self) -> Option<String> {
                None
            }
            async fn get_auth_state(&self) -> AuthState {
                AuthState {
                    is_authenticated: true,
                }
            }
        }

        let kv = MemoryStore::new();
        let backend = Arc::new(RecordingBackend::new());
        let coordinator = coordinator_with(
            &kv,
            backend.clone(),
            Arc::new(SignedInWithoutToken),
            SyncSettings::default(),
        );
        let err = coordinator.perform_outward_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Authentication(_)));
        assert_eq!(backend.call_count(), 0);
        assert_eq!(
            coordinator.last_phase(SyncDirection::Outward),
            SyncPhase::Failed
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_server_error() {
        let kv = MemoryStore::new();
        let coordinator = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::with_response(SyncResponse::default())),
            Arc::new(StaticAuthProvider::new("tok")),
            SyncSettings::default(),
        );
        let err = coordinator.perform_outward_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_gate_storage_error_fallback() {
        let kv = MemoryStore::new();
        kv.set_fail_reads(true);
        let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::new("tok"));

        let permissive = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::new()),
            auth.clone(),
            SyncSettings::default(),
        );
        assert!(permissive.should_perform_inward_sync().await);

        let strict = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::new()),
            auth,
            SyncSettings {
                inward_gate_on_storage_error: InwardGateFallback::Strict,
                ..SyncSettings::default()
            },
        );
        assert!(!strict.should_perform_inward_sync().await);
    }

    #[tokio::test]
    async fn test_update_repo_owner_marks_pending() {
        let kv = MemoryStore::new();
        let coordinator = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::new()),
            Arc::new(StaticAuthProvider::new("tok")),
            SyncSettings::default(),
        );
        coordinator
            .store()
            .save_canonical(&[canonical("abc", "site", "main")])
            .await
            .unwrap();

        assert!(coordinator.update_repo_owner("abc", "new-org").await.unwrap());
        assert!(!coordinator.update_repo_owner("abc", "new-org").await.unwrap());
        assert!(!coordinator.update_repo_owner("missing", "new-org").await.unwrap());
        assert!(matches!(
            coordinator.update_repo_owner("abc", "-bad-").await,
            Err(SyncError::Validation(_))
        ));

        let stored = &kv.value(crate::store::PROJECTS_KEY).unwrap()[0];
        assert_eq!(stored["repoOwner"], json!("new-org"));
        assert_eq!(stored["syncStatus"], json!("pending"));
        assert_eq!(stored["version"], json!(2));
    }

    #[tokio::test]
    async fn test_save_local_edit_writes_and_records() {
        let kv = MemoryStore::new().with_value(
            LEGACY_SETTINGS_KEY,
            json!({"abc": {"repoName": "site", "branch": "main", "projectTitle": "Site",
                           "language": "Rust"}}),
        );
        let coordinator = coordinator_with(
            &kv,
            Arc::new(RecordingBackend::new()),
            Arc::new(StaticAuthProvider::new("tok")),
            SyncSettings::default(),
        );

        let edit = LocalEdit {
            branch: Some("dev".to_string()),
            title: Some("Site".to_string()),
            ..LocalEdit::default()
        };
        let changed = coordinator.save_local_edit("abc", &edit).await.unwrap();
        assert_eq!(changed, vec![ProjectField::Branch]);

        let stored = kv.value(LEGACY_SETTINGS_KEY).unwrap();
        assert_eq!(stored["abc"]["branch"], json!("dev"));
        assert_eq!(stored["abc"]["language"], json!("Rust"));
        assert!(coordinator.guard().is_protected("abc").await.unwrap());

        assert!(
            coordinator
                .save_local_edit("abc", &edit)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            coordinator.save_local_edit("a.b", &edit).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_during_inward_pass_survives_write_back() {
        let kv = MemoryStore::new().with_value(
            LEGACY_SETTINGS_KEY,
            json!({"abc": {"repoName": "site", "branch": "main", "projectTitle": "Site"}}),
        );
        let backend = Arc::new(RecordingBackend::with_response(SyncResponse {
            success: true,
            updated_projects: vec![
                server_project("abc", "site", "main"),
                server_project("xyz", "other", "main"),
            ],
            ..SyncResponse::default()
        }));
        backend.set_delay(std::time::Duration::from_millis(50));
        let coordinator = coordinator_with(
            &kv,
            backend,
            Arc::new(StaticAuthProvider::new("tok")),
            SyncSettings::default(),
        );

        let edit = LocalEdit {
            branch: Some("user-branch".to_string()),
            ..LocalEdit::default()
        };
        let (synced, edited) = tokio::join!(coordinator.perform_inward_sync(), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            coordinator.save_local_edit("abc", &edit).await
        });
        assert!(synced.unwrap().is_some());
        assert_eq!(edited.unwrap(), vec![ProjectField::Branch]);

        let stored = kv.value(LEGACY_SETTINGS_KEY).unwrap();
        assert_eq!(stored["abc"]["branch"], json!("user-branch"));
        assert_eq!(stored["xyz"]["repoName"], json!("other"));
    }

    #[tokio::test]
    async fn test_signed_out_returns_to_idle() {
        let kv = MemoryStore::new().with_value(
            LEGACY_SETTINGS_KEY,
            json!({"abc": {"repoName": "site", "branch": "main", "projectTitle": "Site"}}),
        );
        let backend = Arc::new(RecordingBackend::new());
        let coordinator = coordinator_with(
            &kv,
            backend.clone(),
            Arc::new(StaticAuthProvider::anonymous()),
            SyncSettings::default(),
        );
        assert!(coordinator.perform_outward_sync().await.unwrap().is_none());
        assert_eq!(backend.call_count(), 0);
        assert_eq!(
            coordinator.last_phase(SyncDirection::Outward),
            SyncPhase::Idle
        );
    }
}
