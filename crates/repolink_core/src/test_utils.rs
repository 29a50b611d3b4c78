//! Test doubles for the engine's collaborators.
//!
//! Shared by the unit tests and the integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::backend::SyncBackend;
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::types::{
    BackendProject, CanonicalProject, LegacyProjectEntry, ProjectMetadata, SyncRequest,
    SyncResponse, SyncStatus,
};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    /// Jump to `to`.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

/// A request as seen by [`RecordingBackend`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The request body.
    pub request: SyncRequest,
    /// The bearer token it was sent with.
    pub token: String,
}

/// Backend that records every call and answers from a script.
///
/// Scripted results are consumed in order; once exhausted every call gets
/// the default response.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Result<SyncResponse>>>,
    default_response: Mutex<SyncResponse>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl RecordingBackend {
    /// Backend answering every call with `success: true` and nothing else.
    pub fn new() -> Self {
        Self::with_response(SyncResponse {
            success: true,
            ..SyncResponse::default()
        })
    }

    /// Backend answering every call with `response`.
    pub fn with_response(response: SyncResponse) -> Self {
        Self {
            default_response: Mutex::new(response),
            ..Self::default()
        }
    }

    /// Queue a one-off result.
    pub fn push_result(&self, result: Result<SyncResponse>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    /// Hold every call for `delay` before answering.
    pub fn set_delay(&self, delay: std::time::Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SyncBackend for RecordingBackend {
    async fn sync_projects(&self, request: &SyncRequest, token: &str) -> Result<SyncResponse> {
        self.calls
            .lock()
            .map_err(|_| SyncError::Network("recording lock poisoned".to_string()))?
            .push(RecordedCall {
                request: request.clone(),
                token: token.to_string(),
            });

        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(result) => result,
            None => self
                .default_response
                .lock()
                .map(|r| r.clone())
                .map_err(|_| SyncError::Network("recording lock poisoned".to_string())),
        }
    }
}

/// Canonical project fixture with `remote_id` doubling as the local id.
pub fn canonical(remote_id: &str, repo_name: &str, branch: &str) -> CanonicalProject {
    CanonicalProject {
        id: remote_id.to_string(),
        remote_id: remote_id.to_string(),
        display_name: format!("Project {}", remote_id),
        repo_owner: "octo".to_string(),
        repo_name: repo_name.to_string(),
        branch: branch.to_string(),
        is_private: false,
        last_modified: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        sync_status: SyncStatus::Synced,
        version: 1,
        metadata: ProjectMetadata::default(),
    }
}

/// Backend project fixture.
pub fn server_project(remote_id: &str, repo_name: &str, branch: &str) -> BackendProject {
    BackendProject::from(&canonical(remote_id, repo_name, branch))
}

/// Legacy settings entry fixture.
pub fn legacy_entry(repo_name: &str, branch: &str, title: &str) -> LegacyProjectEntry {
    LegacyProjectEntry {
        repo_name: repo_name.to_string(),
        branch: branch.to_string(),
        project_title: title.to_string(),
        is_private: false,
        extra: serde_json::Map::new(),
    }
}
