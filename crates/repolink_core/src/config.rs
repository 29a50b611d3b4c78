//! Engine configuration.
//!
//! Every field has a default so a partial `[sync]` table (or none at all)
//! deserializes into a usable configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER_URL: &str = "https://api.repolink.dev";

/// What `should_perform_inward_sync` answers when it cannot read storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InwardGateFallback {
    /// Allow the inward pass.
    #[default]
    Permissive,
    /// Skip the inward pass.
    Strict,
}

/// Tunables for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the backend (`{server_url}/sync-projects`).
    pub server_url: String,
    /// Whole-request timeout for the backend call.
    pub request_timeout_secs: u64,
    /// TCP/TLS connect timeout for the backend call.
    pub connect_timeout_secs: u64,
    /// How long a local edit is protected from reverse legacy writes.
    pub race_window_ms: i64,
    /// Installs younger than this may count as fresh.
    pub fresh_install_max_age_days: i64,
    /// Installs that created at most this many projects may count as fresh.
    pub fresh_install_max_lifetime_projects: u64,
    /// Fresh installs track at most this many projects.
    pub fresh_install_max_tracked_projects: usize,
    /// Inward sync runs only while at most this many projects are tracked.
    pub inward_gate_max_projects: usize,
    /// Inward gate answer when its storage read fails.
    pub inward_gate_on_storage_error: InwardGateFallback,
    /// How long a fetched auth token is reused.
    pub token_cache_ttl_secs: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            race_window_ms: 30_000,
            fresh_install_max_age_days: 7,
            fresh_install_max_lifetime_projects: 2,
            fresh_install_max_tracked_projects: 1,
            inward_gate_max_projects: 1,
            inward_gate_on_storage_error: InwardGateFallback::Permissive,
            token_cache_ttl_secs: 300,
        }
    }
}

impl SyncSettings {
    /// Race window as a duration.
    pub fn race_window(&self) -> Duration {
        Duration::milliseconds(self.race_window_ms)
    }

    /// Token cache TTL as a duration.
    pub fn token_cache_ttl(&self) -> Duration {
        Duration::seconds(self.token_cache_ttl_secs)
    }

    /// Full URL of the sync endpoint.
    pub fn sync_endpoint(&self) -> String {
        format!("{}/sync-projects", self.server_url.trim_end_matches('/'))
    }
}
