//! Backend sync endpoint client.
//!
//! `POST {server}/sync-projects` with a JSON [`SyncRequest`] and a bearer
//! token. Non-2xx answers carry `{"error": "..."}` and surface as
//! [`SyncError::Server`]. Retries are not done here; wrap the backend if you
//! need them.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use crate::types::{SyncRequest, SyncResponse};

/// Remote registry of project links.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Send one sync request authenticated with `token`.
    async fn sync_projects(&self, request: &SyncRequest, token: &str) -> Result<SyncResponse>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`SyncBackend`] over HTTPS with bounded timeouts.
pub struct HttpSyncBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSyncBackend {
    /// Build a client from the configured server URL and timeouts.
    pub fn new(settings: &SyncSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: settings.sync_endpoint(),
            client,
        })
    }

    /// Full endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SyncBackend for HttpSyncBackend {
    async fn sync_projects(&self, request: &SyncRequest, token: &str) -> Result<SyncResponse> {
        debug!(
            "POST {} ({} projects, {:?})",
            self.endpoint,
            request.local_projects.len(),
            request.conflict_resolution
        );
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body.clone()
                    }
                });
            warn!("Sync request failed: {} {}", status, message);
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
