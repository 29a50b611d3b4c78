//! Fresh-install heuristic.
//!
//! A fresh install is too new or too little used to be authoritative over
//! data the backend holds, so outward sync must not signal deletions from it.
//! Every signal that is missing or unreadable counts against freshness.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::SyncSettings;
use crate::error::Result;
use crate::store::ProjectStore;

/// Classifies the local install as fresh or established.
#[derive(Clone)]
pub struct FreshInstallDetector {
    store: ProjectStore,
    clock: Arc<dyn Clock>,
    max_age: Duration,
    max_lifetime_projects: u64,
    max_tracked_projects: usize,
}

impl FreshInstallDetector {
    /// Create a detector with thresholds from `settings`.
    pub fn new(store: ProjectStore, clock: Arc<dyn Clock>, settings: &SyncSettings) -> Self {
        Self {
            store,
            clock,
            max_age: Duration::days(settings.fresh_install_max_age_days),
            max_lifetime_projects: settings.fresh_install_max_lifetime_projects,
            max_tracked_projects: settings.fresh_install_max_tracked_projects,
        }
    }

    /// True only if the install has never synced, tracks at most one project,
    /// and is either younger than the age threshold or has created few
    /// projects.
    pub async fn is_fresh_install(&self) -> bool {
        let now = self.clock.now();

        let never_synced = match self.store.last_sync_timestamp().await {
            Ok(last) => last.is_none(),
            Err(e) => {
                warn!("Could not read last sync timestamp: {}", e);
                false
            }
        };
        if !never_synced {
            return false;
        }

        let few_projects = match self.store.tracked_project_count(now).await {
            Ok(count) => count <= self.max_tracked_projects,
            Err(e) => {
                warn!("Could not count tracked projects: {}", e);
                false
            }
        };

        let young = match self.store.install_date().await {
            Ok(Some(installed)) => now.signed_duration_since(installed) < self.max_age,
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read install date: {}", e);
                false
            }
        };

        let low_usage = match self.store.lifetime_project_count().await {
            Ok(Some(count)) => count <= self.max_lifetime_projects,
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read lifetime project count: {}", e);
                false
            }
        };

        let fresh = few_projects && (young || low_usage);
        debug!(
            "Fresh install check: few_projects={} young={} low_usage={} -> {}",
            few_projects, young, low_usage, fresh
        );
        fresh
    }

    /// Stamp the install date and start the lifetime counter, if this install
    /// has no install date yet. Returns whether anything was written.
    pub async fn record_install(&self, at: DateTime<Utc>) -> Result<bool> {
        if self.store.install_date().await?.is_some() {
            return Ok(false);
        }
        self.store.set_install_date(at).await?;
        if self.store.lifetime_project_count().await?.is_none() {
            self.store.set_lifetime_project_count(0).await?;
        }
        Ok(true)
    }

    /// Count `created` new projects against the lifetime counter. A missing
    /// counter stays missing.
    pub async fn record_projects_created(&self, created: u64) -> Result<()> {
        if created == 0 {
            return Ok(());
        }
        if let Some(count) = self.store.lifetime_project_count().await? {
            self.store
                .set_lifetime_project_count(count.saturating_add(created))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        INSTALL_DATE_KEY, LAST_SYNC_KEY, LEGACY_SETTINGS_KEY, LIFETIME_PROJECT_COUNT_KEY,
        MemoryStore,
    };
    use crate::test_utils::ManualClock;
    use serde_json::json;

    fn detector(kv: &MemoryStore) -> (FreshInstallDetector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = ProjectStore::new(Arc::new(kv.clone()));
        let detector = FreshInstallDetector::new(store, clock.clone(), &SyncSettings::default());
        (detector, clock)
    }

    fn days_ago(clock: &ManualClock, days: i64) -> serde_json::Value {
        serde_json::to_value(clock.now() - Duration::days(days)).unwrap()
    }

    #[tokio::test]
    async fn test_young_install_with_one_project_is_fresh() {
        let kv = MemoryStore::new()
            .with_value(LEGACY_SETTINGS_KEY, json!({"p1": {"repoName": "a"}}))
            .with_value(LIFETIME_PROJECT_COUNT_KEY, json!(5));
        let (detector, clock) = detector(&kv);
        kv.insert(INSTALL_DATE_KEY, days_ago(&clock, 2));
        assert!(detector.is_fresh_install().await);
    }

    #[tokio::test]
    async fn test_old_install_with_low_usage_is_fresh() {
        let kv = MemoryStore::new().with_value(LIFETIME_PROJECT_COUNT_KEY, json!(2));
        let (detector, clock) = detector(&kv);
        kv.insert(INSTALL_DATE_KEY, days_ago(&clock, 90));
        assert!(detector.is_fresh_install().await);
    }

    #[tokio::test]
    async fn test_any_sync_makes_install_established() {
        let kv = MemoryStore::new()
            .with_value(LIFETIME_PROJECT_COUNT_KEY, json!(0))
            .with_value(LAST_SYNC_KEY, json!("2026-02-01T00:00:00Z"));
        let (detector, clock) = detector(&kv);
        kv.insert(INSTALL_DATE_KEY, days_ago(&clock, 1));
        assert!(!detector.is_fresh_install().await);
    }

    #[tokio::test]
    async fn test_two_tracked_projects_is_established() {
        let kv = MemoryStore::new()
            .with_value(
                LEGACY_SETTINGS_KEY,
                json!({"p1": {"repoName": "a"}, "p2": {"repoName": "b"}}),
            )
            .with_value(LIFETIME_PROJECT_COUNT_KEY, json!(0));
        let (detector, _clock) = detector(&kv);
        assert!(!detector.is_fresh_install().await);
    }

    #[tokio::test]
    async fn test_missing_signals_bias_to_established() {
        let kv = MemoryStore::new();
        let (detector, _clock) = detector(&kv);
        assert!(!detector.is_fresh_install().await);

        kv.set_fail_reads(true);
        assert!(!detector.is_fresh_install().await);
    }

    #[tokio::test]
    async fn test_record_install_is_write_once() {
        let kv = MemoryStore::new();
        let (detector, clock) = detector(&kv);
        assert!(detector.record_install(clock.now()).await.unwrap());
        assert_eq!(kv.value(LIFETIME_PROJECT_COUNT_KEY), Some(json!(0)));

        clock.advance(Duration::days(30));
        assert!(!detector.record_install(clock.now()).await.unwrap());
        assert_eq!(kv.value(INSTALL_DATE_KEY), Some(days_ago(&clock, 30)));

        detector.record_projects_created(2).await.unwrap();
        assert_eq!(kv.value(LIFETIME_PROJECT_COUNT_KEY), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_missing_counter_is_not_started_by_creation() {
        let kv = MemoryStore::new();
        let (detector, _clock) = detector(&kv);
        detector.record_projects_created(1).await.unwrap();
        assert_eq!(kv.value(LIFETIME_PROJECT_COUNT_KEY), None);
    }
}
