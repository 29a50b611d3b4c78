//! Recent-edit protection.
//!
//! The settings-save path records every user edit of repo name, branch or
//! title. While a record is younger than the race window, sync passes must not
//! write that project back into the legacy settings map.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::store::ProjectStore;
use crate::types::{ProjectField, RecentChangeRecord};

/// A protected edit as seen at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentChange {
    /// Fields touched by the edit.
    pub fields: Vec<ProjectField>,
    /// Age computed against the clock when queried.
    pub age: Duration,
}

/// Tracks recent local field edits.
///
/// Clones share one lock over the record document, so concurrent
/// `record_change` calls never drop each other's records.
#[derive(Clone)]
pub struct RaceWindowGuard {
    store: ProjectStore,
    clock: Arc<dyn Clock>,
    window: Duration,
    records: Arc<Mutex<()>>,
}

impl RaceWindowGuard {
    /// Create a guard with the given default window.
    pub fn new(store: ProjectStore, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window,
            records: Arc::new(Mutex::new(())),
        }
    }

    /// Default protection window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an edit. Replaces any previous record for `project_id` and drops
    /// records that have already aged out.
    pub async fn record_change(
        &self,
        project_id: &str,
        fields: &[ProjectField],
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let _records = self.records.lock().await;
        let now = self.clock.now();
        let mut records = self.store.recent_changes().await?;
        records.retain(|_, record| record.age(now) < self.window);
        records.insert(
            project_id.to_string(),
            RecentChangeRecord {
                project_id: project_id.to_string(),
                changed_fields: fields.to_vec(),
                timestamp,
            },
        );
        debug!("Recorded local edit of {} ({:?})", project_id, fields);
        self.store.save_recent_changes(&records).await
    }

    /// Edits younger than the default window.
    pub async fn get_recent_changes(&self) -> Result<BTreeMap<String, RecentChange>> {
        self.get_recent_changes_within(self.window).await
    }

    /// Edits younger than `window`, aged against the clock right now.
    pub async fn get_recent_changes_within(
        &self,
        window: Duration,
    ) -> Result<BTreeMap<String, RecentChange>> {
        let now = self.clock.now();
        let records = self.store.recent_changes().await?;
        Ok(records
            .into_iter()
            .filter_map(|(id, record)| {
                let age = record.age(now);
                (age < window).then(|| {
                    (
                        id,
                        RecentChange {
                            fields: record.changed_fields,
                            age,
                        },
                    )
                })
            })
            .collect())
    }

    /// Whether `project_id` currently has a protected edit.
    pub async fn is_protected(&self, project_id: &str) -> Result<bool> {
        Ok(self.get_recent_changes().await?.contains_key(project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, ValueMap};
    use crate::test_utils::ManualClock;

    fn guard() -> (RaceWindowGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = ProjectStore::new(Arc::new(MemoryStore::new()));
        let guard = RaceWindowGuard::new(store, clock.clone(), Duration::milliseconds(30_000));
        (guard, clock)
    }

    #[tokio::test]
    async fn test_age_is_computed_at_query_time() {
        let (guard, clock) = guard();
        guard
            .record_change("p1", &[ProjectField::Branch], clock.now())
            .await
            .unwrap();

        clock.advance(Duration::seconds(10));
        let recent = guard.get_recent_changes().await.unwrap();
        assert_eq!(recent["p1"].age, Duration::seconds(10));
        assert_eq!(recent["p1"].fields, vec![ProjectField::Branch]);

        clock.advance(Duration::seconds(20));
        assert!(guard.get_recent_changes().await.unwrap().is_empty());
        assert!(!guard.is_protected("p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_one_record_per_project() {
        let (guard, clock) = guard();
        guard
            .record_change("p1", &[ProjectField::RepoName], clock.now())
            .await
            .unwrap();
        clock.advance(Duration::seconds(5));
        guard
            .record_change("p1", &[ProjectField::Title], clock.now())
            .await
            .unwrap();

        let recent = guard.get_recent_changes().await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent["p1"].fields, vec![ProjectField::Title]);
        assert_eq!(recent["p1"].age, Duration::zero());
    }

    /// Yields to the scheduler around every store call.
    struct YieldingStore(MemoryStore);

    #[async_trait::async_trait]
    impl KeyValueStore for YieldingStore {
        async fn get(&self, keys: &[&str]) -> Result<ValueMap> {
            tokio::task::yield_now().await;
            let values = self.0.get(keys).await;
            tokio::task::yield_now().await;
            values
        }

        async fn set(&self, values: ValueMap) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.set(values).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_edits_keep_both_records() {
        let clock = Arc::new(ManualClock::default());
        let store = ProjectStore::new(Arc::new(YieldingStore(MemoryStore::new())));
        let guard = RaceWindowGuard::new(store, clock.clone(), Duration::milliseconds(30_000));
        let other = guard.clone();

        let (first, second) = tokio::join!(
            guard.record_change("p1", &[ProjectField::Branch], clock.now()),
            other.record_change("p2", &[ProjectField::RepoName], clock.now()),
        );
        first.unwrap();
        second.unwrap();

        let recent = guard.get_recent_changes().await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.contains_key("p1"));
        assert!(recent.contains_key("p2"));
    }

    #[tokio::test]
    async fn test_custom_window() {
        let (guard, clock) = guard();
        guard
            .record_change("p1", &[ProjectField::Branch], clock.now())
            .await
            .unwrap();
        clock.advance(Duration::seconds(3));
        assert!(
            guard
                .get_recent_changes_within(Duration::seconds(2))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(guard.is_protected("p1").await.unwrap());
    }
}
