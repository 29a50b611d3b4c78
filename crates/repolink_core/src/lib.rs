//! # `repolink_core`
//!
//! Synchronization engine for a user's tracked "project ⇄ GitHub repository"
//! links. Two stores are independently writable:
//!
//! 1. the local registry (canonical project list plus the older per-project
//!    settings map still edited by UI surfaces), and
//! 2. the remote backend registry reached over `POST /sync-projects`.
//!
//! [`SyncCoordinator`] drives one linear pass per direction. The other modules
//! are the pieces it composes: [`LegacyFormatBridge`], [`RaceWindowGuard`],
//! [`FreshInstallDetector`] and [`ConflictResolver`].

#![warn(missing_docs)]

/// Authentication provider seam
pub mod auth;

/// Backend sync endpoint client
pub mod backend;

/// TTL cache owned by the coordinator
pub mod cache;

/// Injectable wall clock
pub mod clock;

/// Engine configuration
pub mod config;

/// Top-level sync orchestration
pub mod coordinator;

/// Error types
pub mod error;

/// Fresh-install heuristic
pub mod fresh_install;

/// Legacy settings map ⇄ canonical project list
pub mod legacy;

/// Recent-edit protection
pub mod race_guard;

/// Directional merge and deletion classification
pub mod resolver;

/// Key-value store seam and typed project storage
pub mod store;

/// Test doubles shared by unit and integration tests
#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

/// Data model
pub mod types;

/// Id and GitHub naming validation
pub mod validate;

pub use auth::{AuthProvider, AuthState, StaticAuthProvider};
pub use backend::{HttpSyncBackend, SyncBackend};
pub use cache::TokenCache;
pub use clock::{Clock, SystemClock};
pub use config::{InwardGateFallback, SyncSettings};
pub use coordinator::{SyncCoordinator, SyncDirection, SyncPhase};
pub use error::{Result, SyncError};
pub use fresh_install::FreshInstallDetector;
pub use legacy::{LegacyFormatBridge, LegacyPushOutcome, MigrationOutcome};
pub use race_guard::{RaceWindowGuard, RecentChange};
pub use resolver::{ConflictResolver, MergeOutcome, OutwardPlan};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, ProjectStore, ValueMap};
pub use types::{
    BackendProject, CanonicalProject, ConflictRecord, ConflictResolution, LegacyProjectEntry,
    LegacySettings, LocalEdit, ProjectField, ProjectMetadata, RecentChangeRecord, SyncRequest,
    SyncResponse, SyncStatus,
};
