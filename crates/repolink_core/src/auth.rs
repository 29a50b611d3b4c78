//! Authentication provider seam.
//!
//! The provider is injected into [`SyncCoordinator`](crate::SyncCoordinator);
//! hosts decide where tokens come from.

use async_trait::async_trait;

/// Snapshot of the host's sign-in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthState {
    /// Whether a user is signed in.
    pub is_authenticated: bool,
}

/// Source of backend credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Bearer token for the backend, or `None` when signed out.
    async fn get_auth_token(&self) -> Option<String>;

    /// Current sign-in state.
    async fn get_auth_state(&self) -> AuthState;
}

/// Provider serving a fixed optional token.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    token: Option<String>,
}

impl StaticAuthProvider {
    /// Signed in with `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Signed out.
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// Signed in iff `token` is present and non-empty.
    pub fn from_option(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn get_auth_token(&self) -> Option<String> {
        self.token.clone()
    }

    async fn get_auth_state(&self) -> AuthState {
        AuthState {
            is_authenticated: self.token.is_some(),
        }
    }
}
