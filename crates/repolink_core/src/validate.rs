//! Id and GitHub naming validation.
//!
//! The engine only filters on remote id; the owner/repo checks follow GitHub's
//! naming rules and are used by hosts when accepting user edits.

use crate::error::{Result, SyncError};
use crate::types::is_sentinel;

const MAX_OWNER_LEN: usize = 39;
const MAX_REPO_NAME_LEN: usize = 100;

/// Whether `remote_id` may be sent to the backend.
///
/// Must match `^[A-Za-z0-9_-]+$` and must not be the import placeholder.
pub fn is_valid_remote_id(remote_id: &str) -> bool {
    !remote_id.is_empty()
        && !is_sentinel(remote_id)
        && remote_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Like [`is_valid_remote_id`], as a `Result`.
pub fn check_remote_id(remote_id: &str) -> Result<()> {
    if is_valid_remote_id(remote_id) {
        Ok(())
    } else {
        Err(SyncError::Validation(format!("project id {:?}", remote_id)))
    }
}

/// GitHub user/organization name: alphanumerics and single hyphens, not at
/// either end, at most 39 characters.
pub fn is_valid_repo_owner(owner: &str) -> bool {
    !owner.is_empty()
        && owner.len() <= MAX_OWNER_LEN
        && !owner.starts_with('-')
        && !owner.ends_with('-')
        && !owner.contains("--")
        && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// GitHub repository name: `[A-Za-z0-9._-]`, at most 100 characters, not `.`
/// or `..`.
pub fn is_valid_repo_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_REPO_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
