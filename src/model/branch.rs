use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::version::VersionId;

// ---------------------------------------------------------------------------
// Branch: a movable named pointer into the version store
// ---------------------------------------------------------------------------

/// Metadata for a named branch of a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name (e.g., "main", "feature/rewrite-ch3").
    pub name: String,
    /// Latest version on this branch.
    pub head: VersionId,
    /// When the branch was created.
    pub created_at: DateTime<Utc>,
    /// Branch that was current when this one was created.
    pub parent_branch: Option<String>,
}

impl Branch {
    /// Create a new branch pointing at `head`.
    pub fn new(name: impl Into<String>, head: VersionId, parent_branch: Option<String>) -> Self {
        Self {
            name: name.into(),
            head,
            created_at: Utc::now(),
            parent_branch,
        }
    }
}
