use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::model::item::{content_hash, Item};

// ---------------------------------------------------------------------------
// Version: an immutable content snapshot in a buffer's history
// ---------------------------------------------------------------------------

/// A version identifier, unique within the history of a buffer.
pub type VersionId = String;

/// Generate a new version ID.
pub fn new_version_id() -> VersionId {
    format!("v-{}", Uuid::new_v4().as_simple())
}

/// A single commit. Never mutated once appended to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique version identifier.
    pub id: VersionId,
    /// Full content snapshot, owned by this version.
    pub content: Vec<Item>,
    /// Commit message.
    pub message: String,
    /// When the version was recorded.
    pub timestamp: DateTime<Utc>,
    /// Previous version (None for the root).
    pub parent_id: Option<VersionId>,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Extensible metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Hex SHA-256 of the content, see [`content_hash`].
    pub content_hash: String,
}

impl Version {
    /// Create a version with a fresh id and the current timestamp.
    pub fn new(
        content: Vec<Item>,
        message: impl Into<String>,
        parent_id: Option<VersionId>,
    ) -> Self {
        let content_hash = content_hash(&content);
        Self {
            id: new_version_id(),
            content,
            message: message.into(),
            timestamp: Utc::now(),
            parent_id,
            tags: BTreeSet::new(),
            metadata: BTreeMap::new(),
            content_hash,
        }
    }

    /// Add tags to this version.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Merge metadata entries into this version.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether the stored hash still matches the content.
    pub fn verify(&self) -> bool {
        content_hash(&self.content) == self.content_hash
    }
}

/// Optional extras attached to a commit.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl CommitOptions {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
