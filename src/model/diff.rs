use serde::{Deserialize, Serialize};

use crate::model::item::Item;
use crate::model::version::VersionId;

// ---------------------------------------------------------------------------
// Diff: structural difference between two content snapshots
// ---------------------------------------------------------------------------

/// An identified item whose value changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    /// Identity key shared by the old and new item.
    pub identity: String,
    /// Position of the new item in the target sequence.
    pub index: usize,
    pub old: Item,
    pub new: Item,
    /// Differing keys, present when both sides are records.
    pub changed_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added_count: usize,
    pub removed_count: usize,
    pub modified_count: usize,
    pub unchanged_count: usize,
}

/// Result of comparing two content sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Source version, when the diff was taken between stored versions.
    pub from_version: Option<VersionId>,
    /// Target version (None for working content or raw slices).
    pub to_version: Option<VersionId>,
    /// Items only in the target, in target order.
    pub added: Vec<Item>,
    /// Items only in the source, in source order.
    pub removed: Vec<Item>,
    pub modified: Vec<Modification>,
    pub stats: DiffStats,
    /// Rendered as `+{added} -{removed} ~{modified}`.
    pub summary: String,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Attach the version ids the compared content came from.
    pub fn between(mut self, from: Option<VersionId>, to: Option<VersionId>) -> Self {
        self.from_version = from;
        self.to_version = to;
        self
    }
}
