use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VellumError;
use crate::model::diff::DiffStats;
use crate::model::item::Item;
use crate::model::version::VersionId;

// ---------------------------------------------------------------------------
// Merge strategies, conflicts and results
// ---------------------------------------------------------------------------

/// How conflicting changes are settled during a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Report conflicts and create nothing.
    #[default]
    Auto,
    /// Current branch wins every conflict.
    Ours,
    /// Source branch wins every conflict.
    Theirs,
    /// Keep both sides, current branch first.
    Union,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Auto => "auto",
            MergeStrategy::Ours => "ours",
            MergeStrategy::Theirs => "theirs",
            MergeStrategy::Union => "union",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeStrategy {
    type Err = VellumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(MergeStrategy::Auto),
            "ours" => Ok(MergeStrategy::Ours),
            "theirs" => Ok(MergeStrategy::Theirs),
            "union" => Ok(MergeStrategy::Union),
            other => Err(VellumError::InvalidArgument(format!(
                "unknown merge strategy '{}'; expected auto, ours, theirs or union",
                other
            ))),
        }
    }
}

/// Caller decision for a single conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ConflictResolution {
    Ours,
    Theirs,
    Both,
    Custom(Item),
}

/// A single identity both sides changed incompatibly since their common ancestor.
///
/// `None` on a side means that side deleted the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub identity: String,
    pub ours: Option<Item>,
    pub theirs: Option<Item>,
    pub base: Option<Item>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolution: Option<ConflictResolution>,
}

impl Conflict {
    pub fn new(
        identity: impl Into<String>,
        ours: Option<Item>,
        theirs: Option<Item>,
        base: Option<Item>,
    ) -> Self {
        Self {
            identity: identity.into(),
            ours,
            theirs,
            base,
            resolved: false,
            resolution: None,
        }
    }

    /// Mark this conflict resolved with the given decision.
    pub fn resolve(mut self, resolution: ConflictResolution) -> Self {
        self.resolved = true;
        self.resolution = Some(resolution);
        self
    }

    /// Items this conflict contributes to merged content under `resolution`.
    pub fn outcome(&self, resolution: &ConflictResolution) -> Vec<Item> {
        match resolution {
            ConflictResolution::Ours => self.ours.iter().cloned().collect(),
            ConflictResolution::Theirs => self.theirs.iter().cloned().collect(),
            ConflictResolution::Both => self
                .ours
                .iter()
                .chain(self.theirs.iter())
                .cloned()
                .collect(),
            ConflictResolution::Custom(item) => vec![item.clone()],
        }
    }
}

/// Options for a merge call.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Commit message; defaults to `Merge branch '<source>' into '<current>'`.
    pub message: Option<String>,
    /// Caller resolutions from a previous attempt, matched by identity.
    pub resolutions: Vec<Conflict>,
}

impl MergeOptions {
    pub fn strategy(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_resolutions(mut self, resolutions: Vec<Conflict>) -> Self {
        self.resolutions = resolutions;
        self
    }
}

/// Bookkeeping about how a merge was computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeDetails {
    pub source_branch: String,
    pub target_branch: String,
    pub base_version: Option<VersionId>,
    pub ours_version: VersionId,
    pub theirs_version: VersionId,
    /// Current branch had no changes since the common ancestor.
    pub fast_forward: bool,
    /// Source head was already contained in the current branch.
    pub up_to_date: bool,
    /// Changes on the current branch since the base.
    pub ours_changes: DiffStats,
    /// Changes on the source branch since the base.
    pub theirs_changes: DiffStats,
    /// Conflicts settled by the strategy or by caller resolutions.
    pub resolved_conflicts: Vec<Conflict>,
}

/// Outcome of a merge. Conflicts under `auto` are data, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub success: bool,
    /// Unresolved conflicts.
    pub conflicts: Vec<Conflict>,
    pub merged_content: Option<Vec<Item>>,
    pub new_version_id: Option<VersionId>,
    pub strategy: MergeStrategy,
    pub details: MergeDetails,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_round_trips_through_str() {
        for s in [
            MergeStrategy::Auto,
            MergeStrategy::Ours,
            MergeStrategy::Theirs,
            MergeStrategy::Union,
        ] {
            assert_eq!(s.to_string().parse::<MergeStrategy>().unwrap(), s);
        }
        assert!("octopus".parse::<MergeStrategy>().is_err());
    }

    #[test]
    fn test_conflict_outcome() {
        let c = Conflict::new("a", Some(json!({"v": 2})), Some(json!({"v": 3})), None);
        assert_eq!(c.outcome(&ConflictResolution::Ours), vec![json!({"v": 2})]);
        assert_eq!(
            c.outcome(&ConflictResolution::Both),
            vec![json!({"v": 2}), json!({"v": 3})]
        );
        assert_eq!(
            c.outcome(&ConflictResolution::Custom(json!({"v": 4}))),
            vec![json!({"v": 4})]
        );

        let deleted = Conflict::new("b", None, Some(json!({"v": 1})), Some(json!({"v": 0})));
        assert!(deleted.outcome(&ConflictResolution::Ours).is_empty());
        assert_eq!(deleted.outcome(&ConflictResolution::Both).len(), 1);
    }
}
