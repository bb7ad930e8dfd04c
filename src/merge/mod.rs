use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

use crate::diff::{lcs_pairs, DiffEngine, Partition, Slot};
use crate::error::{VellumError, VellumResult};
use crate::model::buffer::Buffer;
use crate::model::item::Item;
use crate::model::merge::{
    Conflict, ConflictResolution, MergeDetails, MergeOptions, MergeResult, MergeStrategy,
};
use crate::model::version::Version;

// ---------------------------------------------------------------------------
// MergeEngine: three-way merge over a buffer's branches
// ---------------------------------------------------------------------------

/// Tag carried by every merge version.
pub const MERGE_TAG: &str = "merge";

/// Metadata keys recorded on merge versions.
pub const MERGE_SOURCE: &str = "merge_source";
pub const MERGE_SOURCE_HEAD: &str = "merge_source_head";
pub const MERGE_STRATEGY: &str = "merge_strategy";

/// Merged content for one base/ours/theirs triple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentMerge {
    pub content: Vec<Item>,
    /// Conflicts no strategy or caller resolution settled.
    pub conflicts: Vec<Conflict>,
    /// Conflicts settled, with the resolution that was applied.
    pub resolved: Vec<Conflict>,
}

/// How one side changed an identity relative to the base.
#[derive(Debug, Clone, Copy)]
enum Change<'a> {
    Absent,
    Unchanged,
    Added(&'a Item),
    Modified(&'a Item),
    Removed,
}

impl<'a> Change<'a> {
    fn classify(base: Option<&'a Item>, side: Option<&'a Item>) -> Self {
        match (base, side) {
            (None, None) => Change::Absent,
            (None, Some(item)) => Change::Added(item),
            (Some(_), None) => Change::Removed,
            (Some(b), Some(item)) if b == item => Change::Unchanged,
            (Some(_), Some(item)) => Change::Modified(item),
        }
    }
}

/// Where a merged item came from; used to anchor source-side insertions.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Identified(String),
    /// Anonymous item kept from the base, by base anonymous index.
    Base(usize),
    /// Anonymous item added on the current branch, by its anonymous index.
    Ours(usize),
    /// Anonymous item added on the source branch.
    Theirs(usize),
}

/// Performs three-way merges using a [`DiffEngine`] for item identity.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    diff: DiffEngine,
}

impl MergeEngine {
    pub fn new(diff: DiffEngine) -> Self {
        Self { diff }
    }

    /// Merge branch `source` into the buffer's current branch.
    ///
    /// Conflicts left unresolved are returned in the result and leave the
    /// buffer untouched. On success a merge version is appended on the
    /// current branch and checked out, except when the source is already
    /// contained: its head is an ancestor of the current head, or an earlier
    /// merge version recorded it in `merge_source_head`. That case succeeds
    /// with `details.up_to_date` set and appends nothing.
    pub fn merge(
        &self,
        buffer: &mut Buffer,
        source: &str,
        options: MergeOptions,
    ) -> VellumResult<MergeResult> {
        let target = buffer.current_branch().to_string();
        if source == target {
            return Err(VellumError::InvalidMerge(format!(
                "cannot merge branch '{}' into itself",
                source
            )));
        }
        let theirs_head = buffer.branch(source)?.head.clone();
        let ours_head = buffer.head()?.head.clone();
        if buffer.is_dirty() {
            return Err(VellumError::UncommittedChanges { branch: target });
        }

        let versions = buffer.versions();
        let base_id = versions.lowest_common_ancestor(&ours_head, &theirs_head)?;
        let ours = versions.get(&ours_head)?.content.clone();
        let theirs = versions.get(&theirs_head)?.content.clone();
        let base = match &base_id {
            Some(id) => versions.get(id)?.content.clone(),
            None => Vec::new(),
        };

        let mut details = MergeDetails {
            source_branch: source.to_string(),
            target_branch: target.clone(),
            base_version: base_id.clone(),
            ours_version: ours_head.clone(),
            theirs_version: theirs_head.clone(),
            ours_changes: self.diff.diff(&base, &ours).stats,
            theirs_changes: self.diff.diff(&base, &theirs).stats,
            ..MergeDetails::default()
        };

        // Versions keep a single parent, so a source head merged before is
        // found through the metadata of earlier merge versions.
        let already_merged = versions.ancestors(&ours_head)?.any(|v| {
            v.metadata.get(MERGE_SOURCE_HEAD).and_then(Value::as_str) == Some(theirs_head.as_str())
        });
        if already_merged || base_id.as_deref() == Some(theirs_head.as_str()) {
            details.up_to_date = true;
            info!(buffer = %buffer.id(), source, into = %target, "already up to date");
            return Ok(MergeResult {
                success: true,
                conflicts: Vec::new(),
                merged_content: Some(ours),
                new_version_id: None,
                strategy: options.strategy,
                details,
            });
        }

        let merged = if ours == base {
            details.fast_forward = true;
            ContentMerge {
                content: theirs,
                ..ContentMerge::default()
            }
        } else {
            self.merge_content(&base, &ours, &theirs, options.strategy, &options.resolutions)
        };
        details.resolved_conflicts = merged.resolved;

        if !merged.conflicts.is_empty() {
            warn!(
                buffer = %buffer.id(),
                source,
                into = %target,
                conflicts = merged.conflicts.len(),
                "merge stopped on conflicts"
            );
            return Ok(MergeResult {
                success: false,
                conflicts: merged.conflicts,
                merged_content: None,
                new_version_id: None,
                strategy: options.strategy,
                details,
            });
        }

        if let Some(schema) = buffer.schema() {
            schema.validate(&merged.content)?;
        }

        let message = options
            .message
            .unwrap_or_else(|| format!("Merge branch '{}' into '{}'", source, target));
        let metadata = BTreeMap::from([
            (MERGE_SOURCE.to_string(), json!(source)),
            (MERGE_SOURCE_HEAD.to_string(), json!(theirs_head)),
            (MERGE_STRATEGY.to_string(), json!(options.strategy.to_string())),
        ]);
        let version = Version::new(merged.content.clone(), message, Some(ours_head))
            .with_tags([MERGE_TAG])
            .with_metadata(metadata);
        let new_id = buffer.append_to_current(version)?;

        info!(
            buffer = %buffer.id(),
            source,
            into = %target,
            strategy = %options.strategy,
            fast_forward = details.fast_forward,
            resolved = details.resolved_conflicts.len(),
            "merged branch"
        );

        Ok(MergeResult {
            success: true,
            conflicts: Vec::new(),
            merged_content: Some(merged.content),
            new_version_id: Some(new_id),
            strategy: options.strategy,
            details,
        })
    }

    /// Three-way merge of raw content.
    ///
    /// The current side's order is kept; items only the source side
    /// contributes are inserted after the closest preceding item they
    /// followed on the source side, and never ahead of an earlier source-only
    /// item, so they keep their source order even when anchors were reordered.
    pub fn merge_content(
        &self,
        base: &[Item],
        ours: &[Item],
        theirs: &[Item],
        strategy: MergeStrategy,
        resolutions: &[Conflict],
    ) -> ContentMerge {
        let base_p = self.diff.partition(base);
        let ours_p = self.diff.partition(ours);
        let theirs_p = self.diff.partition(theirs);

        let mut result = ContentMerge::default();
        let outcomes =
            self.resolve_identities(&base_p, &ours_p, &theirs_p, strategy, resolutions, &mut result);

        // Anonymous items: align each side against the base.
        let base_anon = base_p.anonymous_items();
        let ours_anon = ours_p.anonymous_items();
        let theirs_anon = theirs_p.anonymous_items();
        let ours_from_base: HashMap<usize, usize> = lcs_pairs(&base_anon, &ours_anon)
            .into_iter()
            .map(|(b, o)| (o, b))
            .collect();
        let theirs_from_base: HashMap<usize, usize> = lcs_pairs(&base_anon, &theirs_anon)
            .into_iter()
            .map(|(b, t)| (t, b))
            .collect();
        let kept_by_theirs: HashSet<usize> = theirs_from_base.values().copied().collect();

        let mut merged: Vec<(Origin, Item)> = Vec::with_capacity(ours.len() + theirs.len());
        let mut placed: HashSet<&str> = HashSet::new();

        for slot in &ours_p.layout {
            match slot {
                Slot::Identified(id) => {
                    placed.insert(id.as_str());
                    for item in outcomes.get(id.as_str()).into_iter().flatten() {
                        merged.push((Origin::Identified(id.clone()), item.clone()));
                    }
                }
                Slot::Anonymous(k) => {
                    let item = ours_anon[*k].clone();
                    match ours_from_base.get(k) {
                        Some(b) if kept_by_theirs.contains(b) => merged.push((Origin::Base(*b), item)),
                        Some(_) => {}
                        None => merged.push((Origin::Ours(*k), item)),
                    }
                }
            }
        }

        let mut unmatched_ours: Vec<usize> = (0..ours_anon.len())
            .filter(|k| !ours_from_base.contains_key(k))
            .collect();
        // Insertion point, and the slot just past the last source-only item.
        let mut cursor = 0;
        let mut floor = 0;

        for slot in &theirs_p.layout {
            match slot {
                Slot::Identified(id) => {
                    if placed.contains(id.as_str()) {
                        let anchor = Origin::Identified(id.clone());
                        if let Some(pos) = merged.iter().rposition(|(o, _)| *o == anchor) {
                            cursor = (pos + 1).max(floor);
                        }
                        continue;
                    }
                    placed.insert(id.as_str());
                    for item in outcomes.get(id.as_str()).into_iter().flatten() {
                        merged.insert(cursor, (Origin::Identified(id.clone()), item.clone()));
                        cursor += 1;
                        floor = cursor;
                    }
                }
                Slot::Anonymous(k) => {
                    let anchor = match theirs_from_base.get(k) {
                        Some(b) => Some(Origin::Base(*b)),
                        None => {
                            // Same value added on both sides: keep a single copy.
                            let item = theirs_anon[*k];
                            let twin = unmatched_ours.iter().position(|&o| ours_anon[o] == item);
                            twin.map(|i| Origin::Ours(unmatched_ours.remove(i)))
                        }
                    };
                    match anchor {
                        Some(anchor) => {
                            if let Some(pos) = merged.iter().position(|(o, _)| *o == anchor) {
                                cursor = (pos + 1).max(floor);
                            }
                        }
                        None => {
                            merged.insert(cursor, (Origin::Theirs(*k), theirs_anon[*k].clone()));
                            cursor += 1;
                            floor = cursor;
                        }
                    }
                }
            }
        }

        result.content = merged.into_iter().map(|(_, item)| item).collect();
        result
    }

    /// Decide the merged items for every identity seen on any side.
    fn resolve_identities<'p>(
        &self,
        base: &'p Partition<'_>,
        ours: &'p Partition<'_>,
        theirs: &'p Partition<'_>,
        strategy: MergeStrategy,
        resolutions: &[Conflict],
        result: &mut ContentMerge,
    ) -> HashMap<&'p str, Vec<Item>> {
        let identities: HashSet<&'p str> = base
            .identified
            .keys()
            .chain(ours.identified.keys())
            .chain(theirs.identified.keys())
            .map(String::as_str)
            .collect();

        // Sort so conflicts come out in a stable order.
        let mut identities: Vec<&'p str> = identities.into_iter().collect();
        identities.sort_unstable();

        let mut outcomes = HashMap::with_capacity(identities.len());
        for id in identities {
            let b = base.get(id);
            let o = ours.get(id);
            let t = theirs.get(id);

            let decided: Result<Vec<Item>, Conflict> =
                match (Change::classify(b, o), Change::classify(b, t)) {
                    (Change::Unchanged, Change::Unchanged) => Ok(b.into_iter().cloned().collect()),
                    (Change::Unchanged, Change::Modified(item))
                    | (Change::Modified(item), Change::Unchanged)
                    | (Change::Added(item), Change::Absent)
                    | (Change::Absent, Change::Added(item)) => Ok(vec![item.clone()]),
                    (Change::Modified(x), Change::Modified(y))
                    | (Change::Added(x), Change::Added(y)) => {
                        if x == y {
                            Ok(vec![x.clone()])
                        } else {
                            Err(Conflict::new(id, Some(x.clone()), Some(y.clone()), b.cloned()))
                        }
                    }
                    (Change::Removed, Change::Modified(y)) => {
                        Err(Conflict::new(id, None, Some(y.clone()), b.cloned()))
                    }
                    (Change::Modified(x), Change::Removed) => {
                        Err(Conflict::new(id, Some(x.clone()), None, b.cloned()))
                    }
                    _ => Ok(Vec::new()),
                };

            let items = match decided {
                Ok(items) => items,
                Err(conflict) => match self.settle(&conflict, strategy, resolutions) {
                    Some(resolution) => {
                        let items = conflict.outcome(&resolution);
                        result.resolved.push(conflict.resolve(resolution));
                        items
                    }
                    None => {
                        result.conflicts.push(conflict);
                        Vec::new()
                    }
                },
            };
            outcomes.insert(id, items);
        }
        outcomes
    }

    /// Resolution for a conflict: the caller's, else the strategy's.
    fn settle(
        &self,
        conflict: &Conflict,
        strategy: MergeStrategy,
        resolutions: &[Conflict],
    ) -> Option<ConflictResolution> {
        let supplied = resolutions
            .iter()
            .filter(|c| c.identity == conflict.identity && c.resolved)
            .find_map(|c| c.resolution.clone());
        if supplied.is_some() {
            return supplied;
        }
        match strategy {
            MergeStrategy::Auto => None,
            MergeStrategy::Ours => Some(ConflictResolution::Ours),
            MergeStrategy::Theirs => Some(ConflictResolution::Theirs),
            MergeStrategy::Union => Some(ConflictResolution::Both),
        }
    }
}
