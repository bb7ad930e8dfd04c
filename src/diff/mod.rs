use std::collections::HashMap;

use crate::model::diff::{Diff, DiffStats, Modification};
use crate::model::item::{changed_fields, identity_of, Item};

pub mod lcs;

pub use lcs::lcs_pairs;

// ---------------------------------------------------------------------------
// DiffEngine: item-granular structural diff
// ---------------------------------------------------------------------------

/// Where an item of a sequence lands after partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    /// Record with a stable identity.
    Identified(String),
    /// Index into [`Partition::anonymous`].
    Anonymous(usize),
}

/// A content sequence split into identified and anonymous items.
pub(crate) struct Partition<'a> {
    /// identity -> (position, item); first occurrence of each identity only.
    pub identified: HashMap<String, (usize, &'a Item)>,
    /// Anonymous items with their positions, in order.
    pub anonymous: Vec<(usize, &'a Item)>,
    /// One slot per position of the original sequence.
    pub layout: Vec<Slot>,
}

impl<'a> Partition<'a> {
    pub fn get(&self, identity: &str) -> Option<&'a Item> {
        self.identified.get(identity).map(|&(_, item)| item)
    }

    pub fn anonymous_items(&self) -> Vec<&'a Item> {
        self.anonymous.iter().map(|&(_, item)| item).collect()
    }

    /// Identities in sequence order.
    pub fn identities(&self) -> impl Iterator<Item = &String> {
        self.layout.iter().filter_map(|slot| match slot {
            Slot::Identified(id) => Some(id),
            Slot::Anonymous(_) => None,
        })
    }
}

/// Computes item-level differences between content snapshots.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    identity_field: String,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new("id")
    }
}

impl DiffEngine {
    pub fn new(identity_field: impl Into<String>) -> Self {
        Self {
            identity_field: identity_field.into(),
        }
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Split `items` into identified records and anonymous values.
    ///
    /// A repeated identity is only honoured for its first occurrence; later
    /// items with the same identity are treated as anonymous.
    pub(crate) fn partition<'a>(&self, items: &'a [Item]) -> Partition<'a> {
        let mut identified = HashMap::new();
        let mut anonymous = Vec::new();
        let mut layout = Vec::with_capacity(items.len());

        for (position, item) in items.iter().enumerate() {
            match identity_of(item, &self.identity_field) {
                Some(id) if !identified.contains_key(&id) => {
                    identified.insert(id.clone(), (position, item));
                    layout.push(Slot::Identified(id));
                }
                _ => {
                    layout.push(Slot::Anonymous(anonymous.len()));
                    anonymous.push((position, item));
                }
            }
        }

        Partition {
            identified,
            anonymous,
            layout,
        }
    }

    /// Structural diff from `from` to `to`.
    ///
    /// Identified records are matched by identity and may be reported as
    /// modified. Anonymous items are aligned with a longest common
    /// subsequence; a changed anonymous value shows up as one removal plus
    /// one addition.
    pub fn diff(&self, from: &[Item], to: &[Item]) -> Diff {
        let old = self.partition(from);
        let new = self.partition(to);

        let mut added: Vec<(usize, &Item)> = Vec::new();
        let mut removed: Vec<(usize, &Item)> = Vec::new();
        let mut modified = Vec::new();
        let mut unchanged = 0;

        for (id, &(position, item)) in &old.identified {
            if !new.identified.contains_key(id) {
                removed.push((position, item));
            }
        }

        for id in new.identities() {
            let (index, new_item) = new.identified[id];
            match old.get(id) {
                None => added.push((index, new_item)),
                Some(old_item) if old_item == new_item => unchanged += 1,
                Some(old_item) => modified.push(Modification {
                    identity: id.clone(),
                    index,
                    old: old_item.clone(),
                    new: new_item.clone(),
                    changed_fields: changed_fields(old_item, new_item),
                }),
            }
        }

        let old_anon = old.anonymous_items();
        let new_anon = new.anonymous_items();
        let pairs = lcs_pairs(&old_anon, &new_anon);
        unchanged += pairs.len();

        let mut kept_old = vec![false; old_anon.len()];
        let mut kept_new = vec![false; new_anon.len()];
        for &(i, j) in &pairs {
            kept_old[i] = true;
            kept_new[j] = true;
        }
        removed.extend(
            old.anonymous
                .iter()
                .zip(&kept_old)
                .filter(|(_, kept)| !**kept)
                .map(|(&entry, _)| entry),
        );
        added.extend(
            new.anonymous
                .iter()
                .zip(&kept_new)
                .filter(|(_, kept)| !**kept)
                .map(|(&entry, _)| entry),
        );

        added.sort_by_key(|&(position, _)| position);
        removed.sort_by_key(|&(position, _)| position);

        let stats = DiffStats {
            added_count: added.len(),
            removed_count: removed.len(),
            modified_count: modified.len(),
            unchanged_count: unchanged,
        };

        Diff {
            from_version: None,
            to_version: None,
            added: added.into_iter().map(|(_, item)| item.clone()).collect(),
            removed: removed.into_iter().map(|(_, item)| item.clone()).collect(),
            modified,
            summary: format!(
                "+{} -{} ~{}",
                stats.added_count, stats.removed_count, stats.modified_count
            ),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_of_identical_content_is_empty() {
        let engine = DiffEngine::default();
        let content = vec![
            json!({"id": "a", "text": "x"}),
            json!("loose"),
            json!({"id": "a", "text": "dup"}),
            json!(42),
        ];
        let diff = engine.diff(&content, &content);
        assert!(diff.is_empty());
        assert_eq!(diff.stats.unchanged_count, content.len());
        assert_eq!(diff.summary, "+0 -0 ~0");
    }

    #[test]
    fn test_identified_add_remove() {
        let engine = DiffEngine::default();
        let diff = engine.diff(
            &[json!({"id": "a"}), json!({"id": "b"})],
            &[json!({"id": "b"}), json!({"id": "c"})],
        );
        assert_eq!(diff.added, vec![json!({"id": "c"})]);
        assert_eq!(diff.removed, vec![json!({"id": "a"})]);
        assert_eq!(diff.stats.modified_count, 0);
        assert_eq!(diff.stats.unchanged_count, 1);
        assert_eq!(diff.summary, "+1 -1 ~0");
    }

    #[test]
    fn test_modified_reports_changed_fields() {
        let engine = DiffEngine::default();
        let diff = engine.diff(
            &[json!({"id": "a", "text": "hello", "n": 1})],
            &[json!({"id": "a", "text": "hello world", "n": 1})],
        );
        assert_eq!(diff.modified.len(), 1);
        let m = &diff.modified[0];
        assert_eq!(m.identity, "a");
        assert_eq!(m.index, 0);
        assert_eq!(m.changed_fields, Some(vec!["text".to_string()]));
        assert_eq!(diff.summary, "+0 -0 ~1");
    }

    #[test]
    fn test_anonymous_change_is_remove_plus_add() {
        let engine = DiffEngine::default();
        let diff = engine.diff(
            &[json!("one"), json!("two"), json!("three")],
            &[json!("one"), json!("2"), json!("three")],
        );
        assert_eq!(diff.removed, vec![json!("two")]);
        assert_eq!(diff.added, vec![json!("2")]);
        assert!(diff.modified.is_empty());
        assert_eq!(diff.stats.unchanged_count, 2);
    }

    #[test]
    fn test_mixed_ordering_follows_positions() {
        let engine = DiffEngine::default();
        let diff = engine.diff(
            &[json!({"id": "a"}), json!("x")],
            &[json!("new-first"), json!({"id": "a"}), json!("x"), json!({"id": "z"})],
        );
        assert_eq!(diff.added, vec![json!("new-first"), json!({"id": "z"})]);
        assert!(diff.removed.is_empty());
        assert_eq!(diff.stats.unchanged_count, 2);
    }

    #[test]
    fn test_reorder_of_identified_items_is_not_a_change() {
        let engine = DiffEngine::default();
        let diff = engine.diff(
            &[json!({"id": "a"}), json!({"id": "b"})],
            &[json!({"id": "b"}), json!({"id": "a"})],
        );
        assert!(diff.is_empty());
        assert_eq!(diff.stats.unchanged_count, 2);
    }

    #[test]
    fn test_custom_identity_field() {
        let engine = DiffEngine::new("key");
        let diff = engine.diff(
            &[json!({"key": 1, "v": "a"})],
            &[json!({"key": 1, "v": "b"})],
        );
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].identity, "#1");
    }

    #[test]
    fn test_number_and_string_ids_do_not_match() {
        let engine = DiffEngine::default();
        let diff = engine.diff(&[json!({"id": 7})], &[json!({"id": "7"})]);
        assert!(diff.modified.is_empty());
        assert_eq!(diff.removed, vec![json!({"id": 7})]);
        assert_eq!(diff.added, vec![json!({"id": "7"})]);
        assert_eq!(diff.summary, "+1 -1 ~0");
    }
}
