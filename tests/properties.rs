//! Property tests for diffing, merging and snapshot round-trips.

use proptest::prelude::*;
use serde_json::{json, Value};
use vellum::persist::{restore, serialize, SerializedBuffer};
use vellum::{Buffer, CommitOptions, DiffEngine, MergeEngine, MergeStrategy};

/// Records drawn from a small identity pool so sides collide often, mixed
/// with anonymous scalars.
fn item() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (0u8..6, 0i64..3).prop_map(|(id, v)| json!({"id": format!("k{}", id), "v": v})),
        1 => "[a-c]{1,2}".prop_map(Value::from),
        1 => (0i64..4).prop_map(Value::from),
        1 => any::<bool>().prop_map(Value::from),
    ]
}

fn content() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(item(), 0..10)
}

proptest! {
    /// Property: a sequence diffed against itself reports no changes
    #[test]
    fn diff_of_identical_content_is_empty(items in content()) {
        let diff = DiffEngine::default().diff(&items, &items);
        prop_assert!(diff.is_empty());
        prop_assert_eq!(diff.stats.unchanged_count, items.len());
    }

    /// Property: every item is accounted for exactly once on each side
    #[test]
    fn diff_counts_cover_both_sides(from in content(), to in content()) {
        let stats = DiffEngine::default().diff(&from, &to).stats;
        prop_assert_eq!(stats.added_count + stats.modified_count + stats.unchanged_count, to.len());
        prop_assert_eq!(stats.removed_count + stats.modified_count + stats.unchanged_count, from.len());
    }

    /// Property: `ours` never conflicts and keeps whatever the current side added
    #[test]
    fn ours_strategy_keeps_current_additions(
        base in content(),
        ours in content(),
        theirs in content(),
    ) {
        let engine = MergeEngine::default();
        let merged = engine.merge_content(&base, &ours, &theirs, MergeStrategy::Ours, &[]);
        prop_assert!(merged.conflicts.is_empty());

        let added = DiffEngine::default().diff(&base, &ours).added;
        for item in &added {
            prop_assert!(merged.content.contains(item), "lost {}", item);
        }
    }

    /// Property: with an untouched current side, the source's additions land
    /// in the source's order
    #[test]
    fn source_additions_keep_their_order(base in content(), theirs in content()) {
        let merged = MergeEngine::default()
            .merge_content(&base, &base, &theirs, MergeStrategy::Auto, &[]);
        prop_assert!(merged.conflicts.is_empty());

        let added = DiffEngine::default().diff(&base, &theirs).added;
        let mut rest = merged.content.iter();
        for item in &added {
            prop_assert!(rest.any(|m| m == item), "{} out of order", item);
        }
    }

    /// Property: auto only reports identities whose two sides disagree
    #[test]
    fn auto_conflicts_have_disagreeing_sides(
        base in content(),
        ours in content(),
        theirs in content(),
    ) {
        let merged = MergeEngine::default()
            .merge_content(&base, &ours, &theirs, MergeStrategy::Auto, &[]);
        for conflict in &merged.conflicts {
            prop_assert_ne!(&conflict.ours, &conflict.theirs);
            prop_assert_ne!(&conflict.ours, &conflict.base);
            prop_assert_ne!(&conflict.theirs, &conflict.base);
        }
        prop_assert!(merged.resolved.is_empty());
    }

    /// Property: snapshot JSON restores a buffer equal in every field
    #[test]
    fn snapshot_round_trip(edits in prop::collection::vec(content(), 1..6), branch_at in 0usize..6) {
        let mut buffer = Buffer::new("doc", Vec::new(), None).unwrap();
        for (n, items) in edits.into_iter().enumerate() {
            if n == branch_at {
                let head = buffer.head().unwrap().head.clone();
                buffer.create_branch("side", &head).unwrap();
            }
            buffer.set_content(items).unwrap();
            if n % 2 == 0 && buffer.is_dirty() {
                buffer
                    .commit(&format!("edit {}", n), CommitOptions::default().tag(format!("t{}", n)))
                    .unwrap();
            }
        }

        let json = serialize(&buffer).to_json().unwrap();
        let restored = restore(SerializedBuffer::from_json(&json).unwrap()).unwrap();
        prop_assert_eq!(restored, buffer);
    }
}
