//! End-to-end behaviour of the buffer manager: branching, committing,
//! rolling back and merging through the public API only.

use serde_json::json;
use vellum::{
    BufferManager, CommitOptions, ConflictResolution, DiffEngine, MergeOptions, MergeStrategy,
    VellumError, MERGE_TAG,
};

fn diverged(base: Vec<serde_json::Value>, left: Vec<serde_json::Value>, right: Vec<serde_json::Value>)
    -> (BufferManager, uuid::Uuid)
{
    let mut manager = BufferManager::default();
    let id = manager.create_buffer("doc", base).unwrap();
    manager.branch(id, "A").unwrap();
    manager.branch(id, "B").unwrap();

    manager.switch_branch(id, "B", false).unwrap();
    manager.set_content(id, right).unwrap();
    manager.commit(id, "right side").unwrap();

    manager.switch_branch(id, "A", false).unwrap();
    manager.set_content(id, left).unwrap();
    manager.commit(id, "left side").unwrap();

    (manager, id)
}

#[test]
fn test_fast_forward_merge() {
    let mut manager = BufferManager::default();
    let id = manager
        .create_buffer("doc", vec![json!({"id": "a", "text": "hello"})])
        .unwrap();
    manager.branch(id, "feature").unwrap();
    manager.switch_branch(id, "feature", false).unwrap();
    manager
        .set_content(id, vec![json!({"id": "a", "text": "hello world"})])
        .unwrap();
    manager.commit(id, "edit").unwrap();
    manager.switch_branch(id, "main", false).unwrap();

    let before = manager.buffer(id).unwrap().head().unwrap().head.clone();
    let result = manager.merge(id, "feature", MergeOptions::default()).unwrap();

    assert!(result.success);
    assert!(result.conflicts.is_empty());
    assert!(result.details.fast_forward);
    assert_eq!(
        result.merged_content,
        Some(vec![json!({"id": "a", "text": "hello world"})])
    );

    let new_id = result.new_version_id.unwrap();
    let buffer = manager.buffer(id).unwrap();
    assert_eq!(buffer.current_branch(), "main");
    assert_eq!(buffer.head().unwrap().head, new_id);
    assert_ne!(new_id, before);
    assert_eq!(
        buffer.working_content(),
        &[json!({"id": "a", "text": "hello world"})]
    );
    assert!(!buffer.is_dirty());

    let merge_version = buffer.versions().get(&new_id).unwrap();
    assert_eq!(merge_version.parent_id.as_deref(), Some(before.as_str()));
    assert!(merge_version.tags.contains(MERGE_TAG));
    assert_eq!(merge_version.metadata["merge_source"], json!("feature"));
}

#[test]
fn test_conflicting_merge_reports_and_leaves_buffer_untouched() {
    let (mut manager, id) = diverged(
        vec![json!({"id": "a", "v": 1})],
        vec![json!({"id": "a", "v": 2})],
        vec![json!({"id": "a", "v": 3})],
    );
    let head_before = manager.buffer(id).unwrap().head().unwrap().head.clone();
    let versions_before = manager.buffer(id).unwrap().versions().len();

    let result = manager
        .merge(id, "B", MergeOptions::strategy(MergeStrategy::Auto))
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.new_version_id, None);
    assert_eq!(result.conflicts.len(), 1);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.identity, "a");
    assert_eq!(conflict.ours, Some(json!({"id": "a", "v": 2})));
    assert_eq!(conflict.theirs, Some(json!({"id": "a", "v": 3})));
    assert_eq!(conflict.base, Some(json!({"id": "a", "v": 1})));

    let buffer = manager.buffer(id).unwrap();
    assert_eq!(buffer.head().unwrap().head, head_before);
    assert_eq!(buffer.versions().len(), versions_before);
    assert_eq!(buffer.working_content(), &[json!({"id": "a", "v": 2})]);
}

#[test]
fn test_resolve_and_retry_loop() {
    let (mut manager, id) = diverged(
        vec![json!({"id": "a", "v": 1})],
        vec![json!({"id": "a", "v": 2})],
        vec![json!({"id": "a", "v": 3})],
    );
    let first = manager.merge(id, "B", MergeOptions::default()).unwrap();
    let resolutions = first
        .conflicts
        .into_iter()
        .map(|c| c.resolve(ConflictResolution::Custom(json!({"id": "a", "v": 5}))))
        .collect();

    let second = manager
        .merge(id, "B", MergeOptions::default().with_resolutions(resolutions))
        .unwrap();
    assert!(second.success);
    assert_eq!(second.merged_content, Some(vec![json!({"id": "a", "v": 5})]));
    assert_eq!(second.details.resolved_conflicts.len(), 1);
}

#[test]
fn test_merging_again_is_up_to_date() {
    let (mut manager, id) = diverged(
        vec![json!({"id": "a", "v": 1})],
        vec![json!({"id": "a", "v": 2}), json!({"id": "l"})],
        vec![json!({"id": "a", "v": 1}), json!({"id": "r"})],
    );
    let first = manager.merge(id, "B", MergeOptions::default()).unwrap();
    assert!(first.success);
    assert_eq!(
        first.merged_content,
        Some(vec![json!({"id": "a", "v": 2}), json!({"id": "r"}), json!({"id": "l"})])
    );
    assert!(!first.details.up_to_date);

    let versions = manager.buffer(id).unwrap().versions().len();
    let again = manager.merge(id, "B", MergeOptions::default()).unwrap();
    assert!(again.success);
    assert!(again.details.up_to_date);
    assert_eq!(again.new_version_id, None);
    assert_eq!(manager.buffer(id).unwrap().versions().len(), versions);
}

#[test]
fn test_structural_diff_by_identity() {
    let engine = DiffEngine::default();
    let diff = engine.diff(
        &[json!({"id": "a"}), json!({"id": "b"})],
        &[json!({"id": "b"}), json!({"id": "c"})],
    );
    assert_eq!(diff.added, vec![json!({"id": "c"})]);
    assert_eq!(diff.removed, vec![json!({"id": "a"})]);
    assert_eq!(diff.stats.modified_count, 0);
    assert_eq!(diff.stats.unchanged_count, 1);
}

#[test]
fn test_commit_is_rejected_exactly_when_clean() {
    let mut manager = BufferManager::default();
    let id = manager.create_buffer("doc", vec![json!({"id": "a"})]).unwrap();
    assert!(matches!(
        manager.commit(id, "noop"),
        Err(VellumError::NothingToCommit { .. })
    ));

    manager.set_content(id, vec![json!({"id": "a"}), json!(1)]).unwrap();
    manager.set_content(id, vec![json!({"id": "a"})]).unwrap();
    assert!(!manager.buffer(id).unwrap().is_dirty());
    assert!(manager.commit(id, "still noop").is_err());

    manager.append_content(id, vec![json!("more")]).unwrap();
    assert!(manager.commit(id, "real").is_ok());
}

#[test]
fn test_rollback_shortens_history() {
    let mut manager = BufferManager::default();
    let id = manager.create_buffer("doc", vec![]).unwrap();
    for i in 0..5 {
        manager.append_content(id, vec![json!(i)]).unwrap();
        manager.commit(id, &format!("c{}", i)).unwrap();
    }
    let before = manager.history(id, Some(100)).unwrap().len();
    assert_eq!(before, 6);

    manager.rollback(id, 2, false).unwrap();
    assert_eq!(manager.history(id, Some(100)).unwrap().len(), before - 2);
    assert_eq!(
        manager.buffer(id).unwrap().working_content(),
        &[json!(0), json!(1), json!(2)]
    );

    let err = manager.rollback(id, 4, false).unwrap_err();
    assert!(matches!(
        err,
        VellumError::InvalidRollback {
            steps: 4,
            available: 3
        }
    ));
    assert_eq!(manager.history(id, Some(100)).unwrap().len(), 4);
}

#[test]
fn test_rollback_and_switch_guard_dirty_tree() {
    let mut manager = BufferManager::default();
    let id = manager.create_buffer("doc", vec![json!(1)]).unwrap();
    manager.set_content(id, vec![json!(2)]).unwrap();
    manager.commit(id, "two").unwrap();
    manager.branch(id, "other").unwrap();
    manager.set_content(id, vec![json!(3)]).unwrap();

    assert!(matches!(
        manager.rollback(id, 1, false),
        Err(VellumError::UncommittedChanges { .. })
    ));
    assert!(matches!(
        manager.switch_branch(id, "other", false),
        Err(VellumError::UncommittedChanges { .. })
    ));

    manager.switch_branch(id, "other", true).unwrap();
    assert_eq!(manager.buffer(id).unwrap().working_content(), &[json!(2)]);
    manager.rollback(id, 1, false).unwrap();
    assert_eq!(manager.buffer(id).unwrap().working_content(), &[json!(1)]);
}

#[test]
fn test_ours_strategy_keeps_every_ours_addition() {
    let (mut manager, id) = diverged(
        vec![json!({"id": "a", "v": 1}), json!({"id": "b"}), json!("shared")],
        vec![
            json!({"id": "a", "v": 2}),
            json!({"id": "b"}),
            json!({"id": "mine"}),
            json!("shared"),
            json!("my note"),
        ],
        vec![json!({"id": "a", "v": 3}), json!({"id": "theirs"})],
    );

    let result = manager
        .merge(id, "B", MergeOptions::strategy(MergeStrategy::Ours))
        .unwrap();
    assert!(result.success);
    assert!(result.conflicts.is_empty());

    let merged = result.merged_content.unwrap();
    assert!(merged.contains(&json!({"id": "a", "v": 2})));
    assert!(merged.contains(&json!({"id": "mine"})));
    assert!(merged.contains(&json!("my note")));
    assert!(merged.contains(&json!({"id": "theirs"})));
    assert!(!merged.contains(&json!({"id": "b"})));
}

#[test]
fn test_auto_conflicts_only_on_divergent_edits() {
    let (mut manager, id) = diverged(
        vec![
            json!({"id": "both", "v": 0}),
            json!({"id": "same", "v": 0}),
            json!({"id": "left", "v": 0}),
            json!({"id": "right", "v": 0}),
            json!({"id": "still", "v": 0}),
        ],
        vec![
            json!({"id": "both", "v": 1}),
            json!({"id": "same", "v": 9}),
            json!({"id": "left", "v": 1}),
            json!({"id": "right", "v": 0}),
            json!({"id": "still", "v": 0}),
        ],
        vec![
            json!({"id": "both", "v": 2}),
            json!({"id": "same", "v": 9}),
            json!({"id": "left", "v": 0}),
            json!({"id": "right", "v": 1}),
            json!({"id": "still", "v": 0}),
        ],
    );

    let result = manager.merge(id, "B", MergeOptions::default()).unwrap();
    let identities: Vec<&str> = result.conflicts.iter().map(|c| c.identity.as_str()).collect();
    assert_eq!(identities, vec!["both"]);

    let result = manager
        .merge(id, "B", MergeOptions::strategy(MergeStrategy::Theirs))
        .unwrap();
    assert_eq!(
        result.merged_content.unwrap(),
        vec![
            json!({"id": "both", "v": 2}),
            json!({"id": "same", "v": 9}),
            json!({"id": "left", "v": 1}),
            json!({"id": "right", "v": 1}),
            json!({"id": "still", "v": 0}),
        ]
    );
}

#[test]
fn test_schema_is_enforced_on_commit() {
    use vellum::{ContentSchema, FieldType};

    let mut manager = BufferManager::default();
    let schema = ContentSchema::new()
        .require("id")
        .field("title", FieldType::String);
    let id = manager
        .create_buffer_with("doc", vec![json!({"id": 1, "title": "ok"})], Some(schema))
        .unwrap();

    manager
        .set_content(id, vec![json!({"id": 1, "title": 42})])
        .unwrap();
    assert!(matches!(
        manager.commit(id, "bad"),
        Err(VellumError::SchemaValidation(_))
    ));
    assert_eq!(manager.history(id, None).unwrap().len(), 1);

    manager.set_schema(id, None).unwrap();
    assert!(manager
        .commit_with(id, "anything goes", CommitOptions::default().meta("author", "me"))
        .is_ok());
}

#[test]
fn test_identical_edits_still_record_a_merge() {
    let (mut manager, id) = diverged(
        vec![json!({"id": "a", "v": 1})],
        vec![json!({"id": "a", "v": 2})],
        vec![json!({"id": "a", "v": 2})],
    );
    let result = manager.merge(id, "B", MergeOptions::default()).unwrap();
    assert!(result.success);
    assert!(!result.details.up_to_date);
    let new_id = result.new_version_id.unwrap();

    let buffer = manager.buffer(id).unwrap();
    assert_eq!(buffer.head().unwrap().head, new_id);
    assert_eq!(buffer.working_content(), &[json!({"id": "a", "v": 2})]);
}

#[test]
fn test_merge_rejected_by_schema_changes_nothing() {
    use vellum::ContentSchema;

    let mut manager = BufferManager::default();
    let id = manager.create_buffer("doc", vec![json!({"id": "a"})]).unwrap();
    manager.branch(id, "f").unwrap();
    manager.switch_branch(id, "f", false).unwrap();
    manager.append_content(id, vec![json!("loose")]).unwrap();
    manager.commit(id, "loose item").unwrap();
    manager.switch_branch(id, "main", false).unwrap();

    manager
        .set_schema(id, Some(ContentSchema::new().require("id")))
        .unwrap();
    let head_before = manager.buffer(id).unwrap().head().unwrap().head.clone();
    let versions_before = manager.buffer(id).unwrap().versions().len();

    let err = manager.merge(id, "f", MergeOptions::default()).unwrap_err();
    assert!(matches!(err, VellumError::SchemaValidation(_)));

    let buffer = manager.buffer(id).unwrap();
    assert_eq!(buffer.head().unwrap().head, head_before);
    assert_eq!(buffer.versions().len(), versions_before);
    assert_eq!(buffer.working_content(), &[json!({"id": "a"})]);
    assert!(!buffer.is_dirty());
}
