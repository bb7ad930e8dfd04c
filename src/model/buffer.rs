use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::VellumResult;
use crate::model::branch::Branch;
use crate::model::item::Item;
use crate::model::schema::ContentSchema;
use crate::model::version::Version;
use crate::store::version_store::VersionStore;

// ---------------------------------------------------------------------------
// Buffer: a named, branchable container of versioned content
// ---------------------------------------------------------------------------

/// Buffer identifier.
pub type BufferId = Uuid;

/// Message of the root version every buffer starts with.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

/// Branch every buffer starts on. It always exists.
pub const MAIN_BRANCH: &str = "main";

/// A buffer with its full version history, branches and working content.
///
/// Invariants kept by every operation:
/// - every branch head exists in `versions`,
/// - `current_branch` exists in `branches`,
/// - `is_dirty` is true exactly when `working_content` differs from the
///   content of the current branch head.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub(crate) id: BufferId,
    pub(crate) name: String,
    pub(crate) branches: BTreeMap<String, Branch>,
    pub(crate) versions: VersionStore,
    pub(crate) current_branch: String,
    pub(crate) working_content: Vec<Item>,
    pub(crate) is_dirty: bool,
    pub(crate) schema: Option<ContentSchema>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Buffer {
    /// Create a buffer with a root version holding `initial_content` and a
    /// single branch [`MAIN_BRANCH`] pointing at it.
    pub fn new(
        name: impl Into<String>,
        initial_content: Vec<Item>,
        schema: Option<ContentSchema>,
    ) -> VellumResult<Self> {
        if let Some(schema) = &schema {
            schema.validate(&initial_content)?;
        }

        let mut versions = VersionStore::new();
        let root = versions
            .append(
                initial_content.clone(),
                INITIAL_COMMIT_MESSAGE,
                None,
                BTreeSet::new(),
            )?
            .id
            .clone();

        let mut branches = BTreeMap::new();
        branches.insert(
            MAIN_BRANCH.to_string(),
            Branch::new(MAIN_BRANCH, root, None),
        );

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            branches,
            versions,
            current_branch: MAIN_BRANCH.to_string(),
            working_content: initial_content,
            is_dirty: false,
            schema,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    pub fn working_content(&self) -> &[Item] {
        &self.working_content
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn schema(&self) -> Option<&ContentSchema> {
        self.schema.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The branch currently checked out.
    pub fn head(&self) -> VellumResult<&Branch> {
        self.branch(&self.current_branch)
    }

    /// The version the current branch points at.
    pub fn head_version(&self) -> VellumResult<&Version> {
        let head = self.head()?;
        self.versions.get(&head.head)
    }

    /// Replace the schema applied to future commits.
    pub fn set_schema(&mut self, schema: Option<ContentSchema>) {
        self.schema = schema;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
