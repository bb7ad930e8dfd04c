//! Map-free snapshot format of a buffer for external persistence.
//!
//! [`serialize`] and [`restore`] are exact inverses: a restored buffer is
//! equal to the original in every field. Restoring re-checks every buffer
//! invariant, so hand-edited or truncated snapshots are rejected instead of
//! producing a buffer the engine cannot reason about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VellumError, VellumResult};
use crate::model::branch::Branch;
use crate::model::buffer::{Buffer, BufferId, MAIN_BRANCH};
use crate::model::item::Item;
use crate::model::schema::ContentSchema;
use crate::model::version::{Version, VersionId};
use crate::store::version_store::VersionStore;

pub mod snapshot_store;

pub use snapshot_store::{InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore};

/// Current snapshot layout revision.
pub const FORMAT_VERSION: u32 = 1;

/// Plain representation of a [`Buffer`].
///
/// Maps are flattened into `(key, value)` lists: branches by name, versions
/// in append order (parents always precede their children).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedBuffer {
    pub format_version: u32,
    pub id: BufferId,
    pub name: String,
    pub branches: Vec<(String, Branch)>,
    pub versions: Vec<(VersionId, Version)>,
    pub current_branch: String,
    pub working_content: Vec<Item>,
    pub is_dirty: bool,
    pub schema: Option<ContentSchema>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SerializedBuffer {
    pub fn to_json(&self) -> VellumResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> VellumResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn serialize(buffer: &Buffer) -> SerializedBuffer {
    SerializedBuffer {
        format_version: FORMAT_VERSION,
        id: buffer.id,
        name: buffer.name.clone(),
        branches: buffer
            .branches
            .iter()
            .map(|(name, branch)| (name.clone(), branch.clone()))
            .collect(),
        versions: buffer
            .versions
            .iter()
            .map(|v| (v.id.clone(), v.clone()))
            .collect(),
        current_branch: buffer.current_branch.clone(),
        working_content: buffer.working_content.clone(),
        is_dirty: buffer.is_dirty,
        schema: buffer.schema.clone(),
        created_at: buffer.created_at,
        updated_at: buffer.updated_at,
    }
}

pub fn restore(serialized: SerializedBuffer) -> VellumResult<Buffer> {
    if serialized.format_version != FORMAT_VERSION {
        return Err(VellumError::CorruptSnapshot(format!(
            "unsupported format version {}",
            serialized.format_version
        )));
    }

    let mut versions = VersionStore::new();
    for (id, version) in serialized.versions {
        if id != version.id {
            return Err(VellumError::CorruptSnapshot(format!(
                "version key {} does not match version id {}",
                id, version.id
            )));
        }
        if !version.verify() {
            return Err(VellumError::CorruptSnapshot(format!(
                "content hash mismatch for version {}",
                id
            )));
        }
        versions.push(version).map_err(|err| match err {
            VellumError::VersionNotFound(parent) => VellumError::CorruptSnapshot(format!(
                "version {} references missing or later parent {}",
                id, parent
            )),
            other => other,
        })?;
    }

    let mut branches = std::collections::BTreeMap::new();
    for (name, branch) in serialized.branches {
        if name != branch.name {
            return Err(VellumError::CorruptSnapshot(format!(
                "branch key '{}' does not match branch name '{}'",
                name, branch.name
            )));
        }
        if !versions.contains(&branch.head) {
            return Err(VellumError::CorruptSnapshot(format!(
                "branch '{}' points at missing version {}",
                name, branch.head
            )));
        }
        if branches.insert(name.clone(), branch).is_some() {
            return Err(VellumError::CorruptSnapshot(format!(
                "duplicate branch '{}'",
                name
            )));
        }
    }

    if !branches.contains_key(MAIN_BRANCH) {
        return Err(VellumError::CorruptSnapshot(format!(
            "branch '{}' is missing",
            MAIN_BRANCH
        )));
    }

    let head = branches
        .get(&serialized.current_branch)
        .map(|b: &Branch| b.head.clone())
        .ok_or_else(|| {
            VellumError::CorruptSnapshot(format!(
                "current branch '{}' does not exist",
                serialized.current_branch
            ))
        })?;
    let dirty = versions.get(&head)?.content != serialized.working_content;
    if dirty != serialized.is_dirty {
        return Err(VellumError::CorruptSnapshot(format!(
            "dirty flag {} disagrees with working content",
            serialized.is_dirty
        )));
    }

    Ok(Buffer {
        id: serialized.id,
        name: serialized.name,
        branches,
        versions,
        current_branch: serialized.current_branch,
        working_content: serialized.working_content,
        is_dirty: serialized.is_dirty,
        schema: serialized.schema,
        created_at: serialized.created_at,
        updated_at: serialized.updated_at,
    })
}
