use std::collections::HashMap;
use tracing::info;

use crate::config::EngineConfig;
use crate::diff::DiffEngine;
use crate::error::{VellumError, VellumResult};
use crate::merge::MergeEngine;
use crate::model::branch::Branch;
use crate::model::buffer::{Buffer, BufferId};
use crate::model::diff::Diff;
use crate::model::item::Item;
use crate::model::merge::{MergeOptions, MergeResult};
use crate::model::schema::ContentSchema;
use crate::model::version::{CommitOptions, Version, VersionId};
use crate::persist::{self, SerializedBuffer};

// ---------------------------------------------------------------------------
// BufferManager: the public façade over every buffer owned by a caller
// ---------------------------------------------------------------------------

/// Owns a set of buffers and exposes the versioning API over them.
///
/// ## Lifecycle
/// Construct one with [`BufferManager::new`] and hand it to whoever needs
/// it; there is no global instance. [`BufferManager::dispose`] drops every
/// buffer.
///
/// All methods take `&mut self` for mutations, so a single manager is
/// linearized by the borrow checker. Use
/// [`SharedBufferManager`](crate::shared::SharedBufferManager) when several
/// tasks need to work on buffers concurrently.
#[derive(Debug)]
pub struct BufferManager {
    config: EngineConfig,
    diff: DiffEngine,
    merge: MergeEngine,
    buffers: HashMap<BufferId, Buffer>,
}

impl BufferManager {
    pub fn new(config: EngineConfig) -> Self {
        let diff = DiffEngine::new(config.identity_field.clone());
        Self {
            merge: MergeEngine::new(diff.clone()),
            diff,
            config,
            buffers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    /// Drop every buffer. Returns how many were held.
    pub fn dispose(&mut self) -> usize {
        let count = self.buffers.len();
        self.buffers.clear();
        info!(count, "disposed buffer manager");
        count
    }

    // -- buffers -------------------------------------------------------------

    pub fn create_buffer(&mut self, name: &str, initial_content: Vec<Item>) -> VellumResult<BufferId> {
        self.create_buffer_with(name, initial_content, None)
    }

    /// Create a buffer whose commits must satisfy `schema`.
    pub fn create_buffer_with(
        &mut self,
        name: &str,
        initial_content: Vec<Item>,
        schema: Option<ContentSchema>,
    ) -> VellumResult<BufferId> {
        let buffer = Buffer::new(name, initial_content, schema)?;
        let id = buffer.id();
        info!(buffer = %id, name, items = buffer.working_content().len(), "created buffer");
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    pub fn buffer(&self, id: BufferId) -> VellumResult<&Buffer> {
        self.buffers.get(&id).ok_or(VellumError::BufferNotFound(id))
    }

    fn buffer_mut(&mut self, id: BufferId) -> VellumResult<&mut Buffer> {
        self.buffers
            .get_mut(&id)
            .ok_or(VellumError::BufferNotFound(id))
    }

    /// All buffers, oldest first.
    pub fn list_buffers(&self) -> Vec<&Buffer> {
        let mut buffers: Vec<&Buffer> = self.buffers.values().collect();
        buffers.sort_by_key(|b| (b.created_at(), b.id()));
        buffers
    }

    /// Remove a buffer and hand it back to the caller.
    pub fn delete_buffer(&mut self, id: BufferId) -> VellumResult<Buffer> {
        let buffer = self
            .buffers
            .remove(&id)
            .ok_or(VellumError::BufferNotFound(id))?;
        info!(buffer = %id, "deleted buffer");
        Ok(buffer)
    }

    pub fn set_schema(&mut self, id: BufferId, schema: Option<ContentSchema>) -> VellumResult<()> {
        self.buffer_mut(id)?.set_schema(schema);
        Ok(())
    }

    // -- working tree ----------------------------------------------------------

    pub fn set_content(&mut self, id: BufferId, items: Vec<Item>) -> VellumResult<()> {
        self.buffer_mut(id)?.set_content(items)
    }

    pub fn append_content(&mut self, id: BufferId, items: Vec<Item>) -> VellumResult<()> {
        self.buffer_mut(id)?.append_content(items)
    }

    // -- history ---------------------------------------------------------------

    pub fn commit(&mut self, id: BufferId, message: &str) -> VellumResult<VersionId> {
        self.commit_with(id, message, CommitOptions::default())
    }

    pub fn commit_with(
        &mut self,
        id: BufferId,
        message: &str,
        options: CommitOptions,
    ) -> VellumResult<VersionId> {
        self.buffer_mut(id)?.commit(message, options)
    }

    /// Move the current branch `steps` versions back.
    pub fn rollback(&mut self, id: BufferId, steps: usize, force: bool) -> VellumResult<VersionId> {
        self.buffer_mut(id)?.rollback(steps, force)
    }

    /// Versions reachable from the current head, most recent first. Uses the
    /// configured history limit when `limit` is `None`.
    pub fn history(&self, id: BufferId, limit: Option<usize>) -> VellumResult<Vec<&Version>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        self.buffer(id)?.history(limit)
    }

    pub fn find_by_tag(&self, id: BufferId, tag: &str) -> VellumResult<Vec<&Version>> {
        Ok(self.buffer(id)?.versions().find_by_tag(tag).collect())
    }

    // -- branches --------------------------------------------------------------

    /// Create branch `name` at the current head.
    pub fn branch(&mut self, id: BufferId, name: &str) -> VellumResult<Branch> {
        let buffer = self.buffer_mut(id)?;
        let head = buffer.head()?.head.clone();
        buffer.create_branch(name, &head).cloned()
    }

    /// Create branch `name` at an arbitrary stored version.
    pub fn branch_from(&mut self, id: BufferId, name: &str, version_id: &str) -> VellumResult<Branch> {
        self.buffer_mut(id)?.create_branch(name, version_id).cloned()
    }

    pub fn list_branches(&self, id: BufferId) -> VellumResult<Vec<&Branch>> {
        Ok(self.buffer(id)?.branches().collect())
    }

    pub fn switch_branch(&mut self, id: BufferId, name: &str, force: bool) -> VellumResult<()> {
        self.buffer_mut(id)?.switch_branch(name, force)
    }

    pub fn merge(
        &mut self,
        id: BufferId,
        source: &str,
        options: MergeOptions,
    ) -> VellumResult<MergeResult> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(VellumError::BufferNotFound(id))?;
        self.merge.merge(buffer, source, options)
    }

    // -- diffs -----------------------------------------------------------------

    /// Diff between two stored versions of a buffer.
    pub fn diff(&self, id: BufferId, from: &str, to: &str) -> VellumResult<Diff> {
        let versions = self.buffer(id)?.versions();
        let old = versions.get(from)?;
        let new = versions.get(to)?;
        Ok(self
            .diff
            .diff(&old.content, &new.content)
            .between(Some(old.id.clone()), Some(new.id.clone())))
    }

    /// Diff from the current head to the uncommitted working content.
    pub fn diff_working(&self, id: BufferId) -> VellumResult<Diff> {
        let buffer = self.buffer(id)?;
        let head = buffer.head_version()?;
        Ok(self
            .diff
            .diff(&head.content, buffer.working_content())
            .between(Some(head.id.clone()), None))
    }

    // -- persistence -----------------------------------------------------------

    pub fn serialize(&self, id: BufferId) -> VellumResult<SerializedBuffer> {
        Ok(persist::serialize(self.buffer(id)?))
    }

    /// Rebuild a buffer from a snapshot, replacing any in-memory copy.
    pub fn restore(&mut self, serialized: SerializedBuffer) -> VellumResult<BufferId> {
        let buffer = persist::restore(serialized)?;
        let id = buffer.id();
        info!(buffer = %id, versions = buffer.versions().len(), "restored buffer");
        self.buffers.insert(id, buffer);
        Ok(id)
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
