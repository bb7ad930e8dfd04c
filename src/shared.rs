use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::diff::DiffEngine;
use crate::error::{VellumError, VellumResult};
use crate::merge::MergeEngine;
use crate::model::buffer::{Buffer, BufferId};
use crate::model::diff::Diff;
use crate::model::item::Item;
use crate::model::merge::{MergeOptions, MergeResult};
use crate::model::schema::ContentSchema;
use crate::model::version::{CommitOptions, Version, VersionId};
use crate::persist::{self, SerializedBuffer, SnapshotStore};

// ---------------------------------------------------------------------------
// SharedBufferManager: buffers behind per-buffer async locks
// ---------------------------------------------------------------------------

/// Thread-safe counterpart of [`BufferManager`](crate::manager::BufferManager).
///
/// Each buffer sits behind its own `RwLock`, so operations on different
/// buffers proceed in parallel while operations on one buffer are
/// linearized. The outer map lock is only held long enough to look up or
/// insert a handle.
pub struct SharedBufferManager {
    config: EngineConfig,
    diff: DiffEngine,
    merge: MergeEngine,
    buffers: RwLock<HashMap<BufferId, Arc<RwLock<Buffer>>>>,
}

impl SharedBufferManager {
    pub fn new(config: EngineConfig) -> Self {
        let diff = DiffEngine::new(config.identity_field.clone());
        Self {
            merge: MergeEngine::new(diff.clone()),
            diff,
            config,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn handle(&self, id: BufferId) -> VellumResult<Arc<RwLock<Buffer>>> {
        self.buffers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(VellumError::BufferNotFound(id))
    }

    /// Run `f` with shared access to one buffer.
    pub async fn with_buffer<R>(
        &self,
        id: BufferId,
        f: impl FnOnce(&Buffer) -> VellumResult<R>,
    ) -> VellumResult<R> {
        let handle = self.handle(id).await?;
        let buffer = handle.read().await;
        f(&*buffer)
    }

    /// Run `f` with exclusive access to one buffer.
    pub async fn with_buffer_mut<R>(
        &self,
        id: BufferId,
        f: impl FnOnce(&mut Buffer) -> VellumResult<R>,
    ) -> VellumResult<R> {
        let handle = self.handle(id).await?;
        let mut buffer = handle.write().await;
        f(&mut *buffer)
    }

    pub async fn create_buffer(
        &self,
        name: &str,
        initial_content: Vec<Item>,
        schema: Option<ContentSchema>,
    ) -> VellumResult<BufferId> {
        let buffer = Buffer::new(name, initial_content, schema)?;
        let id = buffer.id();
        self.buffers
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(buffer)));
        info!(buffer = %id, name, "created shared buffer");
        Ok(id)
    }

    pub async fn list_buffers(&self) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = self.buffers.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn delete_buffer(&self, id: BufferId) -> VellumResult<()> {
        self.buffers
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(VellumError::BufferNotFound(id))
    }

    /// Drop every buffer. Returns how many were held.
    pub async fn dispose(&self) -> usize {
        let mut buffers = self.buffers.write().await;
        let count = buffers.len();
        buffers.clear();
        count
    }

    pub async fn set_content(&self, id: BufferId, items: Vec<Item>) -> VellumResult<()> {
        self.with_buffer_mut(id, |b| b.set_content(items)).await
    }

    pub async fn append_content(&self, id: BufferId, items: Vec<Item>) -> VellumResult<()> {
        self.with_buffer_mut(id, |b| b.append_content(items)).await
    }

    pub async fn commit(
        &self,
        id: BufferId,
        message: &str,
        options: CommitOptions,
    ) -> VellumResult<VersionId> {
        self.with_buffer_mut(id, |b| b.commit(message, options)).await
    }

    pub async fn rollback(&self, id: BufferId, steps: usize, force: bool) -> VellumResult<VersionId> {
        self.with_buffer_mut(id, |b| b.rollback(steps, force)).await
    }

    /// Create branch `name` at the current head.
    pub async fn branch(&self, id: BufferId, name: &str) -> VellumResult<()> {
        self.with_buffer_mut(id, |b| {
            let head = b.head()?.head.clone();
            b.create_branch(name, &head).map(|_| ())
        })
        .await
    }

    pub async fn switch_branch(&self, id: BufferId, name: &str, force: bool) -> VellumResult<()> {
        self.with_buffer_mut(id, |b| b.switch_branch(name, force)).await
    }

    pub async fn merge(
        &self,
        id: BufferId,
        source: &str,
        options: MergeOptions,
    ) -> VellumResult<MergeResult> {
        self.with_buffer_mut(id, |b| self.merge.merge(b, source, options))
            .await
    }

    pub async fn history(&self, id: BufferId, limit: Option<usize>) -> VellumResult<Vec<Version>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        self.with_buffer(id, |b| {
            Ok(b.history(limit)?.into_iter().cloned().collect())
        })
        .await
    }

    pub async fn diff(&self, id: BufferId, from: &str, to: &str) -> VellumResult<Diff> {
        self.with_buffer(id, |b| {
            let old = b.versions().get(from)?;
            let new = b.versions().get(to)?;
            Ok(self
                .diff
                .diff(&old.content, &new.content)
                .between(Some(old.id.clone()), Some(new.id.clone())))
        })
        .await
    }

    pub async fn diff_working(&self, id: BufferId) -> VellumResult<Diff> {
        self.with_buffer(id, |b| {
            let head = b.head_version()?;
            Ok(self
                .diff
                .diff(&head.content, b.working_content())
                .between(Some(head.id.clone()), None))
        })
        .await
    }

    pub async fn serialize(&self, id: BufferId) -> VellumResult<SerializedBuffer> {
        self.with_buffer(id, |b| Ok(persist::serialize(b))).await
    }

    /// Snapshot a buffer into `store`.
    ///
    /// The buffer lock is released before the store is written, so slow
    /// storage never blocks other operations on the buffer. A failed write
    /// leaves in-memory state untouched.
    pub async fn persist(&self, id: BufferId, store: &dyn SnapshotStore) -> VellumResult<()> {
        let snapshot = self.serialize(id).await?;
        if let Err(err) = store.save(&snapshot).await {
            warn!(buffer = %id, error = %err, "failed to persist buffer");
            return Err(err);
        }
        Ok(())
    }

    /// Load a buffer from `store`, replacing any in-memory copy.
    pub async fn load(&self, id: BufferId, store: &dyn SnapshotStore) -> VellumResult<BufferId> {
        let snapshot = store
            .load(&id)
            .await?
            .ok_or(VellumError::BufferNotFound(id))?;
        let buffer = persist::restore(snapshot)?;
        let id = buffer.id();
        self.buffers
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(buffer)));
        info!(buffer = %id, "loaded shared buffer");
        Ok(id)
    }
}

impl Default for SharedBufferManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
