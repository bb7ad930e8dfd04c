use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{VellumError, VellumResult};
use crate::model::buffer::BufferId;
use crate::persist::SerializedBuffer;

// ---------------------------------------------------------------------------
// SnapshotStore trait: where serialized buffers are kept between runs
// ---------------------------------------------------------------------------

/// Storage backend for serialized buffers, keyed by buffer id.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Store a snapshot, replacing any previous one for the same buffer.
    async fn save(&self, snapshot: &SerializedBuffer) -> VellumResult<()>;

    /// Fetch the snapshot of a buffer, if one was saved.
    async fn load(&self, id: &BufferId) -> VellumResult<Option<SerializedBuffer>>;

    /// Remove a snapshot. Returns whether one existed.
    async fn delete(&self, id: &BufferId) -> VellumResult<bool>;

    /// Ids of every stored snapshot.
    async fn list(&self) -> VellumResult<Vec<BufferId>>;
}

// ---------------------------------------------------------------------------
// InMemorySnapshotStore
// ---------------------------------------------------------------------------

/// Keeps snapshots as JSON text in memory. Used by tests and the REPL when no
/// snapshot directory is configured.
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<BufferId, String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &SerializedBuffer) -> VellumResult<()> {
        let json = snapshot.to_json()?;
        self.snapshots.write().await.insert(snapshot.id, json);
        Ok(())
    }

    async fn load(&self, id: &BufferId) -> VellumResult<Option<SerializedBuffer>> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(id)
            .map(|json| SerializedBuffer::from_json(json))
            .transpose()
    }

    async fn delete(&self, id: &BufferId) -> VellumResult<bool> {
        Ok(self.snapshots.write().await.remove(id).is_some())
    }

    async fn list(&self) -> VellumResult<Vec<BufferId>> {
        let mut ids: Vec<BufferId> = self.snapshots.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// JsonFileSnapshotStore
// ---------------------------------------------------------------------------

/// One pretty-printed `<buffer id>.json` file per buffer in a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-save leaves the previous snapshot intact.
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
}

impl JsonFileSnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> VellumResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &BufferId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn save(&self, snapshot: &SerializedBuffer) -> VellumResult<()> {
        let path = self.path_for(&snapshot.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, snapshot.to_json()?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(buffer = %snapshot.id, path = %path.display(), "snapshot saved");
        Ok(())
    }

    async fn load(&self, id: &BufferId) -> VellumResult<Option<SerializedBuffer>> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => SerializedBuffer::from_json(&json)
                .map(Some)
                .map_err(|e| {
                    VellumError::Persistence(format!("failed to read {}: {}", path.display(), e))
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &BufferId) -> VellumResult<bool> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> VellumResult<Vec<BufferId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Foreign files in the directory are skipped.
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<BufferId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::buffer::Buffer;
    use crate::persist::{restore, serialize};
    use serde_json::json;

    fn snapshot() -> SerializedBuffer {
        let buffer = Buffer::new("notes", vec![json!({"id": 1, "text": "hi"})], None).unwrap();
        serialize(&buffer)
    }

    async fn exercise(store: &dyn SnapshotStore) {
        let snap = snapshot();
        assert!(store.load(&snap.id).await.unwrap().is_none());

        store.save(&snap).await.unwrap();
        let loaded = store.load(&snap.id).await.unwrap().unwrap();
        assert_eq!(loaded, snap);
        assert!(restore(loaded).is_ok());
        assert_eq!(store.list().await.unwrap(), vec![snap.id]);

        assert!(store.delete(&snap.id).await.unwrap());
        assert!(!store.delete(&snap.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemorySnapshotStore::new()).await;
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::open(dir.path().join("snapshots"))
            .await
            .unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_json_file_store_overwrites_and_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("README.txt"), "hello").await.unwrap();
        tokio::fs::write(dir.path().join("not-a-uuid.json"), "{}").await.unwrap();

        let mut snap = snapshot();
        store.save(&snap).await.unwrap();
        snap.name = "renamed".to_string();
        store.save(&snap).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![snap.id]);
        assert_eq!(store.load(&snap.id).await.unwrap().unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn test_json_file_store_reports_unreadable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::open(dir.path()).await.unwrap();
        let id = uuid::Uuid::new_v4();
        tokio::fs::write(dir.path().join(format!("{}.json", id)), "{ truncated")
            .await
            .unwrap();
        assert!(matches!(
            store.load(&id).await,
            Err(VellumError::Persistence(_))
        ));
    }
}
