pub mod config;
pub mod diff;
pub mod error;
pub mod manager;
pub mod merge;
pub mod model;
pub mod persist;
pub mod shared;
pub mod store;

pub use config::{load_config, AppConfig, EngineConfig};
pub use diff::DiffEngine;
pub use error::{VellumError, VellumResult};
pub use manager::BufferManager;
pub use merge::{MergeEngine, MERGE_TAG};
pub use model::*;
pub use persist::{InMemorySnapshotStore, JsonFileSnapshotStore, SerializedBuffer, SnapshotStore};
pub use shared::SharedBufferManager;
