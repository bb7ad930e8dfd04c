pub mod branch;
pub mod buffer;
pub mod diff;
pub mod item;
pub mod merge;
pub mod schema;
pub mod version;

pub use branch::Branch;
pub use buffer::{Buffer, BufferId, INITIAL_COMMIT_MESSAGE, MAIN_BRANCH};
pub use diff::{Diff, DiffStats, Modification};
pub use item::{content_hash, identity_of, Item};
pub use merge::{Conflict, ConflictResolution, MergeDetails, MergeOptions, MergeResult, MergeStrategy};
pub use schema::{ContentSchema, FieldType};
pub use version::{CommitOptions, Version, VersionId};
