use thiserror::Error;

/// Central error type for Vellum operations.
#[derive(Error, Debug)]
pub enum VellumError {
    #[error("Buffer not found: {0}")]
    BufferNotFound(uuid::Uuid),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("Uncommitted changes on branch '{branch}'")]
    UncommittedChanges { branch: String },

    #[error("Nothing to commit on branch '{branch}'")]
    NothingToCommit { branch: String },

    #[error("Cannot roll back {steps} step(s): only {available} ancestor(s) available")]
    InvalidRollback { steps: usize, available: usize },

    #[error("Schema validation failed: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),

    #[error("Invalid merge: {0}")]
    InvalidMerge(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl VellumError {
    /// True for the lookup-miss family (buffer, version or branch).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VellumError::BufferNotFound(_)
                | VellumError::VersionNotFound(_)
                | VellumError::BranchNotFound(_)
        )
    }
}

/// Convenience type alias for Vellum results.
pub type VellumResult<T> = Result<T, VellumError>;
