use tracing::debug;

use crate::error::{VellumError, VellumResult};
use crate::model::branch::Branch;
use crate::model::buffer::Buffer;
use crate::model::version::VersionId;

// ---------------------------------------------------------------------------
// Branch management: named pointers into a buffer's version store
// ---------------------------------------------------------------------------

impl Buffer {
    /// Create a branch named `name` pointing at `from`.
    ///
    /// The new branch records the current branch as its parent. Creating a
    /// branch never switches to it.
    pub fn create_branch(&mut self, name: &str, from: &str) -> VellumResult<&Branch> {
        if name.trim().is_empty() {
            return Err(VellumError::InvalidArgument(
                "branch name must not be empty".to_string(),
            ));
        }
        if self.branches.contains_key(name) {
            return Err(VellumError::BranchAlreadyExists(name.to_string()));
        }
        let head = self.versions.get(from)?.id.clone();

        debug!(buffer = %self.id, branch = name, head = %head, "creating branch");
        let branch = Branch::new(name, head, Some(self.current_branch.clone()));
        self.branches.insert(name.to_string(), branch);
        self.touch();
        self.branch(name)
    }

    /// Repoint branch `name` at `version_id`.
    pub(crate) fn set_head(&mut self, name: &str, version_id: &VersionId) -> VellumResult<()> {
        if !self.versions.contains(version_id) {
            return Err(VellumError::VersionNotFound(version_id.clone()));
        }
        let branch = self
            .branches
            .get_mut(name)
            .ok_or_else(|| VellumError::BranchNotFound(name.to_string()))?;
        branch.head = version_id.clone();
        Ok(())
    }

    /// Look up a branch by name.
    pub fn branch(&self, name: &str) -> VellumResult<&Branch> {
        self.branches
            .get(name)
            .ok_or_else(|| VellumError::BranchNotFound(name.to_string()))
    }

    /// All branches, ordered by name.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }
}
