use tracing::{debug, info};

use crate::error::{VellumError, VellumResult};
use crate::model::buffer::Buffer;
use crate::model::version::{CommitOptions, Version, VersionId};

// ---------------------------------------------------------------------------
// Commit, rollback, switch and history on a single buffer
// ---------------------------------------------------------------------------

impl Buffer {
    /// Record the working content as a new version on the current branch.
    pub fn commit(&mut self, message: &str, options: CommitOptions) -> VellumResult<VersionId> {
        if !self.is_dirty {
            return Err(VellumError::NothingToCommit {
                branch: self.current_branch.clone(),
            });
        }
        if let Some(schema) = &self.schema {
            schema.validate(&self.working_content)?;
        }

        let parent = self.head()?.head.clone();
        let version = Version::new(self.working_content.clone(), message, Some(parent))
            .with_tags(options.tags)
            .with_metadata(options.metadata);
        self.append_to_current(version)
    }

    /// Append a version whose parent is the current head and advance the
    /// current branch to it. The working tree is reset to its content.
    pub(crate) fn append_to_current(&mut self, version: Version) -> VellumResult<VersionId> {
        let branch = self.current_branch.clone();
        let id = self.versions.push(version)?.id.clone();
        self.set_head(&branch, &id)?;
        self.load_version(&id)?;

        info!(buffer = %self.id, branch = %branch, version = %id, "committed version");
        Ok(id)
    }

    /// Move the current branch head `steps` parents back.
    ///
    /// Versions past the new head stay in the store; only the branch pointer
    /// moves. Refused on a dirty tree unless `force` is set.
    pub fn rollback(&mut self, steps: usize, force: bool) -> VellumResult<VersionId> {
        let head = self.head()?.head.clone();
        let available = self.versions.depth(&head)?;
        if steps == 0 || steps > available {
            return Err(VellumError::InvalidRollback { steps, available });
        }
        if self.is_dirty && !force {
            return Err(VellumError::UncommittedChanges {
                branch: self.current_branch.clone(),
            });
        }

        let target = self
            .versions
            .ancestors(&head)?
            .nth(steps)
            .map(|v| v.id.clone())
            .ok_or(VellumError::InvalidRollback { steps, available })?;

        let branch = self.current_branch.clone();
        self.set_head(&branch, &target)?;
        self.load_version(&target)?;

        info!(buffer = %self.id, branch = %branch, steps, version = %target, "rolled back");
        Ok(target)
    }

    /// Check out branch `name`, replacing the working content with its head.
    pub fn switch_branch(&mut self, name: &str, force: bool) -> VellumResult<()> {
        let head = self.branch(name)?.head.clone();
        if self.is_dirty && !force {
            return Err(VellumError::UncommittedChanges {
                branch: self.current_branch.clone(),
            });
        }

        debug!(buffer = %self.id, from = %self.current_branch, to = name, "switching branch");
        self.current_branch = name.to_string();
        self.load_version(&head)
    }

    /// Versions reachable from the current head, most recent first.
    pub fn history(&self, limit: usize) -> VellumResult<Vec<&Version>> {
        let head = &self.head()?.head;
        Ok(self.versions.ancestors(head)?.take(limit).collect())
    }
}
