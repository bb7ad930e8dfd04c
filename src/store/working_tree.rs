use crate::error::VellumResult;
use crate::model::buffer::Buffer;
use crate::model::item::Item;

// ---------------------------------------------------------------------------
// Working tree: the mutable content staged on top of the current head
// ---------------------------------------------------------------------------

impl Buffer {
    /// Replace the working content and recompute the dirty flag.
    pub fn set_content(&mut self, items: Vec<Item>) -> VellumResult<()> {
        self.working_content = items;
        self.refresh_dirty()
    }

    /// Append items to the working content and recompute the dirty flag.
    pub fn append_content(&mut self, items: Vec<Item>) -> VellumResult<()> {
        self.working_content.extend(items);
        self.refresh_dirty()
    }

    /// Reset the working content to a copy of `version_id`'s content.
    ///
    /// Only called right after the current branch head has been moved to
    /// `version_id`, so the tree is clean afterwards.
    pub(crate) fn load_version(&mut self, version_id: &str) -> VellumResult<()> {
        let content = self.versions.get(version_id)?.content.clone();
        self.working_content = content;
        self.is_dirty = false;
        self.touch();
        Ok(())
    }

    fn refresh_dirty(&mut self) -> VellumResult<()> {
        let dirty = self.head_version()?.content != self.working_content;
        self.is_dirty = dirty;
        self.touch();
        Ok(())
    }
}
