use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{VellumError, VellumResult};
use crate::model::item::Item;
use crate::model::version::{Version, VersionId};

// ---------------------------------------------------------------------------
// VersionStore: append-only arena of immutable versions
// ---------------------------------------------------------------------------

/// Append-only log of the versions of one buffer.
///
/// Versions live in a vector in insertion order; parent links are kept as
/// arena slots next to it, so ancestor walks never hash. A version's parent
/// always sits at a lower slot, which keeps parent chains acyclic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionStore {
    versions: Vec<Version>,
    parents: Vec<Option<usize>>,
    index: HashMap<VersionId, usize>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new version with a fresh id and timestamp.
    pub fn append(
        &mut self,
        content: Vec<Item>,
        message: impl Into<String>,
        parent_id: Option<VersionId>,
        tags: BTreeSet<String>,
    ) -> VellumResult<&Version> {
        let version = Version::new(content, message, parent_id).with_tags(tags);
        self.push(version)
    }

    /// Append a fully built version. Its parent, if any, must already be stored.
    pub fn push(&mut self, version: Version) -> VellumResult<&Version> {
        if self.index.contains_key(&version.id) {
            return Err(VellumError::CorruptSnapshot(format!(
                "duplicate version id {}",
                version.id
            )));
        }

        let parent = match &version.parent_id {
            Some(parent_id) => Some(self.slot(parent_id)?),
            None => None,
        };

        let slot = self.versions.len();
        self.index.insert(version.id.clone(), slot);
        self.parents.push(parent);
        self.versions.push(version);
        Ok(&self.versions[slot])
    }

    /// Look up a version by id.
    pub fn get(&self, id: &str) -> VellumResult<&Version> {
        self.slot(id).map(|slot| &self.versions[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// All versions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// Walk from `id` to the root, closest first, starting with `id` itself.
    ///
    /// The iterator borrows the store, so calling this again restarts the walk.
    pub fn ancestors(&self, id: &str) -> VellumResult<Ancestors<'_>> {
        let start = self.slot(id)?;
        Ok(Ancestors {
            store: self,
            next: Some(start),
        })
    }

    /// Number of parent links between `id` and the root.
    pub fn depth(&self, id: &str) -> VellumResult<usize> {
        Ok(self.ancestors(id)?.count() - 1)
    }

    /// The closest version reachable from both `a` and `b`, if any.
    pub fn lowest_common_ancestor(&self, a: &str, b: &str) -> VellumResult<Option<VersionId>> {
        let theirs: HashSet<usize> = self.slots_from(self.slot(b)?).collect();
        Ok(self
            .slots_from(self.slot(a)?)
            .find(|slot| theirs.contains(slot))
            .map(|slot| self.versions[slot].id.clone()))
    }

    /// Whether `ancestor` is on the parent chain of `id` (inclusive).
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> VellumResult<bool> {
        let target = self.slot(ancestor)?;
        Ok(self.slots_from(self.slot(id)?).any(|slot| slot == target))
    }

    /// Versions carrying `tag`, oldest first.
    pub fn find_by_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Version> + 'a {
        let tag = tag.to_string();
        self.versions.iter().filter(move |v| v.tags.contains(&tag))
    }

    fn slot(&self, id: &str) -> VellumResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| VellumError::VersionNotFound(id.to_string()))
    }

    fn slots_from(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(start), move |&slot| self.parents[slot])
    }
}

/// Lazy parent-chain walk produced by [`VersionStore::ancestors`].
pub struct Ancestors<'a> {
    store: &'a VersionStore,
    next: Option<usize>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Version;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        self.next = self.store.parents[slot];
        Some(&self.store.versions[slot])
    }
}
