//! Ordered collections of cross-shift entries.
//!
//! Entries are stored in submission order (by [`EntryId`], which is time-prefixed), never by
//! insertion position, so a registry rebuilt from persisted entries orders identically.

use handover_ids::EntryId;
use serde::{Deserialize, Serialize};

/// An entry that can live in a [`Registry`].
pub trait RegistryEntry {
    fn id(&self) -> EntryId;

    /// Display group; lower ranks are listed first. Entries within a group are listed by
    /// submission time ascending.
    fn group_rank(&self) -> u8 {
        0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Vec<T>",
    into = "Vec<T>",
    bound(
        serialize = "T: Serialize + Clone + RegistryEntry",
        deserialize = "T: Deserialize<'de> + RegistryEntry"
    )
)]
pub struct Registry<T: RegistryEntry> {
    entries: Vec<T>,
}

impl<T: RegistryEntry> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: RegistryEntry> From<Vec<T>> for Registry<T> {
    fn from(mut entries: Vec<T>) -> Self {
        entries.sort_by_key(|e| e.id());
        entries.dedup_by_key(|e| e.id());
        Self { entries }
    }
}

impl<T: RegistryEntry> From<Registry<T>> for Vec<T> {
    fn from(registry: Registry<T>) -> Self {
        registry.entries
    }
}

impl<T: RegistryEntry> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&T> {
        self.position(id).map(|i| &self.entries[i])
    }

    pub(crate) fn get_mut(&mut self, id: &EntryId) -> Option<&mut T> {
        self.position(id).map(|i| &mut self.entries[i])
    }

    /// Entries in submission order, ignoring display groups.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries in display order: by group, then by submission time.
    pub fn ordered(&self) -> Vec<&T> {
        let mut view: Vec<&T> = self.entries.iter().collect();
        // Stable sort keeps submission order inside each group.
        view.sort_by_key(|e| e.group_rank());
        view
    }

    pub(crate) fn insert(&mut self, entry: T) {
        let id = entry.id();
        match self.entries.binary_search_by_key(&id, |e| e.id()) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    pub(crate) fn remove(&mut self, id: &EntryId) -> Option<T> {
        self.position(id).map(|i| self.entries.remove(i))
    }

    /// Highest id held, used to resume an id generator after carrying entries forward.
    pub fn latest_id(&self) -> Option<EntryId> {
        self.entries.last().map(|e| e.id())
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.entries.retain(keep);
    }

    fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.binary_search_by_key(id, |e| e.id()).ok()
    }
}
