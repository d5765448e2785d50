use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::model::{CategoryGroup, GroceryItem, ItemDraft, ItemId, ItemPatch};

/// Authoritative in-memory collection of grocery items.
///
/// All mutations serialize behind one lock and apply atomically: readers see
/// either the state before a mutation or after it, never the middle. Reads
/// hand out snapshots, not live views. Mutations on an unknown id are silent
/// no-ops rather than errors, since callers act on snapshots that may have
/// been concurrently deleted.
///
/// Every state change bumps a revision observable through [`subscribe`],
/// which is how screens learn to re-render.
///
/// [`subscribe`]: GroceryStore::subscribe
pub struct GroceryStore {
    items: RwLock<Vec<GroceryItem>>,
    revision: watch::Sender<u64>,
}

impl GroceryStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            items: RwLock::new(Vec::new()),
            revision,
        }
    }

    /// Append a new item with a freshly generated id and `checked = false`.
    /// Insertion order is preserved.
    pub fn add_item(&self, draft: ItemDraft) {
        let item = GroceryItem {
            id: ItemId::generate(),
            name: draft.name,
            quantity: draft.quantity,
            category: draft.category,
            checked: false,
        };
        debug!(id = %item.id, name = %item.name, "adding grocery item");
        self.write().push(item);
        self.notify();
    }

    /// Replace only the supplied fields on the item matching `id`.
    pub fn update_item(&self, id: ItemId, patch: ItemPatch) {
        let changed = {
            let mut items = self.write();
            match items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    if let Some(name) = patch.name {
                        item.name = name;
                    }
                    if let Some(quantity) = patch.quantity {
                        item.quantity = quantity;
                    }
                    if let Some(category) = patch.category {
                        item.category = category;
                    }
                    if let Some(checked) = patch.checked {
                        item.checked = checked;
                    }
                    true
                }
                None => false,
            }
        };
        if changed {
            debug!(%id, "updated grocery item");
            self.notify();
        }
    }

    /// Flip the checked state of the item matching `id`.
    pub fn toggle_item(&self, id: ItemId) {
        let changed = {
            let mut items = self.write();
            if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                item.checked = !item.checked;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Remove the item matching `id`.
    pub fn delete_item(&self, id: ItemId) {
        let removed = {
            let mut items = self.write();
            let before = items.len();
            items.retain(|item| item.id != id);
            items.len() != before
        };
        if removed {
            debug!(%id, "deleted grocery item");
            self.notify();
        }
    }

    /// Consistent snapshot of the full collection in insertion order.
    pub fn items(&self) -> Vec<GroceryItem> {
        self.read().clone()
    }

    /// Group the collection by category.
    ///
    /// A pure projection recomputed on demand, never cached: categories
    /// appear in first-seen order, items keep their insertion order within
    /// each group, and every item appears exactly once.
    pub fn group_by_category(&self) -> Vec<CategoryGroup> {
        let items = self.read();
        let mut groups: Vec<CategoryGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for item in items.iter() {
            let slot = *index.entry(item.category.clone()).or_insert_with(|| {
                groups.push(CategoryGroup {
                    category: item.category.clone(),
                    items: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].items.push(item.clone());
        }
        groups
    }

    /// Observe state changes. The receiver yields a monotonically increasing
    /// revision; any change in value means the snapshot should be re-read.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Remove every item. Intended for test isolation and sign-out.
    pub fn reset(&self) {
        let had_items = {
            let mut items = self.write();
            let had_items = !items.is_empty();
            items.clear();
            had_items
        };
        if had_items {
            debug!("reset grocery store");
            self.notify();
        }
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    // Mutations never panic while holding the lock, so a poisoned lock still
    // guards consistent data and can be recovered.
    fn read(&self) -> RwLockReadGuard<'_, Vec<GroceryItem>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<GroceryItem>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GroceryStore {
    fn default() -> Self {
        Self::new()
    }
}
