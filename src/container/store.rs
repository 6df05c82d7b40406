use super::policy::StoragePolicy;
use crate::core::{Data, Item, ItemId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Visible (committed) items of one container.
///
/// Items are keyed by id; ids are allocated monotonically, so id order is
/// insertion order, which is also FIFO order for queues. A per-value count
/// keeps containment checks O(1).
pub struct ItemStore {
    items: BTreeMap<ItemId, Data>,
    value_counts: HashMap<Data, usize>,
    policy: Box<dyn StoragePolicy>,
}

impl ItemStore {
    pub fn new(policy: Box<dyn StoragePolicy>) -> Self {
        Self {
            items: BTreeMap::new(),
            value_counts: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &dyn StoragePolicy {
        self.policy.as_ref()
    }

    /// Insert honoring the storage policy. Returns false if the policy refuses it.
    pub fn insert(&mut self, item: Item) -> bool {
        if !self.policy.allows_duplicates() && self.contains_value(&item.value) {
            return false;
        }
        self.put(item);
        true
    }

    /// Insert or overwrite regardless of policy.
    ///
    /// Used when the decision was already made elsewhere (backup apply, state transfer).
    pub fn put(&mut self, item: Item) {
        *self.value_counts.entry(item.value.clone()).or_insert(0) += 1;
        if let Some(previous) = self.items.insert(item.id, item.value) {
            self.release_value(&previous);
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&Data> {
        self.items.get(&id)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let value = self.items.remove(&id)?;
        self.release_value(&value);
        Some(Item::new(id, value))
    }

    /// Remove the first item (lowest id) whose value equals `value`.
    pub fn remove_first(&mut self, value: &Data) -> Option<Item> {
        if !self.contains_value(value) {
            return None;
        }
        let id = self
            .items
            .iter()
            .find(|(_, candidate)| *candidate == value)
            .map(|(id, _)| *id)?;
        self.remove(id)
    }

    pub fn first(&self) -> Option<Item> {
        self.items
            .first_key_value()
            .map(|(id, value)| Item::new(*id, value.clone()))
    }

    pub fn contains_value(&self, value: &Data) -> bool {
        self.value_counts.contains_key(value)
    }

    /// Remove every item for which `predicate` holds, returning what was removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> BTreeMap<ItemId, Data>
    where
        F: FnMut(&Data) -> bool,
    {
        let doomed: Vec<ItemId> = self
            .items
            .iter()
            .filter(|(_, value)| predicate(value))
            .map(|(id, _)| *id)
            .collect();

        let mut removed = BTreeMap::new();
        for id in doomed {
            if let Some(item) = self.remove(id) {
                removed.insert(item.id, item.value);
            }
        }
        removed
    }

    /// Remove the given ids, skipping any that are absent.
    pub fn remove_ids(&mut self, ids: &HashSet<ItemId>) {
        for id in ids {
            self.remove(*id);
        }
    }

    pub fn clear(&mut self) -> BTreeMap<ItemId, Data> {
        self.value_counts.clear();
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Data)> {
        self.items.iter().map(|(id, value)| (*id, value))
    }

    pub fn values(&self) -> Vec<Data> {
        self.items.values().cloned().collect()
    }

    fn release_value(&mut self, value: &Data) {
        if let Some(count) = self.value_counts.get_mut(value) {
            *count -= 1;
            if *count == 0 {
                self.value_counts.remove(value);
            }
        }
    }
}

impl std::fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("policy", &self.policy.kind())
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::policy::{ListPolicy, SetPolicy};

    fn list_store() -> ItemStore {
        ItemStore::new(Box::new(ListPolicy))
    }

    #[test]
    fn test_remove_first_takes_lowest_id() {
        let mut store = list_store();
        store.put(Item::new(1, Data::from("a")));
        store.put(Item::new(2, Data::from("b")));
        store.put(Item::new(3, Data::from("a")));

        assert_eq!(store.remove_first(&Data::from("a")), Some(Item::new(1, Data::from("a"))));
        assert!(store.contains_value(&Data::from("a")));
        assert_eq!(store.remove_first(&Data::from("a")), Some(Item::new(3, Data::from("a"))));
        assert!(!store.contains_value(&Data::from("a")));
        assert_eq!(store.remove_first(&Data::from("a")), None);
    }

    #[test]
    fn test_set_policy_refuses_duplicates() {
        let mut store = ItemStore::new(Box::new(SetPolicy));
        assert!(store.insert(Item::new(1, Data::from("a"))));
        assert!(!store.insert(Item::new(2, Data::from("a"))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_overwrites_and_tracks_values() {
        let mut store = list_store();
        store.put(Item::new(1, Data::from("old")));
        store.put(Item::new(1, Data::from("new")));

        assert_eq!(store.len(), 1);
        assert!(!store.contains_value(&Data::from("old")));
        assert!(store.contains_value(&Data::from("new")));
    }

    #[test]
    fn test_remove_where_returns_removed() {
        let mut store = list_store();
        for (id, value) in [(1, "a"), (2, "b"), (3, "c")] {
            store.put(Item::new(id, Data::from(value)));
        }

        let removed = store.remove_where(|value| value.as_bytes() != b"b");
        assert_eq!(removed.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(store.values(), vec![Data::from("b")]);
    }

    #[test]
    fn test_clear_resets_value_index() {
        let mut store = list_store();
        store.put(Item::new(7, Data::from("a")));
        let removed = store.clear();
        assert_eq!(removed.len(), 1);
        assert!(store.is_empty());
        assert!(!store.contains_value(&Data::from("a")));
    }
}
