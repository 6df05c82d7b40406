use crate::core::{ItemId, PendingTxItem, TransactionId};
use std::collections::BTreeMap;

/// In-flight reservations of the two-phase protocol, keyed by item id.
#[derive(Debug, Default, Clone)]
pub struct TransactionLog {
    entries: BTreeMap<ItemId, PendingTxItem>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reservation, returning the entry it replaced (if any).
    pub fn insert(&mut self, entry: PendingTxItem) -> Option<PendingTxItem> {
        self.entries.insert(entry.id, entry)
    }

    pub fn get(&self, id: ItemId) -> Option<&PendingTxItem> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<PendingTxItem> {
        self.entries.remove(&id)
    }

    /// Remove and return every entry owned by `transaction_id`, in id order.
    pub fn drain_transaction(&mut self, transaction_id: &TransactionId) -> Vec<PendingTxItem> {
        let ids: Vec<ItemId> = self
            .entries
            .values()
            .filter(|entry| &entry.transaction_id == transaction_id)
            .map(|entry| entry.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }

    pub fn for_transaction<'a>(
        &'a self,
        transaction_id: &'a TransactionId,
    ) -> impl Iterator<Item = &'a PendingTxItem> + 'a {
        self.entries
            .values()
            .filter(move |entry| &entry.transaction_id == transaction_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTxItem> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Data, Item};

    #[test]
    fn test_drain_transaction_only_touches_owner() {
        let mut log = TransactionLog::new();
        log.insert(PendingTxItem::add(1, "tx1".into()));
        log.insert(PendingTxItem::add(2, "tx2".into()));
        log.insert(PendingTxItem::remove(Item::new(3, Data::from("c")), "tx1".into()));

        let drained = log.drain_transaction(&"tx1".into());
        assert_eq!(drained.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(log.len(), 1);
        assert!(log.contains(2));
    }

    #[test]
    fn test_insert_reports_replaced_entry() {
        let mut log = TransactionLog::new();
        assert!(log.insert(PendingTxItem::add(1, "tx".into())).is_none());
        assert!(log.insert(PendingTxItem::add(1, "tx".into())).is_some());
        assert_eq!(log.len(), 1);
    }
}
