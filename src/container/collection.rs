// ============================================================================
// Collection Container
// ============================================================================
//
// One partition's copy of one distributed collection. The same type serves
// the primary (allocates ids, decides) and the backups (replay decisions
// using the ids chosen by the primary).
//
// Reservation lifecycle per item:
//
//   [none] --reserve_add--> [uncommitted add] --commit_add--> [visible]
//                                 |
//                                 +--rollback_add--> [none]
//
//   [visible] --reserve_remove--> [reserved remove] --commit_remove--> [gone]
//                                         |
//                                         +--rollback_remove--> [visible]
//
// Operations on one container are executed serially by the owning
// partition; the container does no locking of its own.
//
// ============================================================================

use super::id::IdAllocator;
use super::policy::{StoragePolicy, policy_for};
use super::store::ItemStore;
use super::txlog::TransactionLog;
use crate::core::{
    CollectionConfig, CollectionError, Data, Item, ItemId, NO_RESERVATION, PendingTxItem,
    Result, TransactionId,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{Span, debug, error, info_span, warn};

/// Outcome of a successful `reserve_remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveReservation {
    /// A visible item was taken out of the store and logged for the transaction.
    Reserved(Item),
    /// No visible match; the caller's own pending add-reservation was withdrawn instead.
    CanceledAdd(PendingTxItem),
}

impl RemoveReservation {
    pub fn item_id(&self) -> ItemId {
        match self {
            RemoveReservation::Reserved(item) => item.id,
            RemoveReservation::CanceledAdd(entry) => entry.id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub size: usize,
    pub pending: usize,
    pub watermark: ItemId,
    /// Duplicate or out-of-order deliveries that were tolerated.
    pub anomalies: u64,
}

pub struct Container {
    name: String,
    partition_id: u32,
    config: Arc<CollectionConfig>,
    ids: IdAllocator,
    store: ItemStore,
    tx_log: TransactionLog,
    anomalies: u64,
    span: Span,
}

impl Container {
    pub fn new(partition_id: u32, config: Arc<CollectionConfig>) -> Self {
        let span = info_span!("collection", name = %config.name, partition = partition_id);
        Self::with_span(partition_id, config, span)
    }

    /// Create a container that logs under the caller's span.
    pub fn with_span(partition_id: u32, config: Arc<CollectionConfig>, span: Span) -> Self {
        let store = ItemStore::new(policy_for(config.storage));
        debug!(parent: &span, "container created");
        Self {
            name: config.name.clone(),
            partition_id,
            config,
            ids: IdAllocator::new(),
            store,
            tx_log: TransactionLog::new(),
            anomalies: 0,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn StoragePolicy {
        self.store.policy()
    }

    pub fn watermark(&self) -> ItemId {
        self.ids.watermark()
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            size: self.store.len(),
            pending: self.tx_log.len(),
            watermark: self.ids.watermark(),
            anomalies: self.anomalies,
        }
    }

    // ------------------------------------------------------------------
    // Primary operations
    // ------------------------------------------------------------------

    /// Add a value, returning its new id.
    ///
    /// Returns `None` only when the storage policy refuses the value (set
    /// semantics with an equal value already present).
    pub fn add(&mut self, value: Data) -> Option<ItemId> {
        if !self.store.policy().allows_duplicates() && self.store.contains_value(&value) {
            return None;
        }
        let id = self.ids.next_id();
        self.store.put(Item::new(id, value));
        Some(id)
    }

    pub fn remove(&mut self, value: &Data) -> Option<Item> {
        self.store.remove_first(value)
    }

    /// Add values in order, one id each. Values refused by the policy get no id.
    pub fn add_all(&mut self, values: Vec<Data>) -> BTreeMap<ItemId, Data> {
        let mut added = BTreeMap::new();
        for value in values {
            if let Some(id) = self.add(value.clone()) {
                added.insert(id, value);
            }
        }
        added
    }

    /// `retain == true` keeps only values in `values`; `false` removes them.
    pub fn compare_and_remove(
        &mut self,
        retain: bool,
        values: &HashSet<Data>,
    ) -> BTreeMap<ItemId, Data> {
        self.store
            .remove_where(|value| values.contains(value) != retain)
    }

    pub fn clear(&mut self) -> BTreeMap<ItemId, Data> {
        self.store.clear()
    }

    /// True iff every value in `values` is present.
    pub fn contains(&self, values: &HashSet<Data>) -> bool {
        values.iter().all(|value| self.store.contains_value(value))
    }

    pub fn contains_value(&self, value: &Data) -> bool {
        self.store.contains_value(value)
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get_all(&self) -> Vec<Data> {
        self.store.values()
    }

    pub fn get(&self, id: ItemId) -> Option<&Data> {
        self.store.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Data)> {
        self.store.iter()
    }

    pub fn has_enough_capacity(&self, delta: usize) -> bool {
        self.store
            .len()
            .checked_add(delta)
            .is_some_and(|total| total <= self.config.max_size)
    }

    /// Take the oldest item. Only FIFO storage hands items out; other kinds return `None`.
    pub fn poll(&mut self) -> Option<Item> {
        let head = self.peek()?;
        self.store.remove(head.id)
    }

    /// Look at the oldest item without removing it. `None` unless the storage is FIFO.
    pub fn peek(&self) -> Option<Item> {
        if !self.store.policy().is_fifo() {
            return None;
        }
        self.store.first()
    }

    // ------------------------------------------------------------------
    // Backup operations
    // ------------------------------------------------------------------

    pub fn add_backup(&mut self, id: ItemId, value: Data) {
        self.ids.advance_watermark(id);
        self.store.put(Item::new(id, value));
    }

    pub fn remove_backup(&mut self, id: ItemId) {
        self.store.remove(id);
    }

    pub fn add_all_backup(&mut self, values: &BTreeMap<ItemId, Data>) {
        for (id, value) in values {
            self.add_backup(*id, value.clone());
        }
    }

    pub fn clear_backup(&mut self, ids: &HashSet<ItemId>) {
        self.store.remove_ids(ids);
    }

    // ------------------------------------------------------------------
    // Transaction operations
    // ------------------------------------------------------------------

    /// Reserve an id for a transactional add.
    ///
    /// Refused (`None`) when the value is already visible. The value itself is
    /// supplied again on `commit_add`.
    pub fn reserve_add(&mut self, transaction_id: TransactionId, value: &Data) -> Option<ItemId> {
        if self.store.contains_value(value) {
            return None;
        }
        let id = self.ids.next_id();
        self.tx_log.insert(PendingTxItem::add(id, transaction_id));
        Some(id)
    }

    pub fn reserve_add_backup(&mut self, id: ItemId, transaction_id: TransactionId) {
        self.ids.advance_watermark(id);
        if self
            .tx_log
            .insert(PendingTxItem::add(id, transaction_id))
            .is_some()
        {
            self.anomalies += 1;
            error!(
                parent: &self.span,
                item_id = id,
                "transaction reservation item already exists on the backup member"
            );
        }
    }

    /// Reserve a visible item for a transactional remove.
    ///
    /// With no visible match and a `reserved_item_id` other than
    /// [`NO_RESERVATION`], the caller's own add-reservation is withdrawn.
    pub fn reserve_remove(
        &mut self,
        reserved_item_id: i64,
        value: &Data,
        transaction_id: TransactionId,
    ) -> Option<RemoveReservation> {
        if let Some(item) = self.store.remove_first(value) {
            self.tx_log
                .insert(PendingTxItem::remove(item.clone(), transaction_id));
            return Some(RemoveReservation::Reserved(item));
        }
        if reserved_item_id != NO_RESERVATION {
            let id = ItemId::try_from(reserved_item_id).ok()?;
            return self.tx_log.remove(id).map(RemoveReservation::CanceledAdd);
        }
        None
    }

    /// Mirror a remove-reservation. The item must exist on the backup.
    pub fn reserve_remove_backup(
        &mut self,
        id: ItemId,
        transaction_id: TransactionId,
    ) -> Result<()> {
        let item = self.store.remove(id).ok_or_else(|| {
            CollectionError::Transaction(format!(
                "Transaction reservation failed on backup member. Reservation item id: {}",
                id
            ))
        })?;
        self.tx_log.insert(PendingTxItem::remove(item, transaction_id));
        Ok(())
    }

    pub fn ensure_reserve(&self, id: ItemId) -> Result<()> {
        if self.tx_log.contains(id) {
            Ok(())
        } else {
            Err(CollectionError::Transaction(format!(
                "Transaction reservation cannot be found for reservation item id: {}",
                id
            )))
        }
    }

    pub fn commit_add(&mut self, id: ItemId, value: Data) -> Result<()> {
        if self.tx_log.remove(id).is_none() {
            return Err(CollectionError::Transaction(format!(
                "Transaction log cannot be found for committing 'add()' operation. Missing log item id: {}",
                id
            )));
        }
        if !self.store.insert(Item::new(id, value)) {
            self.anomalies += 1;
            warn!(
                parent: &self.span,
                item_id = id,
                "committed value already present, dropped by storage policy"
            );
        }
        Ok(())
    }

    pub fn commit_add_backup(&mut self, id: ItemId, value: Data) {
        self.tx_log.remove(id);
        self.add_backup(id, value);
    }

    /// Finalize a remove-reservation. Repeated commits are tolerated.
    pub fn commit_remove(&mut self, id: ItemId) -> Option<PendingTxItem> {
        let entry = self.tx_log.remove(id);
        if entry.is_none() {
            self.missing_log_entry(id, "committing 'remove()'");
        }
        entry
    }

    pub fn commit_remove_backup(&mut self, id: ItemId) {
        if self.tx_log.remove(id).is_none() {
            self.missing_log_entry(id, "committing 'remove()' on backup");
        }
    }

    pub fn rollback_add(&mut self, id: ItemId) {
        if self.tx_log.remove(id).is_none() {
            self.missing_log_entry(id, "rolling back 'add()'");
        }
    }

    pub fn rollback_add_backup(&mut self, id: ItemId) {
        if self.tx_log.remove(id).is_none() {
            self.missing_log_entry(id, "rolling back 'add()' on backup");
        }
    }

    /// Drop a remove-reservation and make its item visible again under the same id.
    pub fn rollback_remove(&mut self, id: ItemId) {
        match self.tx_log.remove(id) {
            Some(entry) => {
                if let Some(item) = entry.to_item() {
                    self.restore(item);
                }
            }
            None => self.missing_log_entry(id, "rolling back 'remove()'"),
        }
    }

    /// Drop a remove-reservation on a backup.
    ///
    /// The item is not restored here; the primary replicates the restore separately.
    pub fn rollback_remove_backup(&mut self, id: ItemId) {
        if self.tx_log.remove(id).is_none() {
            self.missing_log_entry(id, "rolling back 'remove()' on backup");
        }
    }

    /// Abort every reservation owned by `transaction_id`.
    ///
    /// Remove-reservations are restored, add-reservations discarded. Entries
    /// already committed or rolled back individually are simply not found.
    /// Returns the number of reservations released.
    pub fn rollback_transaction(&mut self, transaction_id: &TransactionId) -> usize {
        let entries = self.tx_log.drain_transaction(transaction_id);
        for entry in &entries {
            if entry.is_remove {
                if let Some(item) = entry.to_item() {
                    self.restore(item);
                }
            }
        }
        if !entries.is_empty() {
            debug!(
                parent: &self.span,
                transaction = %transaction_id,
                released = entries.len(),
                "transaction rolled back"
            );
        }
        entries.len()
    }

    pub fn pending(&self, id: ItemId) -> Option<&PendingTxItem> {
        self.tx_log.get(id)
    }

    pub fn pending_for<'a>(
        &'a self,
        transaction_id: &'a TransactionId,
    ) -> impl Iterator<Item = &'a PendingTxItem> + 'a {
        self.tx_log.for_transaction(transaction_id)
    }

    pub fn pending_items(&self) -> impl Iterator<Item = &PendingTxItem> {
        self.tx_log.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.tx_log.len()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Replace the entire state with records produced elsewhere.
    ///
    /// The watermark is raised past every id seen in either map and never lowered.
    pub(crate) fn replace_state(&mut self, items: Vec<Item>, pending: Vec<PendingTxItem>) {
        self.store.clear();
        self.tx_log.clear();
        for item in items {
            self.ids.advance_watermark(item.id);
            self.store.put(item);
        }
        for entry in pending {
            self.ids.advance_watermark(entry.id);
            self.tx_log.insert(entry);
        }
        debug!(
            parent: &self.span,
            size = self.store.len(),
            pending = self.tx_log.len(),
            watermark = self.ids.watermark(),
            "container state replaced"
        );
    }

    pub fn destroy(&mut self) {
        self.store.clear();
        self.tx_log.clear();
        debug!(parent: &self.span, "container destroyed");
    }

    /// Put a reserved item back. A set that gained an equal value meanwhile keeps that one.
    fn restore(&mut self, item: Item) {
        let id = item.id;
        if !self.store.insert(item) {
            self.anomalies += 1;
            warn!(
                parent: &self.span,
                item_id = id,
                "restored value already present, dropped by storage policy"
            );
        }
    }

    fn missing_log_entry(&mut self, id: ItemId, action: &str) {
        self.anomalies += 1;
        warn!(
            parent: &self.span,
            item_id = id,
            "transaction log cannot be found for {} operation",
            action
        );
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("partition_id", &self.partition_id)
            .field("watermark", &self.ids.watermark())
            .field("store", &self.store)
            .field("tx_log", &self.tx_log)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StorageKind;

    fn container_with(config: CollectionConfig) -> Container {
        Container::new(0, Arc::new(config))
    }

    fn container() -> Container {
        container_with(CollectionConfig::new("test"))
    }

    fn set_of(values: &[&str]) -> HashSet<Data> {
        values.iter().map(|v| Data::from(*v)).collect()
    }

    #[test]
    fn test_capacity_example() {
        let mut c = container_with(CollectionConfig::new("test").with_max_size(2));
        assert_eq!(c.add(Data::from("a")), Some(1));
        assert_eq!(c.add(Data::from("b")), Some(2));
        assert!(!c.has_enough_capacity(1));
        assert_eq!(c.remove(&Data::from("a")), Some(Item::new(1, Data::from("a"))));
        assert!(c.has_enough_capacity(1));
    }

    #[test]
    fn test_capacity_boundaries() {
        let mut c = container_with(CollectionConfig::new("test").with_max_size(5));
        c.add_all(vec![Data::from("a"), Data::from("b")]);
        assert!(c.has_enough_capacity(3));
        assert!(!c.has_enough_capacity(4));
    }

    #[test]
    fn test_unbounded_capacity_does_not_overflow() {
        let mut c = container();
        c.add(Data::from("a"));
        assert!(!c.has_enough_capacity(usize::MAX));
        assert!(c.has_enough_capacity(usize::MAX - 1));
    }

    #[test]
    fn test_contains_requires_all_values() {
        let mut c = container();
        c.add(Data::from("a"));
        c.add(Data::from("b"));
        assert!(c.contains(&set_of(&["a", "b"])));
        assert!(!c.contains(&set_of(&["a", "z"])));
        assert!(c.contains(&HashSet::new()));
    }

    #[test]
    fn test_compare_and_remove_retain_and_remove_all() {
        let mut c = container();
        c.add_all(vec![Data::from("a"), Data::from("b"), Data::from("c")]);

        let removed = c.compare_and_remove(true, &set_of(&["a", "c"]));
        assert_eq!(removed, BTreeMap::from([(2, Data::from("b"))]));

        let removed = c.compare_and_remove(false, &set_of(&["a"]));
        assert_eq!(removed, BTreeMap::from([(1, Data::from("a"))]));
        assert_eq!(c.get_all(), vec![Data::from("c")]);
    }

    #[test]
    fn test_set_refuses_duplicate_add() {
        let mut c = container_with(CollectionConfig::new("s").with_storage(StorageKind::Set));
        assert_eq!(c.add(Data::from("a")), Some(1));
        assert_eq!(c.add(Data::from("a")), None);
        let added = c.add_all(vec![Data::from("b"), Data::from("b")]);
        assert_eq!(added.len(), 1);
        assert_eq!(c.size(), 2);
    }

    #[test]
    fn test_queue_poll_is_fifo() {
        let mut c = container_with(CollectionConfig::new("q").with_storage(StorageKind::Queue));
        c.add(Data::from("first"));
        c.add(Data::from("second"));
        assert_eq!(c.peek().map(|i| i.value), Some(Data::from("first")));
        assert_eq!(c.poll().map(|i| i.id), Some(1));
        assert_eq!(c.poll().map(|i| i.id), Some(2));
        assert_eq!(c.poll(), None);
    }

    #[test]
    fn test_poll_and_peek_need_fifo_storage() {
        for kind in [StorageKind::List, StorageKind::Set] {
            let mut c = container_with(CollectionConfig::new("n").with_storage(kind));
            c.add(Data::from("a"));
            assert_eq!(c.peek(), None);
            assert_eq!(c.poll(), None);
            assert_eq!(c.size(), 1);
        }
    }

    #[test]
    fn test_backup_ops_are_idempotent() {
        let mut c = container();
        c.add_backup(7, Data::from("x"));
        c.add_backup(7, Data::from("x"));
        assert_eq!(c.size(), 1);
        assert_eq!(c.watermark(), 7);

        c.remove_backup(7);
        c.remove_backup(7);
        assert!(c.is_empty());
        assert_eq!(c.add(Data::from("y")), Some(8));
    }

    #[test]
    fn test_reserve_add_refused_when_present() {
        let mut c = container();
        c.add(Data::from("x"));
        assert_eq!(c.reserve_add("tx".into(), &Data::from("x")), None);
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn test_reserve_add_backup_duplicate_is_anomaly() {
        let mut c = container();
        c.reserve_add_backup(3, "tx".into());
        c.reserve_add_backup(3, "tx".into());
        assert_eq!(c.pending_count(), 1);
        assert_eq!(c.stats().anomalies, 1);
        assert_eq!(c.watermark(), 3);
    }

    #[test]
    fn test_reserve_remove_cancels_own_add() {
        let mut c = container();
        let id = c.reserve_add("tx".into(), &Data::from("x")).unwrap();
        let outcome = c.reserve_remove(id as i64, &Data::from("x"), "tx".into());
        assert!(matches!(outcome, Some(RemoveReservation::CanceledAdd(ref e)) if e.id == id));
        assert_eq!(c.pending_count(), 0);
        assert_eq!(c.reserve_remove(NO_RESERVATION, &Data::from("x"), "tx".into()), None);
    }

    #[test]
    fn test_commit_add_conflicting_with_set_is_dropped() {
        let mut c = container_with(CollectionConfig::new("s").with_storage(StorageKind::Set));
        let id = c.reserve_add("tx".into(), &Data::from("x")).unwrap();
        c.add(Data::from("x"));
        assert!(c.commit_add(id, Data::from("x")).is_ok());
        assert_eq!(c.size(), 1);
        assert_eq!(c.stats().anomalies, 1);
    }

    #[test]
    fn test_destroy_clears_everything() {
        let mut c = container();
        c.add(Data::from("a"));
        c.reserve_add("tx".into(), &Data::from("b"));
        c.destroy();
        assert_eq!(c.stats().size, 0);
        assert_eq!(c.stats().pending, 0);
    }
}
