use super::replication::ReplicationOperation;
use crate::codec::StateTransferCodec;
use crate::container::Container;
use crate::core::{CollectionConfig, Result, StorageKind, TransactionId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// All collection containers owned by one partition, keyed by object name.
#[derive(Debug)]
pub struct PartitionContainers {
    partition_id: u32,
    containers: BTreeMap<String, Container>,
}

impl PartitionContainers {
    pub fn new(partition_id: u32) -> Self {
        Self {
            partition_id,
            containers: BTreeMap::new(),
        }
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn get_or_create(&mut self, config: Arc<CollectionConfig>) -> &mut Container {
        let partition_id = self.partition_id;
        self.containers
            .entry(config.name.clone())
            .or_insert_with(|| Container::new(partition_id, config))
    }

    pub fn get(&self, name: &str) -> Option<&Container> {
        self.containers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Destroy and drop a container. Returns false if it did not exist.
    pub fn destroy(&mut self, name: &str) -> bool {
        match self.containers.remove(name) {
            Some(mut container) => {
                container.destroy();
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Abort a transaction in every container of this partition.
    pub fn rollback_transaction(&mut self, transaction_id: &TransactionId) -> usize {
        self.containers
            .values_mut()
            .map(|container| container.rollback_transaction(transaction_id))
            .sum()
    }

    /// Capture every container that keeps a copy at `replica_index`.
    ///
    /// Index 0 (the primary, used for migration) includes everything.
    pub fn prepare_replication(&self, replica_index: u32) -> Result<ReplicationOperation> {
        let mut operation = ReplicationOperation::new(self.partition_id, replica_index);
        for container in self.containers.values() {
            if container.config().total_backup_count() < replica_index {
                continue;
            }
            operation
                .payloads
                .push(StateTransferCodec::capture(container)?);
        }
        Ok(operation)
    }

    /// Replace this partition's containers with the operation's contents.
    ///
    /// All payloads are decoded before the partition is modified; a bad
    /// payload leaves the partition untouched.
    pub fn apply_replication<F>(
        &mut self,
        operation: &ReplicationOperation,
        config_for: F,
    ) -> Result<()>
    where
        F: Fn(&str, StorageKind) -> Arc<CollectionConfig>,
    {
        let mut replacement = BTreeMap::new();
        for payload in &operation.payloads {
            let state = StateTransferCodec::decode(payload)?;
            let name = state.name.clone();
            let mut container = Container::new(self.partition_id, config_for(&name, state.storage));
            StateTransferCodec::apply_state(&mut container, state)?;
            replacement.insert(name, container);
        }

        for container in self.containers.values_mut() {
            container.destroy();
        }
        self.containers = replacement;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Data;

    fn config(name: &str, backups: u32) -> Arc<CollectionConfig> {
        Arc::new(CollectionConfig::new(name).with_backup_count(backups))
    }

    fn default_config(name: &str, storage: StorageKind) -> Arc<CollectionConfig> {
        Arc::new(CollectionConfig::new(name).with_storage(storage))
    }

    #[test]
    fn test_replication_filters_by_backup_count() {
        let mut partition = PartitionContainers::new(1);
        partition.get_or_create(config("one", 1)).add(Data::from("a"));
        partition.get_or_create(config("two", 2)).add(Data::from("b"));

        assert_eq!(partition.prepare_replication(0).unwrap().payloads.len(), 2);
        assert_eq!(partition.prepare_replication(1).unwrap().payloads.len(), 2);
        assert_eq!(partition.prepare_replication(2).unwrap().payloads.len(), 1);
        assert!(partition.prepare_replication(3).unwrap().is_empty());
    }

    #[test]
    fn test_apply_replaces_not_merges() {
        let mut source = PartitionContainers::new(1);
        source.get_or_create(config("kept", 1)).add(Data::from("a"));

        let mut target = PartitionContainers::new(1);
        target.get_or_create(config("stale", 1)).add(Data::from("old"));
        target.get_or_create(config("kept", 1)).add(Data::from("zzz"));

        let op = source.prepare_replication(1).unwrap();
        target.apply_replication(&op, default_config).unwrap();

        assert!(!target.contains("stale"));
        assert_eq!(target.get("kept").unwrap().get_all(), vec![Data::from("a")]);
    }

    #[test]
    fn test_bad_payload_leaves_partition_untouched() {
        let mut target = PartitionContainers::new(1);
        target.get_or_create(config("kept", 1)).add(Data::from("a"));

        let mut op = ReplicationOperation::new(1, 1);
        op.payloads.push(b"garbage".to_vec());
        assert!(target.apply_replication(&op, default_config).is_err());
        assert_eq!(target.get("kept").unwrap().size(), 1);
    }

    #[test]
    fn test_rollback_transaction_spans_containers() {
        let mut partition = PartitionContainers::new(0);
        partition.get_or_create(config("a", 1)).add(Data::from("x"));
        partition
            .get_or_create(config("a", 1))
            .reserve_remove(-1, &Data::from("x"), "tx".into());
        partition
            .get_or_create(config("b", 1))
            .reserve_add("tx".into(), &Data::from("y"));

        assert_eq!(partition.rollback_transaction(&"tx".into()), 2);
        assert_eq!(partition.get("a").unwrap().size(), 1);
        assert_eq!(partition.get("b").unwrap().pending_count(), 0);
    }

    #[test]
    fn test_destroy() {
        let mut partition = PartitionContainers::new(0);
        partition.get_or_create(config("a", 1));
        assert!(partition.destroy("a"));
        assert!(!partition.destroy("a"));
        assert!(partition.is_empty());
    }
}
