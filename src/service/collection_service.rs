use super::ObjectKey;
use super::backup::BackupOp;
use super::partition::PartitionContainers;
use super::replication::ReplicationOperation;
use crate::container::Container;
use crate::core::{CollectionConfig, CollectionError, Result, StorageKind, TransactionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Hosts every partition of one collection service on a single member.
///
/// Each partition sits behind its own mutex, which serializes all operations
/// on that partition's containers while different partitions run in parallel.
pub struct CollectionService {
    member_id: String,
    service_name: String,
    partitions: Vec<Mutex<PartitionContainers>>,
    configs: RwLock<HashMap<String, Arc<CollectionConfig>>>,
}

impl CollectionService {
    pub fn new(
        member_id: impl Into<String>,
        service_name: impl Into<String>,
        partition_count: u32,
    ) -> Result<Self> {
        let member_id = member_id.into();
        if member_id.trim().is_empty() {
            return Err(CollectionError::Config(
                "member_id must not be empty".to_string(),
            ));
        }
        if partition_count == 0 {
            return Err(CollectionError::Config(
                "partition_count must be positive".to_string(),
            ));
        }
        let partitions = (0..partition_count)
            .map(|id| Mutex::new(PartitionContainers::new(id)))
            .collect();
        Ok(Self {
            member_id,
            service_name: service_name.into(),
            partitions,
            configs: RwLock::new(HashMap::new()),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    pub fn key(&self, object_name: &str, partition_id: u32) -> ObjectKey {
        ObjectKey::new(self.service_name.as_str(), object_name, partition_id)
    }

    /// Register (or replace) the configuration used for newly created containers.
    pub async fn register_config(&self, config: CollectionConfig) -> Result<()> {
        config.validate()?;
        let mut configs = self.configs.write().await;
        configs.insert(config.name.clone(), Arc::new(config));
        Ok(())
    }

    /// Registered configuration for `name`, or the defaults.
    pub async fn config_for(&self, name: &str) -> Arc<CollectionConfig> {
        let configs = self.configs.read().await;
        configs
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::new(CollectionConfig::new(name)))
    }

    /// Run `f` against the container addressed by `key`, creating it if needed.
    pub async fn execute<F, R>(&self, key: &ObjectKey, f: F) -> Result<R>
    where
        F: FnOnce(&mut Container) -> R,
    {
        self.check_service(key)?;
        let config = self.config_for(&key.object_name).await;
        let mut partition = self.partition(key.partition_id)?.lock().await;
        Ok(f(partition.get_or_create(config)))
    }

    /// Run `f` against an existing container without creating one.
    pub async fn inspect<F, R>(&self, key: &ObjectKey, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&Container) -> R,
    {
        self.check_service(key)?;
        let partition = self.partition(key.partition_id)?.lock().await;
        Ok(partition.get(&key.object_name).map(f))
    }

    pub async fn apply_backup(&self, key: &ObjectKey, op: &BackupOp) -> Result<()> {
        self.execute(key, |container| op.apply_to(container)).await?
    }

    pub async fn rollback_transaction(
        &self,
        partition_id: u32,
        transaction_id: &TransactionId,
    ) -> Result<usize> {
        let mut partition = self.partition(partition_id)?.lock().await;
        Ok(partition.rollback_transaction(transaction_id))
    }

    /// Destroy `object_name` in every partition. Returns how many containers existed.
    pub async fn destroy(&self, object_name: &str) -> usize {
        let mut destroyed = 0;
        for partition in &self.partitions {
            if partition.lock().await.destroy(object_name) {
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            log::debug!(
                "member '{}' destroyed '{}' in {} partitions",
                self.member_id,
                object_name,
                destroyed
            );
        }
        destroyed
    }

    /// Visible items of `object_name` summed across partitions.
    pub async fn total_size(&self, object_name: &str) -> usize {
        let mut total = 0;
        for partition in &self.partitions {
            if let Some(container) = partition.lock().await.get(object_name) {
                total += container.size();
            }
        }
        total
    }

    pub async fn replication_for(
        &self,
        partition_id: u32,
        replica_index: u32,
    ) -> Result<ReplicationOperation> {
        let partition = self.partition(partition_id)?.lock().await;
        partition.prepare_replication(replica_index)
    }

    pub async fn apply_replication(&self, operation: &ReplicationOperation) -> Result<()> {
        let configs = self.configs.read().await.clone();
        let config_for = |name: &str, storage: StorageKind| {
            configs
                .get(name)
                .cloned()
                .unwrap_or_else(|| Arc::new(CollectionConfig::new(name).with_storage(storage)))
        };

        let mut partition = self.partition(operation.partition_id)?.lock().await;
        partition.apply_replication(operation, config_for)?;
        log::info!(
            "member '{}' applied replication for partition {} (replica {}, {} containers)",
            self.member_id,
            operation.partition_id,
            operation.replica_index,
            operation.payloads.len()
        );
        Ok(())
    }

    fn partition(&self, partition_id: u32) -> Result<&Mutex<PartitionContainers>> {
        self.partitions
            .get(partition_id as usize)
            .ok_or(CollectionError::PartitionOutOfRange {
                partition_id,
                partition_count: self.partition_count(),
            })
    }

    fn check_service(&self, key: &ObjectKey) -> Result<()> {
        if key.service_name == self.service_name {
            Ok(())
        } else {
            Err(CollectionError::ContainerNotFound(key.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Data;

    #[tokio::test]
    async fn test_execute_creates_with_registered_config() {
        let service = CollectionService::new("m1", "list", 4).unwrap();
        service
            .register_config(CollectionConfig::new("orders").with_max_size(1))
            .await
            .unwrap();

        let key = service.key("orders", 2);
        let id = service.execute(&key, |c| c.add(Data::from("a"))).await.unwrap();
        assert_eq!(id, Some(1));
        let full = service
            .execute(&key, |c| !c.has_enough_capacity(1))
            .await
            .unwrap();
        assert!(full);
    }

    #[tokio::test]
    async fn test_partition_out_of_range() {
        let service = CollectionService::new("m1", "list", 2).unwrap();
        let err = service
            .execute(&service.key("x", 5), |c| c.size())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CollectionError::PartitionOutOfRange {
                partition_id: 5,
                partition_count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_service_rejected() {
        let service = CollectionService::new("m1", "list", 2).unwrap();
        let key = ObjectKey::new("queue", "x", 0);
        assert!(service.execute(&key, |c| c.size()).await.is_err());
    }

    #[tokio::test]
    async fn test_inspect_does_not_create() {
        let service = CollectionService::new("m1", "list", 1).unwrap();
        let key = service.key("ghost", 0);
        assert_eq!(service.inspect(&key, |c| c.size()).await.unwrap(), None);
        assert_eq!(service.destroy("ghost").await, 0);
    }

    #[tokio::test]
    async fn test_total_size_and_destroy() {
        let service = CollectionService::new("m1", "list", 3).unwrap();
        for partition in 0..3 {
            let key = service.key("orders", partition);
            service
                .execute(&key, |c| c.add(Data::from("v")))
                .await
                .unwrap();
        }
        assert_eq!(service.total_size("orders").await, 3);
        assert_eq!(service.destroy("orders").await, 3);
        assert_eq!(service.total_size("orders").await, 0);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(CollectionService::new("", "list", 1).is_err());
        assert!(CollectionService::new("m1", "list", 0).is_err());
    }
}
