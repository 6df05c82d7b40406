use super::ObjectKey;
use super::replication::ReplicationOperation;
use crate::container::Container;
use crate::core::{CollectionError, Data, ItemId, Result, TransactionId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A backup-side mutation carrying ids already decided by the primary.
///
/// Every variant is safe to deliver more than once except `ReserveRemove`,
/// which fails when the item it names is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOp {
    Add { id: ItemId, value: Data },
    Remove { id: ItemId },
    AddAll { values: BTreeMap<ItemId, Data> },
    Clear { ids: HashSet<ItemId> },
    ReserveAdd { id: ItemId, transaction_id: TransactionId },
    ReserveRemove { id: ItemId, transaction_id: TransactionId },
    CommitAdd { id: ItemId, value: Data },
    CommitRemove { id: ItemId },
    RollbackAdd { id: ItemId },
    RollbackRemove { id: ItemId },
    RollbackTransaction { transaction_id: TransactionId },
}

impl BackupOp {
    pub fn name(&self) -> &'static str {
        match self {
            BackupOp::Add { .. } => "add",
            BackupOp::Remove { .. } => "remove",
            BackupOp::AddAll { .. } => "add_all",
            BackupOp::Clear { .. } => "clear",
            BackupOp::ReserveAdd { .. } => "reserve_add",
            BackupOp::ReserveRemove { .. } => "reserve_remove",
            BackupOp::CommitAdd { .. } => "commit_add",
            BackupOp::CommitRemove { .. } => "commit_remove",
            BackupOp::RollbackAdd { .. } => "rollback_add",
            BackupOp::RollbackRemove { .. } => "rollback_remove",
            BackupOp::RollbackTransaction { .. } => "rollback_transaction",
        }
    }

    pub fn apply_to(&self, container: &mut Container) -> Result<()> {
        match self {
            BackupOp::Add { id, value } => container.add_backup(*id, value.clone()),
            BackupOp::Remove { id } => container.remove_backup(*id),
            BackupOp::AddAll { values } => container.add_all_backup(values),
            BackupOp::Clear { ids } => container.clear_backup(ids),
            BackupOp::ReserveAdd { id, transaction_id } => {
                container.reserve_add_backup(*id, transaction_id.clone())
            }
            BackupOp::ReserveRemove { id, transaction_id } => {
                container.reserve_remove_backup(*id, transaction_id.clone())?
            }
            BackupOp::CommitAdd { id, value } => container.commit_add_backup(*id, value.clone()),
            BackupOp::CommitRemove { id } => container.commit_remove_backup(*id),
            BackupOp::RollbackAdd { id } => container.rollback_add_backup(*id),
            BackupOp::RollbackRemove { id } => container.rollback_remove_backup(*id),
            BackupOp::RollbackTransaction { transaction_id } => {
                container.rollback_transaction(transaction_id);
            }
        }
        Ok(())
    }
}

/// Transport used to reach the members holding backup replicas.
#[async_trait]
pub trait BackupReplicator: Send + Sync {
    /// Deliver one backup mutation to a member.
    async fn send_backup(&self, target_member: &str, key: &ObjectKey, op: BackupOp) -> Result<()>;

    /// Deliver a full partition state transfer to a member.
    async fn send_replication(
        &self,
        target_member: &str,
        operation: ReplicationOperation,
    ) -> Result<()>;
}

/// Fans a primary's backup ops out to the members holding its replicas.
pub struct BackupDriver {
    replicator: Arc<dyn BackupReplicator>,
    backup_members: Vec<String>,
}

impl BackupDriver {
    /// `backup_members` are ordered by replica index (first entry is replica 1).
    pub fn new(replicator: Arc<dyn BackupReplicator>, backup_members: Vec<String>) -> Self {
        Self {
            replicator,
            backup_members,
        }
    }

    pub fn backup_members(&self) -> &[String] {
        &self.backup_members
    }

    /// Send `op` to the first `backup_count` backup members.
    ///
    /// Returns the members that acknowledged. The first failure is returned
    /// after every member has been attempted.
    pub async fn replicate(
        &self,
        key: &ObjectKey,
        op: BackupOp,
        backup_count: u32,
    ) -> Result<Vec<String>> {
        let mut acknowledged = Vec::new();
        let mut first_error: Option<CollectionError> = None;
        for member in self.backup_members.iter().take(backup_count as usize) {
            match self.replicator.send_backup(member, key, op.clone()).await {
                Ok(()) => acknowledged.push(member.clone()),
                Err(err) => {
                    log::warn!(
                        "backup '{}' for {} failed on member '{}': {}",
                        op.name(),
                        key,
                        member,
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(acknowledged),
        }
    }

    /// Ship a partition's full state to the member at `replica_index` (1-based).
    pub async fn resync(&self, operation: ReplicationOperation) -> Result<()> {
        let index = operation.replica_index as usize;
        let member = index
            .checked_sub(1)
            .and_then(|i| self.backup_members.get(i))
            .ok_or_else(|| {
                CollectionError::Replication(format!(
                    "no backup member for replica index {}",
                    operation.replica_index
                ))
            })?;
        self.replicator.send_replication(member, operation).await
    }
}
