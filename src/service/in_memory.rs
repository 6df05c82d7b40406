use super::ObjectKey;
use super::backup::{BackupOp, BackupReplicator};
use super::collection_service::CollectionService;
use super::replication::ReplicationOperation;
use crate::core::{CollectionError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An in-process `BackupReplicator` wiring member services together.
///
/// Replication frames are encoded and decoded on the way through so the
/// wire format is exercised. Members can be marked unreachable to simulate
/// a partitioned network.
#[derive(Clone, Default)]
pub struct InMemoryBackupReplicator {
    members: Arc<Mutex<HashMap<String, Arc<CollectionService>>>>,
    unreachable: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryBackupReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_member(&self, service: Arc<CollectionService>) {
        let mut members = self.members.lock().await;
        members.insert(service.member_id().to_string(), service);
    }

    pub async fn set_reachable(&self, member_id: &str, reachable: bool) {
        let mut unreachable = self.unreachable.lock().await;
        if reachable {
            unreachable.remove(member_id);
        } else {
            unreachable.insert(member_id.to_string());
        }
    }

    async fn member(&self, member_id: &str) -> Result<Arc<CollectionService>> {
        if self.unreachable.lock().await.contains(member_id) {
            return Err(CollectionError::Replication(format!(
                "member '{}' is unreachable",
                member_id
            )));
        }
        let members = self.members.lock().await;
        members.get(member_id).cloned().ok_or_else(|| {
            CollectionError::Replication(format!("member '{}' is not registered", member_id))
        })
    }
}

#[async_trait]
impl BackupReplicator for InMemoryBackupReplicator {
    async fn send_backup(&self, target_member: &str, key: &ObjectKey, op: BackupOp) -> Result<()> {
        let member = self.member(target_member).await?;
        member.apply_backup(key, &op).await
    }

    async fn send_replication(
        &self,
        target_member: &str,
        operation: ReplicationOperation,
    ) -> Result<()> {
        let member = self.member(target_member).await?;
        let frame = operation.encode()?;
        let received = ReplicationOperation::decode(&frame)?;
        member.apply_replication(&received).await
    }
}
