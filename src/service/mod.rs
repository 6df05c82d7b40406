// ============================================================================
// Collection Service Layer
// ============================================================================
//
// Hosts containers per partition on one member and moves their state to
// other members:
// - PartitionContainers: every container of one partition
// - CollectionService: all partitions of a member, serialized per partition
// - BackupOp / BackupReplicator: per-operation backup replication
// - ReplicationOperation: whole-partition state transfer
//
// ============================================================================

pub mod backup;
pub mod collection_service;
pub mod in_memory;
pub mod partition;
pub mod replication;

pub use backup::{BackupDriver, BackupOp, BackupReplicator};
pub use collection_service::CollectionService;
pub use in_memory::InMemoryBackupReplicator;
pub use partition::PartitionContainers;
pub use replication::{REPLICATION_FORMAT_VERSION, REPLICATION_MAGIC, ReplicationOperation};

use std::fmt;

/// Address of one container: `(service name, object name, partition id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub service_name: String,
    pub object_name: String,
    pub partition_id: u32,
}

impl ObjectKey {
    pub fn new(
        service_name: impl Into<String>,
        object_name: impl Into<String>,
        partition_id: u32,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            object_name: object_name.into(),
            partition_id,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{}",
            self.service_name, self.object_name, self.partition_id
        )
    }
}
