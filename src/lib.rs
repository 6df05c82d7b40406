// ============================================================================
// partstore Library
// ============================================================================
//
// Partition-owned storage for distributed collections: a transactional,
// replicable item container plus the state transfer used to keep backups
// in sync and to migrate partitions between members.
//
// ============================================================================

pub mod codec;
pub mod container;
pub mod core;
pub mod service;

// Re-export main types for convenience
pub use codec::{ContainerState, StateTransferCodec, load_payload, save_payload};
pub use container::{Container, ContainerStats, RemoveReservation, StoragePolicy};
pub use crate::core::{
    CollectionConfig, CollectionError, Data, Item, ItemId, NO_RESERVATION, PendingTxItem, Result,
    StorageKind, TransactionId,
};
pub use service::{
    BackupDriver, BackupOp, BackupReplicator, CollectionService, InMemoryBackupReplicator,
    ObjectKey, PartitionContainers, ReplicationOperation,
};
