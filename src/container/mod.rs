// ============================================================================
// Container Module
// ============================================================================
//
// The partition-owned storage of a distributed collection:
// - IdAllocator: monotonic item ids with a replayable watermark
// - ItemStore: committed, visible items
// - TransactionLog: reservations of the two-phase protocol
// - Container: composition of the above plus primary/backup/transaction ops
//
// ============================================================================

pub mod collection;
pub mod id;
pub mod policy;
pub mod store;
pub mod txlog;

pub use collection::{Container, ContainerStats, RemoveReservation};
pub use id::IdAllocator;
pub use policy::{ListPolicy, QueuePolicy, SetPolicy, StoragePolicy, policy_for};
pub use store::ItemStore;
pub use txlog::TransactionLog;
