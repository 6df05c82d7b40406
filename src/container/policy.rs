// ============================================================================
// Storage Policies
// ============================================================================
//
// A collection variant decides two things about its backing store: whether
// two items with equal values may coexist, and in which order items are
// handed out. Everything else (ids, reservations, replication) is shared.
//
// ============================================================================

use crate::core::StorageKind;
use std::fmt;

pub trait StoragePolicy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StorageKind;

    /// Whether an item may be inserted when an equal value is already visible.
    fn allows_duplicates(&self) -> bool;

    /// Whether `poll`/`peek` take items from the head of the collection.
    fn is_fifo(&self) -> bool {
        false
    }
}

/// Insertion-ordered list, duplicates allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPolicy;

impl StoragePolicy for ListPolicy {
    fn kind(&self) -> StorageKind {
        StorageKind::List
    }

    fn allows_duplicates(&self) -> bool {
        true
    }
}

/// Unique values; a second equal value is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetPolicy;

impl StoragePolicy for SetPolicy {
    fn kind(&self) -> StorageKind {
        StorageKind::Set
    }

    fn allows_duplicates(&self) -> bool {
        false
    }
}

/// First-in first-out queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueuePolicy;

impl StoragePolicy for QueuePolicy {
    fn kind(&self) -> StorageKind {
        StorageKind::Queue
    }

    fn allows_duplicates(&self) -> bool {
        true
    }

    fn is_fifo(&self) -> bool {
        true
    }
}

pub fn policy_for(kind: StorageKind) -> Box<dyn StoragePolicy> {
    match kind {
        StorageKind::List => Box::new(ListPolicy),
        StorageKind::Set => Box::new(SetPolicy),
        StorageKind::Queue => Box::new(QueuePolicy),
    }
}
