use std::fmt;
use std::sync::Arc;

/// Identifier of a single item inside one container.
///
/// Ids are issued by the container's [`IdAllocator`](crate::container::IdAllocator)
/// and are never reused for the lifetime of the container.
pub type ItemId = u64;

/// Sentinel passed to `reserve_remove` when the caller holds no prior add-reservation.
pub const NO_RESERVATION: i64 = -1;

/// Opaque, immutable serialized value.
///
/// Cloning is cheap (shared buffer); equality and hashing are by content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Data(Arc<[u8]>);

impl Data {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Data(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::new(value.as_bytes())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data::new(value)
    }
}

impl From<&[u8]> for Data {
    fn from(value: &[u8]) -> Self {
        Data::new(value)
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "Data({:?})", text),
            Err(_) => write!(f, "Data({} bytes)", self.0.len()),
        }
    }
}

/// A committed, visible element of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub value: Data,
}

impl Item {
    pub fn new(id: ItemId, value: Data) -> Self {
        Self { id, value }
    }
}

/// Identifier of the distributed transaction owning a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    /// Generate a fresh random transaction id
    pub fn generate() -> Self {
        TransactionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        TransactionId::new(value)
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        TransactionId(value)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reservation held in the transaction log.
///
/// Add-reservations carry no value until commit; remove-reservations keep the
/// removed value so a rollback can restore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTxItem {
    pub id: ItemId,
    pub value: Option<Data>,
    pub transaction_id: TransactionId,
    pub is_remove: bool,
}

impl PendingTxItem {
    pub fn add(id: ItemId, transaction_id: TransactionId) -> Self {
        Self {
            id,
            value: None,
            transaction_id,
            is_remove: false,
        }
    }

    pub fn remove(item: Item, transaction_id: TransactionId) -> Self {
        Self {
            id: item.id,
            value: Some(item.value),
            transaction_id,
            is_remove: true,
        }
    }

    /// The item to restore on rollback, if this reservation holds a value.
    pub fn to_item(&self) -> Option<Item> {
        self.value.clone().map(|value| Item::new(self.id, value))
    }
}
