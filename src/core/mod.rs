pub mod config;
pub mod error;
pub mod types;

pub use config::{CollectionConfig, MAX_BACKUP_COUNT, StorageKind};
pub use error::{CollectionError, Result};
pub use types::{Data, Item, ItemId, NO_RESERVATION, PendingTxItem, TransactionId};
