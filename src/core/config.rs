use super::{CollectionError, Result};
use serde::{Deserialize, Serialize};

/// Highest combined sync + async backup count a collection may request.
pub const MAX_BACKUP_COUNT: u32 = 6;

/// Ordering and uniqueness flavour of the backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    List,
    Set,
    Queue,
}

impl StorageKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            StorageKind::List => 0,
            StorageKind::Set => 1,
            StorageKind::Queue => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StorageKind::List),
            1 => Some(StorageKind::Set),
            2 => Some(StorageKind::Queue),
            _ => None,
        }
    }
}

/// Collection configuration
///
/// Consulted by the container for its capacity guard and by the replication
/// layer to decide which replicas hold a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Collection name
    pub name: String,

    /// Maximum number of visible items per partition
    pub max_size: usize,

    /// Number of synchronous backups
    pub backup_count: u32,

    /// Number of asynchronous backups
    pub async_backup_count: u32,

    /// Storage ordering/uniqueness policy
    pub storage: StorageKind,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_size: usize::MAX,
            backup_count: 1,
            async_backup_count: 0,
            storage: StorageKind::List,
        }
    }
}

impl CollectionConfig {
    /// Create a new configuration with defaults
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the maximum size
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the synchronous backup count
    pub fn with_backup_count(mut self, count: u32) -> Self {
        self.backup_count = count;
        self
    }

    /// Set the asynchronous backup count
    pub fn with_async_backup_count(mut self, count: u32) -> Self {
        self.async_backup_count = count;
        self
    }

    /// Set the storage kind
    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Sync plus async backups, saturating at `u32::MAX`.
    pub fn total_backup_count(&self) -> u32 {
        self.backup_count.saturating_add(self.async_backup_count)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CollectionError::Config(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.total_backup_count() > MAX_BACKUP_COUNT {
            return Err(CollectionError::Config(format!(
                "collection '{}' requests {} backups, maximum is {}",
                self.name,
                self.total_backup_count(),
                MAX_BACKUP_COUNT
            )));
        }
        Ok(())
    }

    /// Parse and validate a configuration from JSON
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CollectionError::Config(format!("invalid collection config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
