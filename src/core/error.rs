use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// A two-phase protocol step referenced a reservation or item that must exist but does not.
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Partition {partition_id} is out of range (partition count: {partition_count})")]
    PartitionOutOfRange {
        partition_id: u32,
        partition_count: u32,
    },

    #[error("Container '{0}' not found")]
    ContainerNotFound(String),

    #[error("Replication error: {0}")]
    Replication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CollectionError {
    pub fn is_transaction(&self) -> bool {
        matches!(self, CollectionError::Transaction(_))
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;

impl From<std::io::Error> for CollectionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
