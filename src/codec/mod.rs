//! Binary state transfer for containers and whole partitions.

pub mod file;
pub mod state;
pub mod wire;

pub use file::{load_payload, save_payload};
pub use state::{ContainerState, STATE_FORMAT_VERSION, STATE_MAGIC, StateTransferCodec};
