// ============================================================================
// Partition Replication Operation
// ============================================================================
//
// Carries the full state of every collection in one partition that has a
// copy at the target replica index. Applying it replaces the destination
// partition's collections.
//
// Frame layout (little-endian):
//   magic "PSR1" | version u16 | partition u32 | replica index u32
//   count u32 | (container payload bytes)*
//
// ============================================================================

use crate::codec::wire::{Reader, Writer};
use crate::core::{CollectionError, Result};

pub const REPLICATION_MAGIC: [u8; 4] = *b"PSR1";
pub const REPLICATION_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationOperation {
    pub partition_id: u32,
    /// 0 is the primary (migration), 1.. are backups.
    pub replica_index: u32,
    /// One state transfer payload per container.
    pub payloads: Vec<Vec<u8>>,
}

impl ReplicationOperation {
    pub fn new(partition_id: u32, replica_index: u32) -> Self {
        Self {
            partition_id,
            replica_index,
            payloads: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.put_raw(&REPLICATION_MAGIC);
        w.put_u16(REPLICATION_FORMAT_VERSION);
        w.put_u32(self.partition_id);
        w.put_u32(self.replica_index);
        w.put_len(self.payloads.len())?;
        for payload in &self.payloads {
            w.put_bytes(payload)?;
        }
        Ok(w.finish())
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut r = Reader::new(frame);
        let magic = r.raw(REPLICATION_MAGIC.len())?;
        if magic != REPLICATION_MAGIC {
            return Err(CollectionError::Codec(
                "not a partition replication frame".to_string(),
            ));
        }
        let version = r.u16()?;
        if version != REPLICATION_FORMAT_VERSION {
            return Err(CollectionError::Codec(format!(
                "unsupported replication format version {}",
                version
            )));
        }
        let partition_id = r.u32()?;
        let replica_index = r.u32()?;
        let count = r.u32()? as usize;
        let mut payloads = Vec::with_capacity(count.min(frame.len()));
        for _ in 0..count {
            payloads.push(r.bytes()?.to_vec());
        }
        r.finish()?;
        Ok(Self {
            partition_id,
            replica_index,
            payloads,
        })
    }
}
