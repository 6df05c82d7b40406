// ============================================================================
// Container State Transfer
// ============================================================================
//
// Full-state capture/apply used for backup bring-up and partition migration.
//
// Layout (little-endian):
//   magic "PSC1" | version u16 | storage u8 | name str
//   item count u32 | (id u64, value bytes)*
//   tx count u32   | (id u64, has value u8, [value bytes], tx id str, is remove u8)*
//
// Records are written in ascending id order. An id appears at most once
// across both sections.
//
// ============================================================================

use super::wire::{Reader, Writer};
use crate::container::Container;
use crate::core::{
    CollectionConfig, CollectionError, Data, Item, PendingTxItem, Result, StorageKind,
    TransactionId,
};
use std::collections::HashSet;
use std::sync::Arc;

pub const STATE_MAGIC: [u8; 4] = *b"PSC1";
pub const STATE_FORMAT_VERSION: u16 = 1;

/// Decoded container state, detached from any live container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub name: String,
    pub storage: StorageKind,
    pub items: Vec<Item>,
    pub pending: Vec<PendingTxItem>,
}

impl ContainerState {
    /// Highest id in either map.
    pub fn max_id(&self) -> u64 {
        let items = self.items.iter().map(|item| item.id);
        let pending = self.pending.iter().map(|entry| entry.id);
        items.chain(pending).max().unwrap_or(0)
    }
}

pub struct StateTransferCodec;

impl StateTransferCodec {
    pub fn capture(container: &Container) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.put_raw(&STATE_MAGIC);
        w.put_u16(STATE_FORMAT_VERSION);
        w.put_u8(container.policy().kind().tag());
        w.put_str(container.name())?;

        w.put_len(container.size())?;
        for (id, value) in container.items() {
            w.put_u64(id);
            w.put_bytes(value.as_bytes())?;
        }

        w.put_len(container.pending_count())?;
        for entry in container.pending_items() {
            w.put_u64(entry.id);
            match &entry.value {
                Some(value) => {
                    w.put_bool(true);
                    w.put_bytes(value.as_bytes())?;
                }
                None => w.put_bool(false),
            }
            w.put_str(entry.transaction_id.as_str())?;
            w.put_bool(entry.is_remove);
        }

        Ok(w.finish())
    }

    pub fn decode(payload: &[u8]) -> Result<ContainerState> {
        let mut r = Reader::new(payload);
        Self::read_header(&mut r)?;

        let storage_tag = r.u8()?;
        let storage = StorageKind::from_tag(storage_tag).ok_or_else(|| {
            CollectionError::Codec(format!("unknown storage kind tag {}", storage_tag))
        })?;
        let name = r.string()?;

        let mut seen = HashSet::new();
        let item_count = r.u32()? as usize;
        let mut items = Vec::with_capacity(item_count.min(payload.len()));
        for _ in 0..item_count {
            let id = r.u64()?;
            claim_id(&mut seen, id)?;
            let value = Data::from(r.bytes()?);
            items.push(Item::new(id, value));
        }

        let tx_count = r.u32()? as usize;
        let mut pending = Vec::with_capacity(tx_count.min(payload.len()));
        for _ in 0..tx_count {
            let id = r.u64()?;
            claim_id(&mut seen, id)?;
            let value = if r.bool()? {
                Some(Data::from(r.bytes()?))
            } else {
                None
            };
            let transaction_id = TransactionId::new(r.string()?);
            let is_remove = r.bool()?;
            pending.push(PendingTxItem {
                id,
                value,
                transaction_id,
                is_remove,
            });
        }

        r.finish()?;
        Ok(ContainerState {
            name,
            storage,
            items,
            pending,
        })
    }

    /// Replace `container`'s state with the payload's.
    ///
    /// The payload is fully decoded before anything is touched, so a malformed
    /// payload leaves the container unchanged.
    pub fn apply(container: &mut Container, payload: &[u8]) -> Result<()> {
        let state = Self::decode(payload)?;
        Self::apply_state(container, state)
    }

    /// Replace `container`'s state with an already decoded state.
    pub fn apply_state(container: &mut Container, state: ContainerState) -> Result<()> {
        if state.name != container.name() {
            return Err(CollectionError::Codec(format!(
                "payload for collection '{}' cannot be applied to '{}'",
                state.name,
                container.name()
            )));
        }
        if state.storage != container.policy().kind() {
            return Err(CollectionError::Codec(format!(
                "payload storage {:?} does not match container storage {:?}",
                state.storage,
                container.policy().kind()
            )));
        }
        container.replace_state(state.items, state.pending);
        Ok(())
    }

    /// Build a fresh container from a payload.
    pub fn restore(
        partition_id: u32,
        config: Arc<CollectionConfig>,
        payload: &[u8],
    ) -> Result<Container> {
        let mut container = Container::new(partition_id, config);
        Self::apply(&mut container, payload)?;
        Ok(container)
    }

    fn read_header(r: &mut Reader<'_>) -> Result<()> {
        let magic = r.raw(STATE_MAGIC.len())?;
        if magic != STATE_MAGIC {
            return Err(CollectionError::Codec(format!(
                "bad magic {:02x?}, expected {:02x?}",
                magic, STATE_MAGIC
            )));
        }
        let version = r.u16()?;
        if version != STATE_FORMAT_VERSION {
            return Err(CollectionError::Codec(format!(
                "unsupported state format version {} (supported: {})",
                version, STATE_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

fn claim_id(seen: &mut HashSet<u64>, id: u64) -> Result<()> {
    if seen.insert(id) {
        Ok(())
    } else {
        Err(CollectionError::Codec(format!("duplicate item id {} in payload", id)))
    }
}
