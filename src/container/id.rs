use crate::core::ItemId;

/// Monotonic item id source for a single container.
///
/// The watermark is the last id issued or observed; `next_id` always returns
/// a value strictly above it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAllocator {
    watermark: ItemId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id. Only the primary calls this.
    pub fn next_id(&mut self) -> ItemId {
        self.watermark += 1;
        self.watermark
    }

    /// Record an id that was decided elsewhere (backup apply, state transfer).
    pub fn advance_watermark(&mut self, id: ItemId) {
        self.watermark = self.watermark.max(id);
    }

    pub fn watermark(&self) -> ItemId {
        self.watermark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = IdAllocator::new();
        let issued: Vec<_> = (0..5).map(|_| ids.next_id()).collect();
        assert_eq!(issued, vec![1, 2, 3, 4, 5]);
        assert_eq!(ids.watermark(), 5);
    }

    #[test]
    fn test_advance_never_lowers() {
        let mut ids = IdAllocator::new();
        ids.advance_watermark(10);
        ids.advance_watermark(3);
        assert_eq!(ids.watermark(), 10);
        assert_eq!(ids.next_id(), 11);
    }
}
