use std::collections::{HashMap, VecDeque};

use crate::block::DataBlock;
use crate::error::Result;

/// Where evicted dirty blocks go. The backing store is the real sink; tests
/// plug in recorders.
pub trait WriteBack {
    /// Persist the whole block. On success the block is clean.
    fn write_back(&mut self, block: &mut DataBlock) -> Result<()>;
}

/// Stable reference to a cached block.
///
/// A handle is only meaningful until the next `insert` or `clear`: once its
/// block is evicted the slot may be reused, and the generation check makes
/// the stale handle resolve to `None` instead of to someone else's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    slot: usize,
    generation: u64,
}

struct Slot {
    generation: u64,
    block: Option<DataBlock>,
}

/// Fixed-capacity cache of blocks with least-recently-used eviction.
///
/// Blocks live in an arena of slots; `order` holds slot numbers with the most
/// recently used at the front. Recency is pure access order, not row order.
///
/// ```text
/// order:  [ MRU ] ─ ... ─ [ LRU ]      insert on full → write back LRU if dirty, drop it
/// ```
pub struct MruCache {
    capacity: usize,
    slots: Vec<Slot>,
    free: Vec<usize>,
    order: VecDeque<usize>,
    index: HashMap<usize, usize>,
    evictions: u64,
}

impl MruCache {
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        MruCache {
            capacity,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            order: VecDeque::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            evictions: 0,
        }
    }

    /// Look up a block by start row. Does not change recency.
    pub fn find(&self, start_row: usize) -> Option<BlockHandle> {
        let slot = *self.index.get(&start_row)?;
        Some(self.handle(slot))
    }

    /// Move a block to the most-recently-used position.
    pub fn promote(&mut self, handle: BlockHandle) {
        if self.is_live(handle) {
            self.move_to_front(handle.slot);
        }
    }

    /// Add a block at the most-recently-used position.
    ///
    /// If a block with the same start row is already cached, that entry is
    /// moved to the front and `block` is dropped. Otherwise, when full, the
    /// least-recently-used block is handed to `sink` if dirty and then
    /// discarded. A failed write-back leaves the cache untouched.
    pub fn insert<S: WriteBack + ?Sized>(
        &mut self,
        block: DataBlock,
        sink: &mut S,
    ) -> Result<BlockHandle> {
        if let Some(&slot) = self.index.get(&block.min_index()) {
            self.move_to_front(slot);
            return Ok(self.handle(slot));
        }

        if self.order.len() >= self.capacity {
            self.evict_lru(sink)?;
        }

        let start_row = block.min_index();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].block = Some(block);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    block: Some(block),
                });
                self.slots.len() - 1
            }
        };
        self.index.insert(start_row, slot);
        self.order.push_front(slot);
        Ok(self.handle(slot))
    }

    pub fn block(&self, handle: BlockHandle) -> Option<&DataBlock> {
        let slot = self.slots.get(handle.slot)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.block.as_ref()
    }

    pub fn block_mut(&mut self, handle: BlockHandle) -> Option<&mut DataBlock> {
        let slot = self.slots.get_mut(handle.slot)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.block.as_mut()
    }

    /// Write back every dirty block, most recent first. Nothing is evicted.
    pub fn flush_all<S: WriteBack + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        for &slot in &self.order {
            if let Some(block) = self.slots[slot].block.as_mut() {
                if block.has_changes() {
                    sink.write_back(block)?;
                }
            }
        }
        Ok(())
    }

    /// Drop every block without writing anything back.
    pub fn clear(&mut self) {
        for slot in self.order.drain(..) {
            let entry = &mut self.slots[slot];
            entry.block = None;
            entry.generation += 1;
            self.free.push(slot);
        }
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Start rows from most to least recently used.
    pub fn keys_mru(&self) -> Vec<usize> {
        self.order
            .iter()
            .filter_map(|&slot| self.slots[slot].block.as_ref())
            .map(DataBlock::min_index)
            .collect()
    }

    fn evict_lru<S: WriteBack + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let Some(&slot) = self.order.back() else {
            return Ok(());
        };

        if let Some(block) = self.slots[slot].block.as_mut() {
            if block.has_changes() {
                tracing::debug!(start_row = block.min_index(), "Flushing evicted block");
                sink.write_back(block)?;
            }
        }

        self.order.pop_back();
        let entry = &mut self.slots[slot];
        if let Some(block) = entry.block.take() {
            self.index.remove(&block.min_index());
        }
        entry.generation += 1;
        self.free.push(slot);
        self.evictions += 1;
        Ok(())
    }

    fn move_to_front(&mut self, slot: usize) {
        if let Some(pos) = self.order.iter().position(|&s| s == slot) {
            self.order.remove(pos);
            self.order.push_front(slot);
        }
    }

    fn handle(&self, slot: usize) -> BlockHandle {
        BlockHandle {
            slot,
            generation: self.slots[slot].generation,
        }
    }

    fn is_live(&self, handle: BlockHandle) -> bool {
        self.block(handle).is_some()
    }
}
