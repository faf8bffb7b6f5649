use std::path::PathBuf;

use crate::block::DataBlock;
use crate::cache::{BlockHandle, MruCache};
use crate::config::WorkspaceConfig;
use crate::error::{Error, Result};
use crate::store::BackingStore;
use crate::types::{RowLayout, SharedX};

/// Counters describing how the cache and the scratch files were used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Row accesses served by a cached block.
    pub hits: u64,
    /// Row accesses that had to create a block.
    pub misses: u64,
    /// Blocks dropped from the cache to make room.
    pub evictions: u64,
    /// Blocks loaded from the scratch files.
    pub blocks_read: u64,
    /// Blocks written to the scratch files (excluding padding).
    pub blocks_written: u64,
    /// Zero blocks written to fill gaps.
    pub blocks_padded: u64,
}

/// A large 2D array of spectra paged through a fixed set of in-memory blocks.
///
/// Row accessors translate a row into its block, pull that block into the
/// MRU cache (loading it from the scratch files if it was ever written,
/// evicting the least recently used block if the cache is full) and then act
/// on the row inside the block.
///
/// Slices handed out borrow the workspace, so they cannot be held across a
/// second accessor call that might evict their block.
///
/// After any IO failure the workspace is poisoned: every later call returns
/// [`Error::Poisoned`]. Dropping it discards cached blocks without writing
/// them and removes the scratch files.
pub struct ManagedWorkspace {
    id: u64,
    total_rows: usize,
    layout: RowLayout,
    rows_per_block: usize,
    cache: MruCache,
    store: BackingStore,
    hits: u64,
    misses: u64,
    poisoned: bool,
}

impl ManagedWorkspace {
    /// Set up a workspace of `total_rows` rows, each with `x_len` X values
    /// and `y_len` Y and E values. The row count is fixed from here on.
    ///
    /// `id` keeps scratch file names apart when several workspaces share a
    /// directory; [`WorkspaceFactory`] hands out unique ones.
    pub fn initialize(
        config: &WorkspaceConfig,
        id: u64,
        total_rows: usize,
        x_len: usize,
        y_len: usize,
    ) -> Result<Self> {
        let layout = RowLayout::new(x_len, y_len)?;
        config.validate()?;

        let store = BackingStore::open(config, id, layout, total_rows)?;
        let rows_per_block = store.rows_per_block();

        tracing::debug!(
            id,
            total_rows,
            x_len,
            y_len,
            rows_per_block,
            mru_capacity = config.mru_capacity,
            "Initialized managed workspace"
        );

        Ok(ManagedWorkspace {
            id,
            total_rows,
            layout,
            rows_per_block,
            cache: MruCache::new(config.mru_capacity),
            store,
            hits: 0,
            misses: 0,
            poisoned: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn rows_per_block(&self) -> usize {
        self.rows_per_block
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn scratch_paths(&self) -> &[PathBuf] {
        self.store.paths()
    }

    /// Start row of the last block present in the scratch files.
    pub fn high_water_row(&self) -> Option<usize> {
        self.store.high_water_row()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.cache.evictions(),
            blocks_read: self.store.blocks_read(),
            blocks_written: self.store.blocks_written(),
            blocks_padded: self.store.blocks_padded(),
        }
    }

    pub fn data_x(&mut self, row: usize) -> Result<&[f64]> {
        let (block, index) = self.block_for(row)?;
        block.x(index)
    }

    pub fn data_y(&mut self, row: usize) -> Result<&[f64]> {
        let (block, index) = self.block_for(row)?;
        block.y(index)
    }

    pub fn data_e(&mut self, row: usize) -> Result<&[f64]> {
        let (block, index) = self.block_for(row)?;
        block.e(index)
    }

    /// The row's X allocation, to check or reuse sharing.
    pub fn shared_x(&mut self, row: usize) -> Result<SharedX> {
        let (block, index) = self.block_for(row)?;
        block.shared_x(index).cloned()
    }

    /// Writable X. Marks the block dirty and un-shares the row's X.
    pub fn data_x_mut(&mut self, row: usize) -> Result<&mut [f64]> {
        let (block, index) = self.block_for_mut(row)?;
        block.x_mut(index)
    }

    /// Writable Y. Marks the block dirty.
    pub fn data_y_mut(&mut self, row: usize) -> Result<&mut [f64]> {
        let (block, index) = self.block_for_mut(row)?;
        block.y_mut(index)
    }

    /// Writable E. Marks the block dirty.
    pub fn data_e_mut(&mut self, row: usize) -> Result<&mut [f64]> {
        let (block, index) = self.block_for_mut(row)?;
        block.e_mut(index)
    }

    /// Replace a row's X. Passing the same `SharedX` to several rows shares it.
    pub fn set_x(&mut self, row: usize, x: impl Into<SharedX>) -> Result<()> {
        let (block, index) = self.block_for_mut(row)?;
        block.set_x(index, x.into())
    }

    pub fn set_data(&mut self, row: usize, y: Vec<f64>, e: Vec<f64>) -> Result<()> {
        let (block, index) = self.block_for_mut(row)?;
        block.set_data(index, y, e)
    }

    /// Replace a row's Y and keep its E.
    pub fn set_data_y(&mut self, row: usize, y: Vec<f64>) -> Result<()> {
        let (block, index) = self.block_for_mut(row)?;
        block.set_y(index, y)
    }

    /// Write every dirty cached block to the scratch files. Blocks stay cached.
    pub fn flush(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let flushed = self.cache.flush_all(&mut self.store);
        self.check_io(flushed)
    }

    fn block_for(&mut self, row: usize) -> Result<(&DataBlock, usize)> {
        let (handle, index) = self.resolve(row)?;
        Ok((self.cached(handle)?, index))
    }

    fn block_for_mut(&mut self, row: usize) -> Result<(&mut DataBlock, usize)> {
        let (handle, index) = self.resolve(row)?;
        Ok((self.cached_mut(handle)?, index))
    }

    fn cached(&self, handle: BlockHandle) -> Result<&DataBlock> {
        self.cache.block(handle).ok_or_else(|| stale(handle))
    }

    fn cached_mut(&mut self, handle: BlockHandle) -> Result<&mut DataBlock> {
        self.cache.block_mut(handle).ok_or_else(|| stale(handle))
    }

    /// Bring the block holding `row` into the cache; return it and the
    /// row's index inside it.
    fn resolve(&mut self, row: usize) -> Result<(BlockHandle, usize)> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        if row >= self.total_rows {
            return Err(Error::RowOutOfRange {
                row,
                total_rows: self.total_rows,
            });
        }

        let start_row = row - row % self.rows_per_block;
        let index = row - start_row;

        if let Some(handle) = self.cache.find(start_row) {
            self.hits += 1;
            self.cache.promote(handle);
            return Ok((handle, index));
        }

        self.misses += 1;
        let loaded = self.load(start_row);
        let handle = self.check_io(loaded)?;
        Ok((handle, index))
    }

    /// Poison the workspace if `result` carries an IO failure.
    fn check_io<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e @ Error::Io(_)) = &result {
            self.poisoned = true;
            tracing::error!(id = self.id, error = %e, "Workspace poisoned");
        }
        result
    }

    fn load(&mut self, start_row: usize) -> Result<BlockHandle> {
        let row_count = self.rows_per_block.min(self.total_rows - start_row);
        let mut block = DataBlock::new(start_row, row_count, self.layout);
        self.store.read_block(&mut block)?;
        self.cache.insert(block, &mut self.store)
    }
}

fn stale(handle: BlockHandle) -> Error {
    Error::InvalidState(format!("block handle {handle:?} is no longer cached"))
}

impl Drop for ManagedWorkspace {
    fn drop(&mut self) {
        // Scratch data: nothing needs to survive, so skip the write-back.
        self.cache.clear();
    }
}

/// Hands out workspaces with unique ids so their scratch files never collide.
#[derive(Debug, Clone)]
pub struct WorkspaceFactory {
    config: WorkspaceConfig,
    next_id: u64,
}

impl WorkspaceFactory {
    pub fn new(config: WorkspaceConfig) -> Self {
        WorkspaceFactory { config, next_id: 0 }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn create(&mut self, total_rows: usize, x_len: usize, y_len: usize) -> Result<ManagedWorkspace> {
        let id = self.next_id;
        self.next_id += 1;
        ManagedWorkspace::initialize(&self.config, id, total_rows, x_len, y_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_is_not_reported_as_poisoned() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::new(dir.path()).with_mru_capacity(2);
        let mut ws = ManagedWorkspace::initialize(&config, 0, 10, 2, 2).unwrap();

        let (handle, _) = ws.resolve(3).unwrap();
        assert!(ws.cached(handle).is_ok());

        ws.cache.clear();
        assert!(matches!(ws.cached(handle), Err(Error::InvalidState(_))));
        assert!(matches!(ws.cached_mut(handle), Err(Error::InvalidState(_))));
        assert!(!ws.is_poisoned());

        // The row resolves again through a fresh load.
        assert_eq!(ws.data_y(3).unwrap(), &[0.0, 0.0]);
    }
}
