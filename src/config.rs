use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::RowLayout;

/// Default target footprint of one in-memory block (1 MiB).
pub const DEFAULT_BLOCK_SIZE_BYTES: usize = 1024 * 1024;

/// Default number of blocks kept warm.
pub const DEFAULT_MRU_CAPACITY: usize = 100;

/// Largest file a single legacy handle could address with a signed 32-bit
/// position. Files are split once this would be exceeded.
pub const DEFAULT_MAX_FILE_BYTES: u64 = i32::MAX as u64;

/// Construction-time settings for a managed workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Target in-memory size of a block (default: 1MiB).
    pub block_size_bytes: usize,

    /// Number of blocks held in memory (default: 100).
    pub mru_capacity: usize,

    /// Preferred directory for scratch files (default: none).
    pub scratch_dir: Option<PathBuf>,

    /// Used when `scratch_dir` is unset or not writable (default: OS temp dir).
    pub fallback_dir: PathBuf,

    /// Upper bound on a single scratch file (default: `i32::MAX` bytes).
    /// Must hold at least one block.
    pub max_file_bytes: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
            mru_capacity: DEFAULT_MRU_CAPACITY,
            scratch_dir: None,
            fallback_dir: std::env::temp_dir(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl WorkspaceConfig {
    /// Create a config that prefers the given scratch directory.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(scratch_dir.into()),
            ..Default::default()
        }
    }

    /// Set the target block size in bytes
    pub fn with_block_size_bytes(mut self, bytes: usize) -> Self {
        self.block_size_bytes = bytes;
        self
    }

    /// Set the number of cached blocks
    pub fn with_mru_capacity(mut self, capacity: usize) -> Self {
        self.mru_capacity = capacity;
        self
    }

    /// Set the fallback scratch directory
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = dir.into();
        self
    }

    /// Set the maximum size of a single scratch file
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Reject settings the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size_bytes == 0 {
            return Err(Error::Init("block_size_bytes must be positive".into()));
        }
        if self.mru_capacity == 0 {
            return Err(Error::Init("mru_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Rows held by one block: `max(1, block_size_bytes / record_size)`.
    pub fn rows_per_block(&self, layout: &RowLayout) -> usize {
        (self.block_size_bytes / layout.record_size()).max(1)
    }

    /// Bytes of one encoded block for `layout`.
    pub fn block_bytes(&self, layout: &RowLayout) -> u64 {
        (self.rows_per_block(layout) * layout.record_size()) as u64
    }

    /// Reject a layout whose single block would not fit in one scratch file.
    pub fn validate_layout(&self, layout: &RowLayout) -> Result<()> {
        let block_bytes = self.block_bytes(layout);
        if block_bytes > self.max_file_bytes {
            return Err(Error::Init(format!(
                "block of {block_bytes} bytes exceeds max_file_bytes ({})",
                self.max_file_bytes
            )));
        }
        Ok(())
    }

    /// Whole blocks that fit under `max_file_bytes`. Zero if one block is
    /// already too large; [`validate_layout`](Self::validate_layout) rejects that.
    pub fn blocks_per_file(&self, layout: &RowLayout) -> usize {
        let blocks = self.max_file_bytes / self.block_bytes(layout);
        usize::try_from(blocks).unwrap_or(usize::MAX)
    }
}
