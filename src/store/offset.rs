/// Where a block lives: which scratch file, and at what byte offset in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePosition {
    pub file_index: usize,
    pub offset: u64,
}

/// Maps block indices onto the split scratch files.
///
/// The logical byte space is one flat run of records. Each file holds
/// `blocks_per_file` whole blocks, so a block never straddles two files and
/// every file boundary is a multiple of `block_bytes`.
///
/// ```text
/// logical:  | blk 0 | blk 1 | blk 2 | blk 3 | blk 4 | ...
/// files:    |    file 0     |    file 1     |  file 2 ...   (blocks_per_file = 2)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLayout {
    block_bytes: u64,
    blocks_per_file: u64,
}

impl FileLayout {
    pub fn new(block_bytes: u64, blocks_per_file: u64) -> Self {
        assert!(block_bytes > 0, "block_bytes must be > 0");
        assert!(blocks_per_file > 0, "blocks_per_file must be > 0");
        FileLayout {
            block_bytes,
            blocks_per_file,
        }
    }

    pub fn block_bytes(&self) -> u64 {
        self.block_bytes
    }

    /// Bytes one file holds when full.
    pub fn file_capacity_bytes(&self) -> u64 {
        self.block_bytes * self.blocks_per_file
    }

    /// Files needed for `block_count` blocks.
    pub fn files_for(&self, block_count: u64) -> u64 {
        block_count.div_ceil(self.blocks_per_file)
    }

    /// Resolve a logical byte offset into (file, in-file offset).
    pub fn locate_offset(&self, logical: u64) -> FilePosition {
        let capacity = self.file_capacity_bytes();
        FilePosition {
            file_index: (logical / capacity) as usize,
            offset: logical % capacity,
        }
    }

    /// Resolve the start of block `block_index`.
    pub fn locate_block(&self, block_index: u64) -> FilePosition {
        self.locate_offset(block_index * self.block_bytes)
    }
}
