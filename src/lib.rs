//! # Paged Workspace Store
//!
//! A 2D array of spectra (rows of X, Y and E `f64` values) far larger than
//! memory, held in a fixed number of in-memory blocks and paged to flat
//! binary scratch files.
//!
//! ## Core idea
//! Rows are grouped into fixed-size blocks. A most-recently-used cache keeps
//! a bounded number of blocks in memory; on overflow the least recently used
//! block is written back (only if dirty) and dropped. The scratch files grow
//! append-only from row 0, zero-padding any gap, so every block below the
//! high-water mark can always be read back.
//!
//! ```text
//! ManagedWorkspace ──► MruCache ──(miss)──► BackingStore.read_block
//!        │                 └──(evict dirty)──► BackingStore.write_block
//!        └──► DataBlock (row op at row - block_start)
//! ```

pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod types;
pub mod workspace;

// Public re-exports for the top-level API
pub use config::WorkspaceConfig;
pub use error::{Error, Result};
pub use types::{RowLayout, SharedX};
pub use workspace::{ManagedWorkspace, Stats, WorkspaceFactory};
