pub mod offset;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::block::DataBlock;
use crate::block::record::write_zero_records;
use crate::cache::WriteBack;
use crate::config::WorkspaceConfig;
use crate::error::{Error, Result};
use crate::types::RowLayout;
use offset::{FileLayout, FilePosition};

/// Flat binary scratch files holding every row that is not in memory.
///
/// Blocks are laid out in ascending row order across one or more files (see
/// [`FileLayout`]). The files grow append-only from block 0: before a block
/// is written past the end, every missing block in between is filled with
/// zero records. So the written region is always a dense prefix and
///
/// ```text
/// block start_row <= high_water_row  ⇔  block is fully present on disk
/// ```
///
/// Blocks above the high-water row are never read.
///
/// The files are scratch data: they are removed on `close` or drop.
pub struct BackingStore {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    files: Vec<File>,
    layout: RowLayout,
    rows_per_block: usize,
    blocks_per_file: usize,
    file_layout: FileLayout,
    /// Blocks `[0, written_blocks)` are present in the files.
    written_blocks: usize,
    blocks_read: u64,
    blocks_written: u64,
    blocks_padded: u64,
}

impl BackingStore {
    /// Create the scratch files for `total_rows` rows.
    ///
    /// Files are named `workspace_{id}_{n}.scratch` and truncated if they
    /// already exist. The preferred directory is tried first; if it is unset,
    /// missing or any file cannot be created there, the fallback directory is
    /// used instead.
    pub fn open(
        config: &WorkspaceConfig,
        id: u64,
        layout: RowLayout,
        total_rows: usize,
    ) -> Result<Self> {
        config.validate()?;
        config.validate_layout(&layout)?;

        let rows_per_block = config.rows_per_block(&layout);
        let blocks_per_file = config.blocks_per_file(&layout);
        let file_layout = FileLayout::new(config.block_bytes(&layout), blocks_per_file as u64);
        let total_blocks = total_rows.div_ceil(rows_per_block) as u64;
        let file_count = file_layout.files_for(total_blocks) as usize;

        let (dir, paths, files) = match config.scratch_dir.as_deref() {
            Some(preferred) if preferred.is_dir() => {
                match create_files(preferred, id, file_count) {
                    Ok((paths, files)) => (preferred.to_path_buf(), paths, files),
                    Err(e) => {
                        tracing::warn!(
                            dir = %preferred.display(),
                            error = %e,
                            "Scratch directory not writable, using fallback"
                        );
                        open_fallback(config, id, file_count)?
                    }
                }
            }
            Some(preferred) => {
                tracing::warn!(
                    dir = %preferred.display(),
                    "Scratch directory does not exist, using fallback"
                );
                open_fallback(config, id, file_count)?
            }
            None => open_fallback(config, id, file_count)?,
        };

        tracing::info!(
            dir = %dir.display(),
            files = file_count,
            rows_per_block,
            blocks_per_file,
            "Created scratch files"
        );

        Ok(BackingStore {
            dir,
            paths,
            files,
            layout,
            rows_per_block,
            blocks_per_file,
            file_layout,
            written_blocks: 0,
            blocks_read: 0,
            blocks_written: 0,
            blocks_padded: 0,
        })
    }

    /// Populate `block` from disk if its range was ever written.
    /// Returns whether a read happened; unwritten blocks are left as they are.
    pub fn read_block(&mut self, block: &mut DataBlock) -> Result<bool> {
        let index = self.block_index(block.min_index());
        if index >= self.written_blocks {
            return Ok(false);
        }

        let FilePosition { file_index, offset } = self.file_layout.locate_block(index as u64);
        let file = file_at(&mut self.files, file_index)?;
        file.seek(SeekFrom::Start(offset))?;
        block.deserialize(&mut BufReader::new(file))?;
        self.blocks_read += 1;

        tracing::debug!(start_row = block.min_index(), file_index, offset, "Loaded block");
        Ok(true)
    }

    /// Write `block` to its position, zero-padding any gap before it first.
    ///
    /// The high-water row only moves past blocks that were written in full,
    /// so a failure part way through never leaves an unreadable hole below it.
    pub fn write_block(&mut self, block: &mut DataBlock) -> Result<()> {
        let index = self.block_index(block.min_index());

        while self.written_blocks < index {
            let gap = self.written_blocks;
            self.write_at(gap, |w, layout, rows| write_zero_records(w, layout, rows))?;
            self.written_blocks += 1;
            self.blocks_padded += 1;
            tracing::debug!(start_row = gap * self.rows_per_block, "Padded missing block");
        }

        self.write_at(index, |w, _, _| block.serialize(w))?;
        block.mark_clean();
        self.written_blocks = self.written_blocks.max(index + 1);
        self.blocks_written += 1;
        Ok(())
    }

    /// Start row of the last block present on disk, `None` if nothing was written.
    pub fn high_water_row(&self) -> Option<usize> {
        self.written_blocks
            .checked_sub(1)
            .map(|last| last * self.rows_per_block)
    }

    pub fn rows_per_block(&self) -> usize {
        self.rows_per_block
    }

    pub fn blocks_per_file(&self) -> usize {
        self.blocks_per_file
    }

    pub fn file_count(&self) -> usize {
        self.paths.len()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn blocks_padded(&self) -> u64 {
        self.blocks_padded
    }

    /// Close and delete every scratch file. Reports the first removal error.
    pub fn close(mut self) -> Result<()> {
        self.remove_files()
    }

    fn block_index(&self, start_row: usize) -> usize {
        start_row / self.rows_per_block
    }

    /// Seek to block `index` and stream `rows_per_block` records through `fill`.
    fn write_at<F>(&mut self, index: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut File>, &RowLayout, usize) -> Result<()>,
    {
        let FilePosition { file_index, offset } = self.file_layout.locate_block(index as u64);
        let file = file_at(&mut self.files, file_index)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut writer = BufWriter::new(file);
        fill(&mut writer, &self.layout, self.rows_per_block)?;
        writer.flush()?;
        Ok(())
    }

    fn remove_files(&mut self) -> Result<()> {
        // Handles must be closed before the files can go on every platform.
        self.files.clear();

        let mut first_err = None;
        for path in std::mem::take(&mut self.paths) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e.into()),
            None => {
                tracing::info!(dir = %self.dir.display(), "Removed scratch files");
                Ok(())
            }
        }
    }
}

impl WriteBack for BackingStore {
    fn write_back(&mut self, block: &mut DataBlock) -> Result<()> {
        self.write_block(block)
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            let _ = self.remove_files();
        }
    }
}

fn file_at(files: &mut [File], file_index: usize) -> Result<&mut File> {
    let count = files.len();
    files.get_mut(file_index).ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("scratch file {file_index} does not exist ({count} files)"),
        ))
    })
}

fn open_fallback(
    config: &WorkspaceConfig,
    id: u64,
    file_count: usize,
) -> Result<(PathBuf, Vec<PathBuf>, Vec<File>)> {
    let dir = &config.fallback_dir;
    let (paths, files) = create_files(dir, id, file_count).map_err(|e| {
        Error::Init(format!(
            "cannot create scratch files in {}: {e}",
            dir.display()
        ))
    })?;
    Ok((dir.clone(), paths, files))
}

/// Create `count` fresh read/write files, removing any already created if
/// one of them fails.
fn create_files(dir: &Path, id: u64, count: usize) -> io::Result<(Vec<PathBuf>, Vec<File>)> {
    let mut paths = Vec::with_capacity(count);
    let mut files = Vec::with_capacity(count);

    for n in 0..count {
        let path = dir.join(format!("workspace_{id}_{n}.scratch"));
        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path);

        match opened {
            Ok(file) => {
                paths.push(path);
                files.push(file);
            }
            Err(e) => {
                drop(files);
                for p in &paths {
                    let _ = fs::remove_file(p);
                }
                return Err(e);
            }
        }
    }

    Ok((paths, files))
}
