pub mod record;

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{RowLayout, SharedX, Spectrum};
use record::check_len;

/// A contiguous run of rows held in memory.
///
/// Blocks are created on a cache miss, populated from the backing store if
/// that range was ever written, and flushed on eviction when dirty.
///
/// Dirtiness is conservative: every `*_mut` accessor marks the block dirty,
/// even if the caller only reads through the returned slice.
///
/// X sharing is copy-on-write. Rows given the same `SharedX` keep pointing
/// at one allocation; `x_mut` detaches the row it is called on, so a write
/// through one row never shows up in another.
#[derive(Debug)]
pub struct DataBlock {
    start_row: usize,
    layout: RowLayout,
    rows: Vec<Spectrum>,
    dirty: bool,
}

impl DataBlock {
    /// A clean, zero-filled block covering `[start_row, start_row + row_count)`.
    pub fn new(start_row: usize, row_count: usize, layout: RowLayout) -> Self {
        let zero_x: SharedX = Arc::new(vec![0.0; layout.x_len()]);
        let rows = (0..row_count)
            .map(|_| Spectrum::zeroed(&layout, Arc::clone(&zero_x)))
            .collect();
        DataBlock {
            start_row,
            layout,
            rows,
            dirty: false,
        }
    }

    /// First logical row covered. Doubles as the cache key.
    pub fn min_index(&self) -> usize {
        self.start_row
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Whether the block diverged from the backing store.
    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    /// Bytes `serialize` produces.
    pub fn encoded_len(&self) -> usize {
        self.rows.len() * self.layout.record_size()
    }

    pub fn x(&self, index: usize) -> Result<&[f64]> {
        Ok(self.row(index)?.x.as_slice())
    }

    pub fn y(&self, index: usize) -> Result<&[f64]> {
        Ok(&self.row(index)?.y)
    }

    pub fn e(&self, index: usize) -> Result<&[f64]> {
        Ok(&self.row(index)?.e)
    }

    /// The X allocation itself, to observe sharing between rows.
    pub fn shared_x(&self, index: usize) -> Result<&SharedX> {
        Ok(&self.row(index)?.x)
    }

    pub fn x_mut(&mut self, index: usize) -> Result<&mut [f64]> {
        let row = self.row_mut(index)?;
        Ok(Arc::make_mut(&mut row.x).as_mut_slice())
    }

    pub fn y_mut(&mut self, index: usize) -> Result<&mut [f64]> {
        Ok(&mut self.row_mut(index)?.y)
    }

    pub fn e_mut(&mut self, index: usize) -> Result<&mut [f64]> {
        Ok(&mut self.row_mut(index)?.e)
    }

    /// Replace a row's X. Passing a clone of another row's `SharedX` shares it.
    pub fn set_x(&mut self, index: usize, x: SharedX) -> Result<()> {
        check_len("X", self.layout.x_len(), x.len())?;
        self.row_mut(index)?.x = x;
        Ok(())
    }

    /// Replace a row's Y and E together.
    pub fn set_data(&mut self, index: usize, y: Vec<f64>, e: Vec<f64>) -> Result<()> {
        check_len("Y", self.layout.y_len(), y.len())?;
        check_len("E", self.layout.y_len(), e.len())?;
        let row = self.row_mut(index)?;
        row.y = y;
        row.e = e;
        Ok(())
    }

    /// Replace a row's Y, keeping its E.
    pub fn set_y(&mut self, index: usize, y: Vec<f64>) -> Result<()> {
        check_len("Y", self.layout.y_len(), y.len())?;
        self.row_mut(index)?.y = y;
        Ok(())
    }

    /// Write every row in order. The dirty flag is left alone: only the
    /// caller knows when the bytes actually reached the file.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        for row in &self.rows {
            record::write_record(w, &self.layout, row)?;
        }
        Ok(())
    }

    /// Record that the current contents are in the backing store.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Replace every row with records read in order. Leaves the block clean.
    pub fn deserialize<R: Read>(&mut self, r: &mut R) -> Result<()> {
        for row in self.rows.iter_mut() {
            *row = record::read_record(r, &self.layout)?;
        }
        self.dirty = false;
        Ok(())
    }

    fn row(&self, index: usize) -> Result<&Spectrum> {
        let row_count = self.rows.len();
        self.rows
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, row_count })
    }

    /// Bounds-checked row access that marks the block dirty.
    fn row_mut(&mut self, index: usize) -> Result<&mut Spectrum> {
        let row_count = self.rows.len();
        let row = self
            .rows
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, row_count })?;
        self.dirty = true;
        Ok(row)
    }
}
