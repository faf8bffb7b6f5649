use std::sync::Arc;

use crate::error::{Error, Result};

/// X values (bin boundaries or points). Rows that were given the same
/// sequence share one allocation until one of them is mutated.
pub type SharedX = Arc<Vec<f64>>;

/// Size of the legacy spectrum-number word that opens every record.
pub const RECORD_HEADER_SIZE: usize = std::mem::size_of::<i32>();

const F64_SIZE: usize = std::mem::size_of::<f64>();

/// Fixed shape of every row in a store.
///
/// ```text
/// ┌───────────────┬──────────────────┬──────────────────┬──────────────────┐
/// │ spec no (4B)  │ X: x_len × f64   │ Y: y_len × f64   │ E: y_len × f64   │
/// └───────────────┴──────────────────┴──────────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    x_len: usize,
    y_len: usize,
}

impl RowLayout {
    /// Both lengths must be positive: a zero-length row would make
    /// `rows_per_block` meaningless.
    pub fn new(x_len: usize, y_len: usize) -> Result<Self> {
        if x_len == 0 || y_len == 0 {
            return Err(Error::Init(format!(
                "row lengths must be positive (x_len={x_len}, y_len={y_len})"
            )));
        }
        Ok(RowLayout { x_len, y_len })
    }

    pub fn x_len(&self) -> usize {
        self.x_len
    }

    pub fn y_len(&self) -> usize {
        self.y_len
    }

    /// Bytes per record on disk.
    pub fn record_size(&self) -> usize {
        RECORD_HEADER_SIZE + self.x_len * F64_SIZE + 2 * self.y_len * F64_SIZE
    }
}

/// One logical row: X, Y and E.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub x: SharedX,
    pub y: Vec<f64>,
    pub e: Vec<f64>,
}

impl Spectrum {
    /// A zero-valued row sharing the given X allocation.
    pub fn zeroed(layout: &RowLayout, x: SharedX) -> Self {
        Spectrum {
            x,
            y: vec![0.0; layout.y_len()],
            e: vec![0.0; layout.y_len()],
        }
    }
}
