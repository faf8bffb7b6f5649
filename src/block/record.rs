use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::types::{RowLayout, Spectrum};

/// Value written into the spectrum-number word. Nothing reads it back.
pub const SPECTRUM_NO_PLACEHOLDER: i32 = 0;

/// Serialize one row.
///
/// On-disk format (host-native byte order, no framing):
/// ```text
/// [spec_no: i32][x_0..x_n: f64][y_0..y_m: f64][e_0..e_m: f64]
/// ```
///
/// The row must already match `layout`; a short row would shift every
/// record after it.
pub fn write_record<W: Write>(w: &mut W, layout: &RowLayout, row: &Spectrum) -> Result<()> {
    check_len("X", layout.x_len(), row.x.len())?;
    check_len("Y", layout.y_len(), row.y.len())?;
    check_len("E", layout.y_len(), row.e.len())?;

    w.write_i32::<NativeEndian>(SPECTRUM_NO_PLACEHOLDER)?;
    for &v in row.x.iter() {
        w.write_f64::<NativeEndian>(v)?;
    }
    for &v in &row.y {
        w.write_f64::<NativeEndian>(v)?;
    }
    for &v in &row.e {
        w.write_f64::<NativeEndian>(v)?;
    }
    Ok(())
}

/// Deserialize one row. Each row read this way owns its X.
pub fn read_record<R: Read>(r: &mut R, layout: &RowLayout) -> Result<Spectrum> {
    let _spec_no = r.read_i32::<NativeEndian>()?;

    let mut x = vec![0.0; layout.x_len()];
    r.read_f64_into::<NativeEndian>(&mut x)?;
    let mut y = vec![0.0; layout.y_len()];
    r.read_f64_into::<NativeEndian>(&mut y)?;
    let mut e = vec![0.0; layout.y_len()];
    r.read_f64_into::<NativeEndian>(&mut e)?;

    Ok(Spectrum {
        x: Arc::new(x),
        y,
        e,
    })
}

/// Write `count` all-zero records. Used to fill gaps in the scratch files.
pub fn write_zero_records<W: Write>(w: &mut W, layout: &RowLayout, count: usize) -> Result<()> {
    // 0i32 and 0.0f64 are both all-zero bit patterns.
    let zeros = vec![0u8; layout.record_size()];
    for _ in 0..count {
        w.write_all(&zeros)?;
    }
    Ok(())
}

pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
