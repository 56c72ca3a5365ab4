//! Dense buffers for floating point and integer values. Both store `f64` elements with `NaN`
//! marking missing values; the integer variant rounds every finite value on write.

use crate::{
    column::Column,
    error::{Error, Result},
    types::ColumnType,
};

use super::check_index;

/// Rounding rule for integer buffers: half way values round towards positive infinity. `NaN` and
/// the infinities are kept verbatim.
pub(crate) fn round_half_up(value: f64) -> f64 {
    if value.is_finite() {
        (value + 0.5).floor()
    } else {
        value
    }
}

/// Mutable fixed length vector of `f64` values, the predecessor of a
/// [`ColumnType::Real`] column.
#[derive(Debug)]
pub struct RealBuffer {
    size: usize,
    data: Option<Vec<f64>>,
}

impl RealBuffer {
    /// A buffer of length `size`. With `initialize` every position starts out missing, otherwise
    /// the contents are unspecified and the caller must overwrite every position before freezing.
    pub fn new(size: usize, initialize: bool) -> Self {
        let fill = if initialize { f64::NAN } else { 0.0 };
        RealBuffer {
            size,
            data: Some(vec![fill; size]),
        }
    }

    /// A mutable copy of the values of a numeric readable column.
    pub fn from_column(column: &Column) -> Result<Self> {
        let data = materialize_numeric(column, ColumnType::Real)?;
        Ok(RealBuffer {
            size: column.size(),
            data: Some(data),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        let data = self.data.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        Ok(data[index])
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        data[index] = value;
        Ok(())
    }

    /// Freeze this buffer into an immutable column, handing over the backing storage.
    pub fn to_column(&mut self) -> Result<Column> {
        let data = self.data.take().ok_or(Error::BufferFrozen)?;
        Ok(Column::dense_numeric(ColumnType::Real, data))
    }
}

/// Mutable fixed length vector of integer values stored as `f64`, the predecessor of a
/// [`ColumnType::Integer53Bit`] column. Finite values are rounded half up on write.
#[derive(Debug)]
pub struct Int53Buffer {
    size: usize,
    data: Option<Vec<f64>>,
}

impl Int53Buffer {
    pub fn new(size: usize, initialize: bool) -> Self {
        let fill = if initialize { f64::NAN } else { 0.0 };
        Int53Buffer {
            size,
            data: Some(vec![fill; size]),
        }
    }

    /// A mutable copy of the values of a numeric readable column. Sources which are not already
    /// integer valued are rounded element wise; category indices, nanoseconds of the day and
    /// integer columns are taken verbatim.
    pub fn from_column(column: &Column) -> Result<Self> {
        let mut data = materialize_numeric(column, ColumnType::Integer53Bit)?;
        if !column.column_type().is_integer_valued() {
            for value in &mut data {
                *value = round_half_up(*value);
            }
        }
        Ok(Int53Buffer {
            size: column.size(),
            data: Some(data),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        let data = self.data.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        Ok(data[index])
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        data[index] = round_half_up(value);
        Ok(())
    }

    pub fn to_column(&mut self) -> Result<Column> {
        let data = self.data.take().ok_or(Error::BufferFrozen)?;
        Ok(Column::dense_numeric(ColumnType::Integer53Bit, data))
    }
}

fn materialize_numeric(column: &Column, requested: ColumnType) -> Result<Vec<f64>> {
    if !column.column_type().is_numeric_readable() {
        return Err(Error::ColumnTypeMismatch {
            requested,
            actual: column.column_type(),
        });
    }
    let mut data = vec![0.0; column.size()];
    column.fill_numeric(&mut data, 0)?;
    Ok(data)
}
