//! Write once sparse buffers. A sparse buffer records only the positions deviating from a
//! default value, as pairs of strictly ascending indices and values collected in chunked
//! builders. All writes go through an internal mutex, so a buffer may be handed from thread to
//! thread between writes without further synchronization.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    chunked::ChunkedBuilder,
    column::Column,
    dictionary::DictionaryBuilder,
    error::{Error, Result},
    types::{ColumnType, IndexFormat},
};

use super::{
    numeric::round_half_up,
    temporal::{check_instant, check_nano_of_day, Instant},
    MISSING_LONG,
};

/// Index and value chunk lists shared by the sparse buffer variants, together with the next
/// logical write position.
#[derive(Debug)]
struct Rows<T> {
    indices: ChunkedBuilder<i32>,
    values: ChunkedBuilder<T>,
    /// One past the highest position written so far, explicitly or implicitly.
    next_index: usize,
}

impl<T: Copy> Rows<T> {
    fn new(logical_size: usize) -> Self {
        Rows {
            indices: ChunkedBuilder::for_logical_size(logical_size),
            values: ChunkedBuilder::for_logical_size(logical_size),
            next_index: 0,
        }
    }

    /// Validate `index` against the write position and the buffer bounds. Explicit indices must
    /// be strictly larger than anything written before.
    fn claim(&mut self, index: Option<usize>, size: usize) -> Result<usize> {
        let index = index.unwrap_or(self.next_index);
        if index >= size {
            return Err(Error::IndexOutOfBounds { index, size });
        }
        if index < self.next_index {
            return Err(Error::NonMonotonicSparseIndex {
                index,
                previous: self.next_index - 1,
            });
        }
        Ok(index)
    }

    fn record(&mut self, index: usize, value: T) {
        self.indices.push(index as i32);
        self.values.push(value);
    }
}

/// Sparse vector of `f64` values with a fixed default, the predecessor of a sparse
/// [`ColumnType::Real`] or [`ColumnType::Integer53Bit`] column.
#[derive(Debug)]
pub struct SparseRealBuffer {
    column_type: ColumnType,
    size: usize,
    default_value: f64,
    state: Mutex<Option<Rows<f64>>>,
}

impl SparseRealBuffer {
    pub fn new(default_value: f64, size: usize) -> Self {
        SparseRealBuffer {
            column_type: ColumnType::Real,
            size,
            default_value,
            state: Mutex::new(Some(Rows::new(size))),
        }
    }

    /// An integer variant: the default and every written value are rounded half up.
    pub fn new_int53(default_value: f64, size: usize) -> Self {
        SparseRealBuffer {
            column_type: ColumnType::Integer53Bit,
            size,
            default_value: round_half_up(default_value),
            state: Mutex::new(Some(Rows::new(size))),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Write `value` at the next position.
    pub fn set_next(&self, value: f64) -> Result<()> {
        self.write(None, value)
    }

    /// Write `value` at `index`, which must be larger than every previously written index. The
    /// skipped positions take the default value.
    pub fn set_next_at(&self, index: usize, value: f64) -> Result<()> {
        self.write(Some(index), value)
    }

    fn write(&self, index: Option<usize>, value: f64) -> Result<()> {
        let mut guard = self.state.lock();
        let rows = guard.as_mut().ok_or(Error::BufferFrozen)?;
        let index = rows.claim(index, self.size)?;
        let value = if self.column_type == ColumnType::Integer53Bit {
            round_half_up(value)
        } else {
            value
        };
        if !eq_f64(value, self.default_value) {
            rows.record(index, value);
        }
        rows.next_index = index + 1;
        Ok(())
    }

    pub fn to_column(&self) -> Result<Column> {
        let rows = self.state.lock().take().ok_or(Error::BufferFrozen)?;
        debug_assert_eq!(rows.indices.len(), rows.values.len());
        Ok(Column::sparse_numeric(
            self.column_type,
            self.default_value,
            rows.indices.into_vec(),
            rows.values.into_vec(),
            self.size,
        ))
    }
}

/// `NaN` aware value equality: two missing values count as equal.
fn eq_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Sparse vector of nanosecond of the day values, the predecessor of a sparse
/// [`ColumnType::Time`] column. A default of `None` makes unwritten positions missing.
#[derive(Debug)]
pub struct SparseTimeBuffer {
    size: usize,
    default: i64,
    state: Mutex<Option<Rows<i64>>>,
}

impl SparseTimeBuffer {
    pub fn new(default: Option<i64>, size: usize) -> Result<Self> {
        if let Some(nanos) = default {
            check_nano_of_day(nanos)?;
        }
        Ok(SparseTimeBuffer {
            size,
            default: default.unwrap_or(MISSING_LONG),
            state: Mutex::new(Some(Rows::new(size))),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_next(&self, value: Option<i64>) -> Result<()> {
        self.write(None, value)
    }

    pub fn set_next_at(&self, index: usize, value: Option<i64>) -> Result<()> {
        self.write(Some(index), value)
    }

    fn write(&self, index: Option<usize>, value: Option<i64>) -> Result<()> {
        let raw = match value {
            None => MISSING_LONG,
            Some(nanos) => {
                check_nano_of_day(nanos)?;
                nanos
            }
        };
        let mut guard = self.state.lock();
        let rows = guard.as_mut().ok_or(Error::BufferFrozen)?;
        let index = rows.claim(index, self.size)?;
        if raw != self.default {
            rows.record(index, raw);
        }
        rows.next_index = index + 1;
        Ok(())
    }

    pub fn to_column(&self) -> Result<Column> {
        let rows = self.state.lock().take().ok_or(Error::BufferFrozen)?;
        Ok(Column::sparse_long(
            ColumnType::Time,
            self.default,
            rows.indices.into_vec(),
            rows.values.into_vec(),
            self.size,
        ))
    }
}

/// Sparse vector of instants, the predecessor of a sparse [`ColumnType::DateTime`] column.
/// Like its dense counterpart it comes with second or nanosecond precision.
#[derive(Debug)]
pub struct SparseDateTimeBuffer {
    size: usize,
    default_seconds: i64,
    default_nanos: u32,
    state: Mutex<Option<DateTimeRows>>,
}

#[derive(Debug)]
struct DateTimeRows {
    rows: Rows<i64>,
    nanos: Option<ChunkedBuilder<i32>>,
}

impl SparseDateTimeBuffer {
    /// Second precision; subsecond components of written values are discarded.
    pub fn new(default_seconds: Option<i64>, size: usize) -> Result<Self> {
        if let Some(seconds) = default_seconds {
            check_instant(Instant {
                epoch_seconds: seconds,
                nanos: 0,
            })?;
        }
        Ok(SparseDateTimeBuffer {
            size,
            default_seconds: default_seconds.unwrap_or(MISSING_LONG),
            default_nanos: 0,
            state: Mutex::new(Some(DateTimeRows {
                rows: Rows::new(size),
                nanos: None,
            })),
        })
    }

    /// Nanosecond precision.
    pub fn with_subsecond(default: Option<Instant>, size: usize) -> Result<Self> {
        if let Some(instant) = default {
            check_instant(instant)?;
        }
        Ok(SparseDateTimeBuffer {
            size,
            default_seconds: default.map_or(MISSING_LONG, |i| i.epoch_seconds),
            default_nanos: default.map_or(0, |i| i.nanos),
            state: Mutex::new(Some(DateTimeRows {
                rows: Rows::new(size),
                nanos: Some(ChunkedBuilder::for_logical_size(size)),
            })),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_next(&self, value: Option<Instant>) -> Result<()> {
        self.write(None, value)
    }

    pub fn set_next_at(&self, index: usize, value: Option<Instant>) -> Result<()> {
        self.write(Some(index), value)
    }

    fn write(&self, index: Option<usize>, value: Option<Instant>) -> Result<()> {
        if let Some(instant) = value {
            check_instant(instant)?;
        }
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(Error::BufferFrozen)?;
        let index = state.rows.claim(index, self.size)?;
        let seconds = value.map_or(MISSING_LONG, |i| i.epoch_seconds);
        let nanos = match &state.nanos {
            Some(_) => value.map_or(0, |i| i.nanos),
            // Second precision discards the subsecond component.
            None => 0,
        };
        let is_default = seconds == self.default_seconds
            && (state.nanos.is_none() || nanos == self.default_nanos);
        if !is_default {
            state.rows.record(index, seconds);
            if let Some(nano_builder) = &mut state.nanos {
                nano_builder.push(nanos as i32);
            }
        }
        state.rows.next_index = index + 1;
        Ok(())
    }

    pub fn to_column(&self) -> Result<Column> {
        let state = self.state.lock().take().ok_or(Error::BufferFrozen)?;
        Ok(Column::sparse_date_time(
            self.default_seconds,
            self.default_nanos,
            state.rows.indices.into_vec(),
            state.rows.values.into_vec(),
            state.nanos.map(ChunkedBuilder::into_vec),
            self.size,
        ))
    }
}

/// Sparse vector of categorical values, the predecessor of a sparse [`ColumnType::Nominal`]
/// column. The default value is interned up front; writes matching it record nothing.
#[derive(Debug)]
pub struct SparseNominalBuffer {
    size: usize,
    format: IndexFormat,
    default_index: usize,
    state: Mutex<Option<NominalRows>>,
}

#[derive(Debug)]
struct NominalRows {
    rows: Rows<u32>,
    dictionary: DictionaryBuilder,
}

impl SparseNominalBuffer {
    pub fn new(default: Option<&str>, format: IndexFormat, size: usize) -> Result<Self> {
        let dictionary = DictionaryBuilder::new(format);
        let default_index = match default {
            None => 0,
            Some(value) => dictionary.intern(value)?,
        };
        Ok(SparseNominalBuffer {
            size,
            format,
            default_index,
            state: Mutex::new(Some(NominalRows {
                rows: Rows::new(size),
                dictionary,
            })),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn index_format(&self) -> IndexFormat {
        self.format
    }

    pub fn set_next(&self, value: Option<&str>) -> Result<()> {
        match self.write(None, value)? {
            true => Ok(()),
            false => Err(Error::Overflow {
                format: self.format,
            }),
        }
    }

    pub fn set_next_at(&self, index: usize, value: Option<&str>) -> Result<()> {
        match self.write(Some(index), value)? {
            true => Ok(()),
            false => Err(Error::Overflow {
                format: self.format,
            }),
        }
    }

    /// Like [`SparseNominalBuffer::set_next`], but answers `false` instead of failing when a new
    /// distinct value does not fit the format. The write position does not advance in that case.
    pub fn set_next_save(&self, value: Option<&str>) -> Result<bool> {
        self.write(None, value)
    }

    pub fn set_next_at_save(&self, index: usize, value: Option<&str>) -> Result<bool> {
        self.write(Some(index), value)
    }

    fn write(&self, index: Option<usize>, value: Option<&str>) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(Error::BufferFrozen)?;
        let index = state.rows.claim(index, self.size)?;
        let category = match value {
            None => 0,
            Some(value) => match state.dictionary.try_intern(value) {
                Some(category) => category,
                None => return Ok(false),
            },
        };
        if category != self.default_index {
            state.rows.record(index, category as u32);
        }
        state.rows.next_index = index + 1;
        Ok(true)
    }

    /// Number of distinct non missing values, the non missing default included.
    pub fn different_values(&self) -> Result<usize> {
        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(Error::BufferFrozen)?;
        Ok(state.dictionary.size())
    }

    pub fn to_column(&self) -> Result<Column> {
        let state = self.state.lock().take().ok_or(Error::BufferFrozen)?;
        Ok(Column::sparse_nominal(
            self.format,
            self.default_index as u32,
            state.rows.indices.into_vec(),
            state.rows.values.into_vec(),
            Arc::new(state.dictionary.freeze()),
            None,
            self.size,
        ))
    }

    /// Boolean variant of the freeze, see [`crate::NominalBuffer::to_boolean_column`].
    pub fn to_boolean_column(&self, positive_value: Option<&str>) -> Result<Column> {
        let state = self.state.lock().take().ok_or(Error::BufferFrozen)?;
        let dictionary = state.dictionary.freeze();
        let positive_index = dictionary.positive_index_for(positive_value)?;
        Ok(Column::sparse_nominal(
            self.format,
            self.default_index as u32,
            state.rows.indices.into_vec(),
            state.rows.values.into_vec(),
            Arc::new(dictionary),
            positive_index,
            self.size,
        ))
    }
}
