//! The immutable, sealed column. A column is produced by freezing exactly one buffer; it owns
//! the backing storage of that buffer and never changes afterwards, which makes it safe to share
//! between any number of reader threads.

use std::sync::Arc;

use chrono::NaiveTime;

use crate::{
    buffer::{IndexStore, Instant, ObjectRef, MISSING_LONG},
    dictionary::Dictionary,
    error::{Error, Result},
    types::{Capability, Category, ColumnType, IndexFormat},
};

/// Immutable typed vector of a fixed length. Obtained by freezing a buffer, see the types in
/// [`crate::buffer`].
pub struct Column {
    column_type: ColumnType,
    size: usize,
    storage: Storage,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("column_type", &self.column_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Physical backing of a column. Dense variants store one value per position, sparse variants a
/// default plus the positions deviating from it, with `indices` strictly ascending.
pub(crate) enum Storage {
    DenseNumeric(Vec<f64>),
    /// Time (nanoseconds of the day) or datetime (epoch seconds) values, missing encoded as
    /// [`MISSING_LONG`].
    DenseLong(Vec<i64>),
    DenseDateTimeNano {
        seconds: Vec<i64>,
        nanos: Vec<i32>,
    },
    DenseNominal {
        store: IndexStore,
        dictionary: Arc<Dictionary>,
        positive_index: Option<usize>,
    },
    DenseObject(Vec<Option<ObjectRef>>),
    SparseNumeric {
        default: f64,
        indices: Vec<i32>,
        values: Vec<f64>,
    },
    SparseLong {
        default: i64,
        indices: Vec<i32>,
        values: Vec<i64>,
    },
    SparseDateTime {
        default_seconds: i64,
        default_nanos: u32,
        indices: Vec<i32>,
        seconds: Vec<i64>,
        nanos: Option<Vec<i32>>,
    },
    SparseNominal {
        format: IndexFormat,
        default_index: u32,
        indices: Vec<i32>,
        values: Vec<u32>,
        dictionary: Arc<Dictionary>,
        positive_index: Option<usize>,
    },
}

/// Value of `row` in a sparse layout: the recorded value if the row deviates from the default.
fn sparse_at<T: Copy>(indices: &[i32], values: &[T], default: T, row: usize) -> T {
    match indices.binary_search(&(row as i32)) {
        Ok(k) => values[k],
        Err(_) => default,
    }
}

impl Column {
    pub(crate) fn dense_numeric(column_type: ColumnType, data: Vec<f64>) -> Self {
        debug_assert!(column_type.category() == Category::Numeric);
        Column {
            column_type,
            size: data.len(),
            storage: Storage::DenseNumeric(data),
        }
    }

    pub(crate) fn dense_long(column_type: ColumnType, data: Vec<i64>) -> Self {
        Column {
            column_type,
            size: data.len(),
            storage: Storage::DenseLong(data),
        }
    }

    pub(crate) fn dense_date_time_nano(seconds: Vec<i64>, nanos: Vec<i32>) -> Self {
        debug_assert_eq!(seconds.len(), nanos.len());
        Column {
            column_type: ColumnType::DateTime,
            size: seconds.len(),
            storage: Storage::DenseDateTimeNano { seconds, nanos },
        }
    }

    pub(crate) fn dense_nominal(
        store: IndexStore,
        dictionary: Arc<Dictionary>,
        positive_index: Option<usize>,
    ) -> Self {
        Column {
            column_type: ColumnType::Nominal,
            size: store.len(),
            storage: Storage::DenseNominal {
                store,
                dictionary,
                positive_index,
            },
        }
    }

    pub(crate) fn dense_object(column_type: ColumnType, data: Vec<Option<ObjectRef>>) -> Self {
        Column {
            column_type,
            size: data.len(),
            storage: Storage::DenseObject(data),
        }
    }

    pub(crate) fn sparse_numeric(
        column_type: ColumnType,
        default: f64,
        indices: Vec<i32>,
        values: Vec<f64>,
        size: usize,
    ) -> Self {
        Column {
            column_type,
            size,
            storage: Storage::SparseNumeric {
                default,
                indices,
                values,
            },
        }
    }

    pub(crate) fn sparse_long(
        column_type: ColumnType,
        default: i64,
        indices: Vec<i32>,
        values: Vec<i64>,
        size: usize,
    ) -> Self {
        Column {
            column_type,
            size,
            storage: Storage::SparseLong {
                default,
                indices,
                values,
            },
        }
    }

    pub(crate) fn sparse_date_time(
        default_seconds: i64,
        default_nanos: u32,
        indices: Vec<i32>,
        seconds: Vec<i64>,
        nanos: Option<Vec<i32>>,
        size: usize,
    ) -> Self {
        Column {
            column_type: ColumnType::DateTime,
            size,
            storage: Storage::SparseDateTime {
                default_seconds,
                default_nanos,
                indices,
                seconds,
                nanos,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn sparse_nominal(
        format: IndexFormat,
        default_index: u32,
        indices: Vec<i32>,
        values: Vec<u32>,
        dictionary: Arc<Dictionary>,
        positive_index: Option<usize>,
        size: usize,
    ) -> Self {
        Column {
            column_type: ColumnType::Nominal,
            size,
            storage: Storage::SparseNominal {
                format,
                default_index,
                indices,
                values,
                dictionary,
                positive_index,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn category(&self) -> Category {
        self.column_type.category()
    }

    /// The dictionary of a nominal column, `None` for every other type.
    pub fn dictionary(&self) -> Option<&Arc<Dictionary>> {
        match &self.storage {
            Storage::DenseNominal { dictionary, .. }
            | Storage::SparseNominal { dictionary, .. } => Some(dictionary),
            _ => None,
        }
    }

    /// The physical index format of a nominal column, `None` for every other type.
    pub fn index_format(&self) -> Option<IndexFormat> {
        match &self.storage {
            Storage::DenseNominal { store, .. } => Some(store.format()),
            Storage::SparseNominal { format, .. } => Some(*format),
            _ => None,
        }
    }

    /// The positive index of a boolean column. `None` for non nominal columns and for nominal
    /// columns frozen without a positive value.
    pub fn positive_index(&self) -> Option<usize> {
        match &self.storage {
            Storage::DenseNominal { positive_index, .. }
            | Storage::SparseNominal { positive_index, .. } => *positive_index,
            _ => None,
        }
    }

    /// Whether a datetime column carries a subsecond component.
    pub fn has_subsecond_precision(&self) -> bool {
        matches!(
            &self.storage,
            Storage::DenseDateTimeNano { .. } | Storage::SparseDateTime { nanos: Some(_), .. }
        )
    }

    /// Materialize a numeric view into `dst`, starting at row `offset` of this column. Copies
    /// until `dst` is full or the column ends. Missing values read as `NaN`, nominal columns
    /// yield their category indices.
    pub fn fill_numeric(&self, dst: &mut [f64], offset: usize) -> Result<()> {
        self.check_capability(Capability::NumericReadable)?;
        self.check_offset(offset)?;
        let count = dst.len().min(self.size - offset);
        match &self.storage {
            Storage::DenseNumeric(data) => {
                dst[..count].copy_from_slice(&data[offset..offset + count]);
            }
            Storage::SparseNumeric {
                default,
                indices,
                values,
            } => {
                dst[..count].fill(*default);
                patch_window(indices, offset, count, |k, row| {
                    dst[row - offset] = values[k];
                });
            }
            _ => {
                for (slot, row) in dst[..count].iter_mut().zip(offset..) {
                    *slot = self.numeric_at(row);
                }
            }
        }
        Ok(())
    }

    /// Materialize an object view into `dst`, starting at row `offset`. Nominal columns yield
    /// their dictionary values as shared strings, temporal columns their `chrono` respectively
    /// [`Instant`] representations.
    pub fn fill_objects(&self, dst: &mut [Option<ObjectRef>], offset: usize) -> Result<()> {
        self.check_capability(Capability::ObjectReadable)?;
        self.check_offset(offset)?;
        let count = dst.len().min(self.size - offset);
        for (slot, row) in dst[..count].iter_mut().zip(offset..) {
            *slot = self.object_at(row);
        }
        Ok(())
    }

    /// Materialize the epoch seconds of a datetime column, missing values as [`i64::MIN`].
    pub fn fill_seconds(&self, dst: &mut [i64], offset: usize) -> Result<()> {
        self.check_date_time()?;
        self.check_offset(offset)?;
        let count = dst.len().min(self.size - offset);
        for (slot, row) in dst[..count].iter_mut().zip(offset..) {
            *slot = self.long_at(row);
        }
        Ok(())
    }

    /// Materialize the subsecond components of a datetime column; zero for columns with second
    /// precision and for missing values.
    pub fn fill_nanos(&self, dst: &mut [i32], offset: usize) -> Result<()> {
        self.check_date_time()?;
        self.check_offset(offset)?;
        let count = dst.len().min(self.size - offset);
        for (slot, row) in dst[..count].iter_mut().zip(offset..) {
            *slot = self.nano_at(row);
        }
        Ok(())
    }

    fn check_capability(&self, capability: Capability) -> Result<()> {
        if self.column_type.has_capability(capability) {
            Ok(())
        } else {
            Err(Error::UnsupportedCapability {
                column_type: self.column_type,
                capability,
            })
        }
    }

    fn check_date_time(&self) -> Result<()> {
        if self.column_type == ColumnType::DateTime {
            Ok(())
        } else {
            Err(Error::ColumnTypeMismatch {
                requested: ColumnType::DateTime,
                actual: self.column_type,
            })
        }
    }

    fn check_offset(&self, offset: usize) -> Result<()> {
        if offset <= self.size {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                index: offset,
                size: self.size,
            })
        }
    }

    /// Numeric value of `row`. Callers must have checked [`Capability::NumericReadable`] and the
    /// bounds.
    pub(crate) fn numeric_at(&self, row: usize) -> f64 {
        debug_assert!(row < self.size);
        match &self.storage {
            Storage::DenseNumeric(data) => data[row],
            Storage::SparseNumeric {
                default,
                indices,
                values,
            } => sparse_at(indices, values, *default, row),
            Storage::DenseLong(data) => long_as_numeric(data[row]),
            Storage::SparseLong {
                default,
                indices,
                values,
            } => long_as_numeric(sparse_at(indices, values, *default, row)),
            Storage::DenseNominal { .. } | Storage::SparseNominal { .. } => {
                self.index_at(row) as f64
            }
            Storage::DenseDateTimeNano { .. }
            | Storage::SparseDateTime { .. }
            | Storage::DenseObject(_) => {
                unreachable!("numeric read of a column without the capability")
            }
        }
    }

    /// Category index of `row` of a nominal column, `0` for missing.
    pub(crate) fn index_at(&self, row: usize) -> usize {
        debug_assert!(row < self.size);
        match &self.storage {
            Storage::DenseNominal { store, .. } => store.get(row),
            Storage::SparseNominal {
                default_index,
                indices,
                values,
                ..
            } => sparse_at(indices, values, *default_index, row) as usize,
            _ => unreachable!("category index read of a non nominal column"),
        }
    }

    /// Raw `i64` of `row`: nanoseconds of the day for time columns, epoch seconds for datetime
    /// columns. Missing values read as [`MISSING_LONG`].
    pub(crate) fn long_at(&self, row: usize) -> i64 {
        debug_assert!(row < self.size);
        match &self.storage {
            Storage::DenseLong(data) => data[row],
            Storage::SparseLong {
                default,
                indices,
                values,
            } => sparse_at(indices, values, *default, row),
            Storage::DenseDateTimeNano { seconds, .. } => seconds[row],
            Storage::SparseDateTime {
                default_seconds,
                indices,
                seconds,
                ..
            } => sparse_at(indices, seconds, *default_seconds, row),
            _ => unreachable!("long read of a non temporal column"),
        }
    }

    /// Subsecond component of `row` of a datetime column.
    pub(crate) fn nano_at(&self, row: usize) -> i32 {
        debug_assert!(row < self.size);
        match &self.storage {
            Storage::DenseDateTimeNano { seconds, nanos } => {
                if seconds[row] == MISSING_LONG {
                    0
                } else {
                    nanos[row]
                }
            }
            Storage::SparseDateTime {
                default_nanos,
                indices,
                nanos,
                ..
            } => match nanos {
                None => 0,
                Some(nanos) => match indices.binary_search(&(row as i32)) {
                    Ok(k) => nanos[k],
                    Err(_) => *default_nanos as i32,
                },
            },
            Storage::DenseLong(_) | Storage::SparseLong { .. } => 0,
            _ => unreachable!("nano read of a non datetime column"),
        }
    }

    /// Object value of `row`. Callers must have checked [`Capability::ObjectReadable`] and the
    /// bounds.
    pub(crate) fn object_at(&self, row: usize) -> Option<ObjectRef> {
        debug_assert!(row < self.size);
        match &self.storage {
            Storage::DenseObject(data) => data[row].clone(),
            Storage::DenseNominal { dictionary, .. } | Storage::SparseNominal { dictionary, .. } => {
                dictionary
                    .lookup(self.index_at(row))
                    .map(|value| value.clone() as ObjectRef)
            }
            _ => match self.column_type {
                ColumnType::Time => {
                    let raw = self.long_at(row);
                    if raw == MISSING_LONG {
                        None
                    } else {
                        let time = NaiveTime::from_num_seconds_from_midnight_opt(
                            (raw / 1_000_000_000) as u32,
                            (raw % 1_000_000_000) as u32,
                        )
                        .expect("stored nanoseconds of the day are validated");
                        Some(Arc::new(time) as ObjectRef)
                    }
                }
                ColumnType::DateTime => {
                    let seconds = self.long_at(row);
                    if seconds == MISSING_LONG {
                        None
                    } else {
                        let instant = Instant {
                            epoch_seconds: seconds,
                            nanos: self.nano_at(row) as u32,
                        };
                        Some(Arc::new(instant) as ObjectRef)
                    }
                }
                _ => unreachable!("object read of a column without the capability"),
            },
        }
    }
}

fn long_as_numeric(raw: i64) -> f64 {
    if raw == MISSING_LONG {
        f64::NAN
    } else {
        raw as f64
    }
}

/// Visit the recorded sparse entries falling into the window `[offset, offset + count)`.
fn patch_window(indices: &[i32], offset: usize, count: usize, mut visit: impl FnMut(usize, usize)) {
    let start = indices.partition_point(|&i| (i as usize) < offset);
    for (k, &row) in indices.iter().enumerate().skip(start) {
        let row = row as usize;
        if row >= offset + count {
            break;
        }
        visit(k, row);
    }
}
