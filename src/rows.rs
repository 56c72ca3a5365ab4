//! Read only random access views over one or more columns, handed to user closures by the
//! transformation calculators. A view points at one row at a time; the driving loop moves it
//! forward, the closure reads the values of the current row.
//!
//! Views are cheap to create and not shared between threads: every partition of a parallel
//! computation builds its own.

use std::{any::Any, cell::Cell, sync::Arc};

use crate::{
    buffer::ObjectRef,
    column::Column,
    error::{Error, Result},
    types::{Capability, ColumnType},
};

fn check_same_size(columns: &[&Column]) -> Result<usize> {
    let first = columns
        .first()
        .ok_or_else(|| Error::invalid_argument("at least one column is required"))?;
    if let Some(mismatch) = columns.iter().find(|c| c.size() != first.size()) {
        return Err(Error::invalid_argument(format!(
            "all columns must share one row count, got {} and {}",
            first.size(),
            mismatch.size()
        )));
    }
    Ok(first.size())
}

/// View reading every column as `f64`. All columns must be numeric readable.
pub struct NumericRow<'a> {
    columns: Vec<&'a Column>,
    row: Cell<usize>,
}

impl<'a> NumericRow<'a> {
    pub fn new(columns: &[&'a Column]) -> Result<Self> {
        check_same_size(columns)?;
        for column in columns {
            if !column.column_type().is_numeric_readable() {
                return Err(Error::UnsupportedCapability {
                    column_type: column.column_type(),
                    capability: Capability::NumericReadable,
                });
            }
        }
        Ok(NumericRow {
            columns: columns.to_vec(),
            row: Cell::new(0),
        })
    }

    /// Number of columns in this view.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// The row this view currently points at.
    pub fn position(&self) -> usize {
        self.row.get()
    }

    /// Value of `column` at the current row. Missing values read as `NaN`, nominal columns yield
    /// their category indices.
    pub fn get(&self, column: usize) -> f64 {
        self.columns[column].numeric_at(self.row.get())
    }

    pub(crate) fn move_to(&self, row: usize) {
        self.row.set(row);
    }
}

/// View reading category indices of nominal columns.
pub struct CategoricalRow<'a> {
    columns: Vec<&'a Column>,
    row: Cell<usize>,
}

impl<'a> CategoricalRow<'a> {
    pub fn new(columns: &[&'a Column]) -> Result<Self> {
        check_same_size(columns)?;
        for column in columns {
            if column.column_type() != ColumnType::Nominal {
                return Err(Error::ColumnTypeMismatch {
                    requested: ColumnType::Nominal,
                    actual: column.column_type(),
                });
            }
        }
        Ok(CategoricalRow {
            columns: columns.to_vec(),
            row: Cell::new(0),
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self) -> usize {
        self.row.get()
    }

    /// Category index of `column` at the current row, `0` for missing.
    pub fn get(&self, column: usize) -> usize {
        self.columns[column].index_at(self.row.get())
    }

    pub(crate) fn move_to(&self, row: usize) {
        self.row.set(row);
    }
}

/// View over columns of mixed types. Every read names the kind of access; reads unsupported by
/// the column type fail.
pub struct MixedRow<'a> {
    columns: Vec<&'a Column>,
    row: Cell<usize>,
}

impl<'a> MixedRow<'a> {
    pub fn new(columns: &[&'a Column]) -> Result<Self> {
        check_same_size(columns)?;
        Ok(MixedRow {
            columns: columns.to_vec(),
            row: Cell::new(0),
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self) -> usize {
        self.row.get()
    }

    pub fn get_numeric(&self, column: usize) -> Result<f64> {
        let column = self.columns[column];
        if !column.column_type().is_numeric_readable() {
            return Err(Error::UnsupportedCapability {
                column_type: column.column_type(),
                capability: Capability::NumericReadable,
            });
        }
        Ok(column.numeric_at(self.row.get()))
    }

    pub fn get_index(&self, column: usize) -> Result<usize> {
        let column = self.columns[column];
        if column.column_type() != ColumnType::Nominal {
            return Err(Error::ColumnTypeMismatch {
                requested: ColumnType::Nominal,
                actual: column.column_type(),
            });
        }
        Ok(column.index_at(self.row.get()))
    }

    pub fn get_object(&self, column: usize) -> Result<Option<ObjectRef>> {
        let column = self.columns[column];
        if !column.column_type().is_object_readable() {
            return Err(Error::UnsupportedCapability {
                column_type: column.column_type(),
                capability: Capability::ObjectReadable,
            });
        }
        Ok(column.object_at(self.row.get()))
    }

    /// Object value of `column` at the current row, downcast to its concrete type. A present
    /// value of a different type is an error, e.g. asking a text column for anything but
    /// `String`.
    pub fn get_object_as<T: Any + Send + Sync>(&self, column: usize) -> Result<Option<Arc<T>>> {
        match self.get_object(column)? {
            None => Ok(None),
            Some(object) => object.downcast::<T>().map(Some).map_err(|_| {
                Error::invalid_argument(format!(
                    "object value is not of the requested type {}",
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    pub(crate) fn move_to(&self, row: usize) {
        self.row.set(row);
    }
}
