//! Dense buffer for object valued columns: text, text sets, text lists and custom types. Values
//! are reference counted and shared between buffer, column and readers without copying.

use std::{any::Any, sync::Arc};

use crate::{
    column::Column,
    error::{Error, Result},
    types::{Category, ColumnType},
};

use super::check_index;

/// A shared, type erased element of an object column. Concrete types are recovered through
/// downcasting, e.g. `String` for text columns.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Mutable fixed length vector of optional objects, the predecessor of the object valued column
/// types. Missing values are `None`.
pub struct ObjectBuffer {
    column_type: ColumnType,
    size: usize,
    data: Option<Vec<Option<ObjectRef>>>,
}

impl std::fmt::Debug for ObjectBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBuffer")
            .field("column_type", &self.column_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl ObjectBuffer {
    /// A buffer for one of the object column types. Temporal types have dedicated buffers and are
    /// rejected here, as are the numeric and categorical ones.
    pub fn new(column_type: ColumnType, size: usize) -> Result<Self> {
        if !matches!(
            column_type,
            ColumnType::Text | ColumnType::TextSet | ColumnType::TextList | ColumnType::Custom
        ) {
            return Err(Error::invalid_argument(format!(
                "{column_type:?} values cannot be stored in an object buffer"
            )));
        }
        Ok(ObjectBuffer {
            column_type,
            size,
            data: Some(vec![None; size]),
        })
    }

    /// A mutable copy of the values of an object readable column. Nominal sources are expanded
    /// into their dictionary values and yield a text buffer.
    pub fn from_column(column: &Column) -> Result<Self> {
        let column_type = match column.column_type().category() {
            Category::Categorical => ColumnType::Text,
            Category::Object
                if !matches!(
                    column.column_type(),
                    ColumnType::DateTime | ColumnType::Time
                ) =>
            {
                column.column_type()
            }
            _ => {
                return Err(Error::ColumnTypeMismatch {
                    requested: ColumnType::Text,
                    actual: column.column_type(),
                })
            }
        };
        let data = (0..column.size()).map(|row| column.object_at(row)).collect();
        Ok(ObjectBuffer {
            column_type,
            size: column.size(),
            data: Some(data),
        })
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, index: usize) -> Result<Option<ObjectRef>> {
        let data = self.data.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        Ok(data[index].clone())
    }

    pub fn set(&mut self, index: usize, value: Option<ObjectRef>) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        data[index] = value;
        Ok(())
    }

    /// Convenience for text buffers: wrap a string value.
    pub fn set_string(&mut self, index: usize, value: Option<&str>) -> Result<()> {
        self.set(
            index,
            value.map(|v| Arc::new(v.to_owned()) as ObjectRef),
        )
    }

    pub fn to_column(&mut self) -> Result<Column> {
        let data = self.data.take().ok_or(Error::BufferFrozen)?;
        Ok(Column::dense_object(self.column_type, data))
    }
}
