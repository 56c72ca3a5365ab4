//! Dense buffer for categorical values. Values are interned into a dictionary and only the
//! assigned indices are stored, packed according to the index format of the buffer. One buffer
//! type covers all formats; the format specific storage lives in [`IndexStore`].

use std::sync::Arc;

use log::debug;

use crate::{
    column::Column,
    dictionary::DictionaryBuilder,
    error::{Error, Result},
    packed,
    types::{ColumnType, IndexFormat},
};

use super::check_index;

/// Format specific storage of dictionary indices. The 2 and 4 bit variants pack several indices
/// per byte, see [`crate::packed`] for the aligned block requirement on concurrent writers.
#[derive(Debug)]
pub(crate) enum IndexStore {
    U2 { bytes: Vec<u8>, len: usize },
    U4 { bytes: Vec<u8>, len: usize },
    U8(Vec<u8>),
    U16(Vec<u16>),
    I32(Vec<i32>),
}

impl IndexStore {
    pub fn new(format: IndexFormat, len: usize) -> Self {
        match format {
            IndexFormat::U2 => IndexStore::U2 {
                bytes: vec![0; packed::packed_len_u2(len)],
                len,
            },
            IndexFormat::U4 => IndexStore::U4 {
                bytes: vec![0; packed::packed_len_u4(len)],
                len,
            },
            IndexFormat::U8 => IndexStore::U8(vec![0; len]),
            IndexFormat::U16 => IndexStore::U16(vec![0; len]),
            IndexFormat::I32 => IndexStore::I32(vec![0; len]),
        }
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            IndexStore::U2 { .. } => IndexFormat::U2,
            IndexStore::U4 { .. } => IndexFormat::U4,
            IndexStore::U8(_) => IndexFormat::U8,
            IndexStore::U16(_) => IndexFormat::U16,
            IndexStore::I32(_) => IndexFormat::I32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexStore::U2 { len, .. } | IndexStore::U4 { len, .. } => *len,
            IndexStore::U8(data) => data.len(),
            IndexStore::U16(data) => data.len(),
            IndexStore::I32(data) => data.len(),
        }
    }

    pub fn get(&self, index: usize) -> usize {
        match self {
            IndexStore::U2 { bytes, .. } => packed::read_u2(bytes, index) as usize,
            IndexStore::U4 { bytes, .. } => packed::read_u4(bytes, index) as usize,
            IndexStore::U8(data) => data[index] as usize,
            IndexStore::U16(data) => data[index] as usize,
            IndexStore::I32(data) => data[index] as usize,
        }
    }

    pub fn set(&mut self, index: usize, value: usize) {
        debug_assert!(value <= self.format().max_value());
        match self {
            IndexStore::U2 { bytes, .. } => packed::write_u2(bytes, index, value as u8),
            IndexStore::U4 { bytes, .. } => packed::write_u4(bytes, index, value as u8),
            IndexStore::U8(data) => data[index] = value as u8,
            IndexStore::U16(data) => data[index] = value as u16,
            IndexStore::I32(data) => data[index] = value as i32,
        }
    }
}

/// Mutable fixed length vector of categorical values, the predecessor of a
/// [`ColumnType::Nominal`] column. The index format bounds the number of distinct non missing
/// values the buffer can hold.
#[derive(Debug)]
pub struct NominalBuffer {
    size: usize,
    format: IndexFormat,
    inner: Option<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: IndexStore,
    dictionary: DictionaryBuilder,
}

impl NominalBuffer {
    pub fn new(format: IndexFormat, size: usize) -> Self {
        NominalBuffer {
            size,
            format,
            inner: Some(Inner {
                store: IndexStore::new(format, size),
                dictionary: DictionaryBuilder::new(format),
            }),
        }
    }

    /// A mutable copy of the values of a nominal column. The dictionary is carried over with its
    /// index assignment; it must fit the requested format.
    pub fn from_column(column: &Column, format: IndexFormat) -> Result<Self> {
        if column.column_type() != ColumnType::Nominal {
            return Err(Error::ColumnTypeMismatch {
                requested: ColumnType::Nominal,
                actual: column.column_type(),
            });
        }
        let dictionary = column.dictionary().expect("nominal columns carry a dictionary");
        let builder = DictionaryBuilder::from_dictionary(dictionary, format)?;
        let mut store = IndexStore::new(format, column.size());
        for row in 0..column.size() {
            store.set(row, column.index_at(row));
        }
        Ok(NominalBuffer {
            size: column.size(),
            format,
            inner: Some(Inner {
                store,
                dictionary: builder,
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn index_format(&self) -> IndexFormat {
        self.format
    }

    /// Store `value` at `index`, interning new distinct values. Running out of free indices in
    /// the format is an [`Error::Overflow`]; use [`NominalBuffer::set_save`] to probe instead.
    pub fn set(&mut self, index: usize, value: Option<&str>) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        let category = match value {
            None => 0,
            Some(value) => inner.dictionary.intern(value)?,
        };
        inner.store.set(index, category);
        Ok(())
    }

    /// Like [`NominalBuffer::set`], but answers `false` instead of failing when a new distinct
    /// value does not fit the format anymore. The buffer is unchanged in that case.
    pub fn set_save(&mut self, index: usize, value: Option<&str>) -> Result<bool> {
        let inner = self.inner.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        let category = match value {
            None => 0,
            Some(value) => match inner.dictionary.try_intern(value) {
                Some(category) => category,
                None => return Ok(false),
            },
        };
        inner.store.set(index, category);
        Ok(true)
    }

    pub fn get_index(&self, index: usize) -> Result<usize> {
        let inner = self.inner.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        Ok(inner.store.get(index))
    }

    pub fn get(&self, index: usize) -> Result<Option<Arc<String>>> {
        let category = self.get_index(index)?;
        let inner = self.inner.as_ref().expect("checked by get_index");
        Ok(inner.dictionary.lookup(category))
    }

    /// Number of distinct non missing values set so far.
    pub fn different_values(&self) -> Result<usize> {
        let inner = self.inner.as_ref().ok_or(Error::BufferFrozen)?;
        Ok(inner.dictionary.size())
    }

    /// Freeze this buffer into a nominal column, keeping the index format of the buffer.
    pub fn to_column(&mut self) -> Result<Column> {
        let inner = self.inner.take().ok_or(Error::BufferFrozen)?;
        Ok(Column::dense_nominal(
            inner.store,
            Arc::new(inner.dictionary.freeze()),
            None,
        ))
    }

    /// Freeze into a nominal column whose index format is the smallest one fitting the observed
    /// number of distinct values, repacking the stored indices.
    pub fn to_column_minimal(&mut self) -> Result<Column> {
        let inner = self.inner.take().ok_or(Error::BufferFrozen)?;
        let minimal = IndexFormat::smallest_for(inner.dictionary.size());
        let store = if minimal == self.format {
            inner.store
        } else {
            debug!(
                "Repacking nominal indices from {:?} to {:?} for {} distinct values.",
                self.format,
                minimal,
                inner.dictionary.size()
            );
            let mut repacked = IndexStore::new(minimal, self.size);
            for row in 0..self.size {
                repacked.set(row, inner.store.get(row));
            }
            repacked
        };
        Ok(Column::dense_nominal(
            store,
            Arc::new(inner.dictionary.freeze()),
            None,
        ))
    }

    /// Freeze into a boolean column: a nominal column over at most two values which knows which
    /// of its indices counts as positive. Without a positive value the buffer may hold at most
    /// one distinct value, which is implicitly negative.
    pub fn to_boolean_column(&mut self, positive_value: Option<&str>) -> Result<Column> {
        let inner = self.inner.take().ok_or(Error::BufferFrozen)?;
        let dictionary = inner.dictionary.freeze();
        let positive_index = dictionary.positive_index_for(positive_value)?;
        Ok(Column::dense_nominal(
            inner.store,
            Arc::new(dictionary),
            positive_index,
        ))
    }
}
