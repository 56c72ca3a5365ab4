//! Interning of distinct nominal values. While a buffer is being filled the mapping grows through
//! a [`DictionaryBuilder`], which is safe to share between writer threads. Freezing a nominal
//! buffer turns the builder into an immutable [`Dictionary`] carried by the column.
//!
//! Index `0` is reserved for the missing value in both directions: `lookup(0)` is `None` and
//! missing values are never interned.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{
    error::{Error, Result},
    types::IndexFormat,
};

/// Thread safe interning of distinct values into positive indices.
///
/// Reads take a shared lock. A writer missing the map takes the exclusive lock and checks the map
/// a second time before allocating, so two writers racing on the same new value agree on one
/// index and at most one index is ever assigned per distinct value.
#[derive(Debug)]
pub struct DictionaryBuilder {
    format: IndexFormat,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Value to index. Keys duplicate the values list so lookups can borrow a plain `str`.
    map: HashMap<String, usize>,
    /// Index to value, position `0` is the missing value.
    values: Vec<Option<Arc<String>>>,
}

impl DictionaryBuilder {
    pub fn new(format: IndexFormat) -> Self {
        DictionaryBuilder {
            format,
            inner: RwLock::new(Inner {
                map: HashMap::new(),
                values: vec![None],
            }),
        }
    }

    /// A builder seeded with the contents of an existing dictionary, used when copying a nominal
    /// column back into a buffer. Fails if the dictionary does not fit the requested format.
    pub fn from_dictionary(dictionary: &Dictionary, format: IndexFormat) -> Result<Self> {
        if dictionary.maximal_index() > format.max_value() {
            return Err(Error::invalid_argument(format!(
                "dictionary with maximal index {} does not fit into format {:?}",
                dictionary.maximal_index(),
                format
            )));
        }
        let mut map = HashMap::with_capacity(dictionary.size());
        let mut values = Vec::with_capacity(dictionary.maximal_index() + 1);
        values.push(None);
        for (index, value) in dictionary.values.iter().enumerate().skip(1) {
            let value = value.as_ref().expect("dictionary values past 0 are present");
            map.insert(value.as_ref().clone(), index);
            values.push(Some(value.clone()));
        }
        Ok(DictionaryBuilder {
            format,
            inner: RwLock::new(Inner { map, values }),
        })
    }

    pub fn index_format(&self) -> IndexFormat {
        self.format
    }

    /// Number of interned distinct values, which is also the highest assigned index.
    pub fn size(&self) -> usize {
        self.inner.read().values.len() - 1
    }

    /// The index assigned to `value`, or `None` if it has not been interned.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.inner.read().map.get(value).copied()
    }

    /// The value interned under `index`. `None` for index `0` and for unassigned indices.
    pub fn lookup(&self, index: usize) -> Option<Arc<String>> {
        self.inner.read().values.get(index).cloned().flatten()
    }

    /// Intern `value`, assigning the next free index on a miss. Returns `None` instead of growing
    /// past the maximal index of the format.
    pub fn try_intern(&self, value: &str) -> Option<usize> {
        if let Some(&index) = self.inner.read().map.get(value) {
            return Some(index);
        }
        let mut inner = self.inner.write();
        // Another writer may have interned the value between our two lock acquisitions.
        if let Some(&index) = inner.map.get(value) {
            return Some(index);
        }
        let index = inner.values.len();
        if index > self.format.max_value() {
            return None;
        }
        inner.map.insert(value.to_owned(), index);
        inner.values.push(Some(Arc::new(value.to_owned())));
        Some(index)
    }

    /// Like [`DictionaryBuilder::try_intern`], but overflowing the format is an error.
    pub fn intern(&self, value: &str) -> Result<usize> {
        self.try_intern(value).ok_or(Error::Overflow {
            format: self.format,
        })
    }

    /// Seal the mapping. Called when the owning buffer is frozen into a column.
    pub fn freeze(self) -> Dictionary {
        let inner = self.inner.into_inner();
        Dictionary {
            map: inner.map,
            values: inner.values,
        }
    }
}

/// Immutable bijection between positive indices and distinct non missing values, carried by
/// nominal columns. Safe to share between any number of readers.
#[derive(Debug)]
pub struct Dictionary {
    map: HashMap<String, usize>,
    values: Vec<Option<Arc<String>>>,
}

impl Dictionary {
    /// Number of distinct values, excluding the missing value at index `0`.
    pub fn size(&self) -> usize {
        self.values.len() - 1
    }

    /// The highest assigned index. Equal to [`Dictionary::size`].
    pub fn maximal_index(&self) -> usize {
        self.values.len() - 1
    }

    pub fn lookup(&self, index: usize) -> Option<&Arc<String>> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.map.get(value).copied()
    }

    /// All values in index order, starting with the missing value at position `0`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(|v| v.as_deref().map(String::as_str))
    }

    /// Determine the positive index for a boolean column over this dictionary.
    ///
    /// A boolean dictionary holds at most two values. Without a positive value at most one value
    /// may be present (it is implicitly negative) and there is no positive index. A given
    /// positive value must be one of the present values.
    pub fn positive_index_for(&self, positive_value: Option<&str>) -> Result<Option<usize>> {
        if self.size() > 2 {
            return Err(Error::invalid_argument(format!(
                "a boolean column may hold at most 2 distinct values, got {}",
                self.size()
            )));
        }
        match positive_value {
            None => {
                if self.size() > 1 {
                    return Err(Error::invalid_argument(
                        "two distinct values require one of them to be declared positive",
                    ));
                }
                Ok(None)
            }
            Some(value) => match self.index_of(value) {
                Some(index) => Ok(Some(index)),
                None => Err(Error::invalid_argument(format!(
                    "positive value {value:?} is not part of the dictionary"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use crate::types::IndexFormat;

    use super::DictionaryBuilder;

    #[test]
    fn interning_assigns_stable_positive_indices() {
        let builder = DictionaryBuilder::new(IndexFormat::U8);
        let red = builder.intern("red").unwrap();
        let green = builder.intern("green").unwrap();
        assert_eq!(red, 1);
        assert_eq!(green, 2);
        // Interning again answers the existing index.
        assert_eq!(builder.intern("red").unwrap(), 1);
        assert_eq!(builder.size(), 2);
        assert_eq!(builder.lookup(0), None);
        assert_eq!(builder.lookup(1).unwrap().as_str(), "red");
    }

    #[test]
    fn try_intern_signals_overflow_instead_of_growing() {
        let builder = DictionaryBuilder::new(IndexFormat::U2);
        for value in ["a", "b", "c"] {
            builder.intern(value).unwrap();
        }
        assert_eq!(builder.try_intern("d"), None);
        assert!(builder.intern("d").is_err());
        // Existing values still intern fine at the cap.
        assert_eq!(builder.try_intern("b"), Some(2));
        assert_eq!(builder.size(), 3);
    }

    #[test]
    fn concurrent_interning_assigns_each_value_once() {
        let builder = Arc::new(DictionaryBuilder::new(IndexFormat::I32));
        let values: Vec<String> = (0..100).map(|i| format!("value-{i}")).collect();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let builder = builder.clone();
            let values = values.clone();
            handles.push(thread::spawn(move || {
                values
                    .iter()
                    .map(|v| builder.intern(v).unwrap())
                    .collect::<Vec<_>>()
            }));
        }
        let assignments: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // Every thread observed the same index per value.
        for later in &assignments[1..] {
            assert_eq!(&assignments[0], later);
        }
        assert_eq!(builder.size(), 100);
    }

    #[test]
    fn boolean_configuration_is_validated_at_freeze() {
        let builder = DictionaryBuilder::new(IndexFormat::U2);
        builder.intern("yes").unwrap();
        builder.intern("no").unwrap();
        let dictionary = builder.freeze();
        assert_eq!(dictionary.positive_index_for(Some("yes")).unwrap(), Some(1));
        assert_eq!(dictionary.positive_index_for(Some("no")).unwrap(), Some(2));
        assert!(dictionary.positive_index_for(Some("maybe")).is_err());
        // Two values and no positive one is ambiguous.
        assert!(dictionary.positive_index_for(None).is_err());

        let single = DictionaryBuilder::new(IndexFormat::U2);
        single.intern("off").unwrap();
        let single = single.freeze();
        assert_eq!(single.positive_index_for(None).unwrap(), None);
    }
}
