//! Tags describing the logical element type of a column and the physical width used to store
//! dictionary indices.

/// Broad classification of a column type, deciding which row views can iterate it natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Element values are `f64`, missing values are `NaN`.
    Numeric,
    /// Element values are dictionary indices into a set of distinct values.
    Categorical,
    /// Element values are heap objects, missing values are `None`.
    Object,
}

/// A single way of reading a column. Types support a subset of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The column can be read as `f64` values.
    NumericReadable,
    /// The column can be read as objects.
    ObjectReadable,
    /// Elements have a total order.
    Sortable,
}

/// Tag of the logical element type of a column or buffer. The tags are process wide constants,
/// there is one column type per logical element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 64 bit floating point values.
    Real,
    /// Integer values stored as `f64`. Values set into such a buffer are rounded half up towards
    /// positive infinity. The name refers to the 53 bit significand which bounds the contiguous
    /// integer range.
    Integer53Bit,
    /// Categorical string values, stored as dictionary indices.
    Nominal,
    /// An instant given as seconds since the epoch plus a subsecond nanosecond component.
    DateTime,
    /// Wallclock time of day, stored as nanoseconds since midnight.
    Time,
    /// Free form text, stored as objects without a dictionary.
    Text,
    /// Sets of distinct strings.
    TextSet,
    /// Lists of strings, duplicates allowed.
    TextList,
    /// User defined objects. Readable only as objects, carries no order.
    Custom,
}

impl ColumnType {
    pub fn category(self) -> Category {
        match self {
            ColumnType::Real | ColumnType::Integer53Bit => Category::Numeric,
            ColumnType::Nominal => Category::Categorical,
            ColumnType::DateTime
            | ColumnType::Time
            | ColumnType::Text
            | ColumnType::TextSet
            | ColumnType::TextList
            | ColumnType::Custom => Category::Object,
        }
    }

    pub fn has_capability(self, capability: Capability) -> bool {
        match capability {
            Capability::NumericReadable => matches!(
                self,
                ColumnType::Real | ColumnType::Integer53Bit | ColumnType::Nominal | ColumnType::Time
            ),
            Capability::ObjectReadable => !matches!(self, ColumnType::Real | ColumnType::Integer53Bit),
            Capability::Sortable => !matches!(
                self,
                ColumnType::TextSet | ColumnType::TextList | ColumnType::Custom
            ),
        }
    }

    pub fn is_numeric_readable(self) -> bool {
        self.has_capability(Capability::NumericReadable)
    }

    pub fn is_object_readable(self) -> bool {
        self.has_capability(Capability::ObjectReadable)
    }

    pub fn is_sortable(self) -> bool {
        self.has_capability(Capability::Sortable)
    }

    /// `true` if values of this type are already integers when read numerically. Copying from such
    /// a column into an integer buffer must not round again, since e.g. category indices and
    /// nanoseconds of the day are exact.
    pub(crate) fn is_integer_valued(self) -> bool {
        matches!(
            self,
            ColumnType::Integer53Bit | ColumnType::Time | ColumnType::Nominal
        )
    }
}

/// Physical width used to store one dictionary index. Determines the maximal dictionary
/// cardinality of a nominal column and the packing of indices in memory. [`IndexFormat::U2`] and
/// [`IndexFormat::U4`] pack four respectively two indices into a single byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexFormat {
    U2,
    U4,
    U8,
    U16,
    I32,
}

impl IndexFormat {
    /// The largest index storable in this format. Index `0` is reserved for missing values, so
    /// the maximal number of distinct values is also `max_value()`.
    pub fn max_value(self) -> usize {
        match self {
            IndexFormat::U2 => 3,
            IndexFormat::U4 => 15,
            IndexFormat::U8 => u8::MAX as usize,
            IndexFormat::U16 => u16::MAX as usize,
            IndexFormat::I32 => i32::MAX as usize,
        }
    }

    /// The smallest format able to store `max_index`.
    pub fn smallest_for(max_index: usize) -> IndexFormat {
        match max_index {
            0..=3 => IndexFormat::U2,
            4..=15 => IndexFormat::U4,
            16..=255 => IndexFormat::U8,
            256..=65535 => IndexFormat::U16,
            _ => IndexFormat::I32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_follow_categories() {
        assert_eq!(ColumnType::Real.category(), Category::Numeric);
        assert_eq!(ColumnType::Nominal.category(), Category::Categorical);
        assert_eq!(ColumnType::DateTime.category(), Category::Object);
        assert!(ColumnType::Real.is_numeric_readable());
        assert!(!ColumnType::Real.is_object_readable());
        assert!(ColumnType::Nominal.is_numeric_readable());
        assert!(ColumnType::Nominal.is_object_readable());
        assert!(ColumnType::Time.is_numeric_readable());
        assert!(!ColumnType::DateTime.is_numeric_readable());
        assert!(!ColumnType::Custom.is_sortable());
    }

    #[test]
    fn smallest_format_fits_max_index() {
        assert_eq!(IndexFormat::smallest_for(0), IndexFormat::U2);
        assert_eq!(IndexFormat::smallest_for(3), IndexFormat::U2);
        assert_eq!(IndexFormat::smallest_for(4), IndexFormat::U4);
        assert_eq!(IndexFormat::smallest_for(16), IndexFormat::U8);
        assert_eq!(IndexFormat::smallest_for(255), IndexFormat::U8);
        assert_eq!(IndexFormat::smallest_for(256), IndexFormat::U16);
        assert_eq!(IndexFormat::smallest_for(70000), IndexFormat::I32);
    }
}
