use thiserror::Error;

use crate::types::{Capability, ColumnType, IndexFormat};

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways operations of this crate can fail. Callers which want to react to a specific
/// failure match on the variant rather than inspecting messages.
#[derive(Debug, Error)]
pub enum Error {
    /// A rejected configuration, e.g. a negative category count, an out of range nanosecond
    /// component or a boolean column with more than two categories.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    /// Access outside of `[0, size)` of a buffer or column.
    #[error("index {index} is out of bounds for length {size}")]
    IndexOutOfBounds { index: usize, size: usize },
    /// Sparse buffers must be filled in strictly ascending index order.
    #[error("sparse index {index} must be larger than the previously written index {previous}")]
    NonMonotonicSparseIndex { index: usize, previous: usize },
    /// The buffer has already been frozen into a column and can no longer be used.
    #[error("buffer has already been frozen into a column")]
    BufferFrozen,
    /// A new distinct value would require an index past what the index format can store.
    #[error("no free index left for a new distinct value in format {format:?}")]
    Overflow { format: IndexFormat },
    /// An operation was requested which the type of the column does not support, e.g. reading an
    /// object column numerically.
    #[error("column of type {column_type:?} does not provide the {capability:?} capability")]
    UnsupportedCapability {
        column_type: ColumnType,
        capability: Capability,
    },
    /// A column is used as the source for a buffer with an incompatible element type.
    #[error("column of type {actual:?} cannot be copied into a buffer of type {requested:?}")]
    ColumnTypeMismatch {
        requested: ColumnType,
        actual: ColumnType,
    },
    /// The execution context went inactive, or refused to accept further work, before the
    /// computation finished.
    #[error("computation has been aborted")]
    Aborted,
    /// User supplied code panicked inside a parallel computation. The panic message is preserved.
    #[error("user code failed during a parallel computation: {message}")]
    UserCode { message: String },
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`] with a formatted reason.
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }
}
