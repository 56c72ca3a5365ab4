//! Columnar, immutable in-memory tables for analytical workloads.
//!
//! Data lives in typed, fixed length [`Column`]s. A column is created by filling a transient
//! buffer and freezing it; from then on it never changes and can be shared freely between
//! threads. Nominal (categorical) columns intern their distinct values into a [`Dictionary`] and
//! store only compact indices, packed down to two bits per value for low cardinalities.
//!
//! Transformations over columns are expressed as [`Calculator`]s and dispatched through
//! [`execute`], an adaptive scheduler which picks between sequential execution, one partition
//! per core and fine grained batching based on the amount of work and a [`Workload`] hint. The
//! [`transform`] module offers ready made map, filter and reduce calculators over [row
//! views](NumericRow).
//!
//! ```
//! use girder::{transform, RealBuffer, SequentialContext, Workload};
//!
//! let mut buffer = RealBuffer::new(4, true);
//! for (index, value) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
//!     buffer.set(index, *value).unwrap();
//! }
//! let column = buffer.to_column().unwrap();
//!
//! let context = SequentialContext::new();
//! let doubled = transform::map_to_real(
//!     &[&column],
//!     |row| row.get(0) * 2.0,
//!     Workload::Default,
//!     |_progress| (),
//!     &context,
//! )
//! .unwrap();
//! let mut values = vec![0.0; 4];
//! doubled.fill_numeric(&mut values, 0).unwrap();
//! assert_eq!(values, [2.0, 4.0, 6.0, 8.0]);
//! ```

mod buffer;
mod calculator;
mod chunked;
mod column;
mod context;
mod dictionary;
mod error;
mod executor;
pub mod packed;
mod rows;
pub mod transform;
mod types;

pub use buffer::{
    DateTimeBuffer, Instant, Int53Buffer, NominalBuffer, ObjectBuffer, ObjectRef, RealBuffer,
    SparseDateTimeBuffer, SparseNominalBuffer, SparseRealBuffer, SparseTimeBuffer, TimeBuffer,
    MAX_INSTANT_SECOND, MAX_NANO_OF_DAY, MAX_SUBSECOND_NANO, MIN_INSTANT_SECOND,
};
pub use calculator::Calculator;
pub use column::Column;
pub use context::{Context, SequentialContext, Task, ThreadPoolContext};
pub use dictionary::{Dictionary, DictionaryBuilder};
pub use error::{Error, Result};
pub use executor::{execute, Workload};
pub use rows::{CategoricalRow, MixedRow, NumericRow};
pub use types::{Capability, Category, ColumnType, IndexFormat};
