//! Mutable transient vectors which are filled by a producer and then frozen into immutable
//! columns. Freezing hands the backing storage over to the column without copying; afterwards
//! every mutating call and a second freeze answer [`crate::Error::BufferFrozen`].
//!
//! Dense buffers are written at arbitrary positions through `set`. Sparse buffers are written
//! once, in strictly ascending index order, through `set_next`, with all unwritten positions
//! taking a default value.

mod nominal;
mod numeric;
mod object;
mod sparse;
mod temporal;

pub use self::{
    nominal::NominalBuffer,
    numeric::{Int53Buffer, RealBuffer},
    object::{ObjectBuffer, ObjectRef},
    sparse::{SparseDateTimeBuffer, SparseNominalBuffer, SparseRealBuffer, SparseTimeBuffer},
    temporal::{DateTimeBuffer, Instant, TimeBuffer},
};

pub(crate) use self::{nominal::IndexStore, numeric::round_half_up};

use crate::error::{Error, Result};

/// Sentinel marking a missing value in `i64` backed temporal storage.
pub(crate) const MISSING_LONG: i64 = i64::MIN;

/// Smallest epoch second storable in a datetime buffer.
pub const MIN_INSTANT_SECOND: i64 = -31_557_014_167_219_200;

/// Largest epoch second storable in a datetime buffer.
pub const MAX_INSTANT_SECOND: i64 = 31_556_889_864_403_199;

/// Largest legal nanosecond of the day value, one nanosecond before midnight.
pub const MAX_NANO_OF_DAY: i64 = 86_399_999_999_999;

/// Largest legal subsecond nanosecond component of an instant.
pub const MAX_SUBSECOND_NANO: u32 = 999_999_999;

pub(crate) fn check_index(index: usize, size: usize) -> Result<()> {
    if index < size {
        Ok(())
    } else {
        Err(Error::IndexOutOfBounds { index, size })
    }
}
