//! The uniform contract between a transformation and the parallel executor.

use crate::error::Result;

/// A unit of work over a row range `[0, number_of_operations())`, dispatched by
/// [`crate::executor::execute`].
///
/// The executor calls [`Calculator::init`] exactly once with the precise number of batches it is
/// going to use, then covers the row range with [`Calculator::do_part`] calls such that every row
/// is processed exactly once, and finally collects the result. `do_part` calls may arrive in any
/// order and from any thread, with `batch_index` values `0..number_of_batches` unique per call.
///
/// Implementations must tolerate out of order batch completion. A reduction which is not
/// commutative has to keep one slot per `batch_index` and combine the slots in batch order when
/// the result is assembled, rather than folding into a live accumulator.
pub trait Calculator: Sync {
    /// The assembled result, e.g. a column, a reduced value or a row index vector.
    type Output;

    /// Called exactly once before any [`Calculator::do_part`], with the number of batches the
    /// executor will actually use.
    fn init(&mut self, number_of_batches: usize);

    /// Total number of rows to process.
    fn number_of_operations(&self) -> usize;

    /// Process the rows `[from, to)` as batch `batch_index`.
    fn do_part(&self, from: usize, to: usize, batch_index: usize) -> Result<()>;

    /// Assemble the final result. Called once, after every `do_part` has returned.
    fn into_result(self) -> Result<Self::Output>
    where
        Self: Sized;
}
