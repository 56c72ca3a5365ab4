//! Representative transformations over columns: mapping rows into a new numeric column,
//! filtering rows into an index vector and reducing rows into a single value. Each one is a
//! [`Calculator`] dispatched through [`execute`], so all of them inherit the adaptive
//! parallelism, progress reporting and cancellation of the executor.

use std::cell::UnsafeCell;

use parking_lot::Mutex;

use crate::{
    buffer::round_half_up,
    calculator::Calculator,
    column::Column,
    context::Context,
    error::Result,
    executor::{execute, Workload},
    rows::{CategoricalRow, MixedRow, NumericRow},
    types::ColumnType,
};

/// Fixed length vector writable from several threads at disjoint positions. The executor
/// guarantees disjoint row ranges per partition, which is what makes the unchecked writes below
/// sound.
struct SharedVec<T> {
    data: Box<[UnsafeCell<T>]>,
}

unsafe impl<T: Send> Sync for SharedVec<T> {}

impl<T: Copy> SharedVec<T> {
    fn new(len: usize, fill: T) -> Self {
        SharedVec {
            data: (0..len).map(|_| UnsafeCell::new(fill)).collect(),
        }
    }

    /// # Safety
    ///
    /// No other thread may access `index` concurrently.
    unsafe fn set(&self, index: usize, value: T) {
        *self.data[index].get() = value;
    }

    fn into_vec(self) -> Vec<T> {
        // UnsafeCell is repr(transparent), so the allocation can be reused as is.
        let raw = Box::into_raw(self.data);
        unsafe { Box::from_raw(raw as *mut [T]) }.into_vec()
    }
}

/// Apply `f` to every row of the numeric readable `columns` and collect the results into a new
/// real column.
pub fn map_to_real<F>(
    columns: &[&Column],
    f: F,
    workload: Workload,
    progress: impl Fn(f64) + Sync,
    context: &dyn Context,
) -> Result<Column>
where
    F: Fn(&NumericRow) -> f64 + Sync,
{
    // Validate width, row counts and capabilities before dispatching anything.
    NumericRow::new(columns)?;
    let n = columns[0].size();
    execute(
        MapToReal {
            columns,
            f,
            out: SharedVec::new(n, f64::NAN),
            n,
        },
        workload,
        progress,
        context,
    )
}

struct MapToReal<'a, F> {
    columns: &'a [&'a Column],
    f: F,
    out: SharedVec<f64>,
    n: usize,
}

impl<F> Calculator for MapToReal<'_, F>
where
    F: Fn(&NumericRow) -> f64 + Sync,
{
    type Output = Column;

    fn init(&mut self, _number_of_batches: usize) {}

    fn number_of_operations(&self) -> usize {
        self.n
    }

    fn do_part(&self, from: usize, to: usize, _batch_index: usize) -> Result<()> {
        let view = NumericRow::new(self.columns)?;
        for row in from..to {
            view.move_to(row);
            let value = (self.f)(&view);
            // SAFETY: the executor covers `[0, n)` with disjoint `do_part` ranges, so no other
            // thread writes `row`.
            unsafe { self.out.set(row, value) };
        }
        Ok(())
    }

    fn into_result(self) -> Result<Column> {
        Ok(Column::dense_numeric(ColumnType::Real, self.out.into_vec()))
    }
}

/// Apply `f` to every row of the numeric readable `columns` and collect the results into a new
/// integer column, rounding each one half up.
pub fn map_to_int53<F>(
    columns: &[&Column],
    f: F,
    workload: Workload,
    progress: impl Fn(f64) + Sync,
    context: &dyn Context,
) -> Result<Column>
where
    F: Fn(&NumericRow) -> f64 + Sync,
{
    NumericRow::new(columns)?;
    let n = columns[0].size();
    execute(
        MapToInt53 {
            columns,
            f,
            out: SharedVec::new(n, f64::NAN),
            n,
        },
        workload,
        progress,
        context,
    )
}

struct MapToInt53<'a, F> {
    columns: &'a [&'a Column],
    f: F,
    out: SharedVec<f64>,
    n: usize,
}

impl<F> Calculator for MapToInt53<'_, F>
where
    F: Fn(&NumericRow) -> f64 + Sync,
{
    type Output = Column;

    fn init(&mut self, _number_of_batches: usize) {}

    fn number_of_operations(&self) -> usize {
        self.n
    }

    fn do_part(&self, from: usize, to: usize, _batch_index: usize) -> Result<()> {
        let view = NumericRow::new(self.columns)?;
        for row in from..to {
            view.move_to(row);
            let value = round_half_up((self.f)(&view));
            // SAFETY: the executor covers `[0, n)` with disjoint `do_part` ranges, so no other
            // thread writes `row`.
            unsafe { self.out.set(row, value) };
        }
        Ok(())
    }

    fn into_result(self) -> Result<Column> {
        Ok(Column::dense_numeric(
            ColumnType::Integer53Bit,
            self.out.into_vec(),
        ))
    }
}

/// Apply `f` to the category indices of every row of the nominal `columns` and collect the
/// results into a new real column.
pub fn map_categorical_to_real<F>(
    columns: &[&Column],
    f: F,
    workload: Workload,
    progress: impl Fn(f64) + Sync,
    context: &dyn Context,
) -> Result<Column>
where
    F: Fn(&CategoricalRow) -> f64 + Sync,
{
    CategoricalRow::new(columns)?;
    let n = columns[0].size();
    execute(
        MapCategoricalToReal {
            columns,
            f,
            out: SharedVec::new(n, f64::NAN),
            n,
        },
        workload,
        progress,
        context,
    )
}

struct MapCategoricalToReal<'a, F> {
    columns: &'a [&'a Column],
    f: F,
    out: SharedVec<f64>,
    n: usize,
}

impl<F> Calculator for MapCategoricalToReal<'_, F>
where
    F: Fn(&CategoricalRow) -> f64 + Sync,
{
    type Output = Column;

    fn init(&mut self, _number_of_batches: usize) {}

    fn number_of_operations(&self) -> usize {
        self.n
    }

    fn do_part(&self, from: usize, to: usize, _batch_index: usize) -> Result<()> {
        let view = CategoricalRow::new(self.columns)?;
        for row in from..to {
            view.move_to(row);
            let value = (self.f)(&view);
            // SAFETY: the executor covers `[0, n)` with disjoint `do_part` ranges, so no other
            // thread writes `row`.
            unsafe { self.out.set(row, value) };
        }
        Ok(())
    }

    fn into_result(self) -> Result<Column> {
        Ok(Column::dense_numeric(ColumnType::Real, self.out.into_vec()))
    }
}

/// Collect the indices of all rows for which `predicate` answers `true`, in ascending order.
pub fn filter_rows<F>(
    columns: &[&Column],
    predicate: F,
    workload: Workload,
    progress: impl Fn(f64) + Sync,
    context: &dyn Context,
) -> Result<Vec<usize>>
where
    F: Fn(&MixedRow) -> bool + Sync,
{
    MixedRow::new(columns)?;
    let n = columns[0].size();
    execute(
        FilterRows {
            columns,
            predicate,
            n,
            slots: Mutex::new(Vec::new()),
        },
        workload,
        progress,
        context,
    )
}

struct FilterRows<'a, F> {
    columns: &'a [&'a Column],
    predicate: F,
    n: usize,
    /// One slot per batch, concatenated in batch order so out of order completion cannot scramble
    /// the result.
    slots: Mutex<Vec<Vec<usize>>>,
}

impl<F> Calculator for FilterRows<'_, F>
where
    F: Fn(&MixedRow) -> bool + Sync,
{
    type Output = Vec<usize>;

    fn init(&mut self, number_of_batches: usize) {
        *self.slots.get_mut() = vec![Vec::new(); number_of_batches];
    }

    fn number_of_operations(&self) -> usize {
        self.n
    }

    fn do_part(&self, from: usize, to: usize, batch_index: usize) -> Result<()> {
        let view = MixedRow::new(self.columns)?;
        let mut kept = Vec::new();
        for row in from..to {
            view.move_to(row);
            if (self.predicate)(&view) {
                kept.push(row);
            }
        }
        self.slots.lock()[batch_index] = kept;
        Ok(())
    }

    fn into_result(self) -> Result<Vec<usize>> {
        let slots = self.slots.into_inner();
        let mut kept = Vec::with_capacity(slots.iter().map(Vec::len).sum());
        for slot in slots {
            kept.extend(slot);
        }
        Ok(kept)
    }
}

/// Fold every row of the numeric readable `columns` into an accumulator.
///
/// Each batch folds into its own copy of `identity` through `accumulate`; the per batch results
/// are merged in batch order through `combine` once all batches are done. `combine` therefore
/// only needs to be associative, not commutative.
pub fn reduce_numeric<T, A, M>(
    columns: &[&Column],
    identity: T,
    accumulate: A,
    combine: M,
    workload: Workload,
    progress: impl Fn(f64) + Sync,
    context: &dyn Context,
) -> Result<T>
where
    T: Clone + Send + Sync,
    A: Fn(&mut T, &NumericRow) + Sync,
    M: Fn(&mut T, T) + Sync,
{
    NumericRow::new(columns)?;
    let n = columns[0].size();
    execute(
        ReduceNumeric {
            columns,
            identity,
            accumulate,
            combine,
            n,
            slots: Mutex::new(Vec::new()),
        },
        workload,
        progress,
        context,
    )
}

struct ReduceNumeric<'a, T, A, M> {
    columns: &'a [&'a Column],
    identity: T,
    accumulate: A,
    combine: M,
    n: usize,
    slots: Mutex<Vec<Option<T>>>,
}

impl<T, A, M> Calculator for ReduceNumeric<'_, T, A, M>
where
    T: Clone + Send + Sync,
    A: Fn(&mut T, &NumericRow) + Sync,
    M: Fn(&mut T, T) + Sync,
{
    type Output = T;

    fn init(&mut self, number_of_batches: usize) {
        *self.slots.get_mut() = vec![None; number_of_batches];
    }

    fn number_of_operations(&self) -> usize {
        self.n
    }

    fn do_part(&self, from: usize, to: usize, batch_index: usize) -> Result<()> {
        let view = NumericRow::new(self.columns)?;
        let mut accumulator = self.identity.clone();
        for row in from..to {
            view.move_to(row);
            (self.accumulate)(&mut accumulator, &view);
        }
        self.slots.lock()[batch_index] = Some(accumulator);
        Ok(())
    }

    fn into_result(self) -> Result<T> {
        let mut result = self.identity.clone();
        for slot in self.slots.into_inner().into_iter().flatten() {
            (self.combine)(&mut result, slot);
        }
        Ok(result)
    }
}
