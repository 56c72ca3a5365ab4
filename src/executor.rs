//! The adaptive scheduler dispatching a [`Calculator`] over a [`Context`]. Depending on the
//! amount of work and the workload hint it runs sequentially on the calling thread, fans out one
//! equally sized partition per core, or covers the row range with fixed size batches pulled by
//! the workers.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use log::debug;
use parking_lot::Mutex;

use crate::{
    calculator::Calculator,
    context::{Context, Task},
    error::{Error, Result},
};

/// Ratio between the batched and the equal parts regime: up to `batch_size * this * parallelism`
/// rows the range is split into one partition per core, above it into fixed size batches.
const THRESHOLD_FACTOR_EQUAL_PARTS: usize = 4;

/// Partition starts are rounded up to this multiple, so that writers of 2 and 4 bit packed
/// nominal indices never share a byte across partitions.
const PARTITION_ALIGNMENT: usize = 4;

/// Hint on the per row cost of a computation, selecting the tuning constants of the scheduler.
/// Cheap per row work (`Huge`) wants large batches to keep the dispatch overhead negligible,
/// expensive per row work (`Small`) wants small batches to keep all cores busy until the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workload {
    Small,
    Medium,
    Default,
    Large,
    Huge,
}

impl Workload {
    /// Rows per core below which dispatching to the pool costs more than it buys and the
    /// computation runs on the calling thread.
    pub(crate) fn threshold_parallel(self) -> usize {
        match self {
            Workload::Small => 1_024,
            Workload::Medium | Workload::Default => 4_096,
            Workload::Large => 16_384,
            Workload::Huge => 65_536,
        }
    }

    /// Rows per batch in the batched regime. A multiple of [`PARTITION_ALIGNMENT`].
    pub(crate) fn batch_size(self) -> usize {
        match self {
            Workload::Small => 1_024,
            Workload::Medium | Workload::Default => 4_096,
            Workload::Large => 16_384,
            Workload::Huge => 65_536,
        }
    }
}

/// Run `calculator` over `context` and assemble its result.
///
/// Progress is reported through `progress` as a fraction in `[0, 1]`, at least once per finished
/// partition. Reports from different worker threads may interleave out of order, but the values
/// reported by any single worker are non decreasing, and `1.0` is never reported for a
/// computation which fails or aborts.
///
/// User code panicking inside [`Calculator::do_part`] surfaces as [`Error::UserCode`] carrying
/// the panic message; a context going inactive as [`Error::Aborted`].
pub fn execute<C, P>(
    mut calculator: C,
    workload: Workload,
    progress: P,
    context: &dyn Context,
) -> Result<C::Output>
where
    C: Calculator,
    P: Fn(f64) + Sync,
{
    if !context.is_active() {
        return Err(Error::Aborted);
    }
    let n = calculator.number_of_operations();
    if n == 0 {
        calculator.init(1);
        run_part(&calculator, 0, 0, 0)?;
        progress(1.0);
        return calculator.into_result();
    }

    let parallelism = context.parallelism().max(1);
    let threshold = workload.threshold_parallel();
    let batch_size = workload.batch_size();
    debug_assert_eq!(batch_size % PARTITION_ALIGNMENT, 0);

    if n < threshold * parallelism {
        debug!("Running {n} operations sequentially (threshold {threshold} x {parallelism}).");
        calculator.init(1);
        run_part(&calculator, 0, n, 0)?;
        progress(1.0);
        return calculator.into_result();
    }

    if n <= batch_size * THRESHOLD_FACTOR_EQUAL_PARTS * parallelism {
        execute_equal_parts(calculator, n, parallelism, progress, context)
    } else {
        execute_batched(calculator, n, batch_size, parallelism, progress, context)
    }
}

/// Mid range regime: one contiguous partition per core, sizes differing by at most the
/// alignment.
fn execute_equal_parts<C, P>(
    mut calculator: C,
    n: usize,
    parallelism: usize,
    progress: P,
    context: &dyn Context,
) -> Result<C::Output>
where
    C: Calculator,
    P: Fn(f64) + Sync,
{
    let num_batches = parallelism.min(n);
    let starts = partition_starts(n, num_batches);
    debug!("Running {n} operations in {num_batches} equal partitions.");
    calculator.init(num_batches);

    let outcome = Outcome::default();
    let rows_done = AtomicUsize::new(0);
    {
        let calculator = &calculator;
        let outcome = &outcome;
        let rows_done = &rows_done;
        let progress = &progress;
        let starts = &starts;
        let tasks: Vec<Task<'_>> = (0..num_batches)
            .map(|batch| {
                Box::new(move || {
                    if outcome.failed() {
                        return Ok(());
                    }
                    if !context.is_active() {
                        outcome.abort();
                        return Ok(());
                    }
                    let (from, to) = (starts[batch], starts[batch + 1]);
                    match run_part(calculator, from, to, batch) {
                        Ok(()) => {
                            let done = rows_done.fetch_add(to - from, Ordering::Relaxed) + (to - from);
                            progress(done as f64 / n as f64);
                        }
                        Err(error) => outcome.fail(error),
                    }
                    Ok(())
                }) as Task<'_>
            })
            .collect();
        let called = context.call(tasks);
        outcome.absorb_call_result(called);
    }
    outcome.into_result()?;
    calculator.into_result()
}

/// Large regime: fixed size batches pulled by the workers until the range is exhausted.
fn execute_batched<C, P>(
    mut calculator: C,
    n: usize,
    batch_size: usize,
    parallelism: usize,
    progress: P,
    context: &dyn Context,
) -> Result<C::Output>
where
    C: Calculator,
    P: Fn(f64) + Sync,
{
    let num_batches = n.div_ceil(batch_size);
    let num_workers = parallelism.min(num_batches);
    debug!("Running {n} operations in {num_batches} batches of {batch_size} rows.");
    calculator.init(num_batches);

    let outcome = Outcome::default();
    let rows_done = AtomicUsize::new(0);
    let next_batch = AtomicUsize::new(0);
    {
        let calculator = &calculator;
        let outcome = &outcome;
        let rows_done = &rows_done;
        let next_batch = &next_batch;
        let progress = &progress;
        let tasks: Vec<Task<'_>> = (0..num_workers)
            .map(|_| {
                Box::new(move || {
                    loop {
                        if outcome.failed() {
                            break;
                        }
                        if !context.is_active() {
                            outcome.abort();
                            break;
                        }
                        let batch = next_batch.fetch_add(1, Ordering::Relaxed);
                        if batch >= num_batches {
                            break;
                        }
                        let from = batch * batch_size;
                        let to = n.min(from + batch_size);
                        debug_assert_eq!(from % PARTITION_ALIGNMENT, 0);
                        match run_part(calculator, from, to, batch) {
                            Ok(()) => {
                                let done =
                                    rows_done.fetch_add(to - from, Ordering::Relaxed) + (to - from);
                                progress(done as f64 / n as f64);
                            }
                            Err(error) => {
                                outcome.fail(error);
                                break;
                            }
                        }
                    }
                    Ok(())
                }) as Task<'_>
            })
            .collect();
        let called = context.call(tasks);
        outcome.absorb_call_result(called);
    }
    outcome.into_result()?;
    calculator.into_result()
}

/// Invoke one `do_part`, turning a panic of user code into an [`Error::UserCode`] carrying the
/// panic message.
fn run_part<C: Calculator>(calculator: &C, from: usize, to: usize, batch_index: usize) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(|| calculator.do_part(from, to, batch_index))) {
        Ok(result) => result,
        Err(payload) => Err(Error::UserCode {
            message: panic_message(payload),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non string payload".to_owned()
    }
}

/// Shared failure state of one parallel run. A recorded error wins over an abort, an abort wins
/// over success.
#[derive(Default)]
struct Outcome {
    stop: AtomicBool,
    aborted: AtomicBool,
    first_error: Mutex<Option<Error>>,
}

impl Outcome {
    /// `true` once a batch failed; workers stop picking up new batches.
    fn failed(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn fail(&self, error: Error) {
        self.first_error.lock().get_or_insert(error);
        self.stop.store(true, Ordering::Relaxed);
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Fold the result of [`Context::call`] into this outcome. A context refusing the work
    /// counts as an abort unless a batch failure is already recorded.
    fn absorb_call_result(&self, called: Result<()>) {
        if let Err(error) = called {
            match error {
                Error::Aborted => self.abort(),
                other => self.fail(other),
            }
        }
    }

    fn into_result(self) -> Result<()> {
        if let Some(error) = self.first_error.into_inner() {
            return Err(error);
        }
        if self.aborted.into_inner() {
            return Err(Error::Aborted);
        }
        Ok(())
    }
}

/// Split `[0, n)` into `num` contiguous partitions whose provisional sizes differ by at most one,
/// the rightmost partitions absorbing the remainder. Every split point except the last is then
/// rounded up to the partition alignment. Answers the `num + 1` partition boundaries.
fn partition_starts(n: usize, num: usize) -> Vec<usize> {
    debug_assert!(num >= 1);
    let base = n / num;
    let remainder = n % num;
    let mut starts = Vec::with_capacity(num + 1);
    starts.push(0);
    let mut position = 0;
    for partition in 0..num {
        position += base + usize::from(partition >= num - remainder);
        let boundary = if partition + 1 == num {
            n
        } else {
            round_up_to_alignment(position).min(n)
        };
        starts.push(boundary);
    }
    starts
}

fn round_up_to_alignment(position: usize) -> usize {
    position.div_ceil(PARTITION_ALIGNMENT) * PARTITION_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::{partition_starts, Workload, PARTITION_ALIGNMENT};

    #[test]
    fn tuning_constants_are_monotone() {
        use Workload::*;
        let thresholds: Vec<usize> = [Small, Medium, Default, Large, Huge]
            .iter()
            .map(|w| w.threshold_parallel())
            .collect();
        assert!(thresholds[0] < thresholds[1]);
        assert!(thresholds[1] <= thresholds[2]);
        assert!(thresholds[2] < thresholds[3]);
        assert!(thresholds[3] < thresholds[4]);
        let batches: Vec<usize> = [Small, Medium, Default, Large, Huge]
            .iter()
            .map(|w| w.batch_size())
            .collect();
        assert!(batches[0] < batches[1]);
        assert!(batches[1] <= batches[2]);
        assert!(batches[2] < batches[3]);
        assert!(batches[3] < batches[4]);
        assert!(batches.iter().all(|b| b % PARTITION_ALIGNMENT == 0));
    }

    #[test]
    fn partitions_cover_the_range_disjointly() {
        for (n, num) in [(20_000, 4), (16_384, 8), (99_991, 7), (12, 3)] {
            let starts = partition_starts(n, num);
            assert_eq!(starts.len(), num + 1);
            assert_eq!(starts[0], 0);
            assert_eq!(*starts.last().unwrap(), n);
            assert!(starts.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn partition_starts_are_aligned() {
        let starts = partition_starts(99_991, 7);
        for &start in &starts[..starts.len() - 1] {
            assert_eq!(start % PARTITION_ALIGNMENT, 0);
        }
    }

    #[test]
    fn partition_sizes_stay_balanced_after_alignment() {
        // Provisional sizes differ by at most one; rounding the boundaries moves each by less
        // than the alignment.
        let starts = partition_starts(100_003, 6);
        let sizes: Vec<usize> = starts.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let min = sizes.iter().min().unwrap();
        let max = sizes.iter().max().unwrap();
        assert!(max - min <= 2 * PARTITION_ALIGNMENT);
    }
}
