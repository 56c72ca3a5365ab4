//! End to end tests of the adaptive executor and the transformations built on top of it:
//! partitioning invariants, workload tuning, progress, cancellation and failure propagation.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use girder::{
    execute, transform, Calculator, ColumnType, Error, ObjectBuffer, RealBuffer, Result,
    SequentialContext, ThreadPoolContext, Workload,
};

/// Records every interaction the executor has with a calculator.
struct Recording {
    operations: usize,
    batches: Option<usize>,
    parts: Mutex<Vec<(usize, usize, usize)>>,
    /// Panic while processing this batch index, if set.
    panic_in_batch: Option<usize>,
}

impl Recording {
    fn new(operations: usize) -> Self {
        Recording {
            operations,
            batches: None,
            parts: Mutex::new(Vec::new()),
            panic_in_batch: None,
        }
    }

    fn panicking(operations: usize, batch: usize) -> Self {
        Recording {
            panic_in_batch: Some(batch),
            ..Recording::new(operations)
        }
    }
}

impl Calculator for Recording {
    type Output = (usize, Vec<(usize, usize, usize)>);

    fn init(&mut self, number_of_batches: usize) {
        assert!(self.batches.is_none(), "init must be called exactly once");
        self.batches = Some(number_of_batches);
    }

    fn number_of_operations(&self) -> usize {
        self.operations
    }

    fn do_part(&self, from: usize, to: usize, batch_index: usize) -> Result<()> {
        if self.panic_in_batch == Some(batch_index) {
            panic!("boom in batch {batch_index}");
        }
        self.parts.lock().unwrap().push((from, to, batch_index));
        Ok(())
    }

    fn into_result(self) -> Result<Self::Output> {
        Ok((
            self.batches.expect("init must have been called"),
            self.parts.into_inner().unwrap(),
        ))
    }
}

/// The ranges must cover `[0, n)` without gap or overlap, batch indices must be contiguous and
/// every start of a non empty range must be aligned.
fn assert_disjoint_cover(n: usize, batches: usize, parts: &[(usize, usize, usize)]) {
    assert_eq!(batches, parts.len());

    let mut indices: Vec<usize> = parts.iter().map(|&(_, _, batch)| batch).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..parts.len()).collect::<Vec<_>>());

    let mut ranges: Vec<(usize, usize)> = parts.iter().map(|&(from, to, _)| (from, to)).collect();
    ranges.sort_unstable();
    let mut position = 0;
    for (from, to) in ranges {
        assert_eq!(from, position, "ranges must not leave gaps or overlap");
        assert!(to >= from);
        if from < to && n >= 4 {
            assert_eq!(from % 4, 0, "start of a non empty range must be aligned");
        }
        position = to;
    }
    assert_eq!(position, n);
}

#[test]
fn empty_calculator_still_runs_one_batch() {
    let context = SequentialContext::new();
    let progress_calls = Mutex::new(Vec::new());
    let (batches, parts) = execute(
        Recording::new(0),
        Workload::Small,
        |p| progress_calls.lock().unwrap().push(p),
        &context,
    )
    .unwrap();

    assert_eq!(batches, 1);
    assert_eq!(parts, [(0, 0, 0)]);
    for &p in progress_calls.lock().unwrap().iter() {
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn small_inputs_run_sequentially_in_one_part() {
    let context = ThreadPoolContext::new(4).unwrap();
    let (batches, parts) = execute(Recording::new(100), Workload::Small, |_| (), &context).unwrap();
    assert_eq!(batches, 1);
    assert_eq!(parts, [(0, 100, 0)]);
}

#[test]
fn mid_range_inputs_run_in_one_partition_per_core() {
    let context = ThreadPoolContext::new(4).unwrap();
    // Above the parallel threshold, at the upper end of the equal parts regime:
    // batch_size(Default) * factor * parallelism.
    let n = 4_096 * 4 * 4;
    let (batches, parts) = execute(Recording::new(n), Workload::Default, |_| (), &context).unwrap();
    assert_eq!(batches, 4);
    assert_disjoint_cover(n, batches, &parts);
}

#[test]
fn huge_workload_covers_the_range_in_contiguous_batches() {
    let parallelism = 2;
    let context = ThreadPoolContext::new(parallelism).unwrap();
    let n = 65_536 * parallelism * 3 + 11;
    let (batches, parts) =
        execute(Recording::new(n), Workload::Huge, |_| (), &context).unwrap();
    assert_disjoint_cover(n, batches, &parts);
}

#[test]
fn batched_mode_dispatches_fixed_size_batches() {
    let parallelism = 2;
    let context = ThreadPoolContext::new(parallelism).unwrap();
    // Past the equal parts regime for Huge: batch_size * factor * parallelism.
    let n = 65_536 * 4 * parallelism + 11;
    let (batches, parts) =
        execute(Recording::new(n), Workload::Huge, |_| (), &context).unwrap();

    assert_eq!(batches, n.div_ceil(65_536));
    assert_disjoint_cover(n, batches, &parts);
    for &(from, to, batch) in &parts {
        assert_eq!(from, batch * 65_536);
        assert_eq!(to, ((batch + 1) * 65_536).min(n));
    }
}

#[test]
fn heavier_workloads_use_fewer_larger_batches() {
    let context = SequentialContext::new();
    // Large enough to force batched mode for every workload at parallelism one.
    let n = 65_536 * 4 + 4;
    let mut batch_counts = Vec::new();
    for workload in [Workload::Small, Workload::Medium, Workload::Large, Workload::Huge] {
        let (batches, parts) = execute(Recording::new(n), workload, |_| (), &context).unwrap();
        assert_disjoint_cover(n, batches, &parts);
        batch_counts.push(batches);
    }
    assert!(batch_counts.windows(2).all(|pair| pair[0] > pair[1]));
}

#[test]
fn inactive_context_aborts_before_any_work() {
    let context = SequentialContext::new();
    context.deactivate();
    let progress_count = AtomicUsize::new(0);
    let result = execute(
        Recording::new(1000),
        Workload::Small,
        |_| {
            progress_count.fetch_add(1, Ordering::Relaxed);
        },
        &context,
    );
    assert!(matches!(result, Err(Error::Aborted)));
    assert_eq!(progress_count.load(Ordering::Relaxed), 0);
}

#[test]
fn deactivation_mid_run_aborts_without_reporting_completion() {
    let context = ThreadPoolContext::new(4).unwrap();
    let max_progress = Mutex::new(0.0f64);
    // Plenty of small batches; deactivate as soon as the first one finishes.
    let n = 1_024 * 4 * 4 * 10;
    let result = execute(
        Recording::new(n),
        Workload::Small,
        |p| {
            let mut max = max_progress.lock().unwrap();
            if p > *max {
                *max = p;
            }
            context.deactivate();
        },
        &context,
    );
    assert!(matches!(result, Err(Error::Aborted)));
    assert!(*max_progress.lock().unwrap() < 1.0);
}

#[test]
fn panicking_user_code_surfaces_as_user_code_failure() {
    let context = ThreadPoolContext::new(2).unwrap();
    let n = 1_024 * 2 * 4 * 8;
    let result = execute(
        Recording::panicking(n, 1),
        Workload::Small,
        |_| (),
        &context,
    );
    match result {
        Err(Error::UserCode { message }) => assert!(message.contains("boom in batch 1")),
        other => panic!("expected a user code failure, got {other:?}"),
    }
}

#[test]
fn sequential_panics_are_reported_the_same_way() {
    let context = SequentialContext::new();
    let result = execute(Recording::panicking(10, 0), Workload::Small, |_| (), &context);
    assert!(matches!(result, Err(Error::UserCode { .. })));
}

fn ascending_column(n: usize) -> girder::Column {
    let mut buffer = RealBuffer::new(n, false);
    for index in 0..n {
        buffer.set(index, index as f64).unwrap();
    }
    buffer.to_column().unwrap()
}

#[test]
fn map_builds_a_new_column_in_parallel() {
    let context = ThreadPoolContext::new(4).unwrap();
    let n = 100_000;
    let column = ascending_column(n);

    let doubled = transform::map_to_real(
        &[&column],
        |row| row.get(0) * 2.0,
        Workload::Small,
        |_| (),
        &context,
    )
    .unwrap();

    assert_eq!(doubled.column_type(), ColumnType::Real);
    assert_eq!(doubled.size(), n);
    let mut values = vec![0.0; n];
    doubled.fill_numeric(&mut values, 0).unwrap();
    assert!(values
        .iter()
        .enumerate()
        .all(|(index, &value)| value == index as f64 * 2.0));
}

#[test]
fn map_reports_full_progress_on_success() {
    let context = ThreadPoolContext::new(4).unwrap();
    let column = ascending_column(100_000);
    let max_progress = Mutex::new(0.0f64);
    transform::map_to_real(
        &[&column],
        |row| row.get(0),
        Workload::Small,
        |p| {
            let mut max = max_progress.lock().unwrap();
            if p > *max {
                *max = p;
            }
        },
        &context,
    )
    .unwrap();
    assert_eq!(*max_progress.lock().unwrap(), 1.0);
}

#[test]
fn map_to_int53_rounds_every_result() {
    let context = SequentialContext::new();
    let column = ascending_column(4);

    let halves = transform::map_to_int53(
        &[&column],
        |row| row.get(0) + 0.5,
        Workload::Default,
        |_| (),
        &context,
    )
    .unwrap();

    assert_eq!(halves.column_type(), ColumnType::Integer53Bit);
    let mut values = vec![0.0; 4];
    halves.fill_numeric(&mut values, 0).unwrap();
    assert_eq!(values, [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn categorical_map_reads_category_indices() {
    let context = ThreadPoolContext::new(2).unwrap();
    let n = 30_000;
    let mut buffer = girder::NominalBuffer::new(girder::IndexFormat::U4, n);
    let categories = ["red", "green", "blue"];
    for index in 0..n {
        buffer.set(index, Some(categories[index % 3])).unwrap();
    }
    let column = buffer.to_column().unwrap();

    let indices = transform::map_categorical_to_real(
        &[&column],
        |row| row.get(0) as f64,
        Workload::Small,
        |_| (),
        &context,
    )
    .unwrap();

    let mut values = vec![0.0; n];
    indices.fill_numeric(&mut values, 0).unwrap();
    assert!(values
        .iter()
        .enumerate()
        .all(|(index, &value)| value == (index % 3 + 1) as f64));

    // Categorical views are only defined over nominal columns.
    let numeric = ascending_column(4);
    let result = transform::map_categorical_to_real(
        &[&numeric],
        |row| row.get(0) as f64,
        Workload::Default,
        |_| (),
        &context,
    );
    assert!(matches!(result, Err(Error::ColumnTypeMismatch { .. })));
}

#[test]
fn filter_keeps_matching_rows_in_ascending_order() {
    let context = ThreadPoolContext::new(4).unwrap();
    let n = 50_000;
    let column = ascending_column(n);

    let kept = transform::filter_rows(
        &[&column],
        |row| row.get_numeric(0).unwrap() % 7.0 == 0.0,
        Workload::Small,
        |_| (),
        &context,
    )
    .unwrap();

    let expected: Vec<usize> = (0..n).filter(|index| index % 7 == 0).collect();
    assert_eq!(kept, expected);
}

#[test]
fn reduce_combines_batches_in_order() {
    let context = ThreadPoolContext::new(4).unwrap();
    let n = 50_000;
    let column = ascending_column(n);

    let sum = transform::reduce_numeric(
        &[&column],
        0.0f64,
        |acc, row| *acc += row.get(0),
        |acc, other| *acc += other,
        Workload::Small,
        |_| (),
        &context,
    )
    .unwrap();

    let expected = (n as f64 - 1.0) * n as f64 / 2.0;
    assert_eq!(sum, expected);
}

#[test]
fn transforms_check_capabilities_up_front() {
    let context = SequentialContext::new();
    let mut text = ObjectBuffer::new(ColumnType::Text, 3).unwrap();
    text.set_string(0, Some("a")).unwrap();
    let text = text.to_column().unwrap();

    let result = transform::map_to_real(&[&text], |row| row.get(0), Workload::Default, |_| (), &context);
    assert!(matches!(result, Err(Error::UnsupportedCapability { .. })));

    // Mismatched row counts are rejected as well.
    let short = ascending_column(2);
    let long = ascending_column(3);
    let result = transform::map_to_real(
        &[&short, &long],
        |row| row.get(0) + row.get(1),
        Workload::Default,
        |_| (),
        &context,
    );
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}

#[test]
fn mixed_rows_expose_all_read_paths() {
    let context = SequentialContext::new();
    let numeric = ascending_column(4);
    let mut nominal = girder::NominalBuffer::new(girder::IndexFormat::U8, 4);
    for (index, value) in [Some("a"), None, Some("b"), Some("a")].iter().enumerate() {
        nominal.set(index, *value).unwrap();
    }
    let nominal = nominal.to_column().unwrap();

    let kept = transform::filter_rows(
        &[&numeric, &nominal],
        |row| {
            let value = row.get_numeric(0).unwrap();
            let category = row.get_index(1).unwrap();
            let object = row.get_object_as::<String>(1).unwrap();
            assert_eq!(object.is_some(), category != 0);
            value >= 2.0 || category == 1
        },
        Workload::Default,
        |_| (),
        &context,
    )
    .unwrap();

    assert_eq!(kept, [0, 2, 3]);
}
