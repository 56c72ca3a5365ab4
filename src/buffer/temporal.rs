//! Dense buffers for wallclock times and instants. Times are stored as nanoseconds of the day in
//! a single `i64` per position. Instants are stored as epoch seconds plus, for buffers created
//! with subsecond precision, a separate nanosecond component.

use chrono::{NaiveDateTime, NaiveTime, Timelike};

use crate::{
    column::Column,
    error::{Error, Result},
    types::ColumnType,
};

use super::{
    check_index, MAX_INSTANT_SECOND, MAX_NANO_OF_DAY, MAX_SUBSECOND_NANO, MIN_INSTANT_SECOND,
    MISSING_LONG,
};

/// A point on the timeline as stored by datetime columns: seconds since the Unix epoch plus a
/// subsecond nanosecond component in `[0, 999_999_999]`.
///
/// The representable range is wider than what `chrono` can express, so the conversion into a
/// [`NaiveDateTime`] is fallible while the conversion from one is not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    pub epoch_seconds: i64,
    pub nanos: u32,
}

impl Instant {
    pub fn new(epoch_seconds: i64, nanos: u32) -> Result<Self> {
        if !(MIN_INSTANT_SECOND..=MAX_INSTANT_SECOND).contains(&epoch_seconds) {
            return Err(Error::invalid_argument(format!(
                "epoch second {epoch_seconds} is outside of the representable range"
            )));
        }
        if nanos > MAX_SUBSECOND_NANO {
            return Err(Error::invalid_argument(format!(
                "subsecond nanoseconds must be at most {MAX_SUBSECOND_NANO}, got {nanos}"
            )));
        }
        Ok(Instant {
            epoch_seconds,
            nanos,
        })
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        let utc = datetime.and_utc();
        Instant {
            epoch_seconds: utc.timestamp(),
            nanos: utc.timestamp_subsec_nanos().min(MAX_SUBSECOND_NANO),
        }
    }

    /// `None` if the instant lies outside of the range `chrono` can represent.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp(self.epoch_seconds, self.nanos)
            .map(|utc| utc.naive_utc())
    }
}

/// Mutable fixed length vector of nanosecond of the day values, the predecessor of a
/// [`ColumnType::Time`] column.
#[derive(Debug)]
pub struct TimeBuffer {
    size: usize,
    data: Option<Vec<i64>>,
}

impl TimeBuffer {
    pub fn new(size: usize, initialize: bool) -> Self {
        let fill = if initialize { MISSING_LONG } else { 0 };
        TimeBuffer {
            size,
            data: Some(vec![fill; size]),
        }
    }

    /// A mutable copy of the values of a time column.
    pub fn from_column(column: &Column) -> Result<Self> {
        if column.column_type() != ColumnType::Time {
            return Err(Error::ColumnTypeMismatch {
                requested: ColumnType::Time,
                actual: column.column_type(),
            });
        }
        let data = (0..column.size()).map(|row| column.long_at(row)).collect();
        Ok(TimeBuffer {
            size: column.size(),
            data: Some(data),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, index: usize) -> Result<Option<i64>> {
        let data = self.data.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        let raw = data[index];
        Ok(if raw == MISSING_LONG { None } else { Some(raw) })
    }

    /// Store `value` nanoseconds of the day at `index`, or a missing value for `None`.
    pub fn set(&mut self, index: usize, value: Option<i64>) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        data[index] = match value {
            None => MISSING_LONG,
            Some(nanos) => {
                check_nano_of_day(nanos)?;
                nanos
            }
        };
        Ok(())
    }

    pub fn set_time(&mut self, index: usize, value: Option<NaiveTime>) -> Result<()> {
        self.set(index, value.map(nanos_of_day))
    }

    pub fn to_column(&mut self) -> Result<Column> {
        let data = self.data.take().ok_or(Error::BufferFrozen)?;
        Ok(Column::dense_long(ColumnType::Time, data))
    }
}

/// Mutable fixed length vector of instants, the predecessor of a [`ColumnType::DateTime`]
/// column. Created either with second precision or, via [`DateTimeBuffer::with_subsecond`], with
/// an additional nanosecond component per position.
#[derive(Debug)]
pub struct DateTimeBuffer {
    size: usize,
    seconds: Option<Vec<i64>>,
    nanos: Option<Vec<i32>>,
}

impl DateTimeBuffer {
    /// A buffer storing instants with second precision. Subsecond components of set values are
    /// discarded.
    pub fn new(size: usize, initialize: bool) -> Self {
        let fill = if initialize { MISSING_LONG } else { 0 };
        DateTimeBuffer {
            size,
            seconds: Some(vec![fill; size]),
            nanos: None,
        }
    }

    /// A buffer storing instants with nanosecond precision.
    pub fn with_subsecond(size: usize, initialize: bool) -> Self {
        let fill = if initialize { MISSING_LONG } else { 0 };
        DateTimeBuffer {
            size,
            seconds: Some(vec![fill; size]),
            nanos: Some(vec![0; size]),
        }
    }

    /// A mutable copy of the values of a datetime column, keeping its precision.
    pub fn from_column(column: &Column) -> Result<Self> {
        if column.column_type() != ColumnType::DateTime {
            return Err(Error::ColumnTypeMismatch {
                requested: ColumnType::DateTime,
                actual: column.column_type(),
            });
        }
        let size = column.size();
        let seconds = (0..size).map(|row| column.long_at(row)).collect();
        let nanos = column
            .has_subsecond_precision()
            .then(|| (0..size).map(|row| column.nano_at(row)).collect());
        Ok(DateTimeBuffer {
            size,
            seconds: Some(seconds),
            nanos,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn has_subsecond_precision(&self) -> bool {
        self.nanos.is_some()
    }

    pub fn get(&self, index: usize) -> Result<Option<Instant>> {
        let seconds = self.seconds.as_ref().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        if seconds[index] == MISSING_LONG {
            return Ok(None);
        }
        let nanos = match &self.nanos {
            Some(nanos) => nanos[index] as u32,
            None => 0,
        };
        Ok(Some(Instant {
            epoch_seconds: seconds[index],
            nanos,
        }))
    }

    /// Store an instant at `index`, or a missing value for `None`. For buffers with second
    /// precision the subsecond component is discarded.
    pub fn set(&mut self, index: usize, value: Option<Instant>) -> Result<()> {
        let seconds = self.seconds.as_mut().ok_or(Error::BufferFrozen)?;
        check_index(index, self.size)?;
        match value {
            None => {
                seconds[index] = MISSING_LONG;
                if let Some(nanos) = &mut self.nanos {
                    nanos[index] = 0;
                }
            }
            Some(instant) => {
                check_instant(instant)?;
                seconds[index] = instant.epoch_seconds;
                if let Some(nanos) = &mut self.nanos {
                    nanos[index] = instant.nanos as i32;
                }
            }
        }
        Ok(())
    }

    /// Store seconds and nanoseconds given separately, validating both components.
    pub fn set_instant(&mut self, index: usize, epoch_seconds: i64, nanos: u32) -> Result<()> {
        self.set(index, Some(Instant::new(epoch_seconds, nanos)?))
    }

    pub fn set_datetime(&mut self, index: usize, value: Option<NaiveDateTime>) -> Result<()> {
        self.set(index, value.map(Instant::from_datetime))
    }

    pub fn to_column(&mut self) -> Result<Column> {
        let seconds = self.seconds.take().ok_or(Error::BufferFrozen)?;
        Ok(match self.nanos.take() {
            Some(nanos) => Column::dense_date_time_nano(seconds, nanos),
            None => Column::dense_long(ColumnType::DateTime, seconds),
        })
    }
}

pub(crate) fn nanos_of_day(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * 1_000_000_000
        + (time.nanosecond().min(MAX_SUBSECOND_NANO)) as i64
}

pub(crate) fn check_nano_of_day(nanos: i64) -> Result<()> {
    if (0..=MAX_NANO_OF_DAY).contains(&nanos) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "nanoseconds of the day must lie in [0, {MAX_NANO_OF_DAY}], got {nanos}"
        )))
    }
}

pub(crate) fn check_instant(instant: Instant) -> Result<()> {
    Instant::new(instant.epoch_seconds, instant.nanos).map(|_| ())
}
