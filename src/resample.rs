use crate::error::TableError;
use crate::timeseries::TimeSeriesTable;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Uniform sampling interval, written as a frequency alias such as `"1H"`,
/// `"6H"`, `"30min"` or `"1D"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TimeStep(Duration);

impl TimeStep {
    pub fn new(duration: Duration) -> Result<Self, TableError> {
        if duration <= Duration::zero() {
            return Err(TableError::Argument {
                reason: format!("time step must be positive, got {duration}"),
            });
        }
        Ok(TimeStep(duration))
    }

    pub fn hours(hours: i64) -> Result<Self, TableError> {
        Self::new(Duration::try_hours(hours).unwrap_or(Duration::zero()))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for TimeStep {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let invalid = || TableError::Argument {
            reason: format!("unrecognised time step '{s}'"),
        };

        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid())?
        };
        let duration = match unit.trim() {
            "D" | "d" => Duration::try_days(count),
            "H" | "h" => Duration::try_hours(count),
            "T" | "min" => Duration::try_minutes(count),
            "S" | "s" => Duration::try_seconds(count),
            _ => None,
        };
        TimeStep::new(duration.ok_or_else(invalid)?)
    }
}

impl TryFrom<String> for TimeStep {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0.num_seconds();
        match seconds {
            s if s % 86_400 == 0 => write!(f, "{}D", s / 86_400),
            s if s % 3_600 == 0 => write!(f, "{}H", s / 3_600),
            s if s % 60 == 0 => write!(f, "{}min", s / 60),
            s => write!(f, "{s}S"),
        }
    }
}

impl TimeSeriesTable {
    /// Resamples onto a uniform grid anchored at midnight of the first day.
    ///
    /// Grid rows between real samples are linearly interpolated in time from
    /// the nearest real neighbours of each column; nothing is extrapolated,
    /// and grid rows left with no data in every column are dropped. The
    /// result is then truncated to the inclusive `start..=end` range.
    pub fn resample(
        &self,
        step: TimeStep,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<TimeSeriesTable, TableError> {
        let (Some(first), Some(last)) = (self.index().first(), self.index().last()) else {
            return Ok(self.clone());
        };
        let grid = uniform_grid(first.date().and_time(NaiveTime::MIN), *last, step);

        let columns: Vec<_> = self
            .series()
            .map(|(key, series)| {
                let knots: Vec<(NaiveDateTime, f64)> = self
                    .index()
                    .iter()
                    .zip(series)
                    .filter_map(|(t, v)| v.map(|v| (*t, v)))
                    .collect();
                let values: Vec<Option<f64>> =
                    grid.iter().map(|t| interpolate_at(&knots, *t)).collect();
                (key.clone(), values)
            })
            .collect();

        let occupied: HashSet<usize> = columns
            .iter()
            .flat_map(|(_, values)| values.iter().enumerate().filter(|(_, v)| v.is_some()))
            .map(|(row, _)| row)
            .collect();
        let rows: Vec<usize> = (0..grid.len()).filter(|row| occupied.contains(row)).collect();

        let index = rows.iter().map(|&row| grid[row]).collect();
        let columns = columns
            .into_iter()
            .map(|(key, values)| (key, rows.iter().map(|&row| values[row]).collect()))
            .collect();

        Ok(TimeSeriesTable::new(index, columns)?.truncate(start, end))
    }
}

fn uniform_grid(origin: NaiveDateTime, last: NaiveDateTime, step: TimeStep) -> Vec<NaiveDateTime> {
    let mut grid = Vec::new();
    let mut t = origin;
    while t <= last {
        grid.push(t);
        match t.checked_add_signed(step.duration()) {
            Some(next) => t = next,
            None => break,
        }
    }
    grid
}

// Time-weighted linear interpolation between the real samples around `at`
fn interpolate_at(knots: &[(NaiveDateTime, f64)], at: NaiveDateTime) -> Option<f64> {
    let upper = knots.partition_point(|(t, _)| *t < at);
    if let Some(&(t, v)) = knots.get(upper) {
        if t == at {
            return Some(v);
        }
    }
    if upper == 0 || upper == knots.len() {
        return None;
    }

    let (t0, v0) = knots[upper - 1];
    let (t1, v1) = knots[upper];
    let span = (t1 - t0).num_milliseconds() as f64;
    let offset = (at - t0).num_milliseconds() as f64;
    Some(v0 + (v1 - v0) * offset / span)
}

/// Export range applied before writing: optional resampling followed by
/// either an inclusive date range or a trailing number of days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportWindow {
    time_step: Option<TimeStep>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    number_of_days: Option<f64>,
}

impl ExportWindow {
    pub fn new(
        time_step: Option<TimeStep>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        number_of_days: Option<f64>,
    ) -> Result<Self, TableError> {
        // zero days means no trailing-day limit
        let number_of_days = number_of_days.filter(|days| *days != 0.0);
        if number_of_days.is_some() && (start.is_some() || end.is_some()) {
            return Err(TableError::Argument {
                reason: "start and end cannot be given together with a number of days".into(),
            });
        }
        Ok(ExportWindow {
            time_step,
            start,
            end,
            number_of_days,
        })
    }

    pub fn time_step(&self) -> Option<TimeStep> {
        self.time_step
    }

    pub fn apply(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable, TableError> {
        let table = match self.time_step {
            Some(step) => table.resample(step, None, None)?,
            None => table.clone(),
        };
        match self.number_of_days {
            Some(days) => table.truncate_last_n_days(days),
            None => Ok(table.truncate(self.start, self.end)),
        }
    }
}
