use crate::error::{ShapeError, TableError};
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const PROFILE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Location of a series: river, reach and either a node or a cross section
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub river: String,
    pub reach: String,
    pub location: String,
}

impl EntityKey {
    pub fn new(river: &str, reach: &str, location: &str) -> Self {
        EntityKey {
            river: river.trim().to_string(),
            reach: reach.trim().to_string(),
            location: location.trim().to_string(),
        }
    }

    pub fn with_location(&self, location: &str) -> Self {
        EntityKey::new(&self.river, &self.reach, location)
    }

    pub fn same_reach(&self, other: &EntityKey) -> bool {
        self.river == other.river && self.reach == other.reach
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.river, self.reach, self.location)
    }
}

// Physical quantity tag discovered from the input header
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(String);

impl Variable {
    pub const ELEVATION: &'static str = "Elev";
    pub const FLOW: &'static str = "Flow";

    pub fn new(name: &str) -> Self {
        Variable(name.trim().to_string())
    }

    pub fn elevation() -> Self {
        Variable::new(Self::ELEVATION)
    }

    pub fn flow() -> Self {
        Variable::new(Self::FLOW)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub entity: EntityKey,
    pub variable: Variable,
}

impl ColumnKey {
    pub fn new(entity: EntityKey, variable: Variable) -> Self {
        ColumnKey { entity, variable }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.variable)
    }
}

/// Multi-keyed time series: one strictly increasing row index shared by
/// every `(EntityKey, Variable)` column. `None` cells carry no data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    index: Vec<NaiveDateTime>,
    columns: Vec<ColumnKey>,
    values: Vec<Vec<Option<f64>>>,
}

impl TimeSeriesTable {
    /// Builds a table, checking row order, column lengths, column
    /// uniqueness and the rectangular entity × variable schema.
    pub fn new(
        index: Vec<NaiveDateTime>,
        columns: Vec<(ColumnKey, Vec<Option<f64>>)>,
    ) -> Result<Self, TableError> {
        if let Some(position) = index.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(TableError::UnsortedIndex {
                position: position + 1,
            });
        }

        let mut seen = HashSet::new();
        for (key, series) in &columns {
            if series.len() != index.len() {
                return Err(TableError::LengthMismatch {
                    column: key.to_string(),
                    expected: index.len(),
                    got: series.len(),
                });
            }
            if !seen.insert(key) {
                return Err(TableError::DuplicateColumn {
                    column: key.to_string(),
                });
            }
        }

        check_rectangular(columns.iter().map(|(key, _)| key))?;

        let (columns, values) = columns.into_iter().unzip();
        Ok(TimeSeriesTable {
            index,
            columns,
            values,
        })
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn series(&self) -> impl Iterator<Item = (&ColumnKey, &[Option<f64>])> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(key, series)| (key, series.as_slice()))
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|candidate| candidate == key)
            .map(|i| self.values[i].as_slice())
    }

    // Distinct entities in column order
    pub fn entity_keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = Vec::new();
        for column in &self.columns {
            if !keys.contains(&column.entity) {
                keys.push(column.entity.clone());
            }
        }
        keys
    }

    // Distinct variables in column order
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables: Vec<Variable> = Vec::new();
        for column in &self.columns {
            if !variables.contains(&column.variable) {
                variables.push(column.variable.clone());
            }
        }
        variables
    }

    /// Union-combines two tables into a new one. Rows are the sorted union
    /// of both indices and columns keep first-seen order. Two different
    /// values for the same cell are a [`TableError::Conflict`].
    pub fn merge(&self, other: &TimeSeriesTable) -> Result<TimeSeriesTable, TableError> {
        let mut index: Vec<NaiveDateTime> =
            self.index.iter().chain(&other.index).copied().collect();
        index.sort();
        index.dedup();
        let rows: HashMap<NaiveDateTime, usize> =
            index.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let mut columns: Vec<(ColumnKey, Vec<Option<f64>>)> = Vec::new();
        let mut slots: HashMap<ColumnKey, usize> = HashMap::new();

        for table in [self, other] {
            for (key, series) in table.series() {
                let slot = match slots.get(key) {
                    Some(&slot) => slot,
                    None => {
                        slots.insert(key.clone(), columns.len());
                        columns.push((key.clone(), vec![None; index.len()]));
                        columns.len() - 1
                    }
                };

                for (timestamp, value) in table.index.iter().zip(series) {
                    let Some(value) = *value else { continue };
                    let cell = &mut columns[slot].1[rows[timestamp]];
                    match *cell {
                        Some(existing) if existing != value => {
                            return Err(TableError::Conflict {
                                column: key.to_string(),
                                timestamp: *timestamp,
                                left: existing,
                                right: value,
                            });
                        }
                        _ => *cell = Some(value),
                    }
                }
            }
        }

        TimeSeriesTable::new(index, columns)
    }

    /// Projects the table onto one variable, dropping the variable axis.
    pub fn select_variable(&self, name: &str) -> Result<VariableFrame, TableError> {
        let (keys, columns): (Vec<EntityKey>, Vec<Vec<Option<f64>>>) = self
            .series()
            .filter(|(key, _)| key.variable.as_str() == name)
            .map(|(key, series)| (key.entity.clone(), series.to_vec()))
            .unzip();

        if keys.is_empty() {
            return Err(TableError::UnknownVariable {
                name: name.to_string(),
            });
        }

        Ok(VariableFrame {
            variable: Variable::new(name),
            rows: RowLabels::Timestamps(self.index.clone()),
            keys,
            columns,
        })
    }

    /// Per-location maximum of one variable as a single named profile.
    pub fn maximum(&self, name: &str) -> Result<VariableFrame, TableError> {
        let frame = self.select_variable(name)?;
        let columns = frame
            .columns
            .iter()
            .map(|series| {
                let peak = series
                    .iter()
                    .flatten()
                    .copied()
                    .fold(None, |peak: Option<f64>, v| Some(peak.map_or(v, |p| p.max(v))));
                vec![peak]
            })
            .collect();

        Ok(VariableFrame {
            rows: RowLabels::Named(vec![format!("Maximum_{name}")]),
            columns,
            ..frame
        })
    }

    /// Inclusive date-range slice of the row index.
    pub fn truncate(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let keep: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, t)| start.is_none_or(|s| **t >= s) && end.is_none_or(|e| **t <= e))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&keep)
    }

    /// Keeps the rows within `days` of the last timestamp, inclusive.
    pub fn truncate_last_n_days(&self, days: f64) -> Result<Self, TableError> {
        if !days.is_finite() || days < 0.0 {
            return Err(TableError::Argument {
                reason: format!("number of days must be a non-negative number, got {days}"),
            });
        }
        let Some(&end) = self.index.last() else {
            return Ok(self.clone());
        };
        let start = Duration::try_milliseconds((days * 86_400_000.0).round() as i64)
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(NaiveDateTime::MIN);
        Ok(self.truncate(Some(start), Some(end)))
    }

    pub(crate) fn select_rows(&self, rows: &[usize]) -> Self {
        TimeSeriesTable {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|series| rows.iter().map(|&r| series[r]).collect())
                .collect(),
        }
    }
}

fn check_rectangular<'a>(keys: impl Iterator<Item = &'a ColumnKey>) -> Result<(), TableError> {
    let mut catalogue: Vec<(&EntityKey, HashSet<&Variable>)> = Vec::new();
    for key in keys {
        match catalogue.iter_mut().find(|(entity, _)| *entity == &key.entity) {
            Some((_, variables)) => {
                variables.insert(&key.variable);
            }
            None => catalogue.push((&key.entity, HashSet::from([&key.variable]))),
        }
    }

    if let Some(((_, expected), rest)) = catalogue.split_first() {
        if let Some((entity, _)) = rest.iter().find(|(_, variables)| variables != expected) {
            return Err(TableError::NonRectangular {
                entity: entity.to_string(),
            });
        }
    }
    Ok(())
}

// Row labels of a projected frame
#[derive(Debug, Clone, PartialEq)]
pub enum RowLabels {
    Timestamps(Vec<NaiveDateTime>),
    Named(Vec<String>),
}

impl RowLabels {
    pub fn len(&self) -> usize {
        match self {
            RowLabels::Timestamps(index) => index.len(),
            RowLabels::Named(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_strings(&self) -> Vec<String> {
        match self {
            RowLabels::Timestamps(index) => index
                .iter()
                .map(|t| t.format(PROFILE_FORMAT).to_string())
                .collect(),
            RowLabels::Named(names) => names.clone(),
        }
    }
}

/// One variable's values as a location × profile matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableFrame {
    variable: Variable,
    rows: RowLabels,
    keys: Vec<EntityKey>,
    columns: Vec<Vec<Option<f64>>>,
}

impl VariableFrame {
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn rows(&self) -> &RowLabels {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    pub fn profile_labels(&self) -> Vec<String> {
        self.rows.to_strings()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&EntityKey, &[Option<f64>])> {
        self.keys
            .iter()
            .zip(&self.columns)
            .map(|(key, series)| (key, series.as_slice()))
    }

    pub fn series(&self, key: &EntityKey) -> Option<&[Option<f64>]> {
        self.keys
            .iter()
            .position(|candidate| candidate == key)
            .map(|i| self.columns[i].as_slice())
    }

    /// Checks that two frames share the same row labels and location set.
    pub fn check_parity(&self, other: &VariableFrame) -> Result<(), ShapeError> {
        let left = self.variable.to_string();
        let right = other.variable.to_string();

        if self.row_count() != other.row_count() {
            return Err(ShapeError::RowCount {
                left,
                right,
                left_rows: self.row_count(),
                right_rows: other.row_count(),
            });
        }
        // named rows are per-variable summaries, so only their count must agree
        let rows_match = match (&self.rows, &other.rows) {
            (RowLabels::Timestamps(ours), RowLabels::Timestamps(theirs)) => ours == theirs,
            (RowLabels::Named(_), RowLabels::Named(_)) => true,
            _ => false,
        };
        if !rows_match {
            return Err(ShapeError::RowLabels { left, right });
        }

        let ours: HashSet<&EntityKey> = self.keys.iter().collect();
        let theirs: HashSet<&EntityKey> = other.keys.iter().collect();
        if self.keys.len() != other.keys.len() || ours != theirs {
            return Err(ShapeError::Keys { left, right });
        }
        Ok(())
    }
}
