//! Error types for every fallible stage of the conversion.

use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Errors raised by [`TimeSeriesTable`](crate::timeseries::TimeSeriesTable)
/// construction and its combining operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    /// Both sides of a merge hold different values for the same cell.
    #[error("conflicting values for {column} at {timestamp}: {left} vs {right}")]
    Conflict {
        column: String,
        timestamp: NaiveDateTime,
        left: f64,
        right: f64,
    },

    /// An entity does not expose the same variable set as the others.
    #[error("entity {entity} does not expose the table's variable set")]
    NonRectangular { entity: String },

    /// The requested variable is not part of the table.
    #[error("variable '{name}' not found")]
    UnknownVariable { name: String },

    /// The same (entity, variable) column was supplied twice.
    #[error("duplicate column {column}")]
    DuplicateColumn { column: String },

    /// The row index is not strictly increasing.
    #[error("row index is not strictly increasing at position {position}")]
    UnsortedIndex { position: usize },

    /// A column does not have one value per row.
    #[error("column {column} has {got} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// Conflicting or invalid caller-supplied parameters.
    #[error("invalid argument: {reason}")]
    Argument { reason: String },
}

/// Two frames that must be paired do not line up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("{left} has {left_rows} rows but {right} has {right_rows}")]
    RowCount {
        left: String,
        right: String,
        left_rows: usize,
        right_rows: usize,
    },

    #[error("row labels of {left} and {right} differ")]
    RowLabels { left: String, right: String },

    #[error("{left} and {right} do not cover the same locations")]
    Keys { left: String, right: String },
}

/// Failures reading the special-output format.
#[derive(Debug, thiserror::Error)]
pub enum SpecialOutputError {
    #[error("failed to open special output {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read special output: {0}")]
    Io(#[from] std::io::Error),

    #[error("special output header is incomplete: expected 3 lines, found {found}")]
    MissingHeader { found: usize },

    #[error("special output header lists no nodes")]
    NoNodes,

    #[error("special output header lists no variables")]
    NoVariables,

    #[error("line {line}: expected {expected} values, found {got}")]
    ColumnCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: cannot decode value '{token}'")]
    InvalidValue { line: usize, token: String },

    #[error("special output does not form a valid table: {0}")]
    Table(#[from] TableError),
}

/// Failures loading the node reference table.
#[derive(Debug, thiserror::Error)]
pub enum NodeTableError {
    #[error("failed to open node table {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("node table is missing required column '{name}'")]
    MissingColumn { name: &'static str },

    #[error("node {river},{reach},{node} appears more than once")]
    DuplicateNode {
        river: String,
        reach: String,
        node: String,
    },

    #[error("node table csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures remapping node keys to cross-section keys.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("node {river},{reach},{node} not found in node table")]
    Lookup {
        river: String,
        reach: String,
        node: String,
    },

    #[error("nodes {first} and {second} both map to cross section {cross_section}")]
    DuplicateCrossSection {
        cross_section: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Failures building a steady-flow document.
#[derive(Debug, thiserror::Error)]
pub enum SteadyFlowError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("variable '{name}' is required to write a steady flow file")]
    MissingVariable { name: String },

    #[error("cross section '{cross_section}' on {river},{reach} is not a river mile")]
    NonNumericCrossSection {
        river: String,
        reach: String,
        cross_section: String,
    },

    #[error("failed to write steady flow file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures publishing paired elevation and flow results.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("results csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_error_names_the_triple() {
        let e = MappingError::Lookup {
            river: "West".into(),
            reach: "Main".into(),
            node: "7".into(),
        };
        assert_eq!(e.to_string(), "node West,Main,7 not found in node table");
    }

    #[test]
    fn missing_header_message() {
        let e = SpecialOutputError::MissingHeader { found: 2 };
        assert_eq!(
            e.to_string(),
            "special output header is incomplete: expected 3 lines, found 2"
        );
    }

    #[test]
    fn shape_error_converts_into_writer_error() {
        let e: SteadyFlowError = ShapeError::Keys {
            left: "Elev".into(),
            right: "Flow".into(),
        }
        .into();
        assert_eq!(e.to_string(), "Elev and Flow do not cover the same locations");
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_impl<T: std::error::Error + Send + Sync + 'static>() {}
        assert_impl::<TableError>();
        assert_impl::<SpecialOutputError>();
        assert_impl::<NodeTableError>();
        assert_impl::<MappingError>();
        assert_impl::<SteadyFlowError>();
        assert_impl::<ResultsError>();
    }
}
