//! Converts special-output time series into steady-flow input files.
//!
//! One or more special-output files are parsed into [`TimeSeriesTable`]s,
//! union-merged, resampled, remapped from nodes to cross sections with a
//! [`NodeTable`], and serialized by the [`SteadyFlowWriter`].

pub mod config;
pub mod error;
pub mod io;
pub mod mapper;
pub mod pipeline;
pub mod resample;
pub mod timeseries;

pub use error::{
    MappingError, NodeTableError, ResultsError, ShapeError, SpecialOutputError, SteadyFlowError,
    TableError,
};
pub use io::node_table::{NodeRecord, NodeTable};
pub use io::results::{CsvResultsWriter, ResultsWriter, write_results_csv};
pub use io::steady_flow::{FlowMode, SteadyFlowWriter};
pub use mapper::{CrossSectionMapper, MappingMode};
pub use resample::{ExportWindow, TimeStep};
pub use timeseries::{ColumnKey, EntityKey, TimeSeriesTable, Variable, VariableFrame};
