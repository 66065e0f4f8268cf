use crate::error::{ResultsError, ShapeError};
use crate::timeseries::VariableFrame;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Receiver of paired elevation and flow results keyed by cross section.
/// Both frames must share row labels and location set; implementations
/// reject anything else with a [`ShapeError`].
pub trait ResultsWriter {
    type Error: From<ShapeError>;

    fn write_results(
        &mut self,
        elevation: &VariableFrame,
        flow: &VariableFrame,
    ) -> Result<(), Self::Error>;
}

// Flat CSV export of paired results, one row per location and profile
pub struct CsvResultsWriter<W: Write> {
    writer: Writer<W>,
}

impl CsvResultsWriter<File> {
    pub fn from_path(path: &Path) -> Result<Self, ResultsError> {
        let writer = WriterBuilder::new().has_headers(true).from_path(path)?;
        Ok(CsvResultsWriter { writer })
    }
}

/// Writes paired results to `path`. Unpaired frames are rejected before the
/// file is created.
pub fn write_results_csv(
    path: &Path,
    elevation: &VariableFrame,
    flow: &VariableFrame,
) -> Result<(), ResultsError> {
    elevation.check_parity(flow)?;
    CsvResultsWriter::from_path(path)?.write_results(elevation, flow)
}

impl<W: Write> CsvResultsWriter<W> {
    pub fn new(inner: W) -> Self {
        CsvResultsWriter {
            writer: WriterBuilder::new().has_headers(true).from_writer(inner),
        }
    }

    pub fn into_inner(self) -> Result<W, ResultsError> {
        self.writer
            .into_inner()
            .map_err(|e| ResultsError::Io(e.into_error()))
    }
}

impl<W: Write> ResultsWriter for CsvResultsWriter<W> {
    type Error = ResultsError;

    fn write_results(
        &mut self,
        elevation: &VariableFrame,
        flow: &VariableFrame,
    ) -> Result<(), ResultsError> {
        elevation.check_parity(flow)?;

        self.writer.write_record([
            "profile",
            "river",
            "reach",
            "cross_section",
            "elevation",
            "flow",
        ])?;

        let profiles = elevation.profile_labels();
        for (key, elevations) in elevation.columns() {
            // parity guarantees the key exists on both sides
            let flows = flow.series(key).unwrap_or(&[]);
            for (row, profile) in profiles.iter().enumerate() {
                let cell = |series: &[Option<f64>]| {
                    series
                        .get(row)
                        .copied()
                        .flatten()
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                };
                self.writer.write_record([
                    profile.as_str(),
                    key.river.as_str(),
                    key.reach.as_str(),
                    key.location.as_str(),
                    cell(elevations).as_str(),
                    cell(flows).as_str(),
                ])?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::TimeSeriesTable;
    use crate::timeseries::tests::{at, column};

    fn table() -> TimeSeriesTable {
        TimeSeriesTable::new(
            vec![at(1, 0), at(1, 6)],
            vec![
                column("Main", "100.5", "Elev", &[Some(617.3), None]),
                column("Main", "100.5", "Flow", &[Some(120.0), Some(130.5)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn writes_one_row_per_location_and_profile() {
        let table = table();
        let mut writer = CsvResultsWriter::new(Vec::new());
        writer
            .write_results(
                &table.select_variable("Elev").unwrap(),
                &table.select_variable("Flow").unwrap(),
            )
            .unwrap();

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "profile,river,reach,cross_section,elevation,flow\n\
             2017-04-01 00:00:00,West,Main,100.5,617.3,120\n\
             2017-04-01 06:00:00,West,Main,100.5,,130.5\n"
        );
    }

    #[test]
    fn rejects_unpaired_frames() {
        let table = table();
        let shorter = table.truncate(None, Some(at(1, 0)));
        let mut writer = CsvResultsWriter::new(Vec::new());

        let err = writer
            .write_results(
                &table.select_variable("Elev").unwrap(),
                &shorter.select_variable("Flow").unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, ResultsError::Shape(_)));
    }

    #[test]
    fn unpaired_frames_leave_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let table = table();
        let shorter = table.truncate(None, Some(at(1, 0)));

        let err = write_results_csv(
            &path,
            &table.select_variable("Elev").unwrap(),
            &shorter.select_variable("Flow").unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ResultsError::Shape(_)));
        assert!(!path.exists());

        write_results_csv(
            &path,
            &table.select_variable("Elev").unwrap(),
            &table.select_variable("Flow").unwrap(),
        )
        .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("profile,"));
    }
}
