use crate::error::SpecialOutputError;
use crate::timeseries::{ColumnKey, EntityKey, TimeSeriesTable, Variable};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const HEADER_LINES: usize = 3;
// year, month, day, hour
const DATE_COLUMNS: usize = 4;

// Why a data line was left out of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewFields,
    InvalidHour,
    InvalidDate,
    MissingValues { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: SkipReason,
}

// Parsed file plus the data lines that were tolerated rather than decoded
#[derive(Debug)]
pub struct SpecialOutput {
    pub table: TimeSeriesTable,
    pub skipped: Vec<SkippedLine>,
}

enum Decoded {
    Row(NaiveDateTime, Vec<Option<f64>>),
    Skip(SkipReason),
}

/// Reads a special-output export into a table keyed by
/// `(river, reach, node)`.
///
/// Line 1 is a title and is ignored. Line 2 lists the node ids. Line 3
/// labels the four date columns and then repeats the variable tags once per
/// node; distinct tags in order of first appearance form the variable
/// catalogue. Data lines are `year month day hour value...` with one value
/// per node × variable. Lines with a bad date, a bad hour or too few values
/// are skipped and reported, not treated as errors.
pub fn parse_with_report<R: BufRead>(
    reader: R,
    river: &str,
    reach: &str,
) -> Result<SpecialOutput, SpecialOutputError> {
    let mut lines = reader.lines();

    let mut header = Vec::with_capacity(HEADER_LINES);
    for _ in 0..HEADER_LINES {
        match lines.next() {
            Some(line) => header.push(line?),
            None => return Err(SpecialOutputError::MissingHeader { found: header.len() }),
        }
    }

    let nodes: Vec<&str> = header[1].split_whitespace().collect();
    if nodes.is_empty() {
        return Err(SpecialOutputError::NoNodes);
    }

    let mut variables: Vec<Variable> = Vec::new();
    for tag in header[2].split_whitespace().skip(DATE_COLUMNS) {
        let variable = Variable::new(tag);
        if !variables.contains(&variable) {
            variables.push(variable);
        }
    }
    if variables.is_empty() {
        return Err(SpecialOutputError::NoVariables);
    }

    let width = nodes.len() * variables.len();
    let mut rows: Vec<(NaiveDateTime, Vec<Option<f64>>)> = Vec::new();
    let mut skipped = Vec::new();

    for (offset, line) in lines.enumerate() {
        let line = line?;
        let line_number = HEADER_LINES + offset + 1;
        match decode_row(&line, line_number, width)? {
            Decoded::Row(timestamp, values) => rows.push((timestamp, values)),
            Decoded::Skip(reason) => skipped.push(SkippedLine {
                line_number,
                reason,
            }),
        }
    }

    // re-index: stable sort, a later row with an equal timestamp wins
    rows.sort_by_key(|(timestamp, _)| *timestamp);
    let mut unique: Vec<(NaiveDateTime, Vec<Option<f64>>)> = Vec::with_capacity(rows.len());
    for row in rows {
        match unique.last_mut() {
            Some(last) if last.0 == row.0 => *last = row,
            _ => unique.push(row),
        }
    }

    let index = unique.iter().map(|(timestamp, _)| *timestamp).collect();
    let columns = nodes
        .iter()
        .flat_map(|node| {
            variables.iter().map(move |variable| {
                ColumnKey::new(EntityKey::new(river, reach, node), variable.clone())
            })
        })
        .enumerate()
        .map(|(col, key)| (key, unique.iter().map(|(_, values)| values[col]).collect()))
        .collect();

    let table = TimeSeriesTable::new(index, columns)?;
    Ok(SpecialOutput { table, skipped })
}

pub fn parse<R: BufRead>(
    reader: R,
    river: &str,
    reach: &str,
) -> Result<TimeSeriesTable, SpecialOutputError> {
    Ok(parse_with_report(reader, river, reach)?.table)
}

pub fn read_special_output_file(
    path: &Path,
    river: &str,
    reach: &str,
) -> Result<SpecialOutput, SpecialOutputError> {
    let file = File::open(path).map_err(|source| SpecialOutputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_with_report(BufReader::new(file), river, reach)
}

fn decode_row(line: &str, line_number: usize, width: usize) -> Result<Decoded, SpecialOutputError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < DATE_COLUMNS {
        return Ok(Decoded::Skip(SkipReason::TooFewFields));
    }

    let hour = match fields[3].parse::<f64>() {
        Ok(hour) if hour.is_finite() => hour,
        _ => return Ok(Decoded::Skip(SkipReason::InvalidHour)),
    };
    let date = match (
        fields[0].parse::<i32>(),
        fields[1].parse::<u32>(),
        fields[2].parse::<u32>(),
    ) {
        (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    };
    let Some(date) = date else {
        return Ok(Decoded::Skip(SkipReason::InvalidDate));
    };
    let timestamp = Duration::try_milliseconds((hour * 3_600_000.0).round() as i64)
        .and_then(|offset| date.and_time(NaiveTime::MIN).checked_add_signed(offset));
    let Some(timestamp) = timestamp else {
        return Ok(Decoded::Skip(SkipReason::InvalidHour));
    };

    let tokens = &fields[DATE_COLUMNS..];
    if tokens.len() < width {
        return Ok(Decoded::Skip(SkipReason::MissingValues {
            expected: width,
            got: tokens.len(),
        }));
    }
    if tokens.len() > width {
        return Err(SpecialOutputError::ColumnCount {
            line: line_number,
            expected: width,
            got: tokens.len(),
        });
    }

    let values = tokens
        .iter()
        .map(|token| match token.parse::<f64>() {
            Ok(value) if value.is_nan() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(SpecialOutputError::InvalidValue {
                line: line_number,
                token: token.to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Decoded::Row(timestamp, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::tests::at;
    use std::io::Cursor;

    const SAMPLE: &str = "\
 FEQ special output  WBuncutx
              1.0       2.0
 Year Mn Dy  Hour  Elev  Flow  Elev  Flow
 2017  4  1  0.0  615.30  120.0  612.10  118.0
 2017  4  1  6.0  615.90  150.0  612.70  149.0
 2017  4  1  12.0  616.20  170.0  613.00  168.0
";

    fn key(node: &str, variable: &str) -> ColumnKey {
        ColumnKey::new(EntityKey::new("West", "Main", node), Variable::new(variable))
    }

    #[test]
    fn parses_nodes_variables_and_rows() {
        let table = parse(Cursor::new(SAMPLE), "West", "Main").unwrap();

        assert_eq!(table.index(), &[at(1, 0), at(1, 6), at(1, 12)]);
        assert_eq!(table.variables(), vec![Variable::elevation(), Variable::flow()]);
        assert_eq!(
            table.columns(),
            &[key("1.0", "Elev"), key("1.0", "Flow"), key("2.0", "Elev"), key("2.0", "Flow")]
        );
        assert_eq!(
            table.column(&key("2.0", "Flow")).unwrap(),
            &[Some(118.0), Some(149.0), Some(168.0)]
        );
    }

    #[test]
    fn repeated_tag_collapses_to_one_variable() {
        let input = "title\n 1.0 2.0\n Year Mn Dy Hour Elev Elev\n 2017 4 1 0 600.5 601.5\n";
        let table = parse(Cursor::new(input), "West", "Main").unwrap();

        assert_eq!(table.variables(), vec![Variable::elevation()]);
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.column(&key("1.0", "Elev")).unwrap(), &[Some(600.5)]);
    }

    #[test]
    fn malformed_trailing_line_is_skipped() {
        let input = format!("{SAMPLE} 2017  4\n");
        let parsed = parse_with_report(Cursor::new(input), "West", "Main").unwrap();

        assert_eq!(parsed.table.len(), 3);
        assert_eq!(
            parsed.skipped,
            vec![SkippedLine {
                line_number: 7,
                reason: SkipReason::TooFewFields,
            }]
        );
    }

    #[test]
    fn short_and_undated_lines_are_skipped() {
        let input = "\
title
 1.0 2.0
 Year Mn Dy Hour Elev Elev
 2017 4 1 0 600.0 601.0
 2017 4 1 x 600.0 601.0
 2017 2 30 0 600.0 601.0
 2017 4 1 6 600.0
";
        let parsed = parse_with_report(Cursor::new(input), "West", "Main").unwrap();

        assert_eq!(parsed.table.len(), 1);
        let reasons: Vec<_> = parsed.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::InvalidHour,
                SkipReason::InvalidDate,
                SkipReason::MissingValues { expected: 2, got: 1 },
            ]
        );
    }

    #[test]
    fn fractional_hours_build_sub_hour_timestamps() {
        let input =
            "title\n 1.0\n Year Mn Dy Hour Elev\n 2017 4 1 1.5 600.0\n 2017 4 1 24.25 601.0\n";
        let table = parse(Cursor::new(input), "West", "Main").unwrap();

        let expected_first = at(1, 1) + Duration::minutes(30);
        let expected_second = at(2, 0) + Duration::minutes(15);
        assert_eq!(table.index(), &[expected_first, expected_second]);
    }

    #[test]
    fn later_duplicate_timestamp_overwrites_earlier() {
        let input = "title\n 1.0\n Year Mn Dy Hour Elev\n \
                     2017 4 1 6 600.0\n 2017 4 1 0 599.0\n 2017 4 1 6 600.5\n";
        let table = parse(Cursor::new(input), "West", "Main").unwrap();

        assert_eq!(table.index(), &[at(1, 0), at(1, 6)]);
        assert_eq!(table.column(&key("1.0", "Elev")).unwrap(), &[Some(599.0), Some(600.5)]);
    }

    #[test]
    fn incomplete_header_is_a_format_error() {
        let err = parse(Cursor::new("title\n 1.0 2.0\n"), "West", "Main").unwrap_err();
        assert!(matches!(err, SpecialOutputError::MissingHeader { found: 2 }));

        let err =
            parse(Cursor::new("title\n\n Year Mn Dy Hour Elev\n"), "West", "Main").unwrap_err();
        assert!(matches!(err, SpecialOutputError::NoNodes));

        let err =
            parse(Cursor::new("title\n 1.0\n Year Mn Dy Hour\n"), "West", "Main").unwrap_err();
        assert!(matches!(err, SpecialOutputError::NoVariables));
    }

    #[test]
    fn undecodable_values_are_format_errors() {
        let input = "title\n 1.0\n Year Mn Dy Hour Elev\n 2017 4 1 0 abc\n";
        let err = parse(Cursor::new(input), "West", "Main").unwrap_err();
        assert!(matches!(err, SpecialOutputError::InvalidValue { line: 4, .. }));

        let input = "title\n 1.0\n Year Mn Dy Hour Elev\n 2017 4 1 0 600.0 601.0\n";
        let err = parse(Cursor::new(input), "West", "Main").unwrap_err();
        assert!(matches!(err, SpecialOutputError::ColumnCount { expected: 1, got: 2, .. }));
    }

    #[test]
    fn nan_values_become_missing_cells() {
        let input = "title\n 1.0\n Year Mn Dy Hour Elev\n 2017 4 1 0 NaN\n";
        let table = parse(Cursor::new(input), "West", "Main").unwrap();
        assert_eq!(table.column(&key("1.0", "Elev")).unwrap(), &[None]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_special_output_file(Path::new("does/not/exist.wsq"), "West", "Main")
            .unwrap_err();
        assert!(matches!(err, SpecialOutputError::Open { .. }));
    }
}
