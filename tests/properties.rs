use std::collections::{BTreeSet, HashSet};
use std::io::Cursor;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use feq_ras::io::special_output;
use feq_ras::{ColumnKey, EntityKey, SteadyFlowWriter, TimeSeriesTable, TimeStep, Variable};
use proptest::prelude::*;

fn hour(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 4, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
        + chrono::Duration::hours(offset)
}

// Elev/Flow for every node of one reach over the given hour offsets
fn reach_table(reach: &str, nodes: usize, hours: &BTreeSet<i64>, seed: f64) -> TimeSeriesTable {
    let index: Vec<NaiveDateTime> = hours.iter().map(|&h| hour(h)).collect();
    let mut columns = Vec::new();
    for node in 0..nodes {
        let entity = EntityKey::new("West", reach, &node.to_string());
        for (offset, variable) in [(0.0, Variable::elevation()), (1000.0, Variable::flow())] {
            let values = index
                .iter()
                .enumerate()
                .map(|(row, _)| Some(seed + offset + row as f64 + node as f64 * 0.25))
                .collect();
            columns.push((ColumnKey::new(entity.clone(), variable), values));
        }
    }
    TimeSeriesTable::new(index, columns).unwrap()
}

// Special-output text for nodes `1..=nodes` with Elev/Flow pairs per row
fn special_output_text(hours: &BTreeSet<i64>, nodes: usize, values: &[f64]) -> String {
    let mut text = String::from(" FEQ special output\n");
    for node in 1..=nodes {
        text.push_str(&format!(" {node}"));
    }
    text.push_str("\n Year Mn Dy Hour");
    for _ in 0..nodes {
        text.push_str(" Elev Flow");
    }
    text.push('\n');

    let width = nodes * 2;
    for (row, &h) in hours.iter().enumerate() {
        let t = hour(h);
        text.push_str(&format!(" 2017 4 {} {}", t.format("%d"), t.hour()));
        for col in 0..width {
            text.push_str(&format!(" {:.3}", values[(row * width + col) % values.len()]));
        }
        text.push('\n');
    }
    text
}

proptest! {
    #[test]
    fn merge_is_a_set_union_in_either_order(
        left_hours in prop::collection::btree_set(0i64..96, 1..20),
        right_hours in prop::collection::btree_set(0i64..96, 1..20),
        left_nodes in 1usize..4,
        right_nodes in 1usize..4,
        seed in 0.0f64..700.0,
    ) {
        let left = reach_table("Main", left_nodes, &left_hours, seed);
        let right = reach_table("Trib", right_nodes, &right_hours, seed);

        let forward = left.merge(&right).unwrap();
        let backward = right.merge(&left).unwrap();

        let forward_columns: HashSet<&ColumnKey> = forward.columns().iter().collect();
        let backward_columns: HashSet<&ColumnKey> = backward.columns().iter().collect();
        prop_assert_eq!(forward_columns, backward_columns);

        let expected: Vec<NaiveDateTime> =
            left_hours.union(&right_hours).map(|&h| hour(h)).collect();
        prop_assert_eq!(forward.index(), expected.as_slice());
        prop_assert_eq!(backward.index(), expected.as_slice());
    }

    #[test]
    fn resampling_an_aligned_grid_changes_nothing(
        step_hours in prop::sample::select(vec![1i64, 2, 3, 6, 12]),
        rows in 1usize..30,
        seed in 0.0f64..700.0,
    ) {
        let hours: BTreeSet<i64> = (0..rows as i64).map(|row| row * step_hours).collect();
        let table = reach_table("Main", 2, &hours, seed);

        let resampled = table.resample(TimeStep::hours(step_hours).unwrap(), None, None).unwrap();

        prop_assert_eq!(resampled.index(), table.index());
        for (key, series) in table.series() {
            let other = resampled.column(key).unwrap();
            for (a, b) in series.iter().zip(other) {
                prop_assert!((a.unwrap() - b.unwrap()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn merge_column_set_is_associative(
        a_hours in prop::collection::btree_set(0i64..48, 1..10),
        b_hours in prop::collection::btree_set(0i64..48, 1..10),
        c_hours in prop::collection::btree_set(0i64..48, 1..10),
        nodes in 1usize..3,
    ) {
        let a = reach_table("Main", nodes, &a_hours, 600.0);
        let b = reach_table("Trib", nodes, &b_hours, 500.0);
        let c = reach_table("Spur", nodes, &c_hours, 400.0);

        let left = a.merge(&b).unwrap().merge(&c).unwrap();
        let right = a.merge(&b.merge(&c).unwrap()).unwrap();

        let left_columns: HashSet<&ColumnKey> = left.columns().iter().collect();
        let right_columns: HashSet<&ColumnKey> = right.columns().iter().collect();
        prop_assert_eq!(left_columns, right_columns);
        prop_assert_eq!(left.index(), right.index());
        for (key, series) in left.series() {
            prop_assert_eq!(Some(series), right.column(key));
        }
    }

    #[test]
    fn stage_lines_carry_parsed_grid(
        hours in prop::collection::btree_set(0i64..72, 1..12),
        nodes in 1usize..4,
        values in prop::collection::vec(400.0f64..700.0, 1..40),
    ) {
        let text = special_output_text(&hours, nodes, &values);
        let table = special_output::parse(Cursor::new(text), "West", "Main").unwrap();
        let document = SteadyFlowWriter::default().write(&table, "round trip").unwrap();

        let profiles: Vec<String> = table
            .index()
            .iter()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        let names = document
            .lines()
            .find_map(|line| line.strip_prefix("Profile Names="))
            .unwrap();
        prop_assert_eq!(names, profiles.join(","));

        let mut seen = 0;
        for line in document.lines() {
            let Some(fields) = line.strip_prefix("Set Internal Change=") else {
                continue;
            };
            let fields: Vec<&str> = fields.split(',').map(str::trim).collect();
            prop_assert_eq!(fields.len(), 6);
            let key = ColumnKey::new(
                EntityKey::new(fields[0], fields[1], fields[2]),
                Variable::elevation(),
            );
            let row: usize = fields[3].parse().unwrap();
            let written: f64 = fields[5].parse().unwrap();
            let parsed = table.column(&key).unwrap()[row - 1].unwrap();
            prop_assert!((written - parsed).abs() < 1e-9);
            seen += 1;
        }
        prop_assert_eq!(seen, nodes * table.len());
    }
}
