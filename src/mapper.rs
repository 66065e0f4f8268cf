use crate::error::MappingError;
use crate::io::node_table::NodeTable;
use crate::timeseries::{ColumnKey, TimeSeriesTable, Variable};
use serde::Deserialize;
use std::collections::HashMap;

// How node keys become cross-section keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Relabel by `(river, reach, node)` lookup and apply elevation
    /// adjustments from the node table.
    #[default]
    Lookup,
    /// Relabel only; elevation values pass through unchanged.
    Rename,
}

pub struct CrossSectionMapper<'a> {
    node_table: &'a NodeTable,
    mode: MappingMode,
    elevation: Variable,
}

impl<'a> CrossSectionMapper<'a> {
    pub fn new(node_table: &'a NodeTable) -> Self {
        CrossSectionMapper {
            node_table,
            mode: MappingMode::default(),
            elevation: Variable::elevation(),
        }
    }

    pub fn with_mode(mut self, mode: MappingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns a new table keyed by cross section. Every key must resolve;
    /// one miss fails the whole mapping.
    pub fn map(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable, MappingError> {
        let adjust =
            self.mode == MappingMode::Lookup && self.node_table.has_elevation_adjustments();

        let mut sources: HashMap<ColumnKey, &str> = HashMap::new();
        let mut columns = Vec::with_capacity(table.columns().len());

        for (key, series) in table.series() {
            let record = self
                .node_table
                .get(&key.entity)
                .ok_or_else(|| MappingError::Lookup {
                    river: key.entity.river.clone(),
                    reach: key.entity.reach.clone(),
                    node: key.entity.location.clone(),
                })?;

            let mapped = ColumnKey::new(
                key.entity.with_location(&record.cross_section),
                key.variable.clone(),
            );
            if let Some(first) = sources.insert(mapped.clone(), &key.entity.location) {
                return Err(MappingError::DuplicateCrossSection {
                    cross_section: record.cross_section.clone(),
                    first: first.to_string(),
                    second: key.entity.location.clone(),
                });
            }

            let values = match record.elevation_adjustment {
                Some(offset) if adjust && key.variable == self.elevation => {
                    series.iter().map(|v| v.map(|v| v + offset)).collect()
                }
                _ => series.to_vec(),
            };
            columns.push((mapped, values));
        }

        Ok(TimeSeriesTable::new(table.index().to_vec(), columns)?)
    }
}
