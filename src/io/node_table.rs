use crate::error::NodeTableError;
use crate::timeseries::EntityKey;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

// Column names of the node reference table
pub const RIVER_COLUMN: &str = "River";
pub const REACH_COLUMN: &str = "Reach";
pub const NODE_COLUMN: &str = "Node";
pub const CROSS_SECTION_COLUMN: &str = "XS";
pub const ELEVATION_ADJUSTMENT_COLUMN: &str = "Elev Adj";

const REQUIRED_COLUMNS: [&str; 4] = [RIVER_COLUMN, REACH_COLUMN, NODE_COLUMN, CROSS_SECTION_COLUMN];

// One CSV row as stored on disk
#[derive(Debug, Deserialize)]
struct NodeRow {
    #[serde(rename = "River")]
    river: String,
    #[serde(rename = "Reach")]
    reach: String,
    #[serde(rename = "Node")]
    node: String,
    #[serde(rename = "XS")]
    cross_section: String,
    #[serde(rename = "Elev Adj", default)]
    elevation_adjustment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub river: String,
    pub reach: String,
    pub node: String,
    pub cross_section: String,
    pub elevation_adjustment: Option<f64>,
}

impl NodeRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.river, &self.reach, &self.node)
    }
}

/// Cross-reference from source-model nodes to target-model cross sections.
/// Immutable once loaded; `(river, reach, node)` is unique.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    records: Vec<NodeRecord>,
    lookup: HashMap<EntityKey, usize>,
}

impl NodeTable {
    pub fn from_records(records: Vec<NodeRecord>) -> Result<Self, NodeTableError> {
        let mut lookup = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if lookup.insert(record.key(), i).is_some() {
                return Err(NodeTableError::DuplicateNode {
                    river: record.river.clone(),
                    reach: record.reach.clone(),
                    node: record.node.clone(),
                });
            }
        }
        Ok(NodeTable { records, lookup })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, NodeTableError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?;
        if let Some(missing) = REQUIRED_COLUMNS
            .into_iter()
            .find(|name| !headers.iter().any(|h| h == *name))
        {
            return Err(NodeTableError::MissingColumn { name: missing });
        }

        let mut records = Vec::new();
        for row in rdr.deserialize::<NodeRow>() {
            let row = row?;
            records.push(NodeRecord {
                river: row.river,
                reach: row.reach,
                node: row.node,
                cross_section: row.cross_section,
                elevation_adjustment: row.elevation_adjustment,
            });
        }
        Self::from_records(records)
    }

    pub fn from_path(path: &Path) -> Result<Self, NodeTableError> {
        let file = File::open(path).map_err(|source| NodeTableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn get(&self, key: &EntityKey) -> Option<&NodeRecord> {
        self.lookup.get(key).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // True when any record carries an elevation adjustment
    pub fn has_elevation_adjustments(&self) -> bool {
        self.records.iter().any(|r| r.elevation_adjustment.is_some())
    }

    /// Rivers with their reaches, both in order of first appearance.
    pub fn river_reaches(&self) -> Vec<(String, Vec<String>)> {
        let mut rivers: Vec<(String, Vec<String>)> = Vec::new();
        for record in &self.records {
            let position = match rivers.iter().position(|(river, _)| *river == record.river) {
                Some(position) => position,
                None => {
                    rivers.push((record.river.clone(), Vec::new()));
                    rivers.len() - 1
                }
            };
            let reaches = &mut rivers[position].1;
            if !reaches.contains(&record.reach) {
                reaches.push(record.reach.clone());
            }
        }
        rivers
    }
}
