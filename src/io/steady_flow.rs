use crate::error::SteadyFlowError;
use crate::io::format::{format_general, format_shortest};
use crate::timeseries::{EntityKey, TimeSeriesTable, Variable, VariableFrame};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_PROGRAM_VERSION: &str = "5.03";

const VALUES_PER_LINE: usize = 10;
const DUMMY_FLOW: &str = "     100";
const FLOW_WIDTH: usize = 8;
const FLOW_PRECISION: usize = 6;
const RIVER_REACH_WIDTH: usize = 27;
const BOUNDARY_PROFILE: usize = 1;
const UPSTREAM_TYPE: u8 = 0;
const DOWNSTREAM_TYPE: u8 = 3;
const DOWNSTREAM_SLOPE: &str = "0.001";
const STAGE_CHANGE_TYPE: u8 = 3;

// Source of each reach's flow block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    /// Constant `100` for every profile.
    #[default]
    Dummy,
    /// The `Flow` values at each reach's upstream cross section.
    Table,
}

/// Serializes cross-section keyed stage (and optionally flow) profiles into
/// the steady-flow text format. The layout is a fixed grammar read by
/// position, so field order and padding must not change.
#[derive(Debug, Clone)]
pub struct SteadyFlowWriter {
    program_version: String,
    flow_mode: FlowMode,
}

impl Default for SteadyFlowWriter {
    fn default() -> Self {
        SteadyFlowWriter::new(DEFAULT_PROGRAM_VERSION)
    }
}

impl SteadyFlowWriter {
    pub fn new(program_version: &str) -> Self {
        SteadyFlowWriter {
            program_version: program_version.to_string(),
            flow_mode: FlowMode::default(),
        }
    }

    pub fn with_flow_mode(mut self, flow_mode: FlowMode) -> Self {
        self.flow_mode = flow_mode;
        self
    }

    pub fn write(&self, table: &TimeSeriesTable, title: &str) -> Result<String, SteadyFlowError> {
        let elevation = table
            .select_variable(Variable::ELEVATION)
            .map_err(|_| missing(Variable::ELEVATION))?;
        let flow = table.select_variable(Variable::FLOW).ok();
        if let Some(flow) = &flow {
            elevation.check_parity(flow)?;
        }
        self.write_frames(title, &elevation, flow.as_ref())
    }

    /// Writes already projected frames, e.g. a maximum profile.
    pub fn write_frames(
        &self,
        title: &str,
        elevation: &VariableFrame,
        flow: Option<&VariableFrame>,
    ) -> Result<String, SteadyFlowError> {
        if let Some(flow) = flow {
            elevation.check_parity(flow)?;
        }
        let flow = match self.flow_mode {
            FlowMode::Dummy => None,
            FlowMode::Table => Some(flow.ok_or_else(|| missing(Variable::FLOW))?),
        };

        let document = SteadyFlowDocument::build(title, &self.program_version, elevation, flow)?;
        Ok(document.render())
    }

    /// Writes a rendered document in one call, so a failed render
    /// leaves nothing on disk.
    pub fn save(path: &Path, document: &str) -> Result<(), SteadyFlowError> {
        fs::write(path, document).map_err(|source| SteadyFlowError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn missing(name: &str) -> SteadyFlowError {
    SteadyFlowError::MissingVariable {
        name: name.to_string(),
    }
}

struct ReachGroup<'a> {
    river: &'a str,
    reach: &'a str,
    upstream: &'a EntityKey,
}

impl ReachGroup<'_> {
    fn label(&self) -> String {
        format!("{},{}", self.river, self.reach)
    }
}

struct SteadyFlowDocument<'a> {
    title: &'a str,
    program_version: &'a str,
    profiles: Vec<String>,
    groups: Vec<ReachGroup<'a>>,
    elevation: &'a VariableFrame,
    flow: Option<&'a VariableFrame>,
}

impl<'a> SteadyFlowDocument<'a> {
    fn build(
        title: &'a str,
        program_version: &'a str,
        elevation: &'a VariableFrame,
        flow: Option<&'a VariableFrame>,
    ) -> Result<Self, SteadyFlowError> {
        let mut groups: Vec<(ReachGroup<'a>, f64)> = Vec::new();
        for key in elevation.keys() {
            let mile = key.location.parse::<f64>().map_err(|_| {
                SteadyFlowError::NonNumericCrossSection {
                    river: key.river.clone(),
                    reach: key.reach.clone(),
                    cross_section: key.location.clone(),
                }
            })?;

            match groups.iter_mut().find(|(group, _)| group.upstream.same_reach(key)) {
                // first maximum wins on ties
                Some((group, highest)) if mile > *highest => {
                    group.upstream = key;
                    *highest = mile;
                }
                Some(_) => {}
                None => groups.push((
                    ReachGroup {
                        river: &key.river,
                        reach: &key.reach,
                        upstream: key,
                    },
                    mile,
                )),
            }
        }

        Ok(SteadyFlowDocument {
            title,
            program_version,
            profiles: elevation.profile_labels(),
            groups: groups.into_iter().map(|(group, _)| group).collect(),
            elevation,
            flow,
        })
    }

    fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        self.add_header(&mut lines);
        self.add_reaches_and_flows(&mut lines);
        self.add_boundary_conditions(&mut lines);
        self.add_stage_overrides(&mut lines);
        lines.concat()
    }

    fn add_header(&self, lines: &mut Vec<String>) {
        lines.push(format!("Flow Title={}\n", self.title));
        lines.push(format!("Program Version={}\n", self.program_version));
        lines.push(format!("Number of Profiles= {}\n", self.profiles.len()));
        lines.push(format!("Profile Names={}\n", self.profiles.join(",")));
    }

    fn add_reaches_and_flows(&self, lines: &mut Vec<String>) {
        for group in &self.groups {
            let flows = match self.flow.and_then(|flow| flow.series(group.upstream)) {
                Some(series) => flow_block(series.iter().map(|v| {
                    let value = format_general(v.unwrap_or(f64::NAN), FLOW_PRECISION);
                    format!("{value:>FLOW_WIDTH$}")
                })),
                None => flow_block((0..self.profiles.len()).map(|_| DUMMY_FLOW.to_string())),
            };
            lines.push(format!(
                "River Rch & RM={:<RIVER_REACH_WIDTH$},{}\n{}\n",
                group.label(),
                group.upstream.location,
                flows
            ));
        }
    }

    fn add_boundary_conditions(&self, lines: &mut Vec<String>) {
        for group in &self.groups {
            lines.push(format!(
                "Boundary for River Rch & Prof#={:<RIVER_REACH_WIDTH$}, {}\n\
                 Up Type= {}\nDn Type= {}\nDn Slope={}\n",
                group.label(),
                BOUNDARY_PROFILE,
                UPSTREAM_TYPE,
                DOWNSTREAM_TYPE,
                DOWNSTREAM_SLOPE
            ));
        }
    }

    fn add_stage_overrides(&self, lines: &mut Vec<String>) {
        for (key, series) in self.elevation.columns() {
            for (profile, value) in series.iter().enumerate() {
                lines.push(format!(
                    "Set Internal Change={:<16},{:<16},{:<8}",
                    key.river, key.reach, key.location
                ));
                lines.push(format!(
                    ", {} , {} , {}\n",
                    profile + 1,
                    STAGE_CHANGE_TYPE,
                    format_shortest(value.unwrap_or(f64::NAN))
                ));
            }
        }
    }
}

// Ten fields per line; the last line holds only what is left
fn flow_block(fields: impl Iterator<Item = String>) -> String {
    let mut block = String::new();
    for (i, field) in fields.enumerate() {
        block.push_str(&field);
        if (i + 1) % VALUES_PER_LINE == 0 {
            block.push('\n');
        }
    }
    block
}
