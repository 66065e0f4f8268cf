use crate::io::steady_flow::{DEFAULT_PROGRAM_VERSION, FlowMode};
use crate::mapper::MappingMode;
use crate::resample::{ExportWindow, TimeStep};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// Run configuration loaded from YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub title: Option<String>,
    pub node_table: PathBuf,
    pub special_output: Vec<ReachSource>,
    #[serde(default)]
    pub export: ExportConfig,
    pub steady_flow: SteadyFlowConfig,
    #[serde(default)]
    pub mapping: MappingMode,
    #[serde(default)]
    pub results_csv: Option<PathBuf>,
}

// One special-output file and the river/reach it belongs to
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReachSource {
    pub reach: String,
    pub river: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default)]
    pub time_step: Option<TimeStep>,
    #[serde(default)]
    pub number_of_days: Option<f64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SteadyFlowConfig {
    pub output: PathBuf,
    #[serde(default = "default_program_version")]
    pub program_version: String,
    #[serde(default)]
    pub flow: FlowMode,
    #[serde(default)]
    pub profiles: ProfileMode,
}

// Which rows become steady-flow profiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    #[default]
    TimeSeries,
    Maximum,
}

fn default_program_version() -> String {
    DEFAULT_PROGRAM_VERSION.to_string()
}

impl RunConfig {
    /// Loads a configuration file; relative paths inside it are taken
    /// relative to the file's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config: {:?}", path))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(text)?;
        if config.special_output.is_empty() {
            anyhow::bail!("at least one special output file must be configured");
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.node_table);
        resolve(&mut self.steady_flow.output);
        for source in &mut self.special_output {
            resolve(&mut source.file);
        }
        if let Some(results) = self.results_csv.as_mut() {
            resolve(results);
        }
    }

    pub fn export_window(&self) -> Result<ExportWindow> {
        let start = self.export.start.as_deref().map(parse_timestamp).transpose()?;
        let end = self.export.end.as_deref().map(parse_timestamp).transpose()?;
        Ok(ExportWindow::new(
            self.export.time_step,
            start,
            end,
            self.export.number_of_days,
        )?)
    }

    // Configured title, or today's date
    pub fn title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => chrono::Local::now().format("%B %d, %Y").to_string(),
        }
    }
}

pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(timestamp);
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse timestamp: {text}"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}
