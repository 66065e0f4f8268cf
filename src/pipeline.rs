use crate::config::{ProfileMode, ReachSource, RunConfig};
use crate::io::node_table::NodeTable;
use crate::io::results::write_results_csv;
use crate::io::special_output::{SpecialOutput, read_special_output_file};
use crate::io::steady_flow::{FlowMode, SteadyFlowWriter};
use crate::mapper::CrossSectionMapper;
use crate::timeseries::{TimeSeriesTable, Variable};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info, warn};

// Everything a run produces before the document is written out
#[derive(Debug)]
pub struct PipelineOutput {
    pub title: String,
    pub document: String,
    pub table: TimeSeriesTable,
}

/// Parses every configured reach in parallel and union-merges them in
/// configuration order.
pub fn load_reaches(sources: &[ReachSource], pb: &ProgressBar) -> Result<TimeSeriesTable> {
    let parsed: Vec<Result<SpecialOutput>> = sources
        .par_iter()
        .map(|source| {
            let output = read_special_output_file(&source.file, &source.river, &source.reach)
                .with_context(|| format!("Failed to load special output: {:?}", source.file));
            pb.inc(1);
            output
        })
        .collect();

    let mut combined: Option<TimeSeriesTable> = None;
    for (source, output) in sources.iter().zip(parsed) {
        let output = output?;
        for skipped in &output.skipped {
            warn!(
                "{}: skipped line {} ({:?})",
                source.file.display(),
                skipped.line_number,
                skipped.reason
            );
        }
        info!(
            "Loaded {} rows for {},{} from {}",
            output.table.len(),
            source.river,
            source.reach,
            source.file.display()
        );

        combined = Some(match combined {
            Some(table) => table.merge(&output.table).with_context(|| {
                format!("Failed to merge reach {},{}", source.river, source.reach)
            })?,
            None => output.table,
        });
    }

    combined.context("No special output files configured")
}

pub fn run(config: &RunConfig, pb: &ProgressBar) -> Result<PipelineOutput> {
    let node_table = NodeTable::from_path(&config.node_table)
        .with_context(|| format!("Failed to load node table: {:?}", config.node_table))?;
    info!("Loaded {} node table records", node_table.len());
    warn_unknown_reaches(config, &node_table);

    let combined = load_reaches(&config.special_output, pb)?;
    debug!(
        "Combined table has {} rows and variables {:?}",
        combined.len(),
        combined.variables()
    );

    let window = config.export_window()?;
    let windowed = window.apply(&combined).context("Failed to resample special output")?;
    if let Some(step) = window.time_step() {
        info!("Resampled to {} rows at {}", windowed.len(), step);
    }

    let mapped = CrossSectionMapper::new(&node_table)
        .with_mode(config.mapping)
        .map(&windowed)
        .context("Failed to map nodes to cross sections")?;

    let title = config.title();
    let writer = SteadyFlowWriter::new(&config.steady_flow.program_version)
        .with_flow_mode(config.steady_flow.flow);
    let document = match config.steady_flow.profiles {
        ProfileMode::TimeSeries => writer.write(&mapped, &title)?,
        ProfileMode::Maximum => {
            let elevation = mapped.maximum(Variable::ELEVATION)?;
            let flow = match config.steady_flow.flow {
                FlowMode::Table => Some(mapped.maximum(Variable::FLOW)?),
                FlowMode::Dummy => None,
            };
            writer.write_frames(&title, &elevation, flow.as_ref())?
        }
    };

    // the results file only follows a saved document
    SteadyFlowWriter::save(&config.steady_flow.output, &document)?;

    if let Some(path) = &config.results_csv {
        let elevation = mapped.select_variable(Variable::ELEVATION)?;
        let flow = mapped.select_variable(Variable::FLOW)?;
        write_results_csv(path, &elevation, &flow)
            .with_context(|| format!("Failed to write results: {:?}", path))?;
        info!("Results saved to {}", path.display());
    }

    Ok(PipelineOutput {
        title,
        document,
        table: mapped,
    })
}

fn warn_unknown_reaches(config: &RunConfig, node_table: &NodeTable) {
    let known = node_table.river_reaches();
    for source in &config.special_output {
        let listed = known
            .iter()
            .any(|(river, reaches)| *river == source.river && reaches.contains(&source.reach));
        if !listed {
            warn!(
                "{},{} does not appear in the node table",
                source.river, source.reach
            );
        }
    }
}
