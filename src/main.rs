use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

mod cli;
mod logging;

use cli::get_args;
use feq_ras::config::RunConfig;
use feq_ras::pipeline;

fn main() -> Result<()> {
    let args = get_args();
    logging::init(args.verbose);

    let mut config = RunConfig::from_path(&args.config)?;
    if let Some(output) = args.output {
        config.steady_flow.output = output;
    }
    if let Some(title) = args.title {
        config.title = Some(title);
    }

    // Progress over special output files
    let pb = ProgressBar::new(config.special_output.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} reaches",
            )?
            .progress_chars("#>-"),
    );

    let output = pipeline::run(&config, &pb)?;
    pb.finish_and_clear();

    let path = &config.steady_flow.output;
    info!(
        "{} rows for {} cross sections",
        output.table.len(),
        output.table.entity_keys().len()
    );
    println!("Steady flow file '{}' saved to {}", output.title, path.display());
    Ok(())
}
