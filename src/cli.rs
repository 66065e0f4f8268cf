use clap::Parser;
use std::path::PathBuf;

/// Convert FEQ special output into a HEC-RAS steady flow file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// YAML run configuration
    #[arg(short, long, default_value = "feq_ras.yaml")]
    pub config: PathBuf,

    /// Override the steady flow output path from the config
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the flow title from the config
    #[arg(short, long)]
    pub title: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn get_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_optional() {
        let args = Args::parse_from(["feq_ras", "-c", "run.yaml", "-vv"]);
        assert_eq!(args.config, PathBuf::from("run.yaml"));
        assert_eq!(args.output, None);
        assert_eq!(args.verbose, 2);
    }
}
