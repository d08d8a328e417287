use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use zstack::cutout::FitsIo;
use zstack::store::Store;
use zstack::{Config, ScaleModel, SelectorOptions, Stacker, StackerOptions};

/// Stack moving-target cutouts by night, target and filter.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML configuration file.
    #[arg(long, default_value = "zstack.yaml")]
    config: PathBuf,

    /// Only stack these targets. May repeat.
    #[arg(long = "desg")]
    desgs: Vec<String>,

    /// Restack groups that were already processed.
    #[arg(long)]
    restack: bool,

    /// Length of the baseline window in days.
    #[arg(long)]
    baseline_days: Option<f64>,

    /// Scaling models to produce. May repeat.
    #[arg(long = "scale", value_enum)]
    scales: Vec<ScaleModel>,

    /// Reset the status of images whose stack file has vanished.
    #[arg(long)]
    clean_missing: bool,

    /// Base log filter, e.g. `debug` or `zstack=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    common::log_setup::setup_logging(level, &config.log_dir, "zstack")
        .context("Failed to set up logging")?;

    let store = Store::open(&config.database)
        .with_context(|| format!("Failed to open {}", config.database.display()))?;
    let io = FitsIo::new(config.mask_plane.clone(), config.alignment_plane.clone());

    let mut options = StackerOptions::new(&config.cutout_path, &config.stack_path);
    options.restack = args.restack;
    options.unmask_half_width = config.unmask_half_width;
    options.scales = if args.scales.is_empty() {
        config.scales.clone()
    } else {
        args.scales
    };

    let selector = SelectorOptions {
        desgs: args.desgs,
        restack: args.restack,
        baseline_days: args.baseline_days.unwrap_or(config.baseline_days),
    };

    tracing::info!(
        "Stacking {} into {}",
        config.cutout_path.display(),
        config.stack_path.display()
    );

    let mut stacker = Stacker::new(store, io, options);
    if args.clean_missing {
        stacker.clean_missing()?;
    }
    stacker.run(&selector)?;

    Ok(())
}
