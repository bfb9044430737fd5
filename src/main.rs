use clap::Parser;
use env_logger::Env;
use log::info;

mod cli;

use cli::Args;
use s2cloudmask::{MaskParams, Resolution, Result, RunConfig};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Sentinel-2 Cloud Mask ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .expect("Failed to build thread pool");
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    let resolution: Resolution = args.resolution.parse()?;

    let config = RunConfig {
        directory: args.directory,
        directory_is_granule: !args.img_data,
        resolution,
        compression: args.compression,
        tile_size: args.tile_size,
        output_directory: args.output_directory,
        model_path: args.model,
        mask: MaskParams {
            threshold: args.threshold,
            average_over: args.average_over,
            dilation_size: args.dilation_size,
        },
    };

    let outputs = s2cloudmask::run(&config)?;

    info!("Probabilities: {}", outputs.probabilities.display());
    info!("Cloud mask:    {}", outputs.cloud_mask.display());
    info!("=== Done! ===");
    Ok(())
}
