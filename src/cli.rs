use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "s2cloudmask")]
#[command(about = "Derive cloud probability and cloud mask COGs from a Sentinel-2 L1C granule")]
#[command(version)]
pub struct Args {
    /// Granule directory (containing IMG_DATA), or the image directory itself
    /// with --img-data
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// DIRECTORY is the image directory itself, not a granule root
    #[arg(long)]
    pub img_data: bool,

    /// Target resolution: 'low', 'high', or a native pixel size in meters
    #[arg(short, long, value_name = "RES", default_value = "low")]
    pub resolution: String,

    /// Output compression (DEFLATE, LZW, ZSTD, NONE)
    #[arg(short, long, value_name = "TYPE", default_value = "DEFLATE")]
    pub compression: String,

    /// Output tile size (multiple of 16)
    #[arg(long, value_name = "N", default_value = "512")]
    pub tile_size: usize,

    /// Write outputs here instead of next to the inputs
    #[arg(short, long, value_name = "DIR")]
    pub output_directory: Option<PathBuf>,

    /// LightGBM model file (default: $S2_CLOUD_DETECTOR_MODEL)
    #[arg(long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Cloud probability threshold
    #[arg(long, value_name = "P", default_value = "0.4")]
    pub threshold: f32,

    /// Averaging kernel radius in pixels
    #[arg(long, value_name = "R", default_value = "1")]
    pub average_over: usize,

    /// Dilation kernel radius in pixels
    #[arg(long, value_name = "R", default_value = "1")]
    pub dilation_size: usize,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
