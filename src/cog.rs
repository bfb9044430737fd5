use crate::error::{CloudMaskError, Result};
use crate::io::RasterGrid;
use gdal::cpl::CslStringList;
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use std::path::Path;

pub const DEFAULT_COMPRESSION: &str = "DEFLATE";
pub const DEFAULT_TILE_SIZE: usize = 512;

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    let valid_types = ["DEFLATE", "LZW", "ZSTD", "NONE"];
    if !valid_types.contains(&compression) {
        return Err(CloudMaskError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// Validate tile size (must be multiple of 16)
pub fn validate_tile_size(tile_size: usize) -> Result<()> {
    if tile_size == 0 || tile_size % 16 != 0 {
        return Err(CloudMaskError::InvalidTileSize(tile_size));
    }
    Ok(())
}

/// Create dataset options for tiled output
pub fn create_dataset_options(compression: &str, tile_size: usize) -> Vec<String> {
    let mut options = vec![
        format!("COMPRESS={}", compression),
        "TILED=YES".to_string(),
        format!("BLOCKXSIZE={}", tile_size),
        format!("BLOCKYSIZE={}", tile_size),
        "BIGTIFF=IF_SAFER".to_string(),
    ];
    // PREDICTOR only applies to compressed output
    if compression != "NONE" {
        options.push("PREDICTOR=2".to_string());
    }
    options
}

/// Create a single-band u8 output dataset with the given creation options
pub fn create_u8_dataset(path: &Path, grid: &RasterGrid, options: Vec<String>) -> Result<Dataset> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let dataset = if options.is_empty() {
        driver.create_with_band_type::<u8, _>(path, grid.width, grid.height, 1)?
    } else {
        let mut gdal_options = CslStringList::new();
        for opt in options {
            gdal_options.add_string(&opt)?;
        }

        driver.create_with_band_type_with_options::<u8, _>(
            path,
            grid.width,
            grid.height,
            1,
            &gdal_options,
        )?
    };

    Ok(dataset)
}

/// Build internal overviews so the output reads as a COG
pub fn build_overviews(dataset: &mut Dataset) -> Result<()> {
    let (width, height) = dataset.raster_size();
    let min_dim = width.min(height);

    let mut overview_levels: Vec<i32> = Vec::new();
    let mut level = 2;

    // Halve until the smallest dimension drops under 256
    while (min_dim / level) >= 256 {
        overview_levels.push(level as i32);
        level *= 2;
    }

    if overview_levels.is_empty() {
        debug!(
            "Raster too small for overviews ({}x{}), skipping",
            width, height
        );
        return Ok(());
    }

    info!(
        "Creating {} overview levels: {:?}",
        overview_levels.len(),
        overview_levels
    );

    // NEAREST keeps the 255 nodata out of downsampled levels
    dataset.build_overviews("NEAREST", &overview_levels, &[])?;
    Ok(())
}
