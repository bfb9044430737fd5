//! Cloud probability and cloud mask rasters from Sentinel-2 L1C granules.
//!
//! The pipeline: discover the ten model bands in a granule directory, resample
//! them onto one native grid, classify every pixel with a pre-trained
//! gradient-boosted tree model, smooth/threshold/dilate the probabilities into
//! a binary mask, and write both rasters as cloud-optimized GeoTIFFs.

pub mod bands;
pub mod cog;
pub mod error;
pub mod granule;
pub mod grid;
pub mod io;
pub mod mask;
pub mod model;
pub mod stack;

pub use error::{CloudMaskError, Result};
pub use granule::{Granule, OutputPaths};
pub use grid::Resolution;
pub use mask::MaskParams;
pub use model::Model;

use log::info;
use ndarray::Array2;
use std::path::PathBuf;

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub directory: PathBuf,
    /// Whether `directory` is a granule root (with `IMG_DATA/`) or the image
    /// directory itself.
    pub directory_is_granule: bool,
    pub resolution: Resolution,
    pub compression: String,
    pub tile_size: usize,
    pub output_directory: Option<PathBuf>,
    /// Model file; falls back to `S2_CLOUD_DETECTOR_MODEL` when `None`.
    pub model_path: Option<PathBuf>,
    pub mask: MaskParams,
}

/// Runs the full pipeline on one granule and returns where the two rasters
/// were written.
pub fn run(config: &RunConfig) -> Result<OutputPaths> {
    cog::validate_compression(&config.compression)?;
    cog::validate_tile_size(config.tile_size)?;

    let granule = if config.directory_is_granule {
        Granule::from_granule_path(&config.directory)?
    } else {
        Granule::from_img_data(&config.directory)?
    };

    let model_path = model::resolve_model_path(config.model_path.as_deref())?;
    let model = Model::from_path(&model_path)?;

    let stack = stack::load_stack(&granule, config.resolution)?;
    let probabilities = model.predict(&stack.features, stack.grid.shape())?;

    let cloud_mask = mask::cloud_mask(&probabilities, &config.mask);
    let mask_raster = apply_invalid(cloud_mask, &stack.invalid);
    let probability_raster = quantize_probabilities(&probabilities, &stack.invalid);

    let outputs = granule.output_paths(config.output_directory.as_deref());
    let options = cog::create_dataset_options(&config.compression, config.tile_size);
    io::write_u8_raster(
        &outputs.probabilities,
        &probability_raster,
        &stack.grid,
        "cloud_probability_percent",
        options.clone(),
    )?;
    io::write_u8_raster(
        &outputs.cloud_mask,
        &mask_raster,
        &stack.grid,
        "cloud_mask",
        options,
    )?;

    info!(
        "Done: {} and {}",
        outputs.probabilities.display(),
        outputs.cloud_mask.display()
    );
    Ok(outputs)
}

/// Scales probabilities to whole percent (0-100), 255 where invalid.
fn quantize_probabilities(probabilities: &Array2<f32>, invalid: &Array2<bool>) -> Array2<u8> {
    let mut raster = probabilities.mapv(|p| (p * 100.0).clamp(0.0, 100.0) as u8);
    for (value, &bad) in raster.iter_mut().zip(invalid.iter()) {
        if bad {
            *value = 255;
        }
    }
    raster
}

/// Stamps 255 over invalid pixels.
fn apply_invalid(mut raster: Array2<u8>, invalid: &Array2<bool>) -> Array2<u8> {
    for (value, &bad) in raster.iter_mut().zip(invalid.iter()) {
        if bad {
            *value = 255;
        }
    }
    raster
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_quantize_probabilities() {
        let probabilities = arr2(&[[0.0f32, 0.404], [0.999, 1.2]]);
        let invalid = arr2(&[[false, false], [false, false]]);

        let raster = quantize_probabilities(&probabilities, &invalid);
        assert_eq!(raster, arr2(&[[0u8, 40], [99, 100]]));
    }

    #[test]
    fn test_quantize_probabilities_invalid_pixels() {
        let probabilities = arr2(&[[0.9f32, 0.9]]);
        let invalid = arr2(&[[true, false]]);

        let raster = quantize_probabilities(&probabilities, &invalid);
        assert_eq!(raster, arr2(&[[255u8, 90]]));
    }

    #[test]
    fn test_apply_invalid() {
        let mask = arr2(&[[1u8, 0], [0, 1]]);
        let invalid = arr2(&[[false, true], [false, false]]);

        let raster = apply_invalid(mask, &invalid);
        assert_eq!(raster, arr2(&[[1u8, 255], [0, 1]]));
    }
}
