use crate::error::{CloudMaskError, Result};
use crate::io::RasterGrid;
use log::info;
use std::str::FromStr;

/// Which native resolution the pipeline runs at.
///
/// Sentinel-2 L1C bands come at 10, 20 and 60 m; the target grid is always one
/// of the native grids, never an interpolated in-between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Finest native resolution present (10 m for a full granule).
    High,
    /// Coarsest native resolution present (60 m for a full granule).
    Low,
    /// An explicit pixel size in meters; must match a native resolution.
    Meters(f64),
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Low
    }
}

impl FromStr for Resolution {
    type Err = CloudMaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(Resolution::High),
            "low" => Ok(Resolution::Low),
            other => other
                .parse::<f64>()
                .map(Resolution::Meters)
                .map_err(|_| CloudMaskError::InvalidResolution(s.to_string())),
        }
    }
}

/// Picks the target grid among the distinct native grids of the band files.
///
/// `grids` holds one entry per band, in band order; bands sharing a pixel size
/// share a grid, so selection runs over the distinct pixel sizes.
pub fn select_target_grid(grids: &[RasterGrid], resolution: Resolution) -> Result<RasterGrid> {
    // One representative grid per native pixel size, first band wins
    let mut native: Vec<&RasterGrid> = Vec::new();
    for grid in grids {
        if !native.iter().any(|g| g.pixel_size == grid.pixel_size) {
            native.push(grid);
        }
    }

    let chosen = match resolution {
        Resolution::Low => native
            .iter()
            .max_by(|a, b| a.pixel_size.total_cmp(&b.pixel_size)),
        Resolution::High => native
            .iter()
            .min_by(|a, b| a.pixel_size.total_cmp(&b.pixel_size)),
        Resolution::Meters(meters) => {
            let found = native.iter().find(|g| g.pixel_size == meters);
            if found.is_none() {
                let mut sizes: Vec<f64> = native.iter().map(|g| g.pixel_size).collect();
                sizes.sort_by(f64::total_cmp);
                return Err(CloudMaskError::NotANativeResolution {
                    requested: meters,
                    native: sizes
                        .iter()
                        .map(|s| format!("{s} m"))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            found
        }
    };

    // `grids` is non-empty (one entry per model band), so a grid always exists
    let grid = (*chosen.expect("at least one native grid")).clone();
    info!(
        "Target grid: {}x{} at {} m",
        grid.width, grid.height, grid.pixel_size
    );
    Ok(grid)
}
