use crate::bands::{BANDS, NODATA_DN, QUANTIFICATION_VALUE, SATURATED_DN};
use crate::error::Result;
use crate::granule::Granule;
use crate::grid::{select_target_grid, Resolution};
use crate::io::{self, RasterGrid};
use log::{debug, info};
use ndarray::{Array2, Axis};

/// All ten bands resampled onto one grid, flattened to model input.
pub struct BandStack {
    /// `(height * width, 10)` reflectances, pixel-major.
    pub features: Array2<f32>,
    /// True where any band was nodata or saturated.
    pub invalid: Array2<bool>,
    pub grid: RasterGrid,
}

/// Loads a granule's bands at the requested resolution and assembles the
/// per-pixel feature matrix.
pub fn load_stack(granule: &Granule, resolution: Resolution) -> Result<BandStack> {
    let grids: Vec<RasterGrid> = granule
        .band_paths()
        .map(|(_, path)| io::probe_grid(path))
        .collect::<Result<_>>()?;
    let grid = select_target_grid(&grids, resolution)?;

    let (height, width) = grid.shape();
    let pixels = height * width;

    let mut features = Array2::<f32>::zeros((pixels, BANDS.len()));
    let mut invalid = Array2::<bool>::from_elem((height, width), false);

    for (i, (band, path)) in granule.band_paths().enumerate() {
        info!("Loading band {} ({}/{})", band, i + 1, BANDS.len());
        let dn = io::read_band_dn(path, grid.shape())?;

        // Nodata and saturation are flagged on raw DNs, before scaling
        let flagged = mark_invalid(&dn, &mut invalid);
        if flagged > 0 {
            debug!("Band {}: {} invalid pixels", band, flagged);
        }

        let mut column = features.index_axis_mut(Axis(1), i);
        for (feature, &value) in column.iter_mut().zip(dn.iter()) {
            *feature = f32::from(value) / QUANTIFICATION_VALUE;
        }
    }

    Ok(BandStack {
        features,
        invalid,
        grid,
    })
}

/// Ors nodata/saturated DNs into the invalid mask, returning how many pixels
/// this band flagged.
fn mark_invalid(dn: &Array2<u16>, invalid: &mut Array2<bool>) -> usize {
    let mut flagged = 0;
    for (mask, &value) in invalid.iter_mut().zip(dn.iter()) {
        if value == NODATA_DN || value == SATURATED_DN {
            *mask = true;
            flagged += 1;
        }
    }
    flagged
}
