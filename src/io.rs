use crate::error::{CloudMaskError, Result};
use gdal::raster::{Buffer, RasterBand, ResampleAlg};
use gdal::{Dataset, Metadata};
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

/// Georeferencing of one raster grid.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    /// Square pixel size in CRS units (meters for Sentinel-2 tiles).
    pub pixel_size: f64,
}

impl RasterGrid {
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Reads the grid of a single-band raster without touching its pixels.
pub fn probe_grid(path: &Path) -> Result<RasterGrid> {
    let dataset = Dataset::open(path)?;
    let band: RasterBand = dataset.rasterband(1)?;

    let width = band.x_size();
    let height = band.y_size();
    if width == 0 || height == 0 {
        return Err(CloudMaskError::InvalidDimensions {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let geotransform = dataset.geo_transform()?;
    let pixel_width = geotransform[1].abs();
    let pixel_height = geotransform[5].abs();
    if (pixel_width - pixel_height).abs() > 1e-9 {
        return Err(CloudMaskError::NonSquarePixels {
            path: path.to_path_buf(),
            x: pixel_width,
            y: pixel_height,
        });
    }

    debug!(
        "{}: {}x{} at {} m",
        path.display(),
        width,
        height,
        pixel_width
    );

    Ok(RasterGrid {
        width,
        height,
        geotransform,
        projection: dataset.projection(),
        pixel_size: pixel_width,
    })
}

/// Reads a band's raw digital numbers, resampled (nearest-neighbour) onto the
/// target shape. Bands already at the target resolution pass through unchanged.
pub fn read_band_dn(path: &Path, shape: (usize, usize)) -> Result<Array2<u16>> {
    let (height, width) = shape;
    debug!(
        "Reading {} at {}x{}",
        path.display(),
        width,
        height
    );

    let dataset = Dataset::open(path)?;
    let band: RasterBand = dataset.rasterband(1)?;

    let buffer = band.read_as::<u16>(
        (0, 0),
        (band.x_size(), band.y_size()),
        (width, height),
        Some(ResampleAlg::NearestNeighbour),
    )?;

    let data_vec: Vec<u16> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((height, width), data_vec)?;
    Ok(data)
}

/// Writes a single-band u8 raster as a tiled GeoTIFF with the given creation
/// options, nodata 255 and internal overviews.
pub fn write_u8_raster(
    path: &Path,
    data: &Array2<u8>,
    grid: &RasterGrid,
    description: &str,
    options: Vec<String>,
) -> Result<()> {
    info!("Creating output raster: {}", path.display());

    let mut dataset = crate::cog::create_u8_dataset(path, grid, options)?;

    dataset.set_geo_transform(&grid.geotransform)?;
    dataset.set_projection(&grid.projection)?;

    {
        let mut band = dataset.rasterband(1)?;
        let band_slice = data.as_slice().expect("Array must be contiguous");
        let mut buffer = Buffer::new((grid.width, grid.height), band_slice.to_vec());
        band.write((0, 0), (grid.width, grid.height), &mut buffer)?;
        band.set_description(description)?;
        band.set_no_data_value(Some(255.0))?;
    }

    crate::cog::build_overviews(&mut dataset)?;

    info!("Wrote {}", path.display());
    Ok(())
}
