//! End-to-end run over a synthetic granule.
//!
//! Band fixtures are tiny GeoTIFFs carrying the `.jp2` names GDAL resolves by
//! content, laid out at the three native Sentinel-2 resolutions over one
//! 360 m x 360 m extent.

use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use s2cloudmask::{MaskParams, Resolution, RunConfig};
use std::path::Path;
use tempfile::TempDir;

const EXTENT: f64 = 360.0;

/// One split on B01 reflectance: bright pixels score +2 (cloud), dark -2.
const MODEL: &str = "\
tree
version=v3
num_class=1
num_tree_per_iteration=1
max_feature_idx=9
objective=binary sigmoid:1

Tree=0
num_leaves=2
num_cat=0
split_feature=0
split_gain=1
threshold=0.05
decision_type=2
left_child=-1
right_child=-2
leaf_value=-2.0 2.0
shrinkage=1

end of trees
";

fn write_band(directory: &Path, band: &str, pixel_size: f64, dn: &Array2<u16>) {
    let (height, width) = dn.dim();
    assert_eq!(width as f64 * pixel_size, EXTENT);

    let path = directory.join(format!("T33UUP_20210101T100319_{band}.jp2"));
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<u16, _>(&path, width, height, 1)
        .unwrap();
    dataset
        .set_geo_transform(&[0.0, pixel_size, 0.0, EXTENT, 0.0, -pixel_size])
        .unwrap();

    let mut band = dataset.rasterband(1).unwrap();
    let mut buffer = Buffer::new((width, height), dn.as_slice().unwrap().to_vec());
    band.write((0, 0), (width, height), &mut buffer).unwrap();
}

/// Constant-valued band at the given grid size.
fn flat_band(size: usize, dn: u16) -> Array2<u16> {
    Array2::from_elem((size, size), dn)
}

/// B01 at 60 m: bright (cloudy) top three rows, dark bottom three.
fn b01_band() -> Array2<u16> {
    let mut dn = Array2::from_elem((6, 6), 200u16);
    for y in 0..3 {
        for x in 0..6 {
            dn[[y, x]] = 1000;
        }
    }
    dn
}

fn build_granule(directory: &Path) {
    write_band(directory, "B01", 60.0, &b01_band());
    write_band(directory, "B09", 60.0, &flat_band(6, 500));

    // One nodata DN in B10 marks pixel (5, 0) invalid
    let mut b10 = flat_band(6, 500);
    b10[[5, 0]] = 0;
    write_band(directory, "B10", 60.0, &b10);

    for band in ["B05", "B8A", "B11", "B12"] {
        write_band(directory, band, 20.0, &flat_band(18, 500));
    }
    for band in ["B02", "B04", "B08"] {
        write_band(directory, band, 10.0, &flat_band(36, 500));
    }
}

fn read_u8(path: &Path) -> (Vec<u8>, Option<f64>) {
    let dataset = Dataset::open(path).unwrap();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!((band.x_size(), band.y_size()), (6, 6));
    let buffer = band.read_as::<u8>((0, 0), (6, 6), (6, 6), None).unwrap();
    let nodata = band.no_data_value();
    (buffer.into_iter().collect(), nodata)
}

fn at(data: &[u8], y: usize, x: usize) -> u8 {
    data[y * 6 + x]
}

#[test]
fn test_pipeline_on_synthetic_granule() {
    let img_data = TempDir::new().unwrap();
    build_granule(img_data.path());

    let model_file = img_data.path().join("detector.txt");
    std::fs::write(&model_file, MODEL).unwrap();

    let output = TempDir::new().unwrap();
    let config = RunConfig {
        directory: img_data.path().to_path_buf(),
        directory_is_granule: false,
        resolution: Resolution::Low,
        compression: "DEFLATE".to_string(),
        tile_size: 256,
        output_directory: Some(output.path().to_path_buf()),
        model_path: Some(model_file),
        mask: MaskParams::default(),
    };

    let outputs = s2cloudmask::run(&config).unwrap();
    assert_eq!(
        outputs.probabilities,
        output.path().join("T33UUP_20210101T100319_probabilities.tif")
    );
    assert!(outputs.probabilities.is_file());
    assert!(outputs.cloud_mask.is_file());

    // sigmoid(2) = 0.8808 -> 88, sigmoid(-2) = 0.1192 -> 11
    let (probabilities, nodata) = read_u8(&outputs.probabilities);
    assert_eq!(nodata, Some(255.0));
    assert_eq!(at(&probabilities, 1, 1), 88);
    assert_eq!(at(&probabilities, 4, 4), 11);
    assert_eq!(at(&probabilities, 5, 0), 255);

    let (mask, nodata) = read_u8(&outputs.cloud_mask);
    assert_eq!(nodata, Some(255.0));
    // Cloudy rows survive smoothing and thresholding
    assert_eq!(at(&mask, 1, 1), 1);
    // Dilation pushes the mask one row past the cloudy block
    assert_eq!(at(&mask, 3, 3), 1);
    // Two rows away stays clear
    assert_eq!(at(&mask, 4, 4), 0);
    assert_eq!(at(&mask, 5, 5), 0);
    // Invalid pixel is nodata
    assert_eq!(at(&mask, 5, 0), 255);
}

#[test]
fn test_probe_rejects_non_square_pixels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("T33UUP_20210101T100319_B01.jp2");

    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<u16, _>(&path, 6, 6, 1)
        .unwrap();
    dataset
        .set_geo_transform(&[0.0, 60.0, 0.0, EXTENT, 0.0, -59.0])
        .unwrap();
    drop(dataset);

    let err = s2cloudmask::io::probe_grid(&path).unwrap_err();
    assert!(err.to_string().contains("non-square pixels"));
}

#[test]
fn test_pipeline_rejects_non_native_resolution() {
    let img_data = TempDir::new().unwrap();
    build_granule(img_data.path());

    let model_file = img_data.path().join("detector.txt");
    std::fs::write(&model_file, MODEL).unwrap();

    let config = RunConfig {
        directory: img_data.path().to_path_buf(),
        directory_is_granule: false,
        resolution: Resolution::Meters(30.0),
        compression: "DEFLATE".to_string(),
        tile_size: 256,
        output_directory: None,
        model_path: Some(model_file),
        mask: MaskParams::default(),
    };

    let err = s2cloudmask::run(&config).unwrap_err();
    assert!(err.to_string().contains("not a native resolution"));
}

#[test]
fn test_pipeline_at_explicit_native_resolution() {
    let img_data = TempDir::new().unwrap();
    build_granule(img_data.path());

    let model_file = img_data.path().join("detector.txt");
    std::fs::write(&model_file, MODEL).unwrap();

    let output = TempDir::new().unwrap();
    let config = RunConfig {
        directory: img_data.path().to_path_buf(),
        directory_is_granule: false,
        resolution: Resolution::Meters(20.0),
        compression: "LZW".to_string(),
        tile_size: 256,
        output_directory: Some(output.path().to_path_buf()),
        model_path: Some(model_file),
        mask: MaskParams::default(),
    };

    let outputs = s2cloudmask::run(&config).unwrap();
    let dataset = Dataset::open(&outputs.probabilities).unwrap();
    // 20 m grid over the 360 m extent
    assert_eq!(dataset.raster_size(), (18, 18));
    let geotransform = dataset.geo_transform().unwrap();
    assert_eq!(geotransform[1], 20.0);
}
