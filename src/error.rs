use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudMaskError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{0:?} is not a Sentinel-2 granule, it does not contain an IMG_DATA directory")]
    NotAGranule(PathBuf),

    #[error("granule directory {directory:?} is missing bands: {bands}")]
    MissingBands { directory: PathBuf, bands: String },

    #[error("band file {path:?} has non-square pixels: {x} x {y}")]
    NonSquarePixels { path: PathBuf, x: f64, y: f64 },

    #[error("requested resolution {requested} m is not a native resolution (native: {native})")]
    NotANativeResolution { requested: f64, native: String },

    #[error("invalid resolution specifier: {0} (expected 'high', 'low' or a value in meters)")]
    InvalidResolution(String),

    #[error("band file {path:?} has invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        path: PathBuf,
        width: usize,
        height: usize,
    },

    #[error("no cloud detector model configured; pass --model or set S2_CLOUD_DETECTOR_MODEL")]
    ModelNotConfigured,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("invalid tile size: {0} (must be a positive multiple of 16)")]
    InvalidTileSize(usize),
}

pub type Result<T> = std::result::Result<T, CloudMaskError>;
