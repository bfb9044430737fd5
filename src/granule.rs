use crate::bands::{Band, BANDS};
use crate::error::{CloudMaskError, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A Sentinel-2 L1C granule: one JP2 file per model band.
#[derive(Debug, Clone)]
pub struct Granule {
    paths: BTreeMap<Band, PathBuf>,
}

/// Where the two result rasters go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub probabilities: PathBuf,
    pub cloud_mask: PathBuf,
}

impl Granule {
    /// Opens a SAFE-style granule directory, which keeps its imagery under `IMG_DATA`.
    pub fn from_granule_path(directory: &Path) -> Result<Granule> {
        let img_data = directory.join("IMG_DATA");
        if !img_data.is_dir() {
            return Err(CloudMaskError::NotAGranule(directory.to_path_buf()));
        }
        Granule::from_img_data(&img_data)
    }

    /// Opens a directory containing the band JP2 files directly.
    pub fn from_img_data(directory: &Path) -> Result<Granule> {
        info!("Scanning granule directory: {}", directory.display());

        let mut paths: BTreeMap<Band, PathBuf> = BTreeMap::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jp2") {
                continue;
            }
            if let Some(band) = band_of_file(&path) {
                debug!("Band {}: {}", band, path.display());
                paths.insert(band, path);
            }
        }

        let missing: Vec<&str> = BANDS
            .iter()
            .copied()
            .filter(|b| !paths.contains_key(b))
            .map(|b| b.name())
            .collect();
        if !missing.is_empty() {
            return Err(CloudMaskError::MissingBands {
                directory: directory.to_path_buf(),
                bands: missing.join(", "),
            });
        }

        Ok(Granule { paths })
    }

    /// Path of a band's JP2 file. All ten bands are present by construction.
    pub fn band_path(&self, band: Band) -> &Path {
        &self.paths[&band]
    }

    /// Band paths in feature order.
    pub fn band_paths(&self) -> impl Iterator<Item = (Band, &Path)> {
        BANDS.iter().map(move |&b| (b, self.band_path(b)))
    }

    /// Derives the output raster paths from the B01 file name, dropping the
    /// band token: `T33UUP_20210101T100319_B01.jp2` becomes
    /// `T33UUP_20210101T100319_probabilities.tif` and `..._cloud_mask.tif`.
    pub fn output_paths(&self, output_directory: Option<&Path>) -> OutputPaths {
        let reference = self.band_path(BANDS[0]);
        let directory = output_directory
            .map(Path::to_path_buf)
            .unwrap_or_else(|| reference.parent().unwrap_or(Path::new(".")).to_path_buf());

        let stem = reference
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("granule");
        let base = match stem.rsplit_once('_') {
            Some((prefix, _band)) => prefix,
            None => stem,
        };

        OutputPaths {
            probabilities: directory.join(format!("{base}_probabilities.tif")),
            cloud_mask: directory.join(format!("{base}_cloud_mask.tif")),
        }
    }
}

/// Extracts the band identifier from a file name; it is the last `_`-separated
/// token of the stem (`..._20210101T100319_B8A.jp2` -> `B8A`).
fn band_of_file(path: &Path) -> Option<Band> {
    let stem = path.file_stem()?.to_str()?;
    let token = match stem.rsplit_once('_') {
        Some((_, token)) => token,
        None => stem,
    };
    Band::from_file_token(token)
}
