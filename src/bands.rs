use std::fmt;

/// The ten Sentinel-2 L1C bands the cloud detector model was trained on,
/// in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    B01,
    B02,
    B04,
    B05,
    B08,
    B8A,
    B09,
    B10,
    B11,
    B12,
}

pub const BANDS: [Band; 10] = [
    Band::B01,
    Band::B02,
    Band::B04,
    Band::B05,
    Band::B08,
    Band::B8A,
    Band::B09,
    Band::B10,
    Band::B11,
    Band::B12,
];

/// L1C reflectances are stored as DN / 10000.
pub const QUANTIFICATION_VALUE: f32 = 10000.0;

/// DN marking pixels with no data.
pub const NODATA_DN: u16 = 0;

/// DN marking saturated pixels.
pub const SATURATED_DN: u16 = 65535;

impl Band {
    /// Parses a band identifier as it appears in L1C file names (`B01`, `B8A`, ...).
    pub fn from_file_token(token: &str) -> Option<Band> {
        match token {
            "B01" => Some(Band::B01),
            "B02" => Some(Band::B02),
            "B04" => Some(Band::B04),
            "B05" => Some(Band::B05),
            "B08" => Some(Band::B08),
            "B8A" => Some(Band::B8A),
            "B09" => Some(Band::B09),
            "B10" => Some(Band::B10),
            "B11" => Some(Band::B11),
            "B12" => Some(Band::B12),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Band::B01 => "B01",
            Band::B02 => "B02",
            Band::B04 => "B04",
            Band::B05 => "B05",
            Band::B08 => "B08",
            Band::B8A => "B8A",
            Band::B09 => "B09",
            Band::B10 => "B10",
            Band::B11 => "B11",
            Band::B12 => "B12",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
