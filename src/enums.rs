use serde::{Deserialize, Serialize};

/// Spectral band of a filter or an illumination source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Band {
    Vis,
    Uv,
    Ir,
}

impl Band {
    /// Nominal pass-through wavelength (nm) written for a filter of this band.
    ///
    /// Visible-light captures carry no filter, so no value is recorded.
    pub fn nominal_wavelength(self) -> Option<u16> {
        match self {
            Band::Vis => None,
            Band::Uv => Some(365),
            Band::Ir => Some(800),
        }
    }
}

/// Which set of the calibration manifest an instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSet {
    /// Member of the spectral stack, marked with the `WAVELENGTH` image type.
    Spectral,
    /// Individual (per-material) image, keyed by its label.
    Individual,
}
