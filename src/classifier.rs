//! Band classification of wavelength values.

use crate::enums::Band;

/// Lower edge (nm) of the visible range.
pub const VISIBLE_MIN: f64 = 400.0;
/// Upper edge (nm) of the visible range.
pub const VISIBLE_MAX: f64 = 700.0;

/// Classify an illumination wavelength.
///
/// A missing value is visible light. `NaN` satisfies none of the range
/// comparisons and is treated like a missing value.
pub fn classify(value: Option<f64>) -> Band {
    match value {
        Some(v) if v < VISIBLE_MIN => Band::Uv,
        Some(v) if v > VISIBLE_MAX => Band::Ir,
        _ => Band::Vis,
    }
}

/// Classify a filter pass-through wavelength.
///
/// Filters are recorded by their nominal value (see [`Band::nominal_wavelength`]),
/// and only visible-light captures go without one, so any recorded value
/// outside the UV range is taken as IR. There is no visible mid-range here.
pub fn classify_filter(value: Option<f64>) -> Band {
    match value {
        None => Band::Vis,
        Some(v) if v < VISIBLE_MIN => Band::Uv,
        Some(_) => Band::Ir,
    }
}
