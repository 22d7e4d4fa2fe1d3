//! The calibration manifest describing one capture session.

use std::{fmt, fs, path::Path};

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};
use thiserror::Error;

use crate::enums::Band;

/// Default manifest file name inside a project directory.
pub const MANIFEST_FILE: &str = "spectral.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thumbnails are enabled but thumbnails_width/thumbnails_height is missing")]
    MissingThumbnailSize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type")]
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WavelengthSpec {
    #[serde(default)]
    pub value: Option<f64>,
}

/// One source image, either of the spectral stack or an individual image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Capture {
    /// File name, relative to the project directory.
    pub name: String,
    pub filter: FilterSpec,
    #[serde(default)]
    pub wavelength: Option<WavelengthSpec>,
}

impl Capture {
    pub fn illumination_wavelength(&self) -> Option<f64> {
        self.wavelength.as_ref().and_then(|w| w.value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationManifest {
    /// Physical size of one pixel, (row spacing, column spacing).
    #[serde(rename = "PixelRatio")]
    pub pixel_ratio: [f64; 2],
    #[serde(default)]
    pub spectral: Vec<Capture>,
    /// Individual images by label, in document order.
    #[serde(
        rename = "individualImages",
        default,
        deserialize_with = "ordered_captures"
    )]
    pub individual_images: Vec<(String, Capture)>,
    #[serde(default)]
    pub thumbnails: bool,
    #[serde(default)]
    pub thumbnails_width: Option<u32>,
    #[serde(default)]
    pub thumbnails_height: Option<u32>,
}

impl CalibrationManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(text)?;
        manifest.thumbnail_size()?;
        Ok(manifest)
    }

    /// Bounding box (width, height) of the thumbnails, `None` when disabled.
    pub fn thumbnail_size(&self) -> Result<Option<(u32, u32)>, ManifestError> {
        if !self.thumbnails {
            return Ok(None);
        }
        match (self.thumbnails_width, self.thumbnails_height) {
            (Some(width), Some(height)) => Ok(Some((width, height))),
            _ => Err(ManifestError::MissingThumbnailSize),
        }
    }

    pub fn capture_count(&self) -> usize {
        self.spectral.len() + self.individual_images.len()
    }
}

fn ordered_captures<'de, D>(deserializer: D) -> Result<Vec<(String, Capture)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedCaptures;

    impl<'de> Visitor<'de> for OrderedCaptures {
        type Value = Vec<(String, Capture)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of label to capture")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut captures = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry::<String, Capture>()? {
                captures.push(entry);
            }
            Ok(captures)
        }
    }

    deserializer.deserialize_map(OrderedCaptures)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "PixelRatio": [0.1, 0.2],
        "spectral": [
            {"name": "a.jpg", "filter": {"type": "UV"}, "wavelength": {"value": 350}},
            {"name": "b.jpg", "filter": {"type": "VIS"}}
        ],
        "individualImages": {
            "pigment": {"name": "p.jpg", "filter": {"type": "IR"}},
            "binder": {"name": "c.jpg", "filter": {"type": "VIS"}, "wavelength": {}}
        },
        "thumbnails": true,
        "thumbnails_width": 200,
        "thumbnails_height": 100
    }"#;

    #[test]
    fn parses_sample_manifest() {
        let manifest = CalibrationManifest::from_json(SAMPLE).unwrap();

        assert_eq!(manifest.pixel_ratio, [0.1, 0.2]);
        assert_eq!(manifest.spectral.len(), 2);
        assert_eq!(manifest.spectral[0].filter.band, Band::Uv);
        assert_eq!(manifest.spectral[0].illumination_wavelength(), Some(350.0));
        assert_eq!(manifest.spectral[1].illumination_wavelength(), None);
        assert_eq!(manifest.thumbnail_size().unwrap(), Some((200, 100)));
        assert_eq!(manifest.capture_count(), 4);
    }

    #[test]
    fn keeps_individual_images_in_document_order() {
        let manifest = CalibrationManifest::from_json(SAMPLE).unwrap();
        let labels: Vec<_> = manifest
            .individual_images
            .iter()
            .map(|(label, _)| label.as_str())
            .collect();
        assert_eq!(labels, ["pigment", "binder"]);
        assert_eq!(manifest.individual_images[1].1.illumination_wavelength(), None);
    }

    #[test]
    fn optional_sections_default() {
        let manifest = CalibrationManifest::from_json(r#"{"PixelRatio": [1, 1]}"#).unwrap();
        assert!(manifest.spectral.is_empty());
        assert!(manifest.individual_images.is_empty());
        assert_eq!(manifest.thumbnail_size().unwrap(), None);
    }

    #[test]
    fn thumbnails_require_a_size() {
        let result = CalibrationManifest::from_json(
            r#"{"PixelRatio": [1, 1], "thumbnails": true, "thumbnails_width": 10}"#,
        );
        assert!(matches!(result, Err(ManifestError::MissingThumbnailSize)));
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let result = CalibrationManifest::from_json(
            r#"{"PixelRatio": [1, 1], "spectral": [{"name": "x.jpg", "filter": {"type": "XRAY"}}]}"#,
        );
        assert!(matches!(result, Err(ManifestError::Json(_))));
    }
}
