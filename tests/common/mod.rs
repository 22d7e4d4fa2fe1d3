#![allow(dead_code)]

use std::{fs, path::PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use spectraloptica::{
    dicomizer::{RunSummary, dicomize},
    manifest::CalibrationManifest,
    store::MemoryStore,
};

/// A capture project in a scratch directory, removed on drop.
pub struct Project {
    pub dir: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("spectraloptica-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    pub fn with_image(self, name: &str, width: u32, height: u32) -> Self {
        let image = RgbImage::from_pixel(width, height, Rgb([180, 120, 60]));
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        DynamicImage::ImageRgb8(image)
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        self
    }

    pub fn manifest(&self, json: &str) -> CalibrationManifest {
        CalibrationManifest::from_json(json).unwrap()
    }

    pub async fn dicomize(&self, store: &MemoryStore, json: &str) -> RunSummary {
        dicomize(store, &self.dir, &self.manifest(json)).await.unwrap()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

pub const TWO_SPECTRAL: &str = r#"{
    "PixelRatio": [0.5, 0.25],
    "spectral": [
        {"name": "a.jpg", "filter": {"type": "UV"}, "wavelength": {"value": 350}},
        {"name": "b.jpg", "filter": {"type": "IR"}, "wavelength": {"value": 850}}
    ]
}"#;

pub fn two_spectral_project() -> Project {
    Project::new()
        .with_image("a.jpg", 64, 32)
        .with_image("b.jpg", 64, 32)
}
