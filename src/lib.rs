//! # Spectraloptica
//!
//! This crate turns a multispectral photography session into a DICOM series
//! and serves it back to a web viewer.
//!
//! A capture session is described by a calibration manifest
//! (`spectral.json`): the spectral stack, the individual images, and the
//! physical pixel size. Each capture becomes one VL Photographic Image (the
//! source JPEG is kept as is) uploaded to an Orthanc server, optionally with
//! a thumbnail attachment.
//!
//! The REST side reads a series back from the store and describes it:
//!  - spectral images sorted by illumination wavelength
//!  - individual images keyed by label
//!  - frame size and thumbnail availability
//!
//! It also projects pixel coordinates to physical coordinates based on the
//! `PixelSpacing` of the series.
//!
//! Wavelengths are classified in three bands:
//!  - UV below 400 nm
//!  - VIS from 400 to 700 nm
//!  - IR above 700 nm
//!
//! # Examples
//!
//! ## Converting a project
//!
//! ```no_run
//! # use spectraloptica::{dicomizer::dicomize, manifest::CalibrationManifest, store::OrthancStore};
//! # use std::path::Path;
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = OrthancStore::new("http://localhost:8042", None);
//! let project = Path::new("data/sample");
//! let manifest = CalibrationManifest::load(project.join("spectral.json"))?;
//! let summary = dicomize(&store, project, &manifest).await?;
//! println!("series {:?}", summary.series_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Describing a series
//!
//! ```no_run
//! # use spectraloptica::{aggregator::aggregate, store::OrthancStore};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = OrthancStore::new("http://localhost:8042", None);
//! let series = aggregate(&store, "c8f1a2b3-5e6d7f80-91a2b3c4-d5e6f708-192a3b4c").await?;
//! println!("{}", serde_json::to_string_pretty(&series)?);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod dicomizer;
pub mod enums;
pub mod manifest;
pub mod projector;
pub mod server;
pub mod store;
pub mod tags;
