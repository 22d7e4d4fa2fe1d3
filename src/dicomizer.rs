//! Conversion of a capture project into DICOM instances.
//!
//! Every capture becomes one VL Photographic Image whose pixel data is the
//! untouched source JPEG, encapsulated as a single fragment.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use dicom::core::{
    DataElement, PrimitiveValue, Tag, VR,
    value::{DataSetSequence, PixelFragmentSequence, Value},
};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject, WithMetaError, WriteError};
use dicom_dictionary_std::{tags, uids};
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    enums::ImageSet,
    manifest::{Capture, CalibrationManifest, ManifestError},
    store::{DicomStore, StoreError},
    tags::{
        DicomInstanceTags, TagError, WAVELENGTH_MARKER, format_decimal_string, is_code_string,
    },
};

const PATIENT_NAME: &str = "Tombe^Egyptienne^MS";
const PATIENT_ID: &str = "MS36587845";
const PATIENT_BIRTH_DATE: &str = "20200914";
const PATIENT_SEX: &str = "O";
const STUDY_DESCRIPTION: &str = "MS Tombe Egyptienne";
const SERIES_DESCRIPTION: &str = "Acquisition de la parois";
/// External-camera photography.
const MODALITY: &str = "XC";
const LATERALITY: &str = "L";
const LOSSY_IMAGE_COMPRESSION: &str = "01";

#[derive(Debug, Error)]
pub enum DicomizeError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot decode image {name}: {source}")]
    Encoding {
        name: String,
        source: image::ImageError,
    },

    #[error("Image {name} is too large for DICOM ({width}x{height})")]
    ImageTooLarge { name: String, width: u32, height: u32 },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("DICOM meta error: {0}")]
    Meta(#[from] WithMetaError),

    #[error("DICOM write error: {0}")]
    Write(#[from] WriteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A fresh UID derived from a random UUID (`2.25.<decimal>`).
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

/// Attributes shared by every instance of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub study_date: String,
    pub study_time: String,
}

impl RunIdentity {
    pub fn new(started: DateTime<Local>) -> Self {
        Self {
            study_instance_uid: generate_uid(),
            series_instance_uid: generate_uid(),
            study_date: started.format("%Y%m%d").to_string(),
            study_time: started.format("%H%M%S").to_string(),
        }
    }
}

/// State of one conversion run: the shared identity and the instance counter.
#[derive(Debug, Clone)]
pub struct ConversionRun {
    identity: RunIdentity,
    last_instance_number: u32,
}

impl ConversionRun {
    pub fn new() -> Self {
        Self::with_identity(RunIdentity::new(Local::now()))
    }

    pub fn with_identity(identity: RunIdentity) -> Self {
        Self {
            identity,
            last_instance_number: 0,
        }
    }

    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Allocate the next instance number, starting at 1.
    pub fn next_instance_number(&mut self) -> u32 {
        self.last_instance_number += 1;
        self.last_instance_number
    }
}

impl Default for ConversionRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture-derived attributes of one instance.
pub fn to_dicom_tags(
    capture: &Capture,
    label: &str,
    set: ImageSet,
    instance_number: u32,
    identity: &RunIdentity,
    pixel_ratio: [f64; 2],
    (width, height): (u16, u16),
) -> DicomInstanceTags {
    let image_type = match set {
        ImageSet::Spectral => vec!["ORIGINAL", "PRIMARY", "", WAVELENGTH_MARKER],
        ImageSet::Individual => vec!["ORIGINAL", "PRIMARY"],
    };

    DicomInstanceTags {
        patient_name: Some(PATIENT_NAME.to_string()),
        patient_id: Some(PATIENT_ID.to_string()),
        patient_birth_date: Some(PATIENT_BIRTH_DATE.to_string()),
        patient_sex: Some(PATIENT_SEX.to_string()),
        study_date: Some(identity.study_date.clone()),
        study_time: Some(identity.study_time.clone()),
        study_description: Some(STUDY_DESCRIPTION.to_string()),
        series_description: Some(SERIES_DESCRIPTION.to_string()),
        modality: Some(MODALITY.to_string()),
        laterality: Some(LATERALITY.to_string()),
        lossy_image_compression: Some(LOSSY_IMAGE_COMPRESSION.to_string()),
        sop_class_uid: Some(uids::VL_PHOTOGRAPHIC_IMAGE_STORAGE.to_string()),
        sop_instance_uid: Some(generate_uid()),
        study_instance_uid: Some(identity.study_instance_uid.clone()),
        series_instance_uid: Some(identity.series_instance_uid.clone()),
        instance_number: Some(instance_number.to_string()),
        user_content_label: Some(label.to_string()),
        pixel_spacing: Some(format!(
            "{}\\{}",
            format_decimal_string(pixel_ratio[0]),
            format_decimal_string(pixel_ratio[1])
        )),
        filter_wavelength: capture
            .filter
            .band
            .nominal_wavelength()
            .map(|value| value.to_string()),
        illumination_wavelength: capture.illumination_wavelength().map(|v| v.to_string()),
        rows: Some(height.to_string()),
        columns: Some(width.to_string()),
        image_type: Some(image_type.into_iter().map(str::to_string).collect()),
    }
}

/// One serialized instance, ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedInstance {
    pub instance_number: u32,
    pub tags: DicomInstanceTags,
    pub dicom: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
}

/// Width and height of an encoded image, read from its header.
pub fn image_dimensions(name: &str, bytes: &[u8]) -> Result<(u16, u16), DicomizeError> {
    let encoding = |source| DicomizeError::Encoding {
        name: name.to_string(),
        source,
    };
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| encoding(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(encoding)?;

    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(DicomizeError::ImageTooLarge {
            name: name.to_string(),
            width,
            height,
        }),
    }
}

/// Downscale an image to fit inside `width` x `height`, as JPEG.
pub fn make_thumbnail(
    name: &str,
    bytes: &[u8],
    (width, height): (u32, u32),
) -> Result<Vec<u8>, DicomizeError> {
    let encoding = |source| DicomizeError::Encoding {
        name: name.to_string(),
        source,
    };
    let image = image::load_from_memory(bytes).map_err(encoding)?;
    let thumbnail = DynamicImage::ImageRgb8(image.thumbnail(width, height).to_rgb8());

    let mut buffer = Vec::new();
    thumbnail
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(encoding)?;
    Ok(buffer)
}

/// Assemble a complete DICOM file around the source JPEG.
pub fn encode_instance(
    instance: &DicomInstanceTags,
    jpeg: Vec<u8>,
) -> Result<Vec<u8>, DicomizeError> {
    let mut object = instance.to_object()?;
    put_fixed_attributes(&mut object);
    object.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        Value::PixelSequence(PixelFragmentSequence::new_fragments(vec![jpeg])),
    ));

    let sop_instance_uid = instance
        .sop_instance_uid
        .clone()
        .unwrap_or_else(generate_uid);
    let file = object.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::JPEG_BASELINE8_BIT)
            .media_storage_sop_class_uid(uids::VL_PHOTOGRAPHIC_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(sop_instance_uid),
    )?;

    let mut buffer = Vec::new();
    file.write_all(&mut buffer)?;
    Ok(buffer)
}

fn put_fixed_attributes(object: &mut InMemDicomObject) {
    let us = |object: &mut InMemDicomObject, tag: Tag, value: u16| {
        object.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
    };
    us(object, tags::SAMPLES_PER_PIXEL, 3);
    us(object, tags::PLANAR_CONFIGURATION, 0);
    us(object, tags::BITS_ALLOCATED, 8);
    us(object, tags::BITS_STORED, 8);
    us(object, tags::HIGH_BIT, 7);
    us(object, tags::PIXEL_REPRESENTATION, 0);
    object.put(DataElement::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from("RGB"),
    ));

    // Type 2 attributes, present but empty.
    for (tag, vr) in [
        (tags::ACCESSION_NUMBER, VR::SH),
        (tags::REFERRING_PHYSICIAN_NAME, VR::PN),
        (tags::SERIES_NUMBER, VR::IS),
        (tags::STUDY_ID, VR::SH),
        (tags::MANUFACTURER, VR::LO),
    ] {
        object.put(DataElement::empty(tag, vr));
    }
    object.put(DataElement::new(
        tags::ACQUISITION_CONTEXT_SEQUENCE,
        VR::SQ,
        DataSetSequence::<InMemDicomObject>::empty(),
    ));
}

/// Encode one capture read from `project_dir`.
pub async fn encode_capture(
    project_dir: &Path,
    capture: &Capture,
    label: &str,
    set: ImageSet,
    run: &mut ConversionRun,
    manifest: &CalibrationManifest,
) -> Result<EncodedInstance, DicomizeError> {
    let path = project_dir.join(&capture.name);
    let jpeg = tokio::fs::read(&path)
        .await
        .map_err(|source| DicomizeError::Io {
            path: path.clone(),
            source,
        })?;

    let dimensions = image_dimensions(&capture.name, &jpeg)?;
    let thumbnail = manifest
        .thumbnail_size()?
        .map(|size| make_thumbnail(&capture.name, &jpeg, size))
        .transpose()?;

    if !is_code_string(label) {
        warn!("Label {label:?} is not a conformant UserContentLabel code string");
    }
    let instance_number = run.next_instance_number();
    let tags = to_dicom_tags(
        capture,
        label,
        set,
        instance_number,
        run.identity(),
        manifest.pixel_ratio,
        dimensions,
    );
    let dicom = encode_instance(&tags, jpeg)?;

    Ok(EncodedInstance {
        instance_number,
        tags,
        dicom,
        thumbnail,
    })
}

/// An instance accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedInstance {
    pub id: String,
    pub instance_number: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub identity: RunIdentity,
    /// Store identifier of the series, when at least one instance was uploaded.
    pub series_id: Option<String>,
    pub instances: Vec<UploadedInstance>,
}

/// Convert every capture of the manifest and upload it, spectral captures
/// first.
///
/// The run stops at the first failure; instances uploaded before it stay in
/// the store.
pub async fn dicomize(
    store: &dyn DicomStore,
    project_dir: &Path,
    manifest: &CalibrationManifest,
) -> Result<RunSummary, DicomizeError> {
    let mut run = ConversionRun::new();
    dicomize_with(store, project_dir, manifest, &mut run).await
}

pub async fn dicomize_with(
    store: &dyn DicomStore,
    project_dir: &Path,
    manifest: &CalibrationManifest,
    run: &mut ConversionRun,
) -> Result<RunSummary, DicomizeError> {
    let spectral = manifest.spectral.iter().map(|capture| {
        let label = Path::new(&capture.name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| capture.name.clone());
        (label, capture, ImageSet::Spectral)
    });
    let individual = manifest
        .individual_images
        .iter()
        .map(|(label, capture)| (label.clone(), capture, ImageSet::Individual));

    let mut summary = RunSummary {
        identity: run.identity().clone(),
        series_id: None,
        instances: Vec::with_capacity(manifest.capture_count()),
    };

    for (label, capture, set) in spectral.chain(individual) {
        let encoded = encode_capture(project_dir, capture, &label, set, run, manifest).await?;
        let stored = store.store_instance(encoded.dicom).await?;
        if let Some(thumbnail) = encoded.thumbnail {
            store.put_thumbnail(&stored.id, thumbnail).await?;
        }

        let instance_number = encoded.instance_number;
        info!("Uploaded {label} as instance {instance_number} ({})", stored.id);
        summary.series_id = Some(stored.parent_series);
        summary.instances.push(UploadedInstance {
            id: stored.id,
            instance_number,
            label,
        });
    }

    Ok(summary)
}
