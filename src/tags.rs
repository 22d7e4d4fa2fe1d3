//! The DICOM attributes written by the converter and read back by the viewer
//! endpoints.
//!
//! Values are kept in their DICOM text form (multi-values joined with `\`),
//! which is what the store hands out in its simplified tag listing. Parsing
//! into numbers happens in [`InstanceRecord::decode`] so that a malformed
//! value only affects the records that need it.

use std::str::FromStr;

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::enums::ImageSet;

/// ImageType value marking a member of the spectral stack.
pub const WAVELENGTH_MARKER: &str = "WAVELENGTH";

const MULTI_VALUE_SEPARATOR: char = '\\';

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TagError {
    #[error("Missing tag {0}")]
    Missing(&'static str),

    #[error("Malformed tag {keyword}: {value:?}")]
    Malformed { keyword: &'static str, value: String },
}

macro_rules! define_instance_tags {
    ($( ($field:ident, $keyword:literal, $tag:expr, $vr:expr) ),* $(,)?) => {
        /// Attributes of one instance, absent ones as `None`.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct DicomInstanceTags {
            $( pub $field: Option<String>, )*
            /// ImageType values, in order, empty components included.
            pub image_type: Option<Vec<String>>,
        }

        impl DicomInstanceTags {
            const TEXT_ATTRIBUTES: &'static [(&'static str, Tag, VR)] = &[
                $( ($keyword, $tag, $vr), )*
            ];

            fn text(&self, keyword: &str) -> Option<&str> {
                match keyword {
                    $( $keyword => self.$field.as_deref(), )*
                    _ => None,
                }
            }

            fn text_mut(&mut self, keyword: &str) -> Option<&mut Option<String>> {
                match keyword {
                    $( $keyword => Some(&mut self.$field), )*
                    _ => None,
                }
            }
        }
    };
}

define_instance_tags! {
    (patient_name, "PatientName", tags::PATIENT_NAME, VR::PN),
    (patient_id, "PatientID", tags::PATIENT_ID, VR::LO),
    (patient_birth_date, "PatientBirthDate", tags::PATIENT_BIRTH_DATE, VR::DA),
    (patient_sex, "PatientSex", tags::PATIENT_SEX, VR::CS),
    (study_date, "StudyDate", tags::STUDY_DATE, VR::DA),
    (study_time, "StudyTime", tags::STUDY_TIME, VR::TM),
    (study_description, "StudyDescription", tags::STUDY_DESCRIPTION, VR::LO),
    (series_description, "SeriesDescription", tags::SERIES_DESCRIPTION, VR::LO),
    (modality, "Modality", tags::MODALITY, VR::CS),
    (laterality, "Laterality", tags::LATERALITY, VR::CS),
    (lossy_image_compression, "LossyImageCompression", tags::LOSSY_IMAGE_COMPRESSION, VR::CS),
    (sop_class_uid, "SOPClassUID", tags::SOP_CLASS_UID, VR::UI),
    (sop_instance_uid, "SOPInstanceUID", tags::SOP_INSTANCE_UID, VR::UI),
    (study_instance_uid, "StudyInstanceUID", tags::STUDY_INSTANCE_UID, VR::UI),
    (series_instance_uid, "SeriesInstanceUID", tags::SERIES_INSTANCE_UID, VR::UI),
    (instance_number, "InstanceNumber", tags::INSTANCE_NUMBER, VR::IS),
    (user_content_label, "UserContentLabel", tags::USER_CONTENT_LABEL, VR::CS),
    (pixel_spacing, "PixelSpacing", tags::PIXEL_SPACING, VR::DS),
    (
        filter_wavelength,
        "ImagePathFilterPassThroughWavelength",
        tags::IMAGE_PATH_FILTER_PASS_THROUGH_WAVELENGTH,
        VR::US
    ),
    (illumination_wavelength, "IlluminationWaveLength", tags::ILLUMINATION_WAVE_LENGTH, VR::FL),
    (rows, "Rows", tags::ROWS, VR::US),
    (columns, "Columns", tags::COLUMNS, VR::US),
}

impl DicomInstanceTags {
    /// Read the simplified rendering of a data set (keyword → text value).
    ///
    /// Unknown keywords are ignored, empty values count as absent.
    pub fn from_simplified(map: &Map<String, Value>) -> Self {
        let mut instance = Self::default();
        for &(keyword, _, _) in Self::TEXT_ATTRIBUTES {
            if let Some(slot) = instance.text_mut(keyword) {
                *slot = map.get(keyword).and_then(json_text);
            }
        }
        instance.image_type = map
            .get("ImageType")
            .and_then(json_text)
            .map(|value| split_multi(&value));
        instance
    }

    /// Render to the simplified form read by [`DicomInstanceTags::from_simplified`].
    pub fn to_simplified(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for &(keyword, _, _) in Self::TEXT_ATTRIBUTES {
            if let Some(value) = self.text(keyword) {
                map.insert(keyword.to_string(), Value::String(value.to_string()));
            }
        }
        if let Some(image_type) = &self.image_type {
            map.insert("ImageType".to_string(), Value::String(image_type.join("\\")));
        }
        map
    }

    /// Read the attributes from a DICOM data set.
    pub fn from_object(object: &InMemDicomObject) -> Self {
        let mut instance = Self::default();
        for &(keyword, tag, _) in Self::TEXT_ATTRIBUTES {
            let value = object
                .element(tag)
                .ok()
                .and_then(|element| element.to_str().ok())
                .and_then(|value| normalize(&value));
            if let Some(slot) = instance.text_mut(keyword) {
                *slot = value;
            }
        }
        instance.image_type = object
            .element(tags::IMAGE_TYPE)
            .ok()
            .and_then(|element| element.to_multi_str().ok())
            .map(|values| values.iter().map(|v| v.trim().to_string()).collect());
        instance
    }

    /// Build a data set holding the present attributes.
    ///
    /// The filter pass-through wavelength is always written, empty when
    /// absent, as the attribute is required for photographic images.
    pub fn to_object(&self) -> Result<InMemDicomObject, TagError> {
        let mut object = InMemDicomObject::new_empty();
        for &(keyword, tag, vr) in Self::TEXT_ATTRIBUTES {
            if let Some(text) = self.text(keyword) {
                let value = primitive(keyword, vr, text)?;
                object.put(DataElement::new(tag, vr, value));
            }
        }
        if self.filter_wavelength.is_none() {
            object.put(DataElement::empty(
                tags::IMAGE_PATH_FILTER_PASS_THROUGH_WAVELENGTH,
                VR::US,
            ));
        }
        if let Some(image_type) = &self.image_type {
            let values = image_type.iter().cloned().collect();
            object.put(DataElement::new(
                tags::IMAGE_TYPE,
                VR::CS,
                PrimitiveValue::Strs(values),
            ));
        }
        Ok(object)
    }
}

/// The values needed to describe one image, parsed from its tags.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub label: String,
    pub filter_value: Option<f64>,
    pub wavelength_value: Option<f64>,
    pub image_type: Vec<String>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
}

impl InstanceRecord {
    /// # Errors
    ///
    /// [`TagError::Missing`] when UserContentLabel or ImageType is absent,
    /// [`TagError::Malformed`] when a numeric attribute does not parse.
    pub fn decode(instance: &DicomInstanceTags) -> Result<Self, TagError> {
        let label = instance
            .user_content_label
            .clone()
            .ok_or(TagError::Missing("UserContentLabel"))?;
        let image_type = instance
            .image_type
            .clone()
            .ok_or(TagError::Missing("ImageType"))?;

        Ok(Self {
            label,
            filter_value: parse_number(
                "ImagePathFilterPassThroughWavelength",
                instance.filter_wavelength.as_deref(),
            )?,
            wavelength_value: parse_number(
                "IlluminationWaveLength",
                instance.illumination_wavelength.as_deref(),
            )?,
            image_type,
            rows: parse_number("Rows", instance.rows.as_deref())?,
            columns: parse_number("Columns", instance.columns.as_deref())?,
        })
    }

    pub fn image_set(&self) -> ImageSet {
        if self.image_type.iter().any(|value| value == WAVELENGTH_MARKER) {
            ImageSet::Spectral
        } else {
            ImageSet::Individual
        }
    }
}

/// Maximum length of one Decimal String value.
pub const DS_MAX_LENGTH: usize = 16;
/// Maximum length of one Code String value.
pub const CS_MAX_LENGTH: usize = 16;

/// Render a number as a Decimal String value of at most [`DS_MAX_LENGTH`]
/// characters, switching to exponent form with fewer digits when needed.
pub fn format_decimal_string(value: f64) -> String {
    let plain = value.to_string();
    if plain.len() <= DS_MAX_LENGTH {
        return plain;
    }
    (0..DS_MAX_LENGTH)
        .rev()
        .map(|precision| {
            let text = format!("{value:.precision$e}");
            match text.split_once('e') {
                Some((mantissa, exponent)) if mantissa.contains('.') => format!(
                    "{}e{exponent}",
                    mantissa.trim_end_matches('0').trim_end_matches('.')
                ),
                _ => text,
            }
        })
        .find(|text| text.len() <= DS_MAX_LENGTH)
        .unwrap_or(plain)
}

/// Whether `text` is a conformant Code String value: at most
/// [`CS_MAX_LENGTH`] characters of upper-case letters, digits, space and `_`.
pub fn is_code_string(text: &str) -> bool {
    text.len() <= CS_MAX_LENGTH
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ' || c == '_')
}

pub(crate) fn parse_number<T: FromStr>(
    keyword: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, TagError> {
    value
        .map(|text| {
            text.trim().parse::<T>().map_err(|_| TagError::Malformed {
                keyword,
                value: text.to_string(),
            })
        })
        .transpose()
}

fn primitive(keyword: &'static str, vr: VR, text: &str) -> Result<PrimitiveValue, TagError> {
    let malformed = || TagError::Malformed {
        keyword,
        value: text.to_string(),
    };
    let value = match vr {
        VR::US => PrimitiveValue::from(text.trim().parse::<u16>().map_err(|_| malformed())?),
        VR::FL => PrimitiveValue::from(text.trim().parse::<f32>().map_err(|_| malformed())?),
        _ if text.contains(MULTI_VALUE_SEPARATOR) => {
            PrimitiveValue::Strs(split_multi(text).into_iter().collect())
        }
        _ => PrimitiveValue::from(text),
    };
    Ok(value)
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => normalize(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn split_multi(text: &str) -> Vec<String> {
    text.split(MULTI_VALUE_SEPARATOR)
        .map(|value| value.trim().to_string())
        .collect()
}
