use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    classifier::{classify, classify_filter},
    enums::Band,
    tags::InstanceRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDescriptor {
    #[serde(rename = "type")]
    pub band: Band,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WavelengthDescriptor {
    #[serde(rename = "type")]
    pub band: Band,
    pub value: Option<f64>,
}

/// One image as presented to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDescriptor {
    /// Store identifier of the instance.
    pub name: String,
    pub label: String,
    pub filter: FilterDescriptor,
    pub wavelength: WavelengthDescriptor,
}

impl ImageDescriptor {
    pub fn build(instance_id: &str, record: &InstanceRecord) -> Self {
        Self {
            name: instance_id.to_string(),
            label: record.label.clone(),
            filter: FilterDescriptor {
                band: classify_filter(record.filter_value),
                description: String::new(),
            },
            wavelength: WavelengthDescriptor {
                band: classify(record.wavelength_value),
                value: record.wavelength_value,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub height: u32,
    pub width: u32,
}

/// All images of a series, split into the spectral stack and the
/// individual images.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDescriptor {
    pub spectral_images: Vec<ImageDescriptor>,
    pub individual_images: BTreeMap<String, ImageDescriptor>,
    pub size: FrameSize,
    pub thumbnails: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::DicomInstanceTags;
    use serde_json::json;

    fn record(filter: Option<f64>, wavelength: Option<f64>) -> InstanceRecord {
        InstanceRecord {
            label: "a.jpg".into(),
            filter_value: filter,
            wavelength_value: wavelength,
            image_type: vec!["ORIGINAL".into(), "PRIMARY".into()],
            rows: Some(2),
            columns: Some(3),
        }
    }

    #[test]
    fn classifies_filter_and_wavelength_independently() {
        let descriptor = ImageDescriptor::build("id-1", &record(Some(365.0), Some(850.0)));
        assert_eq!(descriptor.filter.band, Band::Uv);
        assert_eq!(descriptor.wavelength.band, Band::Ir);
        assert_eq!(descriptor.wavelength.value, Some(850.0));
    }

    #[test]
    fn zero_filter_is_present() {
        let from_map = |filter: &str| {
            let map = serde_json::Map::from_iter([
                ("UserContentLabel".to_string(), json!("a.jpg")),
                ("ImageType".to_string(), json!("ORIGINAL\\PRIMARY")),
                ("ImagePathFilterPassThroughWavelength".to_string(), json!(filter)),
            ]);
            let record = InstanceRecord::decode(&DicomInstanceTags::from_simplified(&map)).unwrap();
            ImageDescriptor::build("id-1", &record).filter.band
        };
        assert_eq!(from_map("0"), Band::Uv);
        assert_eq!(from_map(""), Band::Vis);
        assert_eq!(from_map("550"), Band::Ir);
    }

    #[test]
    fn serializes_in_viewer_shape() {
        let descriptor = ImageDescriptor::build("id-1", &record(None, None));
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "name": "id-1",
                "label": "a.jpg",
                "filter": {"type": "VIS", "description": ""},
                "wavelength": {"type": "VIS", "value": null},
            })
        );

        let series = SeriesDescriptor {
            spectral_images: vec![descriptor],
            size: FrameSize {
                height: 2,
                width: 3,
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value["size"], json!({"height": 2, "width": 3}));
        assert_eq!(value["individualImages"], json!({}));
        assert_eq!(value["thumbnails"], json!(false));
        assert_eq!(value["spectralImages"][0]["name"], json!("id-1"));
    }
}
