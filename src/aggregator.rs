use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::{
    descriptor::{FrameSize, ImageDescriptor, SeriesDescriptor},
    enums::ImageSet,
    store::{DicomStore, StoreError, THUMBNAIL_ATTACHMENT},
    tags::InstanceRecord,
};

/// Describe every image of a series.
///
/// Instances whose tags cannot be decoded are logged and left out. The
/// reported frame size is that of the last decoded instance, and the
/// thumbnail flag is that of the last listed instance.
///
/// # Errors
///
/// Returns [`StoreError::SeriesNotFound`] for an unknown series and any other
/// store failure as is.
pub async fn aggregate(
    store: &dyn DicomStore,
    series_id: &str,
) -> Result<SeriesDescriptor, StoreError> {
    let instances = store.series_instance_tags(series_id).await?;
    debug!("Series {series_id}: {} instances", instances.len());

    let mut series = SeriesDescriptor::default();
    for (instance_id, tags) in &instances {
        let attachments = store.instance_attachments(instance_id).await?;
        series.thumbnails = attachments.iter().any(|name| name == THUMBNAIL_ATTACHMENT);

        let record = match InstanceRecord::decode(tags) {
            Ok(record) => record,
            Err(error) => {
                warn!("Skipping instance {instance_id} of series {series_id}: {error}");
                continue;
            }
        };

        if let (Some(height), Some(width)) = (record.rows, record.columns) {
            series.size = FrameSize { height, width };
        }

        let image = ImageDescriptor::build(instance_id, &record);
        match record.image_set() {
            ImageSet::Spectral => series.spectral_images.push(image),
            ImageSet::Individual => {
                series.individual_images.insert(record.label, image);
            }
        }
    }

    sort_by_wavelength(&mut series.spectral_images);
    Ok(series)
}

/// Stable ascending sort; images without a wavelength come first.
///
/// NaN sorts with the missing values, as it does for classification.
pub(crate) fn sort_by_wavelength(images: &mut [ImageDescriptor]) {
    let key = |image: &ImageDescriptor| image.wavelength.value.filter(|v| !v.is_nan());
    images.sort_by(|a, b| match (key(a), key(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{FilterDescriptor, WavelengthDescriptor},
        enums::Band,
    };

    fn image(name: &str, value: Option<f64>) -> ImageDescriptor {
        ImageDescriptor {
            name: name.into(),
            label: name.into(),
            filter: FilterDescriptor {
                band: Band::Vis,
                description: String::new(),
            },
            wavelength: WavelengthDescriptor {
                band: Band::Vis,
                value,
            },
        }
    }

    fn names(images: &[ImageDescriptor]) -> Vec<&str> {
        images.iter().map(|image| image.name.as_str()).collect()
    }

    #[test]
    fn sorts_ascending() {
        let mut images = vec![
            image("ir", Some(850.0)),
            image("uv", Some(350.0)),
            image("vis", Some(550.0)),
        ];
        sort_by_wavelength(&mut images);
        assert_eq!(names(&images), ["uv", "vis", "ir"]);
    }

    #[test]
    fn missing_wavelength_sorts_first_and_keeps_order() {
        let mut images = vec![
            image("ir", Some(850.0)),
            image("first-none", None),
            image("uv", Some(350.0)),
            image("second-none", None),
        ];
        sort_by_wavelength(&mut images);
        assert_eq!(names(&images), ["first-none", "second-none", "uv", "ir"]);
    }

    #[test]
    fn nan_sorts_with_missing_values() {
        let mut images = vec![
            image("b", Some(700.0)),
            image("nan", Some(f64::NAN)),
            image("none", None),
            image("a", Some(400.0)),
        ];
        sort_by_wavelength(&mut images);
        assert_eq!(names(&images), ["nan", "none", "a", "b"]);
    }

    #[test]
    fn finite_values_stay_ordered_among_many_nans() {
        let mut images: Vec<_> = (0..200)
            .map(|i| {
                let value = if i % 5 == 0 {
                    f64::NAN
                } else {
                    ((i * 37) % 200) as f64
                };
                image(&i.to_string(), Some(value))
            })
            .collect();
        sort_by_wavelength(&mut images);

        let finite: Vec<f64> = images
            .iter()
            .filter_map(|image| image.wavelength.value)
            .filter(|value| !value.is_nan())
            .collect();
        assert_eq!(finite.len(), 160);
        assert!(finite.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(images[..40].iter().all(|image| image.wavelength.value.unwrap().is_nan()));
    }
}
