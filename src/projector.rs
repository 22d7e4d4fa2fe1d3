use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    store::{DicomStore, StoreError},
    tags::{DicomInstanceTags, TagError},
};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tag(#[from] TagError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Convert pixel coordinates to physical coordinates for a series.
///
/// The spacing is read from the first instance listed by the store; every
/// instance of a converted series carries the same spacing.
pub async fn project(
    store: &dyn DicomStore,
    series_id: &str,
    x: f64,
    y: f64,
) -> Result<Position, ProjectionError> {
    let instances = store.series_instance_tags(series_id).await?;
    let tags = instances
        .values()
        .next()
        .ok_or_else(|| StoreError::SeriesNotFound(series_id.to_string()))?;
    apply_spacing(tags, x, y)
}

/// Convert pixel coordinates using the spacing of one instance.
pub async fn project_instance(
    store: &dyn DicomStore,
    instance_id: &str,
    x: f64,
    y: f64,
) -> Result<Position, ProjectionError> {
    let tags = store.instance_tags(instance_id).await?;
    apply_spacing(&tags, x, y)
}

fn apply_spacing(tags: &DicomInstanceTags, x: f64, y: f64) -> Result<Position, ProjectionError> {
    let spacing = tags
        .pixel_spacing
        .as_deref()
        .ok_or(TagError::Missing("PixelSpacing"))?;
    let (x_spacing, y_spacing) = parse_pixel_spacing(spacing)?;
    Ok(Position {
        x: x * x_spacing,
        y: y * y_spacing,
    })
}

/// Parse the two components of a PixelSpacing value (`a\b`).
pub fn parse_pixel_spacing(value: &str) -> Result<(f64, f64), TagError> {
    let malformed = || TagError::Malformed {
        keyword: "PixelSpacing",
        value: value.to_string(),
    };
    let components = value
        .split('\\')
        .map(|component| component.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;

    match components.as_slice() {
        [first, second] => Ok((*first, *second)),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_components() {
        assert_eq!(parse_pixel_spacing("0.5\\0.25"), Ok((0.5, 0.25)));
        assert_eq!(parse_pixel_spacing(" 1 \\ 2 "), Ok((1.0, 2.0)));
    }

    #[test]
    fn rejects_wrong_arity_or_text() {
        for value in ["0.5", "0.5\\0.25\\1", "a\\b", "", "0.5\\"] {
            assert!(
                matches!(
                    parse_pixel_spacing(value),
                    Err(TagError::Malformed {
                        keyword: "PixelSpacing",
                        ..
                    })
                ),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn scales_each_axis() {
        let tags = DicomInstanceTags {
            pixel_spacing: Some("0.5\\0.25".into()),
            ..Default::default()
        };
        assert_eq!(
            apply_spacing(&tags, 10.0, 20.0).unwrap(),
            Position { x: 5.0, y: 5.0 }
        );
    }

    #[test]
    fn missing_spacing_is_reported() {
        let result = apply_spacing(&DicomInstanceTags::default(), 1.0, 1.0);
        assert!(matches!(
            result,
            Err(ProjectionError::Tag(TagError::Missing("PixelSpacing")))
        ));
    }
}
