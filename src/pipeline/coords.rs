//! Crop coordinate normalization for server-side cropping.
//!
//! Banner uploads send the original file plus integer crop fields and let the
//! backend do the pixel work. This module turns a fractional [`PixelCrop`]
//! into those integers.

use crate::error::MediaError;
use crate::pipeline::geometry::{validate, PixelCrop};
use serde::{Deserialize, Serialize};

/// Integer crop rectangle sent as `cropX` / `cropY` / `cropWidth` / `cropHeight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropCoordinates {
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_width: u32,
    pub crop_height: u32,
}

impl CropCoordinates {
    /// Multipart text fields, values as stringified integers.
    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("cropX", self.crop_x.to_string()),
            ("cropY", self.crop_y.to_string()),
            ("cropWidth", self.crop_width.to_string()),
            ("cropHeight", self.crop_height.to_string()),
        ]
    }
}

impl From<CropCoordinates> for PixelCrop {
    fn from(c: CropCoordinates) -> Self {
        PixelCrop::new(
            f64::from(c.crop_x),
            f64::from(c.crop_y),
            f64::from(c.crop_width),
            f64::from(c.crop_height),
        )
    }
}

/// Validate `crop` against the source dimensions, then round it.
///
/// Rounding is half-up. A rounded rectangle that would poke one pixel past
/// the edge is trimmed back to the image.
pub fn normalize(
    crop: &PixelCrop,
    image_width: u32,
    image_height: u32,
) -> Result<CropCoordinates, MediaError> {
    validate(crop, image_width, image_height)?;

    let mut coords = round_crop(crop);
    coords.crop_x = coords.crop_x.min(image_width.saturating_sub(1));
    coords.crop_y = coords.crop_y.min(image_height.saturating_sub(1));
    coords.crop_width = coords
        .crop_width
        .clamp(1, image_width - coords.crop_x);
    coords.crop_height = coords
        .crop_height
        .clamp(1, image_height - coords.crop_y);
    Ok(coords)
}

/// Round each component half-up. Callers must have validated `crop`.
pub(crate) fn round_crop(crop: &PixelCrop) -> CropCoordinates {
    CropCoordinates {
        crop_x: round_half_up(crop.x),
        crop_y: round_half_up(crop.y),
        crop_width: round_half_up(crop.width),
        crop_height: round_half_up(crop.height),
    }
}

fn round_half_up(v: f64) -> u32 {
    (v + 0.5).floor().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_crop_passes_through() {
        let c = normalize(&PixelCrop::new(0.0, 0.0, 300.0, 100.0), 1200, 400).unwrap();
        assert_eq!(
            c,
            CropCoordinates {
                crop_x: 0,
                crop_y: 0,
                crop_width: 300,
                crop_height: 100
            }
        );
    }

    #[test]
    fn rounds_half_up() {
        let c = normalize(&PixelCrop::new(10.5, 3.49, 99.5, 40.2), 500, 500).unwrap();
        assert_eq!((c.crop_x, c.crop_y, c.crop_width, c.crop_height), (11, 3, 100, 40));
    }

    #[test]
    fn trims_rounding_overflow_at_edge() {
        let c = normalize(&PixelCrop::new(0.5, 0.0, 499.5, 500.0), 500, 500).unwrap();
        assert_eq!(c.crop_x, 1);
        assert_eq!(c.crop_width, 499);
    }

    #[test]
    fn idempotent() {
        let crops = [
            PixelCrop::new(0.0, 0.0, 300.0, 100.0),
            PixelCrop::new(12.7, 8.2, 33.3, 90.9),
            PixelCrop::new(0.5, 0.5, 10.5, 10.5),
        ];
        for crop in crops {
            let once = normalize(&crop, 500, 500).unwrap();
            let twice = normalize(&once.into(), 500, 500).unwrap();
            assert_eq!(once, twice, "{crop:?}");
        }
    }

    #[test]
    fn invalid_crop_never_normalized() {
        let err = normalize(&PixelCrop::new(0.0, 0.0, 0.0, 100.0), 500, 500).unwrap_err();
        assert!(matches!(err, MediaError::InvalidCrop { .. }));
        let err = normalize(&PixelCrop::new(0.0, 0.0, 300.0, 101.0), 300, 100).unwrap_err();
        assert!(matches!(err, MediaError::OutOfBounds { .. }));
    }

    #[test]
    fn form_fields_are_stringified() {
        let c = CropCoordinates {
            crop_x: 5,
            crop_y: 6,
            crop_width: 70,
            crop_height: 80,
        };
        let fields = c.form_fields();
        assert_eq!(fields[0], ("cropX", "5".to_string()));
        assert_eq!(fields[3], ("cropHeight", "80".to_string()));
    }
}
