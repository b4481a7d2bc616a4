//! Crop geometry: the selection rectangle and its bounds check.
//!
//! Both the file-producing path ([`crate::pipeline::raster`]) and the
//! coordinate-producing path ([`crate::pipeline::coords`]) call
//! [`validate`] themselves, so neither can be reached with a bad crop.

use crate::error::MediaError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// A rectangular selection in the source image's native pixel grid.
///
/// Values may be fractional (a crop widget reports zoomed selections in
/// sub-pixel units); [`crate::pipeline::coords::normalize`] rounds them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelCrop {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// A source image decoded off-screen, ready for validation and rasterization.
///
/// Clones share the decoded pixels.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: Arc<DynamicImage>,
}

impl SourceImage {
    /// Decode image bytes (JPEG or PNG).
    pub fn decode(bytes: &[u8]) -> Result<Self, MediaError> {
        let image = image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))?;
        debug!("Decoded source image {}x{}", image.width(), image.height());
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub(crate) fn shared(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }
}

/// Read only the image header to get its intrinsic width and height.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), MediaError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| MediaError::Decode(e.to_string()))
}

/// Check `crop` against an image of `image_width` × `image_height` pixels.
///
/// # Errors
/// * [`MediaError::InvalidCrop`]: a coordinate is negative or not finite,
///   or an extent is not strictly positive.
/// * [`MediaError::OutOfBounds`]: the rectangle passes the right or bottom edge.
pub fn validate(crop: &PixelCrop, image_width: u32, image_height: u32) -> Result<(), MediaError> {
    let finite = [crop.x, crop.y, crop.width, crop.height]
        .iter()
        .all(|v| v.is_finite());
    if !finite || crop.x < 0.0 || crop.y < 0.0 || crop.width <= 0.0 || crop.height <= 0.0 {
        return Err(MediaError::InvalidCrop {
            x: crop.x,
            y: crop.y,
            width: crop.width,
            height: crop.height,
        });
    }

    if crop.right() > f64::from(image_width) || crop.bottom() > f64::from(image_height) {
        return Err(MediaError::OutOfBounds {
            right: crop.right(),
            bottom: crop.bottom(),
            image_width,
            image_height,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_image_and_interior() {
        assert!(validate(&PixelCrop::new(0.0, 0.0, 500.0, 500.0), 500, 500).is_ok());
        assert!(validate(&PixelCrop::new(10.0, 10.0, 100.0, 100.0), 500, 500).is_ok());
        assert!(validate(&PixelCrop::new(399.5, 0.0, 100.5, 1.0), 500, 500).is_ok());
    }

    #[test]
    fn rejects_non_positive_extents() {
        for (w, h) in [(0.0, 10.0), (10.0, 0.0), (-5.0, 10.0), (10.0, -0.1)] {
            let err = validate(&PixelCrop::new(0.0, 0.0, w, h), 500, 500).unwrap_err();
            assert!(matches!(err, MediaError::InvalidCrop { .. }), "{w}x{h}: {err}");
        }
    }

    #[test]
    fn rejects_negative_and_nan_origin() {
        let err = validate(&PixelCrop::new(-1.0, 0.0, 10.0, 10.0), 500, 500).unwrap_err();
        assert!(matches!(err, MediaError::InvalidCrop { .. }));
        let err = validate(&PixelCrop::new(f64::NAN, 0.0, 10.0, 10.0), 500, 500).unwrap_err();
        assert!(matches!(err, MediaError::InvalidCrop { .. }));
    }

    #[test]
    fn rejects_past_right_or_bottom_edge() {
        let err = validate(&PixelCrop::new(450.0, 0.0, 51.0, 10.0), 500, 500).unwrap_err();
        assert!(matches!(err, MediaError::OutOfBounds { .. }));
        let err = validate(&PixelCrop::new(0.0, 400.0, 10.0, 100.01), 500, 500).unwrap_err();
        assert!(matches!(err, MediaError::OutOfBounds { .. }));
    }

    #[test]
    fn probe_reads_header_dimensions() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(7, 3));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(probe_dimensions(&buf).unwrap(), (7, 3));
        assert_eq!(SourceImage::decode(&buf).unwrap().width(), 7);
    }

    #[test]
    fn decode_reports_garbage() {
        let err = SourceImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }
}
