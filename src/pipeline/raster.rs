//! Rasterization: copy a crop region onto an offscreen surface and encode it.
//!
//! ## Threading
//!
//! The region copy, masking and JPEG encoding loop over every pixel of the
//! surface, so they run under `tokio::task::spawn_blocking`, off the async
//! worker threads. The task gets a shared handle to the decoded source.
//!
//! ## Circular clip
//!
//! Avatars are shown inside a circle, so the profile context masks the
//! surface to the disc inscribed in the crop rectangle. Pixels outside the
//! disc become transparent, and since JPEG carries no alpha channel the
//! surface is flattened onto black before encoding.

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::media::{CroppedAsset, MIME_JPEG};
use crate::pipeline::coords::normalize;
use crate::pipeline::geometry::{PixelCrop, SourceImage};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use tracing::debug;

/// Which photo slot a crop is for. Decides the clip shape and file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropContext {
    /// Member/user avatar: circular clip, 1:1.
    Profile,
    /// Profile banner: rectangular.
    Background,
}

impl CropContext {
    pub fn circular(self) -> bool {
        matches!(self, CropContext::Profile)
    }

    pub fn file_name(self) -> &'static str {
        match self {
            CropContext::Profile => "cropped-profile.jpg",
            CropContext::Background => "cropped-background.jpg",
        }
    }
}

/// Produce a JPEG of exactly the crop's (rounded) width × height.
///
/// The crop is validated against `source` first; an invalid or out-of-bounds
/// crop never reaches the surface.
pub async fn rasterize(
    source: &SourceImage,
    crop: &PixelCrop,
    context: CropContext,
    config: &PipelineConfig,
) -> Result<CroppedAsset, MediaError> {
    let rect = normalize(crop, source.width(), source.height())?;
    let (w, h) = (rect.crop_width, rect.crop_height);

    let area = u64::from(w) * u64::from(h);
    if area == 0 || area > config.max_surface_pixels {
        return Err(MediaError::SurfaceUnavailable {
            width: w,
            height: h,
            limit: config.max_surface_pixels,
        });
    }

    let image = source.shared();
    let quality = config.jpeg_quality_percent();
    let circular = context.circular();

    let bytes = tokio::task::spawn_blocking(move || {
        // Only the selected region is copied; the surface origin is its top-left.
        let surface = image.crop_imm(rect.crop_x, rect.crop_y, w, h).to_rgba8();
        paint_and_encode(surface, circular, quality)
    })
    .await
    .map_err(|e| MediaError::Internal(format!("Raster task panicked: {}", e)))??;

    debug!(
        "Rasterized {:?} crop {}x{} → {} bytes JPEG (q={})",
        context,
        w,
        h,
        bytes.len(),
        quality
    );

    Ok(CroppedAsset {
        file_name: context.file_name().to_string(),
        mime_type: MIME_JPEG,
        bytes,
        width: w,
        height: h,
    })
}

fn paint_and_encode(mut surface: RgbaImage, circular: bool, quality: u8) -> Result<Vec<u8>, MediaError> {
    if circular {
        clip_to_inscribed_disc(&mut surface);
    }
    let flat = flatten_on_black(&surface);
    encode_jpeg(&flat, quality)
}

/// Clear every pixel whose centre lies outside the inscribed disc.
fn clip_to_inscribed_disc(surface: &mut RgbaImage) {
    let (w, h) = surface.dimensions();
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;
    let r = f64::from(w.min(h)) / 2.0;
    let r2 = r * r;

    for (px, py, pixel) in surface.enumerate_pixels_mut() {
        let dx = f64::from(px) + 0.5 - cx;
        let dy = f64::from(py) + 0.5 - cy;
        if dx * dx + dy * dy > r2 {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

fn flatten_on_black(surface: &RgbaImage) -> RgbImage {
    let (w, h) = surface.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let Rgba([r, g, b, a]) = *surface.get_pixel(x, y);
        let scale = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    })
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, MediaError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .map_err(|e| MediaError::Encoding(e.to_string()))?;
    if buf.is_empty() {
        return Err(MediaError::Encoding("encoder produced no data".into()));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> SourceImage {
        SourceImage::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba([rgb[0], rgb[1], rgb[2], 255]),
        )))
    }

    fn close(a: u8, b: u8) -> bool {
        a.abs_diff(b) <= 12
    }

    #[tokio::test]
    async fn profile_crop_has_exact_size_and_circle() {
        let src = solid(500, 500, [200, 40, 40]);
        let crop = PixelCrop::new(10.0, 10.0, 100.0, 100.0);
        let asset = rasterize(&src, &crop, CropContext::Profile, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(asset.file_name, "cropped-profile.jpg");
        assert_eq!(asset.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&asset.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (100, 100));

        let Rgb([r, g, b]) = *decoded.get_pixel(50, 50);
        assert!(close(r, 200) && close(g, 40) && close(b, 40), "centre {r},{g},{b}");
        let Rgb([r, g, b]) = *decoded.get_pixel(1, 1);
        assert!(r < 20 && g < 20 && b < 20, "corner should be clipped: {r},{g},{b}");
    }

    #[tokio::test]
    async fn background_crop_is_rectangular() {
        let src = solid(600, 200, [30, 160, 60]);
        let crop = PixelCrop::new(0.0, 0.0, 300.0, 100.0);
        let asset = rasterize(&src, &crop, CropContext::Background, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(asset.file_name, "cropped-background.jpg");
        let decoded = image::load_from_memory(&asset.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (300, 100));
        let Rgb([r, g, b]) = *decoded.get_pixel(1, 1);
        assert!(close(r, 30) && close(g, 160) && close(b, 60), "corner kept: {r},{g},{b}");
    }

    #[tokio::test]
    async fn copies_only_selected_region() {
        // Left half white, right half black; crop the right half.
        let img = RgbaImage::from_fn(200, 50, |x, _| {
            if x < 100 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let src = SourceImage::from_image(DynamicImage::ImageRgba8(img));
        let crop = PixelCrop::new(100.0, 0.0, 100.0, 50.0);
        let asset = rasterize(&src, &crop, CropContext::Background, &PipelineConfig::default())
            .await
            .unwrap();
        let decoded = image::load_from_memory(&asset.bytes).unwrap().to_rgb8();
        let Rgb([r, _, _]) = *decoded.get_pixel(50, 25);
        assert!(r < 20, "expected black region, got {r}");
    }

    #[tokio::test]
    async fn invalid_crop_rejected_before_surface() {
        let src = solid(100, 100, [0, 0, 0]);
        let err = rasterize(
            &src,
            &PixelCrop::new(0.0, 0.0, 0.0, 10.0),
            CropContext::Profile,
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidCrop { .. }));

        let err = rasterize(
            &src,
            &PixelCrop::new(50.0, 50.0, 60.0, 10.0),
            CropContext::Profile,
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::OutOfBounds { .. }));
    }

    #[tokio::test]
    async fn surface_cap_enforced() {
        let src = solid(100, 100, [0, 0, 0]);
        let config = PipelineConfig::builder()
            .max_surface_pixels(99)
            .build()
            .unwrap();
        let err = rasterize(
            &src,
            &PixelCrop::new(0.0, 0.0, 10.0, 10.0),
            CropContext::Profile,
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::SurfaceUnavailable { limit: 99, .. }));
    }

    #[tokio::test]
    async fn source_is_shared_with_raster_task() {
        let src = solid(80, 40, [10, 200, 10]);
        let before = src.image() as *const DynamicImage;
        let asset = rasterize(
            &src,
            &PixelCrop::new(40.0, 0.0, 40.0, 40.0),
            CropContext::Background,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(asset.width, 40);
        // The task released its handle and the source pixels never moved.
        assert_eq!(std::sync::Arc::strong_count(&src.shared()), 2);
        assert_eq!(src.image() as *const DynamicImage, before);
        assert!(std::ptr::eq(src.clone().image(), src.image()));
    }

    #[test]
    fn disc_mask_keeps_centre() {
        let mut s = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        clip_to_inscribed_disc(&mut s);
        assert_eq!(s.get_pixel(0, 0)[3], 0);
        assert_eq!(s.get_pixel(1, 1)[3], 255);
        assert_eq!(s.get_pixel(2, 2)[3], 255);
    }
}
