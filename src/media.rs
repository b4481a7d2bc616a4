//! Media payloads and upload results.
//!
//! [`CroppedAsset`] is what the rasterizer produces; [`MediaFile`] is anything
//! the dispatcher can send (a cropped asset, or a raw file the user picked).
//! [`UploadResult`] is what the backend hands back.

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_JPG: &str = "image/jpg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_PDF: &str = "application/pdf";

/// A file selected for upload: name, declared MIME type and content.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl MediaFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a local file, taking the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to read '{}': {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, mime_from_extension(path), bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a MIME type from a file extension, the way a browser file picker does.
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => MIME_JPEG,
        "png" => MIME_PNG,
        "pdf" => MIME_PDF,
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// An encoded crop produced by the rasterizer.
#[derive(Clone)]
pub struct CroppedAsset {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    /// Pixel width of the encoded image.
    pub width: u32,
    /// Pixel height of the encoded image.
    pub height: u32,
}

impl std::fmt::Debug for CroppedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CroppedAsset")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl From<CroppedAsset> for MediaFile {
    fn from(asset: CroppedAsset) -> Self {
        MediaFile::new(asset.file_name, asset.mime_type, asset.bytes)
    }
}

/// Successful upload response: `{"mediaUrl": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub media_url: String,
}

impl UploadResult {
    /// The media URL with a `t=<unix-millis>` cache-busting parameter.
    pub fn cache_busted(&self) -> String {
        cache_bust(&self.media_url, now_millis())
    }
}

/// Append a `t=<token>` query parameter so clients refetch the resource.
pub fn cache_bust(url: &str, token: u128) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={token}")
}

pub(crate) fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_bust_appends_query() {
        assert_eq!(
            cache_bust("https://cdn.niceia.org/p.jpg", 42),
            "https://cdn.niceia.org/p.jpg?t=42"
        );
        assert_eq!(
            cache_bust("https://cdn.niceia.org/p.jpg?v=2", 42),
            "https://cdn.niceia.org/p.jpg?v=2&t=42"
        );
    }

    #[test]
    fn upload_result_parses_camel_case() {
        let r: UploadResult = serde_json::from_str(r#"{"mediaUrl":"https://x/p.jpg"}"#).unwrap();
        assert_eq!(r.media_url, "https://x/p.jpg");
        assert!(r.cache_busted().starts_with("https://x/p.jpg?t="));
    }

    #[test]
    fn mime_guess() {
        assert_eq!(mime_from_extension(Path::new("a/B.JPG")), MIME_JPEG);
        assert_eq!(mime_from_extension(Path::new("doc.pdf")), MIME_PDF);
        assert_eq!(mime_from_extension(Path::new("anim.gif")), "image/gif");
        assert_eq!(mime_from_extension(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn from_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("banner.png");
        std::fs::write(&p, b"\x89PNG....").unwrap();
        let f = MediaFile::from_path(&p).await.unwrap();
        assert_eq!(f.file_name, "banner.png");
        assert_eq!(f.mime_type, MIME_PNG);
        assert_eq!(f.len(), 8);
    }
}
