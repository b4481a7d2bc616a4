//! # niceia-media
//!
//! Client-side media pipeline for the Niceia portal: crop selected images,
//! upload them under the user's session, and check that linked documents
//! still exist before they are shown.
//!
//! ## Pipeline Overview
//!
//! ```text
//! selected file + crop rectangle
//!  │
//!  ├─ 1. Geometry  validate the rectangle against the image
//!  ├─ 2a. Raster   profile photo: copy region, circular clip, JPEG (spawn_blocking)
//!  ├─ 2b. Coords   banner: integer crop fields for the server to cut
//!  ├─ 3. Upload    one multipart POST with a bearer token → mediaUrl
//!  └─ 4. Apply     cache-busted URL into the profile / entity submission
//!
//! document URL ── HEAD × 3 (1 s apart) ── clickable link, or link + one warning
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use niceia_media::{
//!     noop_notifier, MediaFile, PipelineConfig, PixelCrop, Profile, ProfileEditor, ProfileKind,
//!     ReqwestBackend, Session,
//! };
//!
//! # async fn run(profile: Profile, token: String) -> Result<(), Box<dyn std::error::Error>> {
//! // Backend origin from NEXT_PUBLIC_API_BASE_URL
//! let config = PipelineConfig::from_env()?;
//! let backend = Arc::new(ReqwestBackend::new(&config)?);
//! let mut editor = ProfileEditor::new(
//!     ProfileKind::Membro,
//!     profile,
//!     Session::with_token(token),
//!     backend,
//!     config,
//!     noop_notifier(),
//! );
//!
//! let photo = MediaFile::from_path("me.png").await?;
//! editor.upload_photo(photo, PixelCrop::new(10.0, 10.0, 100.0, 100.0)).await?;
//! println!("{:?}", editor.profile().foto_perfil);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `niceia-media` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! niceia-media = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod notify;
pub mod pipeline;
pub mod profile;
pub mod retry;
pub mod session;
pub mod submit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, API_BASE_URL_ENV};
pub use error::{ErrorClass, MediaError};
pub use http::{HttpBackend, HttpReply, JsonMethod, MultipartForm, ReqwestBackend};
pub use media::{cache_bust, CroppedAsset, MediaFile, UploadResult};
pub use notify::{noop_notifier, NoopNotifier, Notifier};
pub use pipeline::coords::{normalize, CropCoordinates};
pub use pipeline::geometry::{probe_dimensions, validate, PixelCrop, SourceImage};
pub use pipeline::raster::{rasterize, CropContext};
pub use pipeline::upload::{UploadDispatcher, UploadOwner, UploadPayload, UploadSlot, UploadTarget};
pub use pipeline::verify::{DocumentLink, LinkCheckState, LinkVerifier, ProbeFailure};
pub use profile::{Profile, ProfileEditor, ProfileFields, ProfileKind};
pub use retry::{Attempted, Backoff, RetryPolicy};
pub use session::{Publisher, Session, SessionToken, TokenClaims};
pub use submit::{
    Contributor, EventDraft, EventRequest, NewsDraft, NewsRequest, ProjectDraft, ProjectRequest,
    Submitter, MAX_BODY_CHARS,
};
