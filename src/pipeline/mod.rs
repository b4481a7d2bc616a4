//! Pipeline stages for cropping and uploading media.
//!
//! Each submodule implements one step, so each can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//!                      ┌──▶ raster ──▶ CroppedAsset ───────────────┐
//! geometry (validate) ─┤                                           ├──▶ upload ──▶ UploadResult
//!                      └──▶ coords ──▶ CropCoordinates + original ─┘
//!
//! verify: document URL ──▶ HEAD × ≤3 ──▶ DocumentLink (+ warning)
//! ```
//!
//! 1. [`geometry`]: crop rectangle and bounds check
//! 2. [`raster`]  : offscreen copy, optional circular clip, JPEG encode;
//!    runs in `spawn_blocking`
//! 3. [`coords`]  : integer rounding for server-side cropping
//! 4. [`upload`]  : single-attempt multipart `POST` with bearer token
//! 5. [`verify`]  : bounded-retry existence probe for document links

pub mod coords;
pub mod geometry;
pub mod raster;
pub mod upload;
pub mod verify;
