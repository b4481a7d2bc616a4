//! Error types for the niceia-media library.
//!
//! Every fallible operation returns [`MediaError`]. Variants are grouped by
//! the stage that raises them, and each one maps onto an [`ErrorClass`] that
//! tells the caller how to surface it:
//!
//! * **Validation**: bad crop geometry, disallowed MIME type, missing form
//!   fields. Raised before any network call; the user fixes the input.
//! * **Transport**: network failure, non-2xx response, malformed body. The
//!   originating action stays in its pre-attempt state.
//! * **SessionExpired**: the backend answered 401/403 or the token's `exp`
//!   claim has passed. The caller clears the credential and sends the user to
//!   the login entry point.
//!
//! A link check that runs out of attempts is not an error at all; it is
//! reported as [`crate::pipeline::verify::LinkCheckState::ExhaustedWithWarning`].

use thiserror::Error;

/// All errors returned by the niceia-media library.
#[derive(Debug, Error)]
pub enum MediaError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// A crop coordinate is negative / non-finite, or an extent is not positive.
    #[error("Invalid crop region {x}, {y}, {width}x{height}: coordinates must be ≥ 0 and extents > 0")]
    InvalidCrop {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    /// The crop rectangle extends past the right or bottom image edge.
    #[error(
        "Crop region ends at ({right}, {bottom}) but the image is only {image_width}x{image_height}"
    )]
    OutOfBounds {
        right: f64,
        bottom: f64,
        image_width: u32,
        image_height: u32,
    },

    /// The file's MIME type is not accepted by the upload target.
    #[error("Unsupported media type '{mime}' for {target}; allowed: {allowed}")]
    UnsupportedMediaType {
        mime: String,
        target: String,
        allowed: String,
    },

    /// The selected file has no content.
    #[error("File '{name}' is empty")]
    EmptyFile { name: String },

    /// A required form field is missing or blank.
    #[error("Required field '{field}' is missing")]
    MissingField { field: &'static str },

    /// A text field is longer than the form allows.
    #[error("Field '{field}' has {len} characters; the limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The signed-in role may not perform this action.
    #[error("Role '{role}' may not {action}")]
    NotPermitted { role: String, action: &'static str },

    /// No bearer token is held by the session.
    #[error("Not authenticated: log in before uploading")]
    NotAuthenticated,

    // ── Raster errors ─────────────────────────────────────────────────────
    /// Source bytes could not be decoded as an image.
    #[error("Could not decode source image: {0}")]
    Decode(String),

    /// The offscreen surface could not be allocated.
    #[error("Offscreen surface of {width}x{height} px is unavailable (limit {limit} px)")]
    SurfaceUnavailable { width: u32, height: u32, limit: u64 },

    /// Rasterisation produced no encodable data.
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced an HTTP response.
    #[error("Request to '{url}' failed: {reason}\nCheck your internet connection.")]
    Transport { url: String, reason: String },

    /// The backend answered with a non-success status.
    ///
    /// 401 and 403 additionally classify as [`ErrorClass::SessionExpired`].
    #[error("Upload rejected by server (HTTP {status}): {message}")]
    UploadRejected { status: u16, message: String },

    /// A JSON request (profile update, entity submission) was refused.
    ///
    /// 401 and 403 additionally classify as [`ErrorClass::SessionExpired`].
    #[error("Request rejected by server (HTTP {status}): {message}")]
    RequestRejected { status: u16, message: String },

    /// The backend accepted the upload but returned no `mediaUrl`.
    #[error("Server response from '{url}' did not include a media URL")]
    MissingLocation { url: String },

    /// The response body was not the JSON shape we expect.
    #[error("Invalid response from '{url}': {detail}")]
    InvalidResponse { url: String, detail: String },

    /// The bearer token's `exp` claim is in the past.
    #[error("Session expired. Log in again.")]
    SessionExpired,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input problem; nothing was dispatched.
    Validation,
    /// Network or server problem; nothing was committed.
    Transport,
    /// Credentials must be cleared and the user sent to login.
    SessionExpired,
}

impl MediaError {
    /// Classify this error for display and recovery.
    pub fn class(&self) -> ErrorClass {
        match self {
            MediaError::InvalidCrop { .. }
            | MediaError::OutOfBounds { .. }
            | MediaError::UnsupportedMediaType { .. }
            | MediaError::EmptyFile { .. }
            | MediaError::MissingField { .. }
            | MediaError::FieldTooLong { .. }
            | MediaError::NotAuthenticated
            | MediaError::NotPermitted { .. }
            | MediaError::Decode(_)
            | MediaError::SurfaceUnavailable { .. }
            | MediaError::Encoding(_)
            | MediaError::InvalidConfig(_) => ErrorClass::Validation,
            MediaError::SessionExpired => ErrorClass::SessionExpired,
            MediaError::UploadRejected { status, .. } | MediaError::RequestRejected { status, .. }
                if is_auth_status(*status) =>
            {
                ErrorClass::SessionExpired
            }
            MediaError::Transport { .. }
            | MediaError::UploadRejected { .. }
            | MediaError::RequestRejected { .. }
            | MediaError::MissingLocation { .. }
            | MediaError::InvalidResponse { .. }
            | MediaError::Internal(_) => ErrorClass::Transport,
        }
    }

    /// `true` when the caller should drop its credential and re-authenticate.
    pub fn is_session_expired(&self) -> bool {
        self.class() == ErrorClass::SessionExpired
    }
}

pub(crate) fn is_auth_status(status: u16) -> bool {
    status == 401 || status == 403
}
