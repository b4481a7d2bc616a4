//! Configuration for the crop-and-upload pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. One struct carries every knob so the same
//! config can be shared by the dispatcher, the link verifier and the CLI.

use crate::error::MediaError;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that supplies the backend origin.
pub const API_BASE_URL_ENV: &str = "NEXT_PUBLIC_API_BASE_URL";

/// Configuration for the media pipeline.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use niceia_media::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .api_base_url("https://api.example.org")
///     .jpeg_quality(0.9)
///     .build()
///     .unwrap();
/// assert_eq!(config.jpeg_quality_percent(), 90);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Backend origin, without trailing slash. Default: `http://localhost:8080`.
    pub api_base_url: String,

    /// Lossy encoding quality factor in `0.0..=1.0`. Default: 0.8.
    pub jpeg_quality: f32,

    /// Largest offscreen surface the rasterizer will allocate, in pixels.
    /// Default: 64 megapixels.
    pub max_surface_pixels: u64,

    /// Timeout for a single upload or submission request. Default: 60.
    pub upload_timeout_secs: u64,

    /// Timeout for a single existence probe. Default: 10.
    pub probe_timeout_secs: u64,

    /// Existence probes per document link. Default: 3.
    pub probe_attempts: u32,

    /// Fixed wait between two probes of the same link. Default: 1000.
    pub probe_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            jpeg_quality: 0.8,
            max_surface_pixels: 64 * 1024 * 1024,
            upload_timeout_secs: 60,
            probe_timeout_secs: 10,
            probe_attempts: 3,
            probe_backoff_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with the backend origin taken from `NEXT_PUBLIC_API_BASE_URL`.
    pub fn from_env() -> Result<Self, MediaError> {
        let base = std::env::var(API_BASE_URL_ENV).map_err(|_| {
            MediaError::InvalidConfig(format!("{API_BASE_URL_ENV} is not set"))
        })?;
        Self::builder().api_base_url(base).build()
    }

    /// Quality as the integer percentage the JPEG encoder expects.
    pub fn jpeg_quality_percent(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Bounded-retry policy used by the link verifier.
    pub fn probe_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.probe_attempts,
            Backoff::Fixed(Duration::from_millis(self.probe_backoff_ms)),
        )
    }

    /// Join an API path onto the configured origin.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn jpeg_quality(mut self, q: f32) -> Self {
        self.config.jpeg_quality = q.clamp(0.01, 1.0);
        self
    }

    pub fn max_surface_pixels(mut self, px: u64) -> Self {
        self.config.max_surface_pixels = px.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn probe_attempts(mut self, n: u32) -> Self {
        self.config.probe_attempts = n.max(1);
        self
    }

    pub fn probe_backoff_ms(mut self, ms: u64) -> Self {
        self.config.probe_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MediaError> {
        let c = &self.config;
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(MediaError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.upload_timeout_secs == 0 || c.probe_timeout_secs == 0 {
            return Err(MediaError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
