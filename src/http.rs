//! HTTP seam between the pipeline and the network.
//!
//! Every request the crate makes goes through [`HttpBackend`]. The production
//! implementation is [`ReqwestBackend`]; tests inject a fake that records
//! calls, which is how "no request was sent" is asserted.

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::media::MediaFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

/// Multipart body: one `file` part plus text fields.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    pub file: MediaFile,
    pub fields: Vec<(&'static str, String)>,
}

impl MultipartForm {
    pub fn new(file: MediaFile) -> Self {
        Self {
            file,
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP verbs used for JSON requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMethod {
    Post,
    Patch,
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best human-readable failure reason: `error`, then `message`, then raw text.
    pub fn error_message(&self) -> String {
        if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            for key in ["error", "message"] {
                if let Some(s) = v.get(key).and_then(|m| m.as_str()) {
                    if !s.trim().is_empty() {
                        return s.to_string();
                    }
                }
            }
        }
        let text = String::from_utf8_lossy(&self.body).trim().to_string();
        if text.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            text
        }
    }
}

/// Outgoing requests, abstracted for injection.
///
/// Implementations must return `Ok` for any response that arrived, whatever
/// its status; `Err` is reserved for transport failures.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// `POST` a multipart form under a bearer credential.
    async fn post_multipart(
        &self,
        url: &str,
        bearer: &str,
        form: MultipartForm,
    ) -> Result<HttpReply, MediaError>;

    /// Send a JSON body under a bearer credential.
    async fn send_json(
        &self,
        method: JsonMethod,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, MediaError>;

    /// `HEAD` the URL with default headers and return the status code.
    async fn head(&self, url: &str) -> Result<u16, MediaError>;
}

/// [`HttpBackend`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    upload_timeout: Duration,
    probe_timeout: Duration,
}

impl ReqwestBackend {
    pub fn new(config: &PipelineConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MediaError::Internal(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    async fn finish(url: &str, response: reqwest::Response) -> Result<HttpReply, MediaError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?
            .to_vec();
        debug!("{} → HTTP {} ({} bytes)", url, status, body.len());
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn post_multipart(
        &self,
        url: &str,
        bearer: &str,
        form: MultipartForm,
    ) -> Result<HttpReply, MediaError> {
        let MultipartForm { file, fields } = form;
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)
            .map_err(|e| MediaError::Internal(format!("Bad MIME type: {}", e)))?;

        let mut body = Form::new().part("file", part);
        for (name, value) in fields {
            body = body.text(name, value);
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .multipart(body)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Self::finish(url, response).await
    }

    async fn send_json(
        &self,
        method: JsonMethod,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, MediaError> {
        let request = match method {
            JsonMethod::Post => self.client.post(url),
            JsonMethod::Patch => self.client.patch(url),
        };
        let response = request
            .bearer_auth(bearer)
            .json(body)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Self::finish(url, response).await
    }

    async fn head(&self, url: &str) -> Result<u16, MediaError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Ok(response.status().as_u16())
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> MediaError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    MediaError::Transport {
        url: url.to_string(),
        reason,
    }
}
