//! Upload dispatch: one multipart `POST` per file, under a bearer token.
//!
//! The dispatcher checks the payload against the target's allowed MIME types
//! before it touches the network, sends exactly one request (no retry), and
//! turns the server's JSON into an [`UploadResult`] or a [`MediaError`].
//! Applying the returned URL to any state is the caller's job.

use crate::config::PipelineConfig;
use crate::error::{is_auth_status, MediaError};
use crate::http::{HttpBackend, MultipartForm};
use crate::media::{MediaFile, UploadResult, MIME_JPEG, MIME_JPG, MIME_PDF, MIME_PNG};
use crate::pipeline::coords::CropCoordinates;
use crate::session::Session;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const IMAGE_TYPES: &[&str] = &[MIME_JPEG, MIME_PNG, MIME_JPG];
const DOCUMENT_TYPES: &[&str] = &[MIME_PDF];

/// Entity that owns the uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOwner {
    Membro,
    Usuario,
    Projeto,
    Noticia,
    Evento,
}

/// What the file is for, on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSlot {
    /// Profile photo.
    Perfil,
    /// Profile banner.
    Fundo,
    /// Cover image of a news item, project or event.
    Imagem,
    /// Attached document (project PDF).
    Arquivo,
}

/// An upload endpoint: `/api/files/upload-<owner>-<slot>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    pub owner: UploadOwner,
    pub slot: UploadSlot,
}

impl UploadTarget {
    pub const MEMBRO_PERFIL: Self = Self::new(UploadOwner::Membro, UploadSlot::Perfil);
    pub const MEMBRO_FUNDO: Self = Self::new(UploadOwner::Membro, UploadSlot::Fundo);
    pub const USUARIO_PERFIL: Self = Self::new(UploadOwner::Usuario, UploadSlot::Perfil);
    pub const USUARIO_FUNDO: Self = Self::new(UploadOwner::Usuario, UploadSlot::Fundo);
    pub const PROJETO_IMAGEM: Self = Self::new(UploadOwner::Projeto, UploadSlot::Imagem);
    pub const PROJETO_ARQUIVO: Self = Self::new(UploadOwner::Projeto, UploadSlot::Arquivo);
    pub const NOTICIA_IMAGEM: Self = Self::new(UploadOwner::Noticia, UploadSlot::Imagem);
    pub const EVENTO_IMAGEM: Self = Self::new(UploadOwner::Evento, UploadSlot::Imagem);

    pub const fn new(owner: UploadOwner, slot: UploadSlot) -> Self {
        Self { owner, slot }
    }

    /// Parse an endpoint name such as `upload-membro-perfil`.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("upload-")?;
        let (owner, slot) = rest.split_once('-')?;
        let owner = match owner {
            "membro" => UploadOwner::Membro,
            "usuario" => UploadOwner::Usuario,
            "projeto" => UploadOwner::Projeto,
            "noticia" => UploadOwner::Noticia,
            "evento" => UploadOwner::Evento,
            _ => return None,
        };
        let slot = match slot {
            "perfil" => UploadSlot::Perfil,
            "fundo" => UploadSlot::Fundo,
            "imagem" => UploadSlot::Imagem,
            "arquivo" => UploadSlot::Arquivo,
            _ => return None,
        };
        Some(Self::new(owner, slot))
    }

    /// API path relative to the backend origin.
    pub fn path(&self) -> String {
        format!("/api/files/{self}")
    }

    /// MIME types the backend accepts for this slot.
    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self.slot {
            UploadSlot::Arquivo => DOCUMENT_TYPES,
            _ => IMAGE_TYPES,
        }
    }

    fn accepts(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_types().iter().any(|t| *t == mime)
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match self.owner {
            UploadOwner::Membro => "membro",
            UploadOwner::Usuario => "usuario",
            UploadOwner::Projeto => "projeto",
            UploadOwner::Noticia => "noticia",
            UploadOwner::Evento => "evento",
        };
        let slot = match self.slot {
            UploadSlot::Perfil => "perfil",
            UploadSlot::Fundo => "fundo",
            UploadSlot::Imagem => "imagem",
            UploadSlot::Arquivo => "arquivo",
        };
        write!(f, "upload-{owner}-{slot}")
    }
}

/// What gets uploaded, by mode.
#[derive(Debug, Clone)]
pub enum UploadPayload {
    /// A finished file: a rasterized crop or a raw pick.
    File(MediaFile),
    /// The uncropped original plus the rectangle the server should cut.
    Coordinates {
        original: MediaFile,
        crop: CropCoordinates,
    },
}

impl UploadPayload {
    pub fn file(&self) -> &MediaFile {
        match self {
            UploadPayload::File(f) => f,
            UploadPayload::Coordinates { original, .. } => original,
        }
    }

    fn into_form(self) -> MultipartForm {
        match self {
            UploadPayload::File(file) => MultipartForm::new(file),
            UploadPayload::Coordinates { original, crop } => {
                let mut form = MultipartForm::new(original);
                form.fields.extend(crop.form_fields());
                form
            }
        }
    }
}

impl From<MediaFile> for UploadPayload {
    fn from(file: MediaFile) -> Self {
        UploadPayload::File(file)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    media_url: Option<String>,
}

/// Sends payloads to upload endpoints.
#[derive(Clone)]
pub struct UploadDispatcher {
    backend: Arc<dyn HttpBackend>,
    config: PipelineConfig,
}

impl UploadDispatcher {
    pub fn new(backend: Arc<dyn HttpBackend>, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Validate `payload` for `target` without sending anything.
    ///
    /// # Errors
    /// [`MediaError::EmptyFile`] or [`MediaError::UnsupportedMediaType`].
    pub fn check(&self, target: UploadTarget, payload: &UploadPayload) -> Result<(), MediaError> {
        self.check_file(target, payload.file())
    }

    /// Same as [`UploadDispatcher::check`], for a file not yet wrapped in a payload.
    pub fn check_file(&self, target: UploadTarget, file: &MediaFile) -> Result<(), MediaError> {
        if file.is_empty() {
            return Err(MediaError::EmptyFile {
                name: file.file_name.clone(),
            });
        }
        if !target.accepts(&file.mime_type) {
            return Err(MediaError::UnsupportedMediaType {
                mime: file.mime_type.clone(),
                target: target.to_string(),
                allowed: target.allowed_types().join(", "),
            });
        }
        Ok(())
    }

    /// Upload `payload` to `target` in a single attempt.
    ///
    /// Validation and the credential check both happen before the request,
    /// so a rejected payload never reaches the network.
    pub async fn dispatch(
        &self,
        session: &Session,
        target: UploadTarget,
        payload: UploadPayload,
    ) -> Result<UploadResult, MediaError> {
        self.check(target, &payload)?;
        let token = session.bearer()?;

        let url = self.config.endpoint(&target.path());
        let form = payload.into_form();
        info!(
            "Uploading '{}' ({}, {} bytes) to {}",
            form.file.file_name,
            form.file.mime_type,
            form.file.len(),
            target
        );
        if let Some(x) = form.field("cropX") {
            debug!(
                "Server-side crop x={} y={} w={} h={}",
                x,
                form.field("cropY").unwrap_or("?"),
                form.field("cropWidth").unwrap_or("?"),
                form.field("cropHeight").unwrap_or("?")
            );
        }

        let reply = self.backend.post_multipart(&url, token.as_str(), form).await?;

        if !reply.is_success() {
            let message = reply.error_message();
            if is_auth_status(reply.status) {
                warn!("Upload to {} refused (HTTP {}): session expired", target, reply.status);
            } else {
                warn!("Upload to {} failed (HTTP {}): {}", target, reply.status, message);
            }
            return Err(MediaError::UploadRejected {
                status: reply.status,
                message,
            });
        }

        let parsed: UploadResponse =
            serde_json::from_slice(&reply.body).map_err(|e| MediaError::InvalidResponse {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        match parsed.media_url {
            Some(media_url) if !media_url.trim().is_empty() => {
                info!("Upload to {} stored at {}", target, media_url);
                Ok(UploadResult { media_url })
            }
            _ => Err(MediaError::MissingLocation { url }),
        }
    }
}
