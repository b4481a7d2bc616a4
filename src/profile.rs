//! Profile edit session: photo and banner uploads, then the profile update.
//!
//! A [`ProfileEditor`] owns the profile being edited and the session used to
//! edit it. Upload methods take `&mut self`, so one editor can never have two
//! uploads in flight for the same slot. State changes only after the backend
//! confirms: a failed upload leaves the profile exactly as it was.
//!
//! ```text
//! photo:  file ──▶ decode ──▶ raster (circle) ──▶ upload-…-perfil ──▶ fotoPerfil = url?t=…
//! banner: file ──▶ header dims ──▶ coords ──▶ upload-…-fundo (+crop fields) ──▶ fotoFundo = url?t=…
//! save:   PATCH /api/{membros|usuarios}/update/{id} with stored (un-busted) URLs
//! ```

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::http::{HttpBackend, JsonMethod};
use crate::media::{cache_bust, now_millis, MediaFile, UploadResult};
use crate::notify::Notifier;
use crate::pipeline::coords::normalize;
use crate::pipeline::geometry::{probe_dimensions, PixelCrop, SourceImage};
use crate::pipeline::raster::{rasterize, CropContext};
use crate::pipeline::upload::{UploadDispatcher, UploadPayload, UploadTarget};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A member or user profile as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub nome: String,
    pub sobrenome: String,
    pub email: String,
    #[serde(default)]
    pub contato: String,
    #[serde(default)]
    pub localizacao: String,
    pub foto_perfil: Option<String>,
    pub foto_fundo: Option<String>,
}

/// Editable text fields of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub nome: String,
    pub sobrenome: String,
    pub email: String,
    pub contato: String,
    pub localizacao: String,
}

/// Which kind of account is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Membro,
    Usuario,
}

impl ProfileKind {
    pub fn photo_target(self) -> UploadTarget {
        match self {
            ProfileKind::Membro => UploadTarget::MEMBRO_PERFIL,
            ProfileKind::Usuario => UploadTarget::USUARIO_PERFIL,
        }
    }

    pub fn banner_target(self) -> UploadTarget {
        match self {
            ProfileKind::Membro => UploadTarget::MEMBRO_FUNDO,
            ProfileKind::Usuario => UploadTarget::USUARIO_FUNDO,
        }
    }

    pub fn update_path(self, id: i64) -> String {
        match self {
            ProfileKind::Membro => format!("/api/membros/update/{id}"),
            ProfileKind::Usuario => format!("/api/usuarios/update/{id}"),
        }
    }
}

/// One profile edit session.
pub struct ProfileEditor {
    kind: ProfileKind,
    session: Session,
    backend: Arc<dyn HttpBackend>,
    dispatcher: UploadDispatcher,
    config: PipelineConfig,
    notifier: Arc<dyn Notifier>,
    /// Display state; photo URLs carry a cache-busting parameter.
    profile: Profile,
    /// URLs as stored by the backend, sent back on save.
    stored_photo: Option<String>,
    stored_banner: Option<String>,
}

impl ProfileEditor {
    pub fn new(
        kind: ProfileKind,
        profile: Profile,
        session: Session,
        backend: Arc<dyn HttpBackend>,
        config: PipelineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dispatcher = UploadDispatcher::new(backend.clone(), config.clone());
        let (profile, stored_photo, stored_banner) = baseline(profile);
        Self {
            kind,
            session,
            backend,
            dispatcher,
            config,
            notifier,
            profile,
            stored_photo,
            stored_banner,
        }
    }

    /// Current display state.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Crop the selected photo to a circle client-side and upload the result.
    pub async fn upload_photo(
        &mut self,
        selected: MediaFile,
        crop: PixelCrop,
    ) -> Result<UploadResult, MediaError> {
        match self.photo_pipeline(selected, &crop).await {
            Ok(result) => {
                self.stored_photo = Some(result.media_url.clone());
                self.profile.foto_perfil = Some(result.cache_busted());
                self.notifier.success("Profile photo updated.");
                Ok(result)
            }
            Err(e) => Err(self.fail(e, "Error uploading the profile photo")),
        }
    }

    /// Upload the original banner with crop coordinates for the server.
    ///
    /// A banner without a crop selection is refused before anything is sent.
    pub async fn upload_banner(
        &mut self,
        original: MediaFile,
        crop: Option<PixelCrop>,
    ) -> Result<UploadResult, MediaError> {
        match self.banner_pipeline(original, crop).await {
            Ok(result) => {
                self.stored_banner = Some(result.media_url.clone());
                self.profile.foto_fundo = Some(result.cache_busted());
                self.notifier.success("Banner updated.");
                Ok(result)
            }
            Err(e) => Err(self.fail(e, "Error uploading the banner")),
        }
    }

    /// Send the edited fields and current photo URLs to the backend.
    pub async fn save(&mut self, fields: ProfileFields) -> Result<&Profile, MediaError> {
        match self.save_inner(&fields).await {
            Ok(updated) => {
                self.adopt(updated);
                self.notifier.success("Profile updated successfully!");
                Ok(&self.profile)
            }
            Err(e) => Err(self.fail(e, "Error updating the profile")),
        }
    }

    async fn photo_pipeline(
        &self,
        selected: MediaFile,
        crop: &PixelCrop,
    ) -> Result<UploadResult, MediaError> {
        let target = self.kind.photo_target();
        self.dispatcher.check_file(target, &selected)?;

        let source = tokio::task::spawn_blocking(move || SourceImage::decode(&selected.bytes))
            .await
            .map_err(|e| MediaError::Internal(format!("Decode task panicked: {}", e)))??;

        let asset = rasterize(&source, crop, CropContext::Profile, &self.config).await?;
        self.dispatcher
            .dispatch(&self.session, target, UploadPayload::File(asset.into()))
            .await
    }

    async fn banner_pipeline(
        &self,
        original: MediaFile,
        crop: Option<PixelCrop>,
    ) -> Result<UploadResult, MediaError> {
        let crop = crop.ok_or(MediaError::MissingField { field: "crop" })?;
        let target = self.kind.banner_target();
        self.dispatcher.check_file(target, &original)?;

        let (w, h) = probe_dimensions(&original.bytes)?;
        let coords = normalize(&crop, w, h)?;
        self.dispatcher
            .dispatch(
                &self.session,
                target,
                UploadPayload::Coordinates {
                    original,
                    crop: coords,
                },
            )
            .await
    }

    async fn save_inner(&self, fields: &ProfileFields) -> Result<Profile, MediaError> {
        if fields.nome.trim().is_empty() {
            return Err(MediaError::MissingField { field: "nome" });
        }
        if fields.email.trim().is_empty() {
            return Err(MediaError::MissingField { field: "email" });
        }
        let token = self.session.bearer()?;

        let body = serde_json::json!({
            "id": self.profile.id,
            "nome": fields.nome,
            "sobrenome": fields.sobrenome,
            "email": fields.email,
            "contato": fields.contato,
            "localizacao": fields.localizacao,
            "fotoPerfil": self.stored_photo,
            "fotoFundo": self.stored_banner,
        });
        let url = self.config.endpoint(&self.kind.update_path(self.profile.id));
        info!("Updating profile {}", self.profile.id);

        let reply = self
            .backend
            .send_json(JsonMethod::Patch, &url, token.as_str(), &body)
            .await?;
        if !reply.is_success() {
            return Err(MediaError::RequestRejected {
                status: reply.status,
                message: reply.error_message(),
            });
        }
        serde_json::from_slice(&reply.body).map_err(|e| MediaError::InvalidResponse {
            url,
            detail: e.to_string(),
        })
    }

    /// Take a backend profile as the new baseline.
    fn adopt(&mut self, profile: Profile) {
        (self.profile, self.stored_photo, self.stored_banner) = baseline(profile);
    }

    /// Report a failure and drop the credential if the session is dead.
    fn fail(&mut self, e: MediaError, context: &str) -> MediaError {
        if e.is_session_expired() {
            warn!("{}: {}", context, e);
            self.session.clear();
            self.notifier.error("Session expired. Log in again.");
        } else {
            warn!("{}: {}", context, e);
            self.notifier.error(&format!("{context}: {e}"));
        }
        e
    }
}

/// Split a backend profile into display state and the URLs it stores.
fn baseline(profile: Profile) -> (Profile, Option<String>, Option<String>) {
    let token = now_millis();
    let stored_photo = profile.foto_perfil.clone();
    let stored_banner = profile.foto_fundo.clone();
    let display = Profile {
        foto_perfil: stored_photo.as_deref().map(|u| cache_bust(u, token)),
        foto_fundo: stored_banner.as_deref().map(|u| cache_bust(u, token)),
        ..profile
    };
    (display, stored_photo, stored_banner)
}
