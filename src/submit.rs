//! Entity submissions: news, events and projects sent for moderation.
//!
//! Each submission validates its required fields first, uploads its media
//! through the [`UploadDispatcher`], then posts one JSON body to
//! `/api/{noticias|evento|projeto}/solicitar`. If any upload fails nothing is
//! posted.

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::http::{HttpBackend, JsonMethod};
use crate::media::MediaFile;
use crate::notify::Notifier;
use crate::pipeline::upload::{UploadDispatcher, UploadTarget};
use crate::session::{Publisher, Session};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A member credited on an event or project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewsDraft {
    pub titulo: String,
    pub conteudo: String,
    pub categoria: String,
    pub imagem: Option<MediaFile>,
}

#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub titulo: String,
    pub descricao: String,
    /// Event date as entered, e.g. `2025-03-14`.
    pub data_evento: String,
    pub imagem: Option<MediaFile>,
    pub contribuidores: Vec<Contributor>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub titulo: String,
    pub descricao: String,
    pub area_tematica_id: i64,
    pub area_tematica_titulo: String,
    /// Cover image. Required.
    pub imagem: Option<MediaFile>,
    /// Optional PDF attachment.
    pub arquivo: Option<MediaFile>,
    pub contribuidores: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRequest {
    pub titulo: String,
    pub conteudo: String,
    pub categoria: String,
    pub imagem_url: Option<String>,
    pub publicador_id: i64,
    pub publicador_nome_e_sobrenome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub titulo: String,
    pub descricao: String,
    pub data_evento: String,
    pub arquivos_midia: Option<String>,
    pub publicador_id: i64,
    pub publicador_nome_e_sobrenome: String,
    pub contribuidores_id: Vec<i64>,
    pub contribuidores_nome_e_sobrenome: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub titulo: String,
    pub descricao: String,
    pub area_tematica_id: i64,
    pub area_tematica_titulo: String,
    pub imagem: Option<String>,
    pub arquivo: Option<String>,
    pub publicador_id: i64,
    pub publicador_nome_e_sobrenome: String,
    pub contribuidores_id: Vec<i64>,
    pub contribuidores_nome_e_sobrenome: Vec<String>,
}

/// Character limit on news bodies and event/project descriptions.
pub const MAX_BODY_CHARS: usize = 1000;

fn within_limit(value: &str, field: &'static str) -> Result<(), MediaError> {
    let len = value.chars().count();
    if len > MAX_BODY_CHARS {
        return Err(MediaError::FieldTooLong {
            field,
            len,
            max: MAX_BODY_CHARS,
        });
    }
    Ok(())
}

fn require(value: &str, field: &'static str) -> Result<(), MediaError> {
    if value.trim().is_empty() {
        return Err(MediaError::MissingField { field });
    }
    Ok(())
}

fn split_contributors(list: &[Contributor]) -> (Vec<i64>, Vec<String>) {
    list.iter().map(|c| (c.id, c.full_name.clone())).unzip()
}

impl NewsDraft {
    pub fn validate(&self) -> Result<(), MediaError> {
        require(&self.titulo, "titulo")?;
        require(&self.conteudo, "conteudo")?;
        within_limit(&self.conteudo, "conteudo")?;
        require(&self.categoria, "categoria")
    }
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), MediaError> {
        require(&self.titulo, "titulo")?;
        require(&self.descricao, "descricao")?;
        within_limit(&self.descricao, "descricao")?;
        require(&self.data_evento, "dataEvento")?;
        if self.contribuidores.is_empty() {
            return Err(MediaError::MissingField {
                field: "contribuidoresId",
            });
        }
        Ok(())
    }
}

impl ProjectDraft {
    pub fn validate(&self) -> Result<(), MediaError> {
        require(&self.titulo, "titulo")?;
        require(&self.descricao, "descricao")?;
        within_limit(&self.descricao, "descricao")?;
        if self.area_tematica_id <= 0 {
            return Err(MediaError::MissingField {
                field: "areaTematicaId",
            });
        }
        if self.imagem.is_none() {
            return Err(MediaError::MissingField { field: "imagem" });
        }
        if self.contribuidores.is_empty() {
            return Err(MediaError::MissingField {
                field: "contribuidoresId",
            });
        }
        Ok(())
    }
}

/// Sends entity submissions on behalf of the session's user.
pub struct Submitter {
    session: Session,
    backend: Arc<dyn HttpBackend>,
    dispatcher: UploadDispatcher,
    config: PipelineConfig,
    notifier: Arc<dyn Notifier>,
}

impl Submitter {
    pub fn new(
        session: Session,
        backend: Arc<dyn HttpBackend>,
        config: PipelineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dispatcher = UploadDispatcher::new(backend.clone(), config.clone());
        Self {
            session,
            backend,
            dispatcher,
            config,
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn submit_news(&mut self, draft: NewsDraft) -> Result<NewsRequest, MediaError> {
        let outcome = self.news(draft).await;
        self.report(outcome, "news")
    }

    pub async fn submit_event(&mut self, draft: EventDraft) -> Result<EventRequest, MediaError> {
        let outcome = self.event(draft).await;
        self.report(outcome, "event")
    }

    pub async fn submit_project(
        &mut self,
        draft: ProjectDraft,
    ) -> Result<ProjectRequest, MediaError> {
        let outcome = self.project(draft).await;
        self.report(outcome, "project")
    }

    async fn news(&self, draft: NewsDraft) -> Result<NewsRequest, MediaError> {
        draft.validate()?;
        self.precheck(UploadTarget::NOTICIA_IMAGEM, draft.imagem.as_ref())?;
        let publisher = self.session.publisher()?;

        let imagem_url = self.upload(UploadTarget::NOTICIA_IMAGEM, draft.imagem).await?;
        let body = NewsRequest {
            titulo: draft.titulo,
            conteudo: draft.conteudo,
            categoria: draft.categoria,
            imagem_url,
            publicador_id: publisher.id,
            publicador_nome_e_sobrenome: publisher.full_name,
        };
        self.post("/api/noticias/solicitar", &body).await?;
        Ok(body)
    }

    async fn event(&self, draft: EventDraft) -> Result<EventRequest, MediaError> {
        draft.validate()?;
        self.precheck(UploadTarget::EVENTO_IMAGEM, draft.imagem.as_ref())?;
        let publisher = self.session.publisher()?;
        check_event_role(&publisher)?;

        let arquivos_midia = self.upload(UploadTarget::EVENTO_IMAGEM, draft.imagem).await?;
        let (contribuidores_id, contribuidores_nome_e_sobrenome) =
            split_contributors(&draft.contribuidores);
        let body = EventRequest {
            titulo: draft.titulo,
            descricao: draft.descricao,
            data_evento: draft.data_evento,
            arquivos_midia,
            publicador_id: publisher.id,
            publicador_nome_e_sobrenome: publisher.full_name,
            contribuidores_id,
            contribuidores_nome_e_sobrenome,
        };
        self.post("/api/evento/solicitar", &body).await?;
        Ok(body)
    }

    async fn project(&self, draft: ProjectDraft) -> Result<ProjectRequest, MediaError> {
        draft.validate()?;
        self.precheck(UploadTarget::PROJETO_IMAGEM, draft.imagem.as_ref())?;
        self.precheck(UploadTarget::PROJETO_ARQUIVO, draft.arquivo.as_ref())?;
        let publisher = self.session.publisher()?;

        // Image and PDF go up concurrently; either failure aborts the post.
        let (imagem, arquivo) = futures::future::try_join(
            self.upload(UploadTarget::PROJETO_IMAGEM, draft.imagem),
            self.upload(UploadTarget::PROJETO_ARQUIVO, draft.arquivo),
        )
        .await?;

        let (contribuidores_id, contribuidores_nome_e_sobrenome) =
            split_contributors(&draft.contribuidores);
        let body = ProjectRequest {
            titulo: draft.titulo,
            descricao: draft.descricao,
            area_tematica_id: draft.area_tematica_id,
            area_tematica_titulo: draft.area_tematica_titulo,
            imagem,
            arquivo,
            publicador_id: publisher.id,
            publicador_nome_e_sobrenome: publisher.full_name,
            contribuidores_id,
            contribuidores_nome_e_sobrenome,
        };
        self.post("/api/projeto/solicitar", &body).await?;
        Ok(body)
    }

    fn precheck(&self, target: UploadTarget, file: Option<&MediaFile>) -> Result<(), MediaError> {
        match file {
            Some(f) => self.dispatcher.check_file(target, f),
            None => Ok(()),
        }
    }

    async fn upload(
        &self,
        target: UploadTarget,
        file: Option<MediaFile>,
    ) -> Result<Option<String>, MediaError> {
        match file {
            Some(f) => {
                let res = self.dispatcher.dispatch(&self.session, target, f.into()).await?;
                Ok(Some(res.media_url))
            }
            None => Ok(None),
        }
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), MediaError> {
        let token = self.session.bearer()?;
        let url = self.config.endpoint(path);
        let value = serde_json::to_value(body).map_err(|e| MediaError::Internal(e.to_string()))?;
        info!("Submitting to {}", url);

        let reply = self
            .backend
            .send_json(JsonMethod::Post, &url, token.as_str(), &value)
            .await?;
        if !reply.is_success() {
            return Err(MediaError::RequestRejected {
                status: reply.status,
                message: reply.error_message(),
            });
        }
        Ok(())
    }

    fn report<T>(&mut self, outcome: Result<T, MediaError>, what: &str) -> Result<T, MediaError> {
        match outcome {
            Ok(body) => {
                self.notifier
                    .success(&format!("Request to publish {what} sent successfully!"));
                Ok(body)
            }
            Err(e) if e.is_session_expired() => {
                warn!("Submitting {} failed: {}", what, e);
                self.session.clear();
                self.notifier.error("Session expired. Log in again.");
                Err(e)
            }
            Err(e) => {
                warn!("Submitting {} failed: {}", what, e);
                self.notifier
                    .error(&format!("Error requesting {what} publication: {e}"));
                Err(e)
            }
        }
    }
}

fn check_event_role(publisher: &Publisher) -> Result<(), MediaError> {
    if publisher.may_publish_events() {
        return Ok(());
    }
    Err(MediaError::NotPermitted {
        role: publisher.role.clone().unwrap_or_else(|| "unknown".into()),
        action: "publish events",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpReply, MultipartForm};
    use crate::notify::noop_notifier;
    use crate::session::test_jwt;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Backend {
        uploads: Mutex<Vec<String>>,
        posts: Mutex<Vec<(String, Value)>>,
        fail_upload: bool,
    }

    #[async_trait]
    impl HttpBackend for Backend {
        async fn post_multipart(&self, url: &str, _: &str, form: MultipartForm) -> Result<HttpReply, MediaError> {
            self.uploads.lock().unwrap().push(url.to_string());
            if self.fail_upload {
                return Ok(HttpReply {
                    status: 500,
                    body: b"boom".to_vec(),
                });
            }
            let body = json!({ "mediaUrl": format!("https://cdn/{}", form.file.file_name) });
            Ok(HttpReply {
                status: 201,
                body: body.to_string().into_bytes(),
            })
        }

        async fn send_json(&self, _: JsonMethod, url: &str, _: &str, body: &Value) -> Result<HttpReply, MediaError> {
            self.posts.lock().unwrap().push((url.to_string(), body.clone()));
            Ok(HttpReply {
                status: 200,
                body: Vec::new(),
            })
        }

        async fn head(&self, _: &str) -> Result<u16, MediaError> {
            unreachable!()
        }
    }

    fn member() -> Session {
        Session::with_token(test_jwt(
            &json!({"id": 9, "nome": "Rui", "sobrenome": "Lima", "role": "MEMBRO"}),
        ))
    }

    fn submitter(backend: Arc<Backend>, session: Session) -> Submitter {
        let config = PipelineConfig::builder()
            .api_base_url("https://api.test")
            .build()
            .unwrap();
        Submitter::new(session, backend, config, noop_notifier())
    }

    fn crew() -> Vec<Contributor> {
        vec![
            Contributor {
                id: 1,
                full_name: "Ana Souza".into(),
            },
            Contributor {
                id: 2,
                full_name: "Bia Reis".into(),
            },
        ]
    }

    #[tokio::test]
    async fn news_without_image_posts_null_url() {
        let backend = Arc::new(Backend::default());
        let mut s = submitter(backend.clone(), member());
        s.submit_news(NewsDraft {
            titulo: "T".into(),
            conteudo: "C".into(),
            categoria: "Eventos".into(),
            imagem: None,
        })
        .await
        .unwrap();

        assert!(backend.uploads.lock().unwrap().is_empty());
        let posts = backend.posts.lock().unwrap();
        assert_eq!(posts[0].0, "https://api.test/api/noticias/solicitar");
        assert_eq!(posts[0].1["imagemUrl"], Value::Null);
        assert_eq!(posts[0].1["publicadorId"], 9);
        assert_eq!(posts[0].1["publicadorNomeESobrenome"], "Rui Lima");
    }

    #[tokio::test]
    async fn missing_title_sends_nothing() {
        let backend = Arc::new(Backend::default());
        let mut s = submitter(backend.clone(), member());
        let err = s
            .submit_news(NewsDraft {
                conteudo: "C".into(),
                categoria: "X".into(),
                imagem: Some(MediaFile::new("n.jpg", "image/jpeg", vec![1])),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingField { field: "titulo" }));
        assert!(backend.uploads.lock().unwrap().is_empty());
        assert!(backend.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_sends_nothing() {
        let backend = Arc::new(Backend::default());
        let mut s = submitter(backend.clone(), member());
        let err = s
            .submit_news(NewsDraft {
                titulo: "T".into(),
                conteudo: "x".repeat(5000),
                categoria: "X".into(),
                imagem: Some(MediaFile::new("n.jpg", "image/jpeg", vec![1])),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::FieldTooLong {
                field: "conteudo",
                len: 5000,
                max: 1000
            }
        ));
        assert_eq!(err.class(), crate::error::ErrorClass::Validation);
        assert!(backend.uploads.lock().unwrap().is_empty());
        assert!(backend.posts.lock().unwrap().is_empty());
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let event = EventDraft {
            titulo: "E".into(),
            descricao: "ç".repeat(MAX_BODY_CHARS),
            data_evento: "2025-03-14".into(),
            imagem: None,
            contribuidores: crew(),
        };
        assert!(event.validate().is_ok());

        let project = ProjectDraft {
            titulo: "P".into(),
            descricao: "d".repeat(MAX_BODY_CHARS + 1),
            area_tematica_id: 3,
            imagem: Some(MediaFile::new("capa.png", "image/png", vec![1])),
            contribuidores: crew(),
            ..Default::default()
        };
        assert!(matches!(
            project.validate(),
            Err(MediaError::FieldTooLong { field: "descricao", .. })
        ));
    }

    #[tokio::test]
    async fn project_uploads_both_files_then_posts() {
        let backend = Arc::new(Backend::default());
        let mut s = submitter(backend.clone(), member());
        let body = s
            .submit_project(ProjectDraft {
                titulo: "P".into(),
                descricao: "D".into(),
                area_tematica_id: 3,
                area_tematica_titulo: "Saúde".into(),
                imagem: Some(MediaFile::new("capa.png", "image/png", vec![1])),
                arquivo: Some(MediaFile::new("doc.pdf", "application/pdf", vec![2])),
                contribuidores: crew(),
            })
            .await
            .unwrap();

        assert_eq!(body.imagem.as_deref(), Some("https://cdn/capa.png"));
        assert_eq!(body.arquivo.as_deref(), Some("https://cdn/doc.pdf"));
        let mut uploads = backend.uploads.lock().unwrap().clone();
        uploads.sort();
        assert_eq!(
            uploads,
            vec![
                "https://api.test/api/files/upload-projeto-arquivo",
                "https://api.test/api/files/upload-projeto-imagem",
            ]
        );
        let posts = backend.posts.lock().unwrap();
        assert_eq!(posts[0].1["contribuidoresId"], json!([1, 2]));
        assert_eq!(posts[0].1["areaTematicaTitulo"], "Saúde");
    }

    #[tokio::test]
    async fn project_rejects_non_pdf_attachment_before_upload() {
        let backend = Arc::new(Backend::default());
        let mut s = submitter(backend.clone(), member());
        let err = s
            .submit_project(ProjectDraft {
                titulo: "P".into(),
                descricao: "D".into(),
                area_tematica_id: 3,
                imagem: Some(MediaFile::new("capa.png", "image/png", vec![1])),
                arquivo: Some(MediaFile::new("doc.docx", "application/msword", vec![2])),
                contribuidores: crew(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType { .. }));
        assert!(backend.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_aborts_submission() {
        let backend = Arc::new(Backend {
            fail_upload: true,
            ..Default::default()
        });
        let mut s = submitter(backend.clone(), member());
        let err = s
            .submit_event(EventDraft {
                titulo: "E".into(),
                descricao: "D".into(),
                data_evento: "2025-03-14".into(),
                imagem: Some(MediaFile::new("e.jpg", "image/jpeg", vec![1])),
                contribuidores: crew(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UploadRejected { status: 500, .. }));
        assert!(backend.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_requires_member_role() {
        let backend = Arc::new(Backend::default());
        let user = Session::with_token(test_jwt(&json!({"id": 4, "role": "USUARIO"})));
        let mut s = submitter(backend.clone(), user);
        let err = s
            .submit_event(EventDraft {
                titulo: "E".into(),
                descricao: "D".into(),
                data_evento: "2025-03-14".into(),
                imagem: None,
                contribuidores: crew(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotPermitted { .. }));
        assert!(backend.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_session_is_cleared() {
        let backend = Arc::new(Backend::default());
        let expired = Session::with_token(test_jwt(&json!({"id": 9, "exp": 1})));
        let mut s = submitter(backend, expired);
        let err = s
            .submit_news(NewsDraft {
                titulo: "T".into(),
                conteudo: "C".into(),
                categoria: "X".into(),
                imagem: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_session_expired());
        assert!(!s.session().is_authenticated());
    }
}
