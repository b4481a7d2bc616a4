//! Existence checks for externally hosted documents.
//!
//! Bibliographies and periodic editions point at files on storage the
//! backend does not proxy. Before offering a "view" action we `HEAD` the URL
//! under a bounded retry policy. Running out of attempts never hides the
//! link: the link is returned as-is and a single warning goes to the
//! [`Notifier`], so a transient network or CORS hiccup cannot block access to
//! a document that is actually there.

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::http::HttpBackend;
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the last probe of a link failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// The server answered with a non-success status.
    Status(u16),
    /// No response arrived.
    Transport(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Status(s) => write!(f, "HTTP {s}"),
            ProbeFailure::Transport(r) => f.write_str(r),
        }
    }
}

/// Terminal outcome of checking one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkCheckState {
    /// Placeholder link (`""` or `"#"`); nothing to probe.
    Unchecked,
    /// A probe succeeded.
    Verified { attempts: u32 },
    /// Every probe failed; the link is still shown, with a warning.
    ExhaustedWithWarning { attempts: u32, last: ProbeFailure },
}

/// A document link ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentLink {
    pub title: String,
    pub url: String,
    pub state: LinkCheckState,
}

impl DocumentLink {
    /// Whether the "view" action is offered. Only placeholders are inert.
    pub fn is_clickable(&self) -> bool {
        !is_placeholder(&self.url)
    }
}

/// Probes document URLs with bounded retry.
#[derive(Clone)]
pub struct LinkVerifier {
    backend: Arc<dyn HttpBackend>,
    policy: RetryPolicy,
    api_base_url: String,
}

impl LinkVerifier {
    pub fn new(backend: Arc<dyn HttpBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            policy: config.probe_policy(),
            api_base_url: config.api_base_url.clone(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Probe `url` until one attempt succeeds or the budget is spent.
    ///
    /// Raises no notification; see [`LinkVerifier::verify`] for that.
    pub async fn check(&self, url: &str) -> LinkCheckState {
        if is_placeholder(url) {
            return LinkCheckState::Unchecked;
        }
        let target = self.resolve(url);

        let outcome = self
            .policy
            .run(|attempt| {
                let target = target.as_str();
                async move {
                    debug!("Probing {} (attempt {}/{})", target, attempt, self.policy.max_attempts());
                    match self.backend.head(target).await {
                        Ok(status) if (200..300).contains(&status) => Ok(()),
                        Ok(status) => {
                            warn!("Document link {} answered HTTP {}", target, status);
                            Err(ProbeFailure::Status(status))
                        }
                        Err(MediaError::Transport { reason, .. }) => {
                            warn!("Document link {} unreachable: {}", target, reason);
                            Err(ProbeFailure::Transport(reason))
                        }
                        Err(e) => {
                            warn!("Document link {} probe failed: {}", target, e);
                            Err(ProbeFailure::Transport(e.to_string()))
                        }
                    }
                }
            })
            .await;

        match outcome.result {
            Ok(()) => LinkCheckState::Verified {
                attempts: outcome.attempts,
            },
            Err(last) => LinkCheckState::ExhaustedWithWarning {
                attempts: outcome.attempts,
                last,
            },
        }
    }

    /// Check one document and warn once if it could not be confirmed.
    pub async fn verify(
        &self,
        title: &str,
        url: &str,
        notifier: &dyn Notifier,
    ) -> DocumentLink {
        let state = self.check(url).await;
        match &state {
            LinkCheckState::ExhaustedWithWarning { attempts, last } => {
                let message = match last {
                    ProbeFailure::Status(_) => format!("The file for '{title}' may be unavailable."),
                    ProbeFailure::Transport(_) => format!("Could not verify the file for '{title}'."),
                };
                info!("{} ({} attempts, last: {})", message, attempts, last);
                notifier.warning(&message);
            }
            LinkCheckState::Verified { attempts } => {
                debug!("Verified '{}' after {} attempt(s)", title, attempts);
            }
            LinkCheckState::Unchecked => {}
        }
        DocumentLink {
            title: title.to_string(),
            url: url.to_string(),
            state,
        }
    }

    /// Verify documents one after another, preserving input order.
    pub async fn verify_all<I, T, U>(&self, documents: I, notifier: &dyn Notifier) -> Vec<DocumentLink>
    where
        I: IntoIterator<Item = (T, U)>,
        T: AsRef<str>,
        U: AsRef<str>,
    {
        let mut links = Vec::new();
        for (title, url) in documents {
            links.push(self.verify(title.as_ref(), url.as_ref(), notifier).await);
        }
        links
    }

    /// Resolve backend-relative paths (`/files/x.pdf`) against the API origin.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with('/') && !url.starts_with("//") {
            format!("{}{}", self.api_base_url.trim_end_matches('/'), url)
        } else {
            url.to_string()
        }
    }
}

fn is_placeholder(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "#"
}
