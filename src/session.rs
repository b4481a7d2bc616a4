//! Explicit session: the bearer credential handed to every network call.
//!
//! The token is opaque to the pipeline. When it happens to be a JWT we peek at
//! its payload for the `exp` claim (to fail fast on an expired session) and
//! for the publisher identity used by entity submissions. Signatures are not
//! checked; the backend does that.

use crate::error::MediaError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Claims the front-end reads from the token payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<u64>,
    pub id: Option<serde_json::Value>,
    pub nome: Option<String>,
    pub sobrenome: Option<String>,
    pub role: Option<String>,
}

/// The signed-in user, as named on submitted entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    pub id: i64,
    pub full_name: String,
    pub role: Option<String>,
}

impl Publisher {
    /// Only admins and members may publish events.
    pub fn may_publish_events(&self) -> bool {
        matches!(self.role.as_deref(), Some("ADMIN") | Some("MEMBRO"))
    }
}

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the JWT payload segment. `None` for opaque (non-JWT) tokens.
    pub fn claims(&self) -> Option<TokenClaims> {
        let mut parts = self.0.split('.');
        let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
        let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    /// `true` when the token carries an `exp` claim at or before `now_secs`.
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.claims()
            .and_then(|c| c.exp)
            .is_some_and(|exp| exp <= now_secs)
    }
}

/// Credentials for one user session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<SessionToken>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token = SessionToken::new(token);
        if token.as_str().is_empty() {
            return Self::anonymous();
        }
        Self { token: Some(token) }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The token, if it is present and not expired.
    ///
    /// # Errors
    /// * [`MediaError::NotAuthenticated`]: no token.
    /// * [`MediaError::SessionExpired`]: the JWT `exp` claim has passed.
    pub fn bearer(&self) -> Result<&SessionToken, MediaError> {
        let token = self.token.as_ref().ok_or(MediaError::NotAuthenticated)?;
        if token.is_expired_at(now_secs()) {
            debug!("Bearer token expired");
            return Err(MediaError::SessionExpired);
        }
        Ok(token)
    }

    /// Identity of the signed-in user, from the token payload.
    pub fn publisher(&self) -> Result<Publisher, MediaError> {
        let claims = self
            .bearer()?
            .claims()
            .ok_or(MediaError::MissingField { field: "publicadorId" })?;
        let id = claims
            .id
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .ok_or(MediaError::MissingField { field: "publicadorId" })?;
        let full_name = format!(
            "{} {}",
            claims.nome.unwrap_or_default(),
            claims.sobrenome.unwrap_or_default()
        )
        .trim()
        .to_string();
        Ok(Publisher {
            id,
            full_name,
            role: claims.role,
        })
    }

    /// Drop the credential. Called when the backend reports the session dead.
    pub fn clear(&mut self) {
        if self.token.take().is_some() {
            info!("Session credential cleared; re-authentication required");
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) fn test_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2ln")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opaque_token_is_never_expired() {
        let s = Session::with_token("abc123");
        assert!(s.bearer().is_ok());
        assert!(s.bearer().unwrap().claims().is_none());
    }

    #[test]
    fn expired_jwt_rejected() {
        let s = Session::with_token(test_jwt(&json!({"exp": 1})));
        assert!(matches!(s.bearer(), Err(MediaError::SessionExpired)));
    }

    #[test]
    fn fresh_jwt_accepted() {
        let s = Session::with_token(test_jwt(&json!({"exp": 4_102_444_800u64})));
        assert!(s.bearer().is_ok());
    }

    #[test]
    fn missing_token_not_authenticated() {
        let s = Session::with_token("   ");
        assert!(!s.is_authenticated());
        assert!(matches!(s.bearer(), Err(MediaError::NotAuthenticated)));
    }

    #[test]
    fn publisher_from_claims_accepts_string_id() {
        let s = Session::with_token(test_jwt(
            &json!({"id": "42", "nome": "Ana", "sobrenome": "Souza"}),
        ));
        assert_eq!(
            s.publisher().unwrap(),
            Publisher {
                id: 42,
                full_name: "Ana Souza".into(),
                role: None,
            }
        );
        assert!(!s.publisher().unwrap().may_publish_events());
    }

    #[test]
    fn clear_drops_token() {
        let mut s = Session::with_token("abc");
        s.clear();
        assert!(matches!(s.bearer(), Err(MediaError::NotAuthenticated)));
    }

    #[test]
    fn debug_redacts_secret() {
        let s = Session::with_token("super-secret");
        assert!(!format!("{s:?}").contains("super-secret"));
    }
}
