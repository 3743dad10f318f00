use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An externally verified caller, attached to every inbound operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityContext {
    /// Stable subject id issued by the identity provider.
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl IdentityContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
}

/// Boundary to the identity provider: turns a bearer token into an identity.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, bearer_token: &str) -> Result<IdentityContext, AuthError>;
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Reads the payload of a JWT whose signature the gateway in front of this
/// service has already checked. Only `sub`, `name`, `email` and `exp` are used.
#[derive(Debug, Default, Clone)]
pub struct JwtPayloadVerifier;

impl IdentityVerifier for JwtPayloadVerifier {
    fn verify(&self, bearer_token: &str) -> Result<IdentityContext, AuthError> {
        let token = bearer_token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::Malformed);
        }

        let payload_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|_| AuthError::Malformed)?;
        let payload: JwtPayload =
            serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::Malformed)?;

        if payload.sub.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        if let Some(exp) = payload.exp {
            if exp <= Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }

        Ok(IdentityContext {
            id: payload.sub,
            display_name: payload.name.filter(|s| !s.trim().is_empty()),
            email: payload.email.filter(|s| !s.trim().is_empty()),
        })
    }
}
