use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::AppError;
use crate::identity::{AuthError, IdentityVerifier};

/// Resolves the caller and injects an `IdentityContext` into request
/// extensions. Accepts `Authorization: Bearer <jwt>` or an `access_token`
/// cookie.
pub async fn require_auth(
    State(verifier): State<Arc<dyn IdentityVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&request).or_else(|| cookie_token(&request));

    let Some(token) = token else {
        return AppError::Unauthorized(AuthError::MissingToken.to_string()).into_response();
    };

    match verifier.verify(&token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "token rejected");
            AppError::Unauthorized(e.to_string()).into_response()
        }
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn cookie_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("access_token="))
        })
        .map(str::to_string)
        .filter(|t| !t.is_empty())
}
