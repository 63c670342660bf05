// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer access-token middleware.

use crate::error::AppError;
use crate::models::User;
use crate::services::TokenKind;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated user resolved from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Middleware that requires a valid access token.
///
/// Every token failure (missing, malformed, expired, unknown user) yields the
/// same `Unauthorized` response. Store errors still surface as 500.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let user = resolve_user(&state, &token).await?;
    request.extensions_mut().insert(AuthUser { user });

    Ok(next.run(request).await)
}

/// Verify an access token and load the user it names.
pub async fn resolve_user(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state
        .tokens
        .verify(token, TokenKind::Access)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::Unauthorized
        })?;

    match state.users.get_user(&claims.sub).await? {
        Some(user) => Ok(user),
        None => {
            tracing::debug!(user_id = %claims.sub, "Access token for unknown user");
            Err(AppError::Unauthorized)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("abc.def")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
