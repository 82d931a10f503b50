use axum::http::{header, HeaderMap};
use tracing::warn;

use crate::{
    auth::jwt::JwtKeys,
    error::AppError,
    users::{repo::UserStore, repo_types::User},
};

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

fn credentials_error() -> AppError {
    AppError::Unauthorized(INVALID_CREDENTIALS.into())
}

/// Resolves a bearer token to the user named by its `sub` claim.
///
/// Every failure (bad token, missing subject, unknown email) produces the same
/// rejection so callers cannot tell which check failed.
pub async fn resolve_current_user(
    keys: &JwtKeys,
    store: &dyn UserStore,
    token: &str,
) -> Result<User, AppError> {
    let claims = keys.validate(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        credentials_error()
    })?;

    let Some(email) = claims.get("sub").and_then(|v| v.as_str()) else {
        warn!("token without subject");
        return Err(credentials_error());
    };

    match store.find_by_email(email).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(email = %email, "token subject does not exist");
            Err(credentials_error())
        }
        Err(e) => Err(AppError::Internal(e.into())),
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))
}
