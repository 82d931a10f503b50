use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::{jwt::JwtKeys, services::{bearer_token, resolve_current_user}};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// The authenticated caller, resolved from the bearer token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let keys = JwtKeys::from(&state.config.jwt);
        let user = resolve_current_user(&keys, state.store.as_ref(), token).await?;
        Ok(CurrentUser(user))
    }
}
