use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, TokenResponse},
        extractors::CurrentUser,
        jwt::{subject_claims, JwtKeys},
        password::verify_password_blocking,
    },
    error::AppError,
    extract::Form,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/token", post(login_for_access_token))
        .route("/auth/refresh_token", post(refresh_access_token))
}

#[instrument(skip_all, fields(email = %form.username))]
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .store
        .find_by_email(&form.username)
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .ok_or_else(|| {
            warn!("login unknown email");
            AppError::Unauthorized("Incorrect email or password".into())
        })?;

    let matches = verify_password_blocking(form.password, user.password.clone()).await?;
    if !matches {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .issue_default(subject_claims(&user.email))
        .map_err(|e| AppError::Internal(e.into()))?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(access_token)))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn refresh_access_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TokenResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .issue_default(subject_claims(&user.email))
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(TokenResponse::bearer(access_token)))
}
