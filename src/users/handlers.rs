use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        extractors::CurrentUser,
        jwt::JwtKeys,
        services::{bearer_token, resolve_current_user},
    },
    error::AppError,
    extract::{Json as Body, Path, Query},
    state::AppState,
    users::{
        dto::{Message, Pagination, UserList, UserPayload, UserPublic},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip_all, fields(username = %payload.username))]
pub async fn create_user(
    State(state): State<AppState>,
    Body(payload): Body<UserPayload>,
) -> Result<(StatusCode, Json<UserPublic>), AppError> {
    let user = services::register(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<UserList>, AppError> {
    if p.limit < 0 || p.offset < 0 {
        return Err(AppError::Validation(
            "limit and offset must be non-negative".into(),
        ));
    }
    let users = services::list(state.store.as_ref(), p.limit, p.offset).await?;
    Ok(Json(UserList {
        users: users.into_iter().map(UserPublic::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserPublic>, AppError> {
    let user = services::get_by_id(state.store.as_ref(), id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip_all, fields(actor_id = actor.id, target_id = id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Body(payload): Body<UserPayload>,
) -> Result<Json<UserPublic>, AppError> {
    let user = services::update(state.store.as_ref(), &actor, id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, headers))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Message>, AppError> {
    if state.config.delete_requires_auth {
        let token = bearer_token(&headers)?;
        let keys = JwtKeys::from_ref(&state);
        resolve_current_user(&keys, state.store.as_ref(), token).await?;
    }
    services::delete(state.store.as_ref(), id).await?;
    Ok(Json(Message {
        message: "User deleted".into(),
    }))
}
