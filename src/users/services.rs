use anyhow::anyhow;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    auth::password::hash_password_blocking,
    error::AppError,
    users::{
        dto::UserPayload,
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
    },
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User with id {id} not found"))
}

fn registration_conflict(candidate: &UserPayload) -> AppError {
    AppError::Conflict(format!(
        "User with username {} or email {} already exists",
        candidate.username, candidate.email
    ))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

fn validate_payload(payload: &UserPayload) -> Result<(), AppError> {
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    Ok(())
}

async fn hashed(payload: UserPayload) -> Result<NewUser, AppError> {
    let password_hash = hash_password_blocking(payload.password).await?;
    Ok(NewUser {
        username: payload.username,
        email: payload.email,
        password_hash,
    })
}

pub async fn register(store: &dyn UserStore, candidate: UserPayload) -> Result<User, AppError> {
    validate_payload(&candidate)?;
    let existing = store
        .find_by_username_or_email(&candidate.username, &candidate.email)
        .await
        .map_err(internal)?;

    if let Some(found) = existing {
        if found.username == candidate.username || found.email == candidate.email {
            warn!(username = %candidate.username, email = %candidate.email, "registration conflict");
            return Err(registration_conflict(&candidate));
        }
        error!(
            found_id = found.id,
            username = %candidate.username,
            email = %candidate.email,
            "username-or-email lookup returned a user matching neither field"
        );
        return Err(AppError::Internal(anyhow!(
            "inconsistent username-or-email lookup"
        )));
    }

    let conflict = registration_conflict(&candidate);
    let user = match store.insert(hashed(candidate).await?).await {
        Ok(u) => u,
        // Lost a race against a concurrent registration.
        Err(StoreError::UniqueViolation) => return Err(conflict),
        Err(e) => return Err(internal(e)),
    };

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn update(
    store: &dyn UserStore,
    actor: &User,
    target_id: i64,
    changes: UserPayload,
) -> Result<User, AppError> {
    if actor.id != target_id {
        warn!(actor_id = actor.id, target_id, "update of another user refused");
        return Err(AppError::Forbidden("Not enough permissions".into()));
    }
    validate_payload(&changes)?;

    match store.update(target_id, hashed(changes).await?).await {
        Ok(Some(user)) => {
            info!(user_id = user.id, "user updated");
            Ok(user)
        }
        Ok(None) => Err(not_found(target_id)),
        Err(StoreError::UniqueViolation) => {
            Err(AppError::Conflict("Username or email already exists".into()))
        }
        Err(e) => Err(internal(e)),
    }
}

pub async fn delete(store: &dyn UserStore, target_id: i64) -> Result<(), AppError> {
    if store.find_by_id(target_id).await.map_err(internal)?.is_none() {
        return Err(not_found(target_id));
    }
    // Someone else may have removed it in between; the outcome is the same.
    if !store.delete(target_id).await.map_err(internal)? {
        return Err(not_found(target_id));
    }
    info!(user_id = target_id, "user deleted");
    Ok(())
}

pub async fn get_by_id(store: &dyn UserStore, id: i64) -> Result<User, AppError> {
    store
        .find_by_id(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(id))
}

pub async fn list(store: &dyn UserStore, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
    store.list_paged(limit, offset).await.map_err(internal)
}

fn internal(e: StoreError) -> AppError {
    AppError::Internal(e.into())
}
