use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{config::JwtConfig, state::AppState};

/// Free-form claim set carried by a token.
pub type Claims = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Signing and verification keys plus the default token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub default_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            default_ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    /// Adds `exp = now + ttl` to `claims` (replacing any caller value) and signs.
    pub fn issue(&self, mut claims: Claims, ttl: Duration) -> Result<String, TokenError> {
        let exp = OffsetDateTime::now_utc() + ttl;
        claims.insert("exp".into(), Value::from(exp.unix_timestamp()));
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(sub = ?claims.get("sub"), exp = exp.unix_timestamp(), "jwt signed");
        Ok(token)
    }

    pub fn issue_default(&self, claims: Claims) -> Result<String, TokenError> {
        self.issue(claims, self.default_ttl)
    }

    /// Checks signature, structure and expiry. Claim semantics are left to the caller.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;

        // A token is already dead at its `exp` instant.
        let exp = data
            .claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::InvalidToken("exp is not an integer".into()))?;
        if exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::InvalidToken("token expired".into()));
        }

        debug!(sub = ?data.claims.get("sub"), "jwt verified");
        Ok(data.claims)
    }
}

/// Claim set for a login token: just the subject email.
pub fn subject_claims(email: &str) -> Claims {
    let mut claims = Claims::new();
    claims.insert("sub".into(), Value::from(email));
    claims
}
