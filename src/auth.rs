use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    authz::Role,
    config::AppConfig,
    error::ApiError,
    models::{Person, Session},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the Bearer token handed out at login. Signed with the server
/// secret and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The person id the session belongs to.
    pub sub: i64,
    /// Server-side session id; the row must still exist for the token to be
    /// accepted, which is what makes logout effective.
    pub sid: Uuid,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
    /// Issued-at timestamp.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take this as
/// an argument and pass it to the authorizer.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    /// Session the request authenticated with; logout deletes this row.
    pub session_id: Uuid,
}

/// Hashes a password into an argon2 PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies a candidate password against a stored PHC hash. An unparsable
/// hash counts as a mismatch.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Builds the session row and matching signed token for a person who just
/// authenticated.
pub fn issue_session(
    person: &Person,
    config: &AppConfig,
) -> Result<(Session, String), ApiError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(config.session_ttl_secs);

    let session = Session {
        id: Uuid::new_v4(),
        person_id: person.id,
        created_at: now,
        expires_at,
    };

    let claims = Claims {
        sub: person.id,
        sid: session.id,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    Ok((session, token))
}

/// AuthUser extractor
///
/// Resolves the Bearer token into an identity:
/// 1. extract and decode the token;
/// 2. confirm the session row still exists (logout deletes it);
/// 3. load the person and confirm the account is active.
///
/// Any failure rejects with the `unauthenticated` kind (401); role checks
/// come later, in the authorizer.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_string()))?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::Unauthenticated("session expired".to_string())
                }
                _ => ApiError::Unauthenticated("invalid session token".to_string()),
            })?;

        let claims = token_data.claims;

        // The signature alone is not enough, the session must still be
        // live in the store.
        let session = repo
            .get_session(claims.sid)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::Unauthenticated("session is no longer active".to_string()))?;

        let person = repo
            .get_person(session.person_id)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::Unauthenticated("session is no longer active".to_string()))?;

        if !person.is_active {
            return Err(ApiError::Unauthenticated("inactive person".to_string()));
        }

        Ok(AuthUser {
            id: person.id,
            username: person.username,
            role: person.role,
            session_id: session.id,
        })
    }
}
