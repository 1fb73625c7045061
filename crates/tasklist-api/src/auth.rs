use std::net::SocketAddr;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use tasklist_db::Database;
use tasklist_types::api::{AuthRequest, MessageResponse};

use crate::cookies::{REFRESH_COOKIE, access_cookie, refresh_cookie};
use crate::error::{ApiError, join_err};
use crate::tokens;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub cookie_domain: String,
}

/// Client ip and user agent, captured for the refresh token audit columns.
/// Both are best-effort: absent under test harnesses and exotic transports.
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(Self { ip, user_agent })
    }
}

fn validate_credentials(req: &AuthRequest) -> Result<(), ApiError> {
    let valid_email = match req.email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };
    if !valid_email {
        return Err(ApiError::Validation("Invalid email.".into()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation("Password must be 6 characters length.".into()));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req)?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.clone();
    let email = req.email.clone();
    tokio::task::spawn_blocking(move || db.db.create_user(&user_id.to_string(), &email, &password_hash))
        .await
        .map_err(join_err)?
        // A duplicate email lands here too and is indistinguishable to the
        // client from any other persistence failure.
        .map_err(ApiError::Internal)?;

    Ok(Json(MessageResponse {
        message: "Successfully registered!".into(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
    Json(req): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req)?;

    let db = state.clone();
    let email = req.email.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::InvalidCredentials)?;

    // Constant-time verify via the hashing primitive, never a string compare
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unparsable: {}", e)))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad user id in store: {}", e)))?;

    let access = tokens::issue_access_token(&state.jwt_secret, user_id, state.access_ttl_seconds)?;
    let pair = tokens::issue_refresh_token(state.refresh_ttl_seconds);

    let db = state.clone();
    let row_id = Uuid::new_v4().to_string();
    let hashed = pair.hashed.clone();
    let expired_at = pair.expired_at.to_rfc3339();
    let owner_id = user.id.clone();
    tokio::task::spawn_blocking(move || {
        db.db.insert_refresh_token(
            &row_id,
            &hashed,
            meta.ip.as_deref(),
            meta.user_agent.as_deref(),
            &owner_id,
            &expired_at,
        )
    })
    .await
    .map_err(join_err)??;

    let jar = jar
        .add(access_cookie(&access, state.access_ttl_seconds, &state.cookie_domain))
        .add(refresh_cookie(&pair.plaintext, state.refresh_ttl_seconds, &state.cookie_domain));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Successfully logged in!".into(),
        }),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::MissingToken)?;

    // Unknown, malformed, and expired tokens must all read the same from the
    // outside: a plain 401.
    let hashed = tokens::hash_refresh_token(&presented);

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_refresh_token_by_hash(&hashed))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::Unauthorized)?;

    let expired_at = chrono::DateTime::parse_from_rfc3339(&row.expired_at)
        .map_err(|_| ApiError::Unauthorized)?
        .with_timezone(&Utc);
    if Utc::now() >= expired_at {
        return Err(ApiError::Unauthorized);
    }

    // Account may have been deleted since the token was issued
    let db = state.clone();
    let owner_id = row.user_id.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&owner_id))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad user id in store: {}", e)))?;

    let access = tokens::issue_access_token(&state.jwt_secret, user_id, state.access_ttl_seconds)?;
    let pair = tokens::issue_refresh_token(state.refresh_ttl_seconds);

    // Rotate in place: once the UPDATE lands, the plaintext the client just
    // presented no longer matches anything.
    let db = state.clone();
    let row_id = row.id.clone();
    let new_hash = pair.hashed.clone();
    let new_expiry = pair.expired_at.to_rfc3339();
    tokio::task::spawn_blocking(move || db.db.rotate_refresh_token(&row_id, &new_hash, &new_expiry))
        .await
        .map_err(join_err)??;

    let jar = jar
        .add(access_cookie(&access, state.access_ttl_seconds, &state.cookie_domain))
        .add(refresh_cookie(&pair.plaintext, state.refresh_ttl_seconds, &state.cookie_domain));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Tokens refreshed.".into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str, password: &str) -> AuthRequest {
        AuthRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn credential_validation() {
        assert!(validate_credentials(&req("a@b.com", "secret1")).is_ok());
        assert!(validate_credentials(&req("not-an-email", "secret1")).is_err());
        assert!(validate_credentials(&req("@b.com", "secret1")).is_err());
        assert!(validate_credentials(&req("a@nodot", "secret1")).is_err());
        assert!(validate_credentials(&req("a@b.com", "short")).is_err());
    }
}
