use std::sync::Arc;

use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::warn;
use uuid::Uuid;

use parley_db::{violated_constraint, Constraint, Database};
use parley_types::api::{
    Claims, SessionResponse, SessionUser, SigninRequest, SigninResponse, SignupRequest,
    SignupResponse,
};
use parley_types::validate;

use crate::error::ApiError;
use crate::username;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Session lifetime; signin mints 15-day tokens.
const TOKEN_LIFETIME_DAYS: i64 = 15;

/// The one message every credential failure collapses into, so a caller
/// cannot probe which emails are registered.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    validate::signup(&req).map_err(ApiError::validation)?;

    // Uniqueness checks, hashing, and the insert are all blocking work.
    tokio::task::spawn_blocking(move || signup_blocking(&state.db, req))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("signup task join error: {e}")))??;

    Ok((StatusCode::CREATED, Json(SignupResponse { ok: true })))
}

/// Signup core, run off the async runtime: email pre-check, username
/// allocation, hashing, transactional insert.
///
/// The pre-check and the allocator's existence probe are advisory; the
/// UNIQUE constraints decide at insert time. An email collision there (two
/// concurrent signups passing the pre-check) is still CONFLICT, and a
/// username collision re-enters the allocation loop.
fn signup_blocking(db: &Database, req: SignupRequest) -> Result<(), ApiError> {
    if db
        .get_user_by_email(&req.email)
        .context("email uniqueness check failed")?
        .is_some()
    {
        return Err(ApiError::conflict("User already exists"));
    }

    // Hash once up front; losing a username race must not cost another pass.
    let password_hash = hash_password(&req.password)?;

    for _ in 0..username::MAX_ATTEMPTS {
        let candidate = username::allocate(db, &req.email)?;
        let user_id = Uuid::new_v4();

        match db.create_user(
            &user_id.to_string(),
            &req.email,
            &req.name,
            &candidate,
            &password_hash,
        ) {
            Ok(()) => return Ok(()),
            Err(err) => match violated_constraint(&err) {
                Some(Constraint::UserEmail) => {
                    return Err(ApiError::conflict("User already exists"));
                }
                Some(Constraint::UserUsername) => {
                    warn!("username {candidate:?} claimed between check and insert, reallocating");
                    continue;
                }
                _ => return Err(ApiError::Internal(err)),
            },
        }
    }

    Err(ApiError::Internal(anyhow!(
        "gave up allocating a username after {} attempts",
        username::MAX_ATTEMPTS
    )))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<SigninResponse>, ApiError> {
    // Malformed input gets the same generic rejection as a wrong password;
    // signin never reveals which part failed.
    if validate::signin(&req).is_err() {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let SigninRequest { email, password } = req;

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_user_with_credential(&email))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("signin task join error: {e}")))?
        .context("credential lookup failed")?;

    // Unknown email, a user with no credential row, and a failed hash
    // comparison all collapse into one observable outcome.
    let Some(user) = row else {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    let Some(hash) = user.hash else {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    if !verify_password(&password, &hash) {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let user_id: Uuid = user.id.parse().context("corrupt user id in store")?;
    let token = create_token(&state.jwt_secret, user_id, &user.email, &user.username)?;

    Ok(Json(SigninResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// The identity rehydrated from the presented token, for UI consumers.
pub async fn session(Extension(claims): Extension<Claims>) -> Json<SessionResponse> {
    let expires = chrono::DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_default();

    Json(SessionResponse {
        user: SessionUser {
            id: claims.sub,
            email: claims.email,
            username: claims.username,
        },
        expires,
    })
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Hash comparison; a corrupt stored hash verifies as false rather than
/// erroring, keeping that failure indistinguishable from a bad password.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn create_token(secret: &str, user_id: Uuid, email: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a bearer token and recover its claims. Expired or tampered tokens
/// are `None`; callers treat that as Unauthenticated rather than an error.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}
