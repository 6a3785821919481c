use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use banter_db::{ChatError, Database};
use banter_gateway::dispatcher::Dispatcher;
use banter_types::api::{Claims, LoginRequest, NoticeResponse, RegisterRequest, SessionResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::render::{HtmlFragmentRenderer, MessageRenderer};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub dispatcher: Dispatcher,
    pub renderer: Arc<dyn MessageRenderer>,
}

impl AppStateInner {
    /// State with the default HTML renderer.
    pub fn new(
        db: Arc<Database>,
        jwt_secret: String,
        token_ttl_days: i64,
        dispatcher: Dispatcher,
    ) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            token_ttl_days,
            dispatcher,
            renderer: Arc::new(HtmlFragmentRenderer),
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.is_empty() {
        return Err(ChatError::Validation("Password can't be blank".into()).into());
    }
    if req
        .password_confirmation
        .as_deref()
        .is_some_and(|confirmation| confirmation != req.password)
    {
        return Err(
            ChatError::Validation("Password confirmation doesn't match Password".into()).into(),
        );
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let username = req.username;
    let user = blocking(&state, move |db| db.create_user(&username, &password_hash)).await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username, state.token_ttl_days)
        .map_err(|e| {
            error!("Token signing failed: {}", e);
            ApiError::Internal
        })?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id: user.id,
            username: user.username,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const BAD_LOGIN: &str = "Invalid username or password";

    let username = req.username;
    let credentials = blocking(&state, move |db| db.get_credentials(&username))
        .await?
        .ok_or(ApiError::Unauthorized(BAD_LOGIN))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&credentials.password_hash).map_err(|e| {
        error!("Stored password hash for {} is unreadable: {}", credentials.id, e);
        ApiError::Internal
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized(BAD_LOGIN))?;

    let token = create_token(
        &state.jwt_secret,
        credentials.id,
        &credentials.username,
        state.token_ttl_days,
    )
    .map_err(|e| {
        error!("Token signing failed: {}", e);
        ApiError::Internal
    })?;

    Ok(Json(SessionResponse {
        user_id: credentials.id,
        username: credentials.username,
        token,
    }))
}

/// Delete the caller's account together with everything it owns.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    blocking(&state, move |db| db.delete_user(user_id)).await?;
    info!("{} ({}) deleted their account", claims.username, user_id);

    Ok(Json(NoticeResponse {
        notice: "Your account has been deleted.".into(),
    }))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    ttl_days: i64,
) -> anyhow::Result<String> {
    let expires_at = chrono::TimeDelta::try_days(ttl_days)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} days is out of range", ttl_days))?;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
