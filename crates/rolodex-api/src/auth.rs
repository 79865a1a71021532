use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use md5::{Digest, Md5};
use tracing::{debug, info};
use uuid::Uuid;

use rolodex_cache::UserDirectory;
use rolodex_db::models::NewUser;
use rolodex_db::{Database, StoreError};
use rolodex_types::api::{
    AvatarRequest, Claims, LoginRequest, MessageResponse, SignupRequest, SignupResponse,
    TokenResponse, TokenScope, UserResponse,
};
use rolodex_types::models::User;

use crate::error::ApiError;
use crate::middleware::bearer_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub users: UserDirectory,
    pub jwt_secret: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let email = req.email.trim().to_string();

    // Validate input
    if !is_plausible_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::bad_request("Username must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    if state.users.resolve(&email).await?.is_some() {
        return Err(email_taken(&email));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user = state
        .users
        .create_user(NewUser {
            avatar: Some(gravatar_url(&email)),
            email: email.clone(),
            username: req.username,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            // A concurrent signup won the unique index.
            StoreError::Conflict(_) => email_taken(&email),
            other => other.into(),
        })?;

    // Mail delivery is external; the link is logged for the operator.
    let email_token = create_token(&state.jwt_secret, &user.email, TokenScope::EmailToken)?;
    info!("Created user {} ({})", user.id, user.email);
    debug!("Confirmation link for {}: /auth/confirmed_email/{}", user.email, email_token);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user.into(),
            detail: "User successfully created. Check your email for confirmation.".to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .users
        .resolve(req.email.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("stored hash for user {} is invalid: {}", user.id, e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    if !user.confirmed {
        return Err(ApiError::unauthorized("Email not confirmed"));
    }

    Ok(Json(issue_tokens(&state, &user.email).await?))
}

/// Trade the current refresh token for a new pair. Only the most recently
/// issued refresh token is accepted.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    let claims = decode_token(&state.jwt_secret, token, TokenScope::RefreshToken)?;

    let user = state
        .users
        .resolve(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    if user.refresh_token.as_deref() != Some(token) {
        return Err(ApiError::unauthorized("Invalid or expired refresh token"));
    }

    Ok(Json(issue_tokens(&state, &user.email).await?))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = decode_token(&state.jwt_secret, &token, TokenScope::EmailToken)
        .map_err(|_| ApiError::bad_request("Verification error"))?;

    let user = state
        .users
        .resolve(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::bad_request("Verification error"))?;

    let message = if user.confirmed {
        "Your email is already confirmed"
    } else {
        state.users.confirm_email(&user.email).await?;
        info!("Confirmed email for user {}", user.id);
        "Email confirmed"
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// The image itself lives with an external host; this records its URL.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<AvatarRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let url = req.avatar_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::bad_request("Avatar must be an http(s) URL"));
    }

    let updated = state
        .users
        .update_avatar(&user.email, url)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(updated.into()))
}

/// Removes a single account. Callers can only remove their own; any other
/// email answers 404 like a missing one.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(email): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    if email != user.email {
        return Err(ApiError::not_found("User not found"));
    }

    let deleted = state
        .users
        .delete_user(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!("Deleted user {} ({})", deleted.id, deleted.email);
    Ok(Json(deleted.into()))
}

async fn issue_tokens(state: &AppState, email: &str) -> Result<TokenResponse, ApiError> {
    let access_token = create_token(&state.jwt_secret, email, TokenScope::AccessToken)?;
    let refresh_token = create_token(&state.jwt_secret, email, TokenScope::RefreshToken)?;

    let stored = state
        .users
        .update_refresh_token(email, Some(refresh_token.clone()))
        .await?;
    if !stored {
        return Err(StoreError::NotFound.into());
    }

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
    })
}

pub fn create_token(secret: &str, email: &str, scope: TokenScope) -> anyhow::Result<String> {
    let lifetime = match scope {
        TokenScope::AccessToken => chrono::Duration::minutes(15),
        TokenScope::RefreshToken => chrono::Duration::days(7),
        TokenScope::EmailToken => chrono::Duration::days(1),
    };

    let claims = Claims {
        sub: email.to_string(),
        scope,
        exp: (chrono::Utc::now() + lifetime).timestamp() as usize,
        jti: Uuid::new_v4(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Decode and check signature, expiry and scope.
pub fn decode_token(secret: &str, token: &str, scope: TokenScope) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::unauthorized("Could not validate credentials")
    })?;

    if token_data.claims.scope != scope {
        return Err(ApiError::unauthorized("Invalid scope for token"));
    }

    Ok(token_data.claims)
}

/// Default avatar: the Gravatar identicon for the address.
pub fn gravatar_url(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{}?d=identicon", hex::encode(digest))
}

fn email_taken(email: &str) -> ApiError {
    ApiError::conflict(format!("User with the email {} already exists", email))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@') && email.len() <= 254
        }
        None => false,
    }
}
