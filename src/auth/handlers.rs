use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{MessageResponse, UserResponse},
        services::CredentialStore,
        validate,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip_all)]
pub async fn register(
    State(creds): State<CredentialStore>,
    State(keys): State<JwtKeys>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(payload) = body?;
    validate::require(&[
        ("username", &payload.username),
        ("email", &payload.email),
        ("password", &payload.password),
    ])?;

    let user = creds
        .create(
            payload.username.as_deref().unwrap_or_default(),
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    let token = keys.issue(&user)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(creds): State<CredentialStore>,
    State(keys): State<JwtKeys>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = body?;
    let identifier = payload.identifier();
    validate::require(&[("username", &identifier), ("password", &payload.password)])?;

    let user = creds
        .verify(
            identifier.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    let token = keys.issue(&user)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Tokens are stateless; logging out only confirms the token was good and
/// leaves discarding it to the client.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn logout(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    info!("user logged out");
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse { user: user.into() })
}
