use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    state::AppState,
    users::{
        dto::{CreateUserRequest, MessageResponse, UpdateUserRequest, UserResponse, UsersResponse},
        services::{CredentialStore, UserUpdate},
        validate,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip_all, fields(caller_id = caller.id))]
pub async fn list_users(
    State(creds): State<CredentialStore>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = creds.list().await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(creds, caller, body), fields(caller_id = caller.id))]
pub async fn create_user(
    State(creds): State<CredentialStore>,
    AuthUser(caller): AuthUser,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
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
    Ok((StatusCode::CREATED, Json(UserResponse { user: user.into() })))
}

#[instrument(skip(creds, caller, path), fields(caller_id = caller.id))]
pub async fn get_user(
    State(creds): State<CredentialStore>,
    AuthUser(caller): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Path(id) = path?;
    let user = creds.get(id).await?;
    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip(creds, caller, path, body), fields(caller_id = caller.id))]
pub async fn update_user(
    State(creds): State<CredentialStore>,
    AuthUser(caller): AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Path(id) = path?;
    let Json(payload) = body?;
    let user = creds
        .update(
            id,
            UserUpdate {
                username: payload.username,
                email: payload.email,
                password: payload.password,
            },
        )
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip(creds, caller, path), fields(caller_id = caller.id))]
pub async fn delete_user(
    State(creds): State<CredentialStore>,
    AuthUser(caller): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path?;
    creds.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}
