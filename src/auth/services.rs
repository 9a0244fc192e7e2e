use tracing::{debug, warn};

use crate::{
    auth::jwt::JwtKeys,
    error::ApiError,
    users::{repo_types::User, services::CredentialStore},
};

/// Token part of an `Authorization` value; the `Bearer ` scheme is optional.
pub(crate) fn bearer_token(raw: &str) -> Option<&str> {
    let raw = raw.trim_start();
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    // a lone scheme carries no credential
    if token.is_empty() || token.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// Resolve the caller behind an `Authorization` header value.
///
/// Every failure, including a token whose user has since been deleted,
/// comes back as `Unauthorized`.
pub async fn authenticate(
    keys: &JwtKeys,
    creds: &CredentialStore,
    raw_header: Option<&str>,
) -> Result<User, ApiError> {
    let token = raw_header
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::unauthorized("Missing token"))?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    match creds.get(user_id).await {
        Ok(user) => {
            debug!(user_id, "caller authenticated");
            Ok(user)
        }
        Err(ApiError::NotFound(_)) => {
            warn!(user_id, "token for deleted user");
            Err(ApiError::unauthorized("Invalid or expired token"))
        }
        Err(e) => Err(e),
    }
}
