use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    auth::{jwt::JwtKeys, services::authenticate},
    error::ApiError,
    users::{repo_types::User, services::CredentialStore},
};

/// Verified caller. Taking this as a handler argument gates the route: the
/// token is checked and the user loaded before the handler body runs.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    CredentialStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let creds = CredentialStore::from_ref(state);
        let raw = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let user = authenticate(&keys, &creds, raw).await?;
        Ok(AuthUser(user))
    }
}
