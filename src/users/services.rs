use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tracing::{debug, info, warn};

use crate::{
    auth::password,
    error::ApiError,
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{NewUser, User, UserChanges},
        validate,
    },
};

/// Field-level edit as submitted by a client; the password is still plaintext.
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Owns user records: hashing, uniqueness and credential checks sit here,
/// on top of whichever [`UserStore`] the process was started with.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl FromRef<AppState> for CredentialStore {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone())
    }
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn create(&self, username: &str, email: &str, plain: &str) -> Result<User, ApiError> {
        let username = validate::username(username)?;
        let email = validate::email(email)?;
        validate::password(plain)?;

        let password_hash = password::hash_password(plain)?;
        let user = self
            .users
            .insert(NewUser {
                username,
                email,
                password_hash,
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "create user rejected");
                ApiError::from(e)
            })?;
        info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Unknown identifier and wrong password fail the same way.
    pub async fn verify(&self, identifier: &str, plain: &str) -> Result<User, ApiError> {
        let identifier = identifier.trim();
        let Some(user) = self.users.find_by_login(identifier).await? else {
            password::verify_against_decoy(plain);
            warn!("login for unknown identifier");
            return Err(ApiError::InvalidCredentials);
        };

        let ok = password::verify_password(plain, &user.password_hash)
            .with_context(|| format!("stored hash for user {}", user.id))?;
        if !ok {
            warn!(user_id = user.id, "login invalid password");
            return Err(ApiError::InvalidCredentials);
        }
        debug!(user_id = user.id, "credentials verified");
        Ok(user)
    }

    pub async fn update(&self, id: i64, update: UserUpdate) -> Result<User, ApiError> {
        let mut changes = UserChanges::default();
        if let Some(name) = update.username.as_deref() {
            changes.username = Some(validate::username(name)?);
        }
        if let Some(email) = update.email.as_deref() {
            changes.email = Some(validate::email(email)?);
        }
        if let Some(plain) = update.password.as_deref() {
            validate::password(plain)?;
            changes.password_hash = Some(password::hash_password(plain)?);
        }

        if changes.is_empty() {
            return self.get(id).await;
        }

        let password_changed = changes.password_hash.is_some();
        let user = self.users.update(id, changes).await?;
        info!(user_id = user.id, password_changed, "user updated");
        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.users.delete(id).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<User, ApiError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    }

    pub async fn list(&self) -> Result<Vec<User>, ApiError> {
        Ok(self.users.list().await?)
    }
}
