use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for login; `username` may hold either the username or the
/// email, and `email` is read when `username` is absent or blank.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn identifier(&self) -> Option<String> {
        [&self.username, &self.email]
            .into_iter()
            .flatten()
            .find(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(json: &str) -> LoginRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn identifier_prefers_username_then_email() {
        let both = login(r#"{"username":"bob","email":"bob@x.com","password":"pw"}"#);
        assert_eq!(both.identifier().as_deref(), Some("bob"));

        let blank_name = login(r#"{"username":" ","email":"bob@x.com"}"#);
        assert_eq!(blank_name.identifier().as_deref(), Some("bob@x.com"));

        assert_eq!(login(r#"{"password":"pw"}"#).identifier(), None);
    }
}
