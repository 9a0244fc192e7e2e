use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::Claims, config::JwtConfig, state::AppState, users::repo_types::User,
};

/// HS256 signing and verification keys plus the claims they stamp.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.max(1) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn claims_for(&self, user: &User, now: OffsetDateTime) -> Claims {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    /// Self-contained token for `user`, valid for the configured ttl.
    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let claims = self.claims_for(user, OffsetDateTime::now_utc());
        let token = self.sign(&claims)?;
        debug!(user_id = user.id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        // no grace period past `exp`
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24,
        })
    }

    fn user() -> User {
        User {
            id: 42,
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$x".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn issue_and_verify() {
        let keys = keys("dev-secret", "iss", "aud");
        let token = keys.issue(&user()).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "iss");
        assert_eq!(claims.aud, "aud");
    }

    #[test]
    fn token_lives_one_day_by_default() {
        let keys = keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc();
        let claims = keys.claims_for(&user(), now);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys("dev-secret", "iss", "aud");
        let claims = keys.claims_for(&user(), OffsetDateTime::now_utc() - TimeDuration::days(2));
        let token = keys.sign(&claims).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn no_grace_period_after_expiry() {
        let keys = keys("dev-secret", "iss", "aud");
        let mut claims = keys.claims_for(&user(), OffsetDateTime::now_utc());
        claims.exp = (OffsetDateTime::now_utc().unix_timestamp() - 5) as usize;
        let token = keys.sign(&claims).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = keys("secret-a", "iss", "aud").issue(&user()).unwrap();
        assert!(keys("secret-b", "iss", "aud").verify(&token).is_err());
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let token = keys("same", "good-iss", "good-aud").issue(&user()).unwrap();
        assert!(keys("same", "bad-iss", "good-aud").verify(&token).is_err());
        assert!(keys("same", "good-iss", "bad-aud").verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(keys("s", "i", "a").verify("not.a.jwt").is_err());
        assert!(keys("s", "i", "a").verify("").is_err());
    }
}
