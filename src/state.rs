use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::users::{
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
};
use std::sync::Arc;
use tracing::warn;

/// Postgres when a URL is given, otherwise the in-memory table. A database
/// that cannot be reached or migrated is a startup error.
pub async fn open_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn UserStore>> {
    match database_url {
        Some(url) => {
            let store = PgUserStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; users are kept in memory and lost on exit");
            Ok(Arc::new(MemoryUserStore::new()))
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    /// Built once from `config.jwt`.
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = open_store(config.database_url.as_deref()).await?;
        Ok(Self::from_parts(users, config))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let keys = JwtKeys::from(&config.jwt);
        Self {
            users,
            config,
            keys,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24,
            },
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRef;

    #[test]
    fn keys_are_built_from_config() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.issuer, state.config.jwt.issuer);
        assert_eq!(keys.audience, state.config.jwt.audience);
        assert_eq!(keys.ttl.as_secs(), 24 * 60 * 60);
    }

    #[tokio::test]
    async fn unreachable_database_fails_startup() {
        let res = open_store(Some("postgres://postgres@127.0.0.1:1/accounts")).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn no_database_url_uses_memory() {
        let store = open_store(None).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
