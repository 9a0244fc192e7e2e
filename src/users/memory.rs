use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::repo::{StoreError, UniqueField, UserStore};
use crate::users::repo_types::{NewUser, User, UserChanges};

/// In-process user table. Uniqueness checks and writes share one lock, so
/// two racing registrations for the same name cannot both land.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, User>,
}

impl Table {
    fn conflict(&self, skip: Option<i64>, username: Option<&str>, email: Option<&str>) -> Option<UniqueField> {
        self.rows
            .values()
            .filter(|u| Some(u.id) != skip)
            .find_map(|u| {
                if username == Some(u.username.as_str()) {
                    Some(UniqueField::Username)
                } else if email == Some(u.email.as_str()) {
                    Some(UniqueField::Email)
                } else {
                    None
                }
            })
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, Table>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("user table lock poisoned")))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut table = self.table()?;
        if let Some(field) = table.conflict(None, Some(new.username.as_str()), Some(new.email.as_str())) {
            return Err(StoreError::Duplicate(field));
        }
        table.last_id += 1;
        let user = User {
            id: table.last_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.table()?.rows.get(&id).cloned())
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let table = self.table()?;
        let email = identifier.to_lowercase();
        let by_name = table.rows.values().find(|u| u.username == identifier);
        let found = by_name.or_else(|| table.rows.values().find(|u| u.email == email));
        Ok(found.cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.table()?.rows.values().cloned().collect())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, StoreError> {
        let mut table = self.table()?;
        if !table.rows.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) =
            table.conflict(Some(id), changes.username.as_deref(), changes.email.as_deref())
        {
            return Err(StoreError::Duplicate(field));
        }
        let user = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.table()?
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[tokio::test]
    async fn ids_increase_and_are_not_reused() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        let b = store.insert(new_user("b", "b@x.com")).await.unwrap();
        assert!(b.id > a.id);

        store.delete(b.id).await.unwrap();
        let c = store.insert(new_user("c", "c@x.com")).await.unwrap();
        assert!(c.id > b.id);
    }

    #[tokio::test]
    async fn insert_rejects_taken_username_and_email() {
        let store = MemoryUserStore::new();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        let err = store.insert(new_user("alice", "other@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)));

        let err = store.insert(new_user("other", "alice@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));
    }

    #[tokio::test]
    async fn update_ignores_own_values_but_not_others() {
        let store = MemoryUserStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.insert(new_user("bob", "bob@x.com")).await.unwrap();

        let same = UserChanges {
            username: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(store.update(alice.id, same).await.unwrap().username, "alice");

        let taken = UserChanges {
            email: Some("bob@x.com".into()),
            ..Default::default()
        };
        let err = store.update(alice.id, taken).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));
        assert_eq!(
            store.find_by_id(alice.id).await.unwrap().unwrap().email,
            "alice@x.com"
        );
    }

    #[tokio::test]
    async fn update_and_delete_unknown_id() {
        let store = MemoryUserStore::new();
        let err = store.update(42, UserChanges::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(matches!(store.delete(42).await.unwrap_err(), StoreError::NotFound));
    }

    #[tokio::test]
    async fn login_lookup_prefers_username() {
        let store = MemoryUserStore::new();
        let odd = store.insert(new_user("carol@x.com", "odd@x.com")).await.unwrap();
        store.insert(new_user("carol", "carol@x.com")).await.unwrap();

        let found = store.find_by_login("carol@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, odd.id);

        let by_email = store.find_by_login("CAROL@X.COM").await.unwrap().unwrap();
        assert_eq!(by_email.username, "carol");
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = MemoryUserStore::new();
        for name in ["z", "y", "x"] {
            store
                .insert(new_user(name, &format!("{name}@x.com")))
                .await
                .unwrap();
        }
        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
