//! User records and their process-lifetime store.
//!
//! Ids are allocated from an atomic counter while the write lock is held, so
//! concurrent creates never share or skip an id.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User(id={}, name='{}', email='{}')",
            self.id, self.name, self.email
        )
    }
}

/// Fields supplied when creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UserError {
    #[error("User not found")]
    NotFound { id: u64 },
}

/// Owned user storage, injected into handlers.
#[derive(Debug)]
pub struct UserStore {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new user under the next sequential id.
    pub async fn create(&self, new: NewUser) -> User {
        let mut users = self.users.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            name: new.name,
            email: new.email,
            address: new.address,
        };
        users.insert(id, user.clone());
        user
    }

    pub async fn get(&self, id: u64) -> Result<User, UserError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(UserError::NotFound { id })
    }

    /// Replace a user's address in place.
    pub async fn update_address(&self, id: u64, address: String) -> Result<User, UserError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(UserError::NotFound { id })?;
        user.address = Some(address);
        Ok(user.clone())
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            address: None,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_from_one() {
        let store = UserStore::new();
        for expected in 1..=5 {
            let user = store.create(new_user(&format!("u{expected}"))).await;
            assert_eq!(user.id, expected);
        }
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn get_returns_stored_fields() {
        let store = UserStore::new();
        let created = store
            .create(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                address: Some("12 Analytical St".into()),
            })
            .await;
        assert_eq!(store.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = UserStore::new();
        assert_eq!(store.get(7).await, Err(UserError::NotFound { id: 7 }));
    }

    #[tokio::test]
    async fn update_address_then_read_back() {
        let store = UserStore::new();
        let user = store.create(new_user("grace")).await;
        let updated = store
            .update_address(user.id, "1 Navy Way".into())
            .await
            .unwrap();
        assert_eq!(updated.address.as_deref(), Some("1 Navy Way"));
        assert_eq!(store.get(user.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_unknown_leaves_store_unchanged() {
        let store = UserStore::new();
        let user = store.create(new_user("linus")).await;
        assert!(store.update_address(99, "nowhere".into()).await.is_err());
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(user.id).await.unwrap(), user);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_duplicate_ids() {
        let store = Arc::new(UserStore::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create(new_user(&format!("u{i}"))).await.id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=64).collect::<Vec<u64>>());
    }

    #[test]
    fn display_matches_short_form() {
        let user = User {
            id: 3,
            name: "Ken".into(),
            email: "ken@example.com".into(),
            address: None,
        };
        assert_eq!(user.to_string(), "User(id=3, name='Ken', email='ken@example.com')");
    }
}
