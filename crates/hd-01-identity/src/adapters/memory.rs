//! In-memory user store.

use crate::domain::User;
use crate::error::{IdentityError, IdentityResult};
use crate::ports::UserStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Users keyed by id with a unique email index.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    by_email: HashMap<String, String>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a user's active flag. Returns `false` for an unknown id.
    pub fn set_active(&self, user_id: &str, active: bool) -> bool {
        let mut tables = self.inner.write();
        match tables.users.get_mut(user_id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = chrono::Utc::now();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> IdentityResult<Option<User>> {
        let tables = self.inner.read();
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn insert(&self, user: User) -> IdentityResult<User> {
        let mut tables = self.inner.write();
        if tables.by_email.contains_key(&user.email) {
            return Err(IdentityError::EmailInUse);
        }
        tables.by_email.insert(user.email.clone(), user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn list_active(&self) -> IdentityResult<Vec<User>> {
        let tables = self.inner.read();
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}
