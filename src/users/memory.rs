use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewUser, Profile, User};
use super::repo::{RepoError, UserRepository};

/// Map-backed repository for router and service tests.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn len(&self) -> usize {
        self.users.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        let users = self.users.lock().ok()?;
        users.values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.find(|u| u.id == id))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        Ok(self.find(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.find(|u| u.email == email))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.lock().expect("user map poisoned");
        if users.values().any(|u| u.username == new_user.username) {
            return Err(RepoError::DuplicateUsername);
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new_user.id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile: new_user.profile,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: Profile) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().expect("user map poisoned");
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        user.profile.merge(changes);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}
