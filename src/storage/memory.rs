use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::error::{StoreError, StoreResult};
use super::UserRepository;
use crate::users::repo_types::User;

/// Process-local store, insertion ordered. Nothing survives a restart.
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    actor: String,
}

impl MemoryUserStore {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            actor: actor.into(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<User>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn get_all(&self) -> StoreResult<Vec<User>> {
        Ok(self.read().clone())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<User> {
        self.read()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn create(&self, mut user: User) -> StoreResult<()> {
        user.metadata.created_by = self.actor.clone();
        user.metadata.updated_by = self.actor.clone();
        self.write().push(user);
        Ok(())
    }

    async fn update(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        let mut users = self.write();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::not_found(id))?;
        user.name = name.to_string();
        user.email = email.to_string();
        user.metadata.updated_at = OffsetDateTime::now_utc();
        user.metadata.updated_by = self.actor.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut users = self.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(StoreError::not_found(id));
        }
        Ok(())
    }
}
