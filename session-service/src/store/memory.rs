//! In-memory UserStore used by integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProfileUpdate, StoreError, UserStore};
use crate::models::{Status, User};

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user directly, bypassing the signup flow.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn remove(&self, id: Uuid) {
        self.users.write().await.remove(&id);
    }

    pub async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn update_with<F>(&self, id: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: Status) -> Result<(), StoreError> {
        self.update_with(id, |u| u.status = status.as_str().to_string())
            .await
    }

    async fn set_two_factor_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        let secret = secret.to_string();
        self.update_with(id, |u| {
            u.two_factor_secret = Some(secret);
            u.two_factor_enabled = false;
        })
        .await
    }

    async fn enable_two_factor(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if user.two_factor_secret.is_none() {
            return Err(StoreError::NotFound);
        }
        user.two_factor_enabled = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn disable_two_factor(&self, id: Uuid) -> Result<(), StoreError> {
        self.update_with(id, |u| {
            u.two_factor_enabled = false;
            u.two_factor_secret = None;
        })
        .await
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<(), StoreError> {
        self.update_with(id, |u| {
            if let Some(username) = update.username {
                u.username = Some(username);
            }
            if let Some(avatar) = update.avatar {
                u.avatar = Some(avatar);
            }
        })
        .await
    }

    async fn mark_profile_complete(&self, id: Uuid) -> Result<(), StoreError> {
        self.update_with(id, |u| u.profile_complete = true).await
    }
}
