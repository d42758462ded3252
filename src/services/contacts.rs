use anyhow::anyhow;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::auth::AuthUser;
use crate::models::contacts::Contact;
use crate::repository::Repository;

#[derive(Clone)]
pub struct ContactService {
    repo: Arc<dyn Repository>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Adds `username` as a contact of `user`, and `user` as theirs.
    pub async fn add_contact(&self, user: &AuthUser, username: &str) -> AppResult<Contact> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest(anyhow!("Username is required")));
        }
        if username == user.username {
            return Err(AppError::BadRequest(anyhow!("Cannot add yourself as a contact")));
        }

        let other = self
            .repo
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
        if self.repo.contact_exists(user.user_id, other.id).await? {
            return Err(AppError::InvalidState(anyhow!("Contact already exists")));
        }

        let contact = self.repo.add_contact(user.user_id, other.id).await?;
        tracing::info!(user_id = %user.user_id, contact = %other.username, "contact added");
        Ok(contact)
    }

    pub async fn list_contacts(&self, user_id: Uuid) -> AppResult<Vec<Contact>> {
        self.repo.contacts_for_user(user_id).await
    }

    pub async fn remove_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<()> {
        if !self.repo.remove_contact(user_id, contact_user_id).await? {
            return Err(AppError::NotFound(anyhow!("Contact not found")));
        }
        tracing::info!(%user_id, %contact_user_id, "contact removed");
        Ok(())
    }

    pub async fn search_contacts(&self, user_id: Uuid, query: &str) -> AppResult<Vec<Contact>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest(anyhow!("Search query is required")));
        }
        self.repo.search_contacts(user_id, query).await
    }
}
