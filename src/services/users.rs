use std::sync::Arc;

use crate::error::AppResult;
use crate::models::auth::AuthUser;
use crate::models::users::User;
use crate::repository::Repository;

/// Registers token identities on first use.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn Repository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn ensure_user(&self, auth: &AuthUser) -> AppResult<User> {
        if let Some(user) = self.repo.get_user_by_id(auth.user_id).await? {
            if user.username == auth.username {
                return Ok(user);
            }
        }
        let user = self.repo.upsert_user(auth.user_id, &auth.username).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }
}
