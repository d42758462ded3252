use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::auth::AuthUser;
use crate::models::calls::CallHistory;
use crate::repository::Repository;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct HistoryService {
    repo: Arc<dyn Repository>,
}

impl HistoryService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    fn can_view(user: &AuthUser, history: &CallHistory) -> bool {
        history.created_by == user.user_id || history.participants.0.contains(&user.username)
    }

    pub async fn call_history(
        &self,
        user: &AuthUser,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<CallHistory>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        self.repo
            .history_for_user(user.user_id, &user.username, limit, offset)
            .await
    }

    pub async fn call_history_between(
        &self,
        user: &AuthUser,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CallHistory>> {
        if start > end {
            return Err(AppError::BadRequest(anyhow!(
                "Start date must not be after end date"
            )));
        }
        self.repo
            .history_for_user_between(user.user_id, &user.username, start, end)
            .await
    }

    pub async fn call_details(&self, user: &AuthUser, call_id: Uuid) -> AppResult<CallHistory> {
        let history = self
            .repo
            .get_history(call_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Call history not found")))?;
        if !Self::can_view(user, &history) {
            return Err(AppError::Forbidden(anyhow!(
                "Not a participant of this call"
            )));
        }
        Ok(history)
    }

    /// Creator-only.
    pub async fn delete_call_history(&self, user: &AuthUser, call_id: Uuid) -> AppResult<()> {
        let history = self
            .repo
            .get_history(call_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Call history not found")))?;
        if history.created_by != user.user_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the creator can delete call history"
            )));
        }
        self.repo.delete_history(call_id).await?;
        tracing::info!(%call_id, user_id = %user.user_id, "call history deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calls::CallType;
    use crate::models::users::User;
    use crate::services::testing::Harness;

    fn auth(user: &User) -> AuthUser {
        AuthUser {
            user_id: user.id,
            username: user.username.clone(),
        }
    }

    #[tokio::test]
    async fn participants_can_read_but_only_creator_deletes() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let carol = h.user("carol").await;
        let history = HistoryService::new(h.repo.clone());
        let call = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &["bob".to_string()], None)
            .await
            .unwrap();

        assert_eq!(history.call_history(&auth(&bob), None, None).await.unwrap().len(), 1);
        assert!(history.call_history(&auth(&carol), None, None).await.unwrap().is_empty());
        assert!(history.call_details(&auth(&bob), call.call_id).await.is_ok());
        assert!(matches!(
            history.call_details(&auth(&carol), call.call_id).await,
            Err(AppError::Forbidden(_))
        ));

        assert!(matches!(
            history.delete_call_history(&auth(&bob), call.call_id).await,
            Err(AppError::Forbidden(_))
        ));
        history
            .delete_call_history(&auth(&alice), call.call_id)
            .await
            .unwrap();
        assert!(matches!(
            history.call_details(&auth(&alice), call.call_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn date_range_filters_and_validates() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let history = HistoryService::new(h.repo.clone());
        h.calls
            .create_call_and_invite(alice.id, CallType::Voice, &[], None)
            .await
            .unwrap();

        let now = Utc::now();
        let hour = chrono::Duration::hours(1);
        assert_eq!(
            history
                .call_history_between(&auth(&alice), now - hour, now + hour)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(history
            .call_history_between(&auth(&alice), now + hour, now + hour * 2)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            history
                .call_history_between(&auth(&alice), now + hour, now)
                .await,
            Err(AppError::BadRequest(_))
        ));
    }
}
