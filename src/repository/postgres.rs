use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use uuid::Uuid;

use super::Repository;
use crate::error::AppResult;
use crate::models::calls::{
    Call, CallHistory, CallStatus, HistoryUpdate, Invitation, InvitationStatus, NewCall,
    NewCallHistory, NewInvitation,
};
use crate::models::scheduled::{
    NewScheduledCall, RsvpStatus, ScheduledCall, ScheduledCallInvitation, ScheduledCallStatus,
    ScheduledCallUpdate,
};
use crate::models::contacts::Contact;
use crate::models::users::User;
use crate::queries::{self, db_error};

/// Postgres-backed repository; each operation checks out its own connection.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> AppResult<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(db_error("acquire"))
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        queries::users::insert_user(&mut *self.conn().await?, username).await
    }

    async fn upsert_user(&self, user_id: Uuid, username: &str) -> AppResult<User> {
        queries::users::upsert_user(&mut *self.conn().await?, user_id, username).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        queries::users::find_user_by_id(&mut *self.conn().await?, user_id).await
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        queries::users::find_user_by_username(&mut *self.conn().await?, username).await
    }

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        queries::users::user_exists(&mut *self.conn().await?, user_id).await
    }

    async fn add_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<Contact> {
        queries::contacts::insert_contact_pair(&mut *self.conn().await?, user_id, contact_user_id)
            .await
    }

    async fn contacts_for_user(&self, user_id: Uuid) -> AppResult<Vec<Contact>> {
        queries::contacts::find_contacts_for_user(&mut *self.conn().await?, user_id).await
    }

    async fn remove_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool> {
        queries::contacts::delete_contact_pair(&mut *self.conn().await?, user_id, contact_user_id)
            .await
    }

    async fn contact_exists(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool> {
        queries::contacts::contact_exists(&mut *self.conn().await?, user_id, contact_user_id).await
    }

    async fn search_contacts(&self, user_id: Uuid, query: &str) -> AppResult<Vec<Contact>> {
        queries::contacts::search_contacts(&mut *self.conn().await?, user_id, query).await
    }

    async fn create_call(&self, call: NewCall) -> AppResult<Call> {
        queries::calls::insert_call(&mut *self.conn().await?, &call).await
    }

    async fn get_call(&self, call_id: Uuid) -> AppResult<Option<Call>> {
        queries::calls::find_call_by_id(&mut *self.conn().await?, call_id).await
    }

    async fn get_call_by_room(&self, room_name: &str) -> AppResult<Option<Call>> {
        queries::calls::find_call_by_room(&mut *self.conn().await?, room_name).await
    }

    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        queries::calls::update_call_status(&mut *self.conn().await?, call_id, from, to, ended_at)
            .await
    }

    async fn list_active_calls(&self) -> AppResult<Vec<Call>> {
        queries::calls::get_active_calls(&mut *self.conn().await?).await
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation> {
        queries::invitations::insert_invitation(&mut *self.conn().await?, &invitation).await
    }

    async fn get_invitation(&self, invitation_id: i64) -> AppResult<Option<Invitation>> {
        queries::invitations::find_invitation_by_id(&mut *self.conn().await?, invitation_id).await
    }

    async fn pending_invitations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Invitation>> {
        queries::invitations::get_pending_invitations_for_user(&mut *self.conn().await?, user_id)
            .await
    }

    async fn invitations_for_call(&self, call_id: Uuid) -> AppResult<Vec<Invitation>> {
        queries::invitations::get_invitations_for_call(&mut *self.conn().await?, call_id).await
    }

    async fn transition_invitation(
        &self,
        invitation_id: i64,
        from: InvitationStatus,
        to: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        queries::invitations::update_invitation_status(
            &mut *self.conn().await?,
            invitation_id,
            from,
            to,
            responded_at,
        )
        .await
    }

    async fn create_history(&self, history: NewCallHistory) -> AppResult<CallHistory> {
        queries::history::insert_history(&mut *self.conn().await?, &history).await
    }

    async fn update_history(&self, call_id: Uuid, update: HistoryUpdate) -> AppResult<()> {
        queries::history::update_history(&mut *self.conn().await?, call_id, &update).await
    }

    async fn get_history(&self, call_id: Uuid) -> AppResult<Option<CallHistory>> {
        queries::history::find_history_by_call_id(&mut *self.conn().await?, call_id).await
    }

    async fn history_for_user(
        &self,
        user_id: Uuid,
        username: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallHistory>> {
        queries::history::get_history_for_user(
            &mut *self.conn().await?,
            user_id,
            username,
            limit,
            offset,
        )
        .await
    }

    async fn history_for_user_between(
        &self,
        user_id: Uuid,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CallHistory>> {
        queries::history::get_history_for_user_between(
            &mut *self.conn().await?,
            user_id,
            username,
            start,
            end,
        )
        .await
    }

    async fn delete_history(&self, call_id: Uuid) -> AppResult<bool> {
        queries::history::delete_history(&mut *self.conn().await?, call_id).await
    }

    async fn create_scheduled_call(&self, call: NewScheduledCall) -> AppResult<ScheduledCall> {
        queries::scheduled::insert_scheduled_call(&mut *self.conn().await?, &call).await
    }

    async fn get_scheduled_call(&self, id: i64) -> AppResult<Option<ScheduledCall>> {
        queries::scheduled::find_scheduled_call_by_id(&mut *self.conn().await?, id).await
    }

    async fn scheduled_calls_by_creator(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>> {
        queries::scheduled::get_scheduled_calls_by_creator(&mut *self.conn().await?, user_id, status)
            .await
    }

    async fn scheduled_calls_by_invitee(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>> {
        queries::scheduled::get_scheduled_calls_by_invitee(&mut *self.conn().await?, user_id, status)
            .await
    }

    async fn upcoming_scheduled_calls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ScheduledCall>> {
        queries::scheduled::get_upcoming_scheduled_calls(&mut *self.conn().await?, now, limit).await
    }

    async fn transition_scheduled_call(
        &self,
        id: i64,
        from: ScheduledCallStatus,
        to: ScheduledCallStatus,
    ) -> AppResult<bool> {
        queries::scheduled::update_scheduled_call_status(&mut *self.conn().await?, id, from, to)
            .await
    }

    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<()> {
        queries::scheduled::update_reminder_sent(&mut *self.conn().await?, id, at).await
    }

    async fn update_scheduled_call(
        &self,
        id: i64,
        update: &ScheduledCallUpdate,
    ) -> AppResult<bool> {
        queries::scheduled::update_scheduled_call_details(&mut *self.conn().await?, id, update)
            .await
    }

    async fn delete_scheduled_call(&self, id: i64) -> AppResult<bool> {
        queries::scheduled::delete_scheduled_call(&mut *self.conn().await?, id).await
    }

    async fn create_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
    ) -> AppResult<ScheduledCallInvitation> {
        queries::scheduled::insert_scheduled_invitation(
            &mut *self.conn().await?,
            scheduled_call_id,
            invitee_id,
        )
        .await
    }

    async fn scheduled_invitations(
        &self,
        scheduled_call_id: i64,
    ) -> AppResult<Vec<ScheduledCallInvitation>> {
        queries::scheduled::get_scheduled_invitations(&mut *self.conn().await?, scheduled_call_id)
            .await
    }

    async fn transition_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
        from: RsvpStatus,
        to: RsvpStatus,
    ) -> AppResult<bool> {
        queries::scheduled::update_scheduled_invitation_status(
            &mut *self.conn().await?,
            scheduled_call_id,
            invitee_id,
            from,
            to,
        )
        .await
    }

    async fn mark_scheduled_invitation_reminder_sent(
        &self,
        invitation_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        queries::scheduled::update_scheduled_invitation_reminder_sent(
            &mut *self.conn().await?,
            invitation_id,
            at,
        )
        .await
    }
}
