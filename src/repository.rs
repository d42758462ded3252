//! Durable storage for users, contacts, calls, invitations, history and
//! scheduled calls.
//!
//! Services only see the [`Repository`] trait. `PgRepository` is the production
//! implementation; `MemoryRepository` backs the tests and local runs.
//!
//! Every `transition_*` method is a compare-and-swap on status: it moves the
//! record only if its current status equals `from`, and reports whether it did.

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

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

#[async_trait]
pub trait Repository: Send + Sync {
    // users
    async fn create_user(&self, username: &str) -> AppResult<User>;
    /// Registers an externally issued identity. A username held by another id is `InvalidState`.
    async fn upsert_user(&self, user_id: Uuid, username: &str) -> AppResult<User>;
    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool>;

    // contacts, stored in both directions
    async fn add_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<Contact>;
    async fn contacts_for_user(&self, user_id: Uuid) -> AppResult<Vec<Contact>>;
    async fn remove_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool>;
    async fn contact_exists(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool>;
    /// Case-insensitive substring match on the contact's username.
    async fn search_contacts(&self, user_id: Uuid, query: &str) -> AppResult<Vec<Contact>>;

    // calls
    async fn create_call(&self, call: NewCall) -> AppResult<Call>;
    async fn get_call(&self, call_id: Uuid) -> AppResult<Option<Call>>;
    async fn get_call_by_room(&self, room_name: &str) -> AppResult<Option<Call>>;
    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool>;
    async fn list_active_calls(&self) -> AppResult<Vec<Call>>;

    // invitations
    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation>;
    async fn get_invitation(&self, invitation_id: i64) -> AppResult<Option<Invitation>>;
    async fn pending_invitations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Invitation>>;
    async fn invitations_for_call(&self, call_id: Uuid) -> AppResult<Vec<Invitation>>;
    async fn transition_invitation(
        &self,
        invitation_id: i64,
        from: InvitationStatus,
        to: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    // call history
    async fn create_history(&self, history: NewCallHistory) -> AppResult<CallHistory>;
    async fn update_history(&self, call_id: Uuid, update: HistoryUpdate) -> AppResult<()>;
    async fn get_history(&self, call_id: Uuid) -> AppResult<Option<CallHistory>>;
    /// Records the user created or took part in, newest first.
    async fn history_for_user(
        &self,
        user_id: Uuid,
        username: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallHistory>>;
    async fn history_for_user_between(
        &self,
        user_id: Uuid,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CallHistory>>;
    async fn delete_history(&self, call_id: Uuid) -> AppResult<bool>;

    // scheduled calls
    async fn create_scheduled_call(&self, call: NewScheduledCall) -> AppResult<ScheduledCall>;
    async fn get_scheduled_call(&self, id: i64) -> AppResult<Option<ScheduledCall>>;
    async fn scheduled_calls_by_creator(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>>;
    async fn scheduled_calls_by_invitee(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>>;
    /// Calls still `scheduled` with `scheduled_at >= now`, soonest first.
    async fn upcoming_scheduled_calls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ScheduledCall>>;
    async fn transition_scheduled_call(
        &self,
        id: i64,
        from: ScheduledCallStatus,
        to: ScheduledCallStatus,
    ) -> AppResult<bool>;
    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<()>;
    /// Applies the present fields; returns `false` if the call is no longer `scheduled`.
    async fn update_scheduled_call(&self, id: i64, update: &ScheduledCallUpdate)
        -> AppResult<bool>;
    async fn delete_scheduled_call(&self, id: i64) -> AppResult<bool>;

    // scheduled call invitations
    async fn create_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
    ) -> AppResult<ScheduledCallInvitation>;
    async fn scheduled_invitations(
        &self,
        scheduled_call_id: i64,
    ) -> AppResult<Vec<ScheduledCallInvitation>>;
    async fn transition_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
        from: RsvpStatus,
        to: RsvpStatus,
    ) -> AppResult<bool>;
    async fn mark_scheduled_invitation_reminder_sent(
        &self,
        invitation_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
}
