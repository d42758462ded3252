//! In-process repository used by tests and `DATABASE_URL=memory` runs.
//!
//! All tables live behind one lock so each operation is atomic, which gives
//! the same compare-and-swap guarantees as the Postgres `UPDATE ... WHERE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::error::{AppError, AppResult};
use crate::models::calls::{
    Call, CallHistory, CallStatus, HistoryStatus, HistoryUpdate, Invitation, InvitationStatus,
    NewCall, NewCallHistory, NewInvitation,
};
use crate::models::scheduled::{
    NewScheduledCall, RsvpStatus, ScheduledCall, ScheduledCallInvitation, ScheduledCallStatus,
    ScheduledCallUpdate,
};
use crate::models::contacts::Contact;
use crate::models::users::User;

#[derive(Debug, Clone)]
struct InvitationRow {
    id: i64,
    call_id: Uuid,
    inviter_id: Uuid,
    invitee_id: Uuid,
    status: InvitationStatus,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct ContactRow {
    id: i64,
    user_id: Uuid,
    contact_user_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    contacts: BTreeMap<i64, ContactRow>,
    calls: HashMap<Uuid, Call>,
    invitations: BTreeMap<i64, InvitationRow>,
    history: BTreeMap<i64, CallHistory>,
    scheduled: BTreeMap<i64, ScheduledCall>,
    scheduled_invitations: BTreeMap<i64, ScheduledCallInvitation>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, user_id: Uuid) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn join_invitation(&self, row: &InvitationRow) -> Option<Invitation> {
        let call = self.calls.get(&row.call_id)?;
        Some(Invitation {
            id: row.id,
            call_id: row.call_id,
            inviter_id: row.inviter_id,
            inviter_name: self.username(row.inviter_id),
            invitee_id: row.invitee_id,
            invitee_name: self.username(row.invitee_id),
            call_type: call.call_type,
            room_name: call.room_name.clone(),
            status: row.status,
            created_at: row.created_at,
            responded_at: row.responded_at,
        })
    }

    fn has_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> bool {
        self.contacts
            .values()
            .any(|c| c.user_id == user_id && c.contact_user_id == contact_user_id)
    }

    /// `user_id`'s contacts, newest first.
    fn contacts_of(&self, user_id: Uuid) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = self
            .contacts
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| Contact {
                id: c.id,
                user_id: c.user_id,
                contact_user_id: c.contact_user_id,
                username: self.username(c.contact_user_id),
                created_at: c.created_at,
            })
            .collect();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        contacts
    }

    fn history_visible_to(history: &CallHistory, user_id: Uuid, username: &str) -> bool {
        history.created_by == user_id || history.participants.0.iter().any(|p| p == username)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_history_desc(mut records: Vec<CallHistory>) -> Vec<CallHistory> {
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
    records
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Username already exists"
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn upsert_user(&self, user_id: Uuid, username: &str) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == username && u.id != user_id)
        {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Username already taken"
            )));
        }
        let user = tables.users.entry(user_id).or_insert_with(|| User {
            id: user_id,
            username: username.to_string(),
            created_at: Utc::now(),
        });
        user.username = username.to_string();
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.tables.read().await.users.contains_key(&user_id))
    }

    async fn add_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<Contact> {
        let mut tables = self.tables.write().await;
        if user_id == contact_user_id {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot add yourself as a contact"
            )));
        }
        if !tables.users.contains_key(&user_id) || !tables.users.contains_key(&contact_user_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
        }
        let now = Utc::now();
        for (owner, other) in [(user_id, contact_user_id), (contact_user_id, user_id)] {
            if !tables.has_contact(owner, other) {
                let id = tables.next_id();
                tables.contacts.insert(
                    id,
                    ContactRow {
                        id,
                        user_id: owner,
                        contact_user_id: other,
                        created_at: now,
                    },
                );
            }
        }
        tables
            .contacts_of(user_id)
            .into_iter()
            .find(|c| c.contact_user_id == contact_user_id)
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("contact not stored")))
    }

    async fn contacts_for_user(&self, user_id: Uuid) -> AppResult<Vec<Contact>> {
        Ok(self.tables.read().await.contacts_of(user_id))
    }

    async fn remove_contact(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.contacts.len();
        tables.contacts.retain(|_, c| {
            !((c.user_id == user_id && c.contact_user_id == contact_user_id)
                || (c.user_id == contact_user_id && c.contact_user_id == user_id))
        });
        Ok(tables.contacts.len() < before)
    }

    async fn contact_exists(&self, user_id: Uuid, contact_user_id: Uuid) -> AppResult<bool> {
        Ok(self.tables.read().await.has_contact(user_id, contact_user_id))
    }

    async fn search_contacts(&self, user_id: Uuid, query: &str) -> AppResult<Vec<Contact>> {
        let needle = query.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .contacts_of(user_id)
            .into_iter()
            .filter(|c| c.username.to_lowercase().contains(&needle))
            .collect())
    }

    async fn create_call(&self, call: NewCall) -> AppResult<Call> {
        let mut tables = self.tables.write().await;
        if tables.calls.values().any(|c| c.room_name == call.room_name) {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Room {} already has a call",
                call.room_name
            )));
        }
        let call = Call {
            call_id: call.call_id,
            room_name: call.room_name,
            call_type: call.call_type,
            created_by: call.created_by,
            status: CallStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
        };
        tables.calls.insert(call.call_id, call.clone());
        Ok(call)
    }

    async fn get_call(&self, call_id: Uuid) -> AppResult<Option<Call>> {
        Ok(self.tables.read().await.calls.get(&call_id).cloned())
    }

    async fn get_call_by_room(&self, room_name: &str) -> AppResult<Option<Call>> {
        Ok(self
            .tables
            .read()
            .await
            .calls
            .values()
            .find(|c| c.room_name == room_name)
            .cloned())
    }

    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.calls.get_mut(&call_id) {
            Some(call) if call.status == from => {
                call.status = to;
                if ended_at.is_some() {
                    call.ended_at = ended_at;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active_calls(&self) -> AppResult<Vec<Call>> {
        let tables = self.tables.read().await;
        let mut calls: Vec<Call> = tables
            .calls
            .values()
            .filter(|c| c.status == CallStatus::Active)
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(calls)
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation> {
        let mut tables = self.tables.write().await;
        if tables
            .invitations
            .values()
            .any(|i| i.call_id == invitation.call_id && i.invitee_id == invitation.invitee_id)
        {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "User already invited to this call"
            )));
        }
        let id = tables.next_id();
        let row = InvitationRow {
            id,
            call_id: invitation.call_id,
            inviter_id: invitation.inviter_id,
            invitee_id: invitation.invitee_id,
            status: InvitationStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        tables.invitations.insert(id, row.clone());
        tables
            .join_invitation(&row)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Call not found")))
    }

    async fn get_invitation(&self, invitation_id: i64) -> AppResult<Option<Invitation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .invitations
            .get(&invitation_id)
            .and_then(|row| tables.join_invitation(row)))
    }

    async fn pending_invitations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Invitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<Invitation> = tables
            .invitations
            .values()
            .filter(|i| i.invitee_id == user_id && i.status == InvitationStatus::Pending)
            .filter_map(|row| tables.join_invitation(row))
            .collect();
        invitations.reverse();
        Ok(invitations)
    }

    async fn invitations_for_call(&self, call_id: Uuid) -> AppResult<Vec<Invitation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .invitations
            .values()
            .filter(|i| i.call_id == call_id)
            .filter_map(|row| tables.join_invitation(row))
            .collect())
    }

    async fn transition_invitation(
        &self,
        invitation_id: i64,
        from: InvitationStatus,
        to: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invitations.get_mut(&invitation_id) {
            Some(row) if row.status == from => {
                row.status = to;
                row.responded_at = Some(responded_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_history(&self, history: NewCallHistory) -> AppResult<CallHistory> {
        let mut tables = self.tables.write().await;
        if tables.history.values().any(|h| h.call_id == history.call_id) {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "History already exists for call"
            )));
        }
        let id = tables.next_id();
        let record = CallHistory {
            id,
            call_id: history.call_id,
            room_name: history.room_name,
            call_type: history.call_type,
            created_by: history.created_by,
            participants: Json(history.participants),
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: 0,
            status: HistoryStatus::Pending,
        };
        tables.history.insert(id, record.clone());
        Ok(record)
    }

    async fn update_history(&self, call_id: Uuid, update: HistoryUpdate) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let record = tables
            .history
            .values_mut()
            .find(|h| h.call_id == call_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Call history not found")))?;
        if update.ended_at.is_some() {
            record.ended_at = update.ended_at;
        }
        record.duration_seconds = update.duration_seconds;
        record.status = update.status;
        Ok(())
    }

    async fn get_history(&self, call_id: Uuid) -> AppResult<Option<CallHistory>> {
        Ok(self
            .tables
            .read()
            .await
            .history
            .values()
            .find(|h| h.call_id == call_id)
            .cloned())
    }

    async fn history_for_user(
        &self,
        user_id: Uuid,
        username: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallHistory>> {
        let tables = self.tables.read().await;
        let records = tables
            .history
            .values()
            .filter(|h| Tables::history_visible_to(h, user_id, username))
            .cloned()
            .collect();
        Ok(sorted_history_desc(records)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn history_for_user_between(
        &self,
        user_id: Uuid,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CallHistory>> {
        let tables = self.tables.read().await;
        let records = tables
            .history
            .values()
            .filter(|h| Tables::history_visible_to(h, user_id, username))
            .filter(|h| h.started_at >= start && h.started_at <= end)
            .cloned()
            .collect();
        Ok(sorted_history_desc(records))
    }

    async fn delete_history(&self, call_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let id = tables
            .history
            .values()
            .find(|h| h.call_id == call_id)
            .map(|h| h.id);
        Ok(id.and_then(|id| tables.history.remove(&id)).is_some())
    }

    async fn create_scheduled_call(&self, call: NewScheduledCall) -> AppResult<ScheduledCall> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let record = ScheduledCall {
            id,
            call_id: call.call_id,
            room_name: call.room_name,
            call_type: call.call_type,
            created_by: call.created_by,
            scheduled_at: call.scheduled_at,
            timezone: call.timezone,
            recurrence: Json(call.recurrence),
            title: call.title,
            description: call.description,
            join_link: call.join_link,
            status: ScheduledCallStatus::Scheduled,
            reminder_sent_at: None,
            max_participants: call.max_participants,
            max_duration_seconds: call.max_duration_seconds,
            created_at: now,
            updated_at: now,
            invitees: Vec::new(),
        };
        tables.scheduled.insert(id, record.clone());
        Ok(record)
    }

    async fn get_scheduled_call(&self, id: i64) -> AppResult<Option<ScheduledCall>> {
        Ok(self.tables.read().await.scheduled.get(&id).cloned())
    }

    async fn scheduled_calls_by_creator(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>> {
        let tables = self.tables.read().await;
        let mut calls: Vec<ScheduledCall> = tables
            .scheduled
            .values()
            .filter(|c| c.created_by == user_id)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.scheduled_at);
        Ok(calls)
    }

    async fn scheduled_calls_by_invitee(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>> {
        let tables = self.tables.read().await;
        let mut calls: Vec<ScheduledCall> = tables
            .scheduled_invitations
            .values()
            .filter(|i| i.invitee_id == user_id)
            .filter_map(|i| tables.scheduled.get(&i.scheduled_call_id))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.scheduled_at);
        Ok(calls)
    }

    async fn upcoming_scheduled_calls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ScheduledCall>> {
        let tables = self.tables.read().await;
        let mut calls: Vec<ScheduledCall> = tables
            .scheduled
            .values()
            .filter(|c| c.status == ScheduledCallStatus::Scheduled && c.scheduled_at >= now)
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.scheduled_at);
        calls.truncate(limit.max(0) as usize);
        Ok(calls)
    }

    async fn transition_scheduled_call(
        &self,
        id: i64,
        from: ScheduledCallStatus,
        to: ScheduledCallStatus,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.scheduled.get_mut(&id) {
            Some(call) if call.status == from => {
                call.status = to;
                call.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let call = tables
            .scheduled
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Scheduled call not found")))?;
        call.reminder_sent_at = Some(at);
        call.updated_at = Utc::now();
        Ok(())
    }

    async fn update_scheduled_call(
        &self,
        id: i64,
        update: &ScheduledCallUpdate,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.scheduled.get_mut(&id) {
            Some(call) if call.status == ScheduledCallStatus::Scheduled => {
                if let Some(title) = &update.title {
                    call.title = Some(title.clone());
                }
                if let Some(description) = &update.description {
                    call.description = Some(description.clone());
                }
                if let Some(scheduled_at) = update.scheduled_at {
                    call.scheduled_at = scheduled_at;
                    call.reminder_sent_at = None;
                }
                call.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_scheduled_call(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        tables
            .scheduled_invitations
            .retain(|_, i| i.scheduled_call_id != id);
        Ok(tables.scheduled.remove(&id).is_some())
    }

    async fn create_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
    ) -> AppResult<ScheduledCallInvitation> {
        let mut tables = self.tables.write().await;
        if !tables.scheduled.contains_key(&scheduled_call_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Scheduled call not found"
            )));
        }
        if tables
            .scheduled_invitations
            .values()
            .any(|i| i.scheduled_call_id == scheduled_call_id && i.invitee_id == invitee_id)
        {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "User already invited to this scheduled call"
            )));
        }
        let id = tables.next_id();
        let invitation = ScheduledCallInvitation {
            id,
            scheduled_call_id,
            invitee_id,
            status: RsvpStatus::Pending,
            reminder_sent_at: None,
            created_at: Utc::now(),
        };
        tables.scheduled_invitations.insert(id, invitation.clone());
        Ok(invitation)
    }

    async fn scheduled_invitations(
        &self,
        scheduled_call_id: i64,
    ) -> AppResult<Vec<ScheduledCallInvitation>> {
        Ok(self
            .tables
            .read()
            .await
            .scheduled_invitations
            .values()
            .filter(|i| i.scheduled_call_id == scheduled_call_id)
            .cloned()
            .collect())
    }

    async fn transition_scheduled_invitation(
        &self,
        scheduled_call_id: i64,
        invitee_id: Uuid,
        from: RsvpStatus,
        to: RsvpStatus,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables
            .scheduled_invitations
            .values_mut()
            .find(|i| i.scheduled_call_id == scheduled_call_id && i.invitee_id == invitee_id)
        {
            Some(invitation) if invitation.status == from => {
                invitation.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_scheduled_invitation_reminder_sent(
        &self,
        invitation_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let invitation = tables
            .scheduled_invitations
            .get_mut(&invitation_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invitation not found")))?;
        invitation.reminder_sent_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calls::CallType;

    async fn seeded() -> (MemoryRepository, User, User, Call) {
        let repo = MemoryRepository::new();
        let alice = repo.create_user("alice").await.unwrap();
        let bob = repo.create_user("bob").await.unwrap();
        let call = repo
            .create_call(NewCall {
                call_id: Uuid::new_v4(),
                room_name: "room-1".to_string(),
                call_type: CallType::Video,
                created_by: alice.id,
            })
            .await
            .unwrap();
        (repo, alice, bob, call)
    }

    #[tokio::test]
    async fn call_transition_is_compare_and_swap() {
        let (repo, _, _, call) = seeded().await;
        let now = Utc::now();

        assert!(repo
            .transition_call(call.call_id, CallStatus::Active, CallStatus::Ended, Some(now))
            .await
            .unwrap());
        assert!(!repo
            .transition_call(call.call_id, CallStatus::Active, CallStatus::Cancelled, None)
            .await
            .unwrap());

        let stored = repo.get_call(call.call_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Ended);
        assert_eq!(stored.ended_at, Some(now));
        assert!(repo.list_active_calls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invitations_join_usernames_and_reject_duplicates() {
        let (repo, alice, bob, call) = seeded().await;
        let new = NewInvitation {
            call_id: call.call_id,
            inviter_id: alice.id,
            invitee_id: bob.id,
            call_type: call.call_type,
            room_name: call.room_name.clone(),
        };
        let invitation = repo.create_invitation(new.clone()).await.unwrap();
        assert_eq!(invitation.inviter_name, "alice");
        assert_eq!(invitation.invitee_name, "bob");
        assert_eq!(invitation.room_name, "room-1");

        assert!(matches!(
            repo.create_invitation(new).await,
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(repo.pending_invitations_for_user(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_visible_to_creator_and_participants() {
        let (repo, alice, bob, call) = seeded().await;
        repo.create_history(NewCallHistory {
            call_id: call.call_id,
            room_name: call.room_name.clone(),
            call_type: call.call_type,
            created_by: alice.id,
            participants: vec!["alice".to_string(), "bob".to_string()],
        })
        .await
        .unwrap();
        let carol = repo.create_user("carol").await.unwrap();

        assert_eq!(repo.history_for_user(alice.id, "alice", 10, 0).await.unwrap().len(), 1);
        assert_eq!(repo.history_for_user(bob.id, "bob", 10, 0).await.unwrap().len(), 1);
        assert!(repo.history_for_user(carol.id, "carol", 10, 0).await.unwrap().is_empty());
        assert!(repo.history_for_user(bob.id, "bob", 10, 1).await.unwrap().is_empty());

        assert!(repo.delete_history(call.call_id).await.unwrap());
        assert!(repo.get_history(call.call_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upcoming_excludes_past_and_non_scheduled() {
        let (repo, alice, bob, _) = seeded().await;
        let now = Utc::now();
        let mut ids = Vec::new();
        for minutes in [30, -5, 10] {
            let call = repo
                .create_scheduled_call(NewScheduledCall {
                    call_id: Uuid::new_v4(),
                    room_name: format!("scheduled-{}", minutes),
                    call_type: CallType::Voice,
                    created_by: alice.id,
                    scheduled_at: now + chrono::Duration::minutes(minutes),
                    timezone: "UTC".to_string(),
                    recurrence: serde_json::json!({"type": "none"}),
                    title: None,
                    description: None,
                    join_link: String::new(),
                    max_participants: 20,
                    max_duration_seconds: 0,
                })
                .await
                .unwrap();
            ids.push(call.id);
        }
        repo.transition_scheduled_call(ids[0], ScheduledCallStatus::Scheduled, ScheduledCallStatus::Cancelled)
            .await
            .unwrap();

        let upcoming = repo.upcoming_scheduled_calls(now, 100).await.unwrap();
        assert_eq!(upcoming.iter().map(|c| c.id).collect::<Vec<_>>(), vec![ids[2]]);

        let invitation = repo.create_scheduled_invitation(ids[2], bob.id).await.unwrap();
        repo.mark_scheduled_invitation_reminder_sent(invitation.id, now)
            .await
            .unwrap();
        let invitations = repo.scheduled_invitations(ids[2]).await.unwrap();
        assert_eq!(invitations[0].reminder_sent_at, Some(now));
        assert_eq!(
            repo.scheduled_calls_by_invitee(bob.id, Some(ScheduledCallStatus::Scheduled))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn calls_are_found_by_room() {
        let (repo, alice, _, call) = seeded().await;
        let found = repo.get_call_by_room("room-1").await.unwrap().unwrap();
        assert_eq!(found.call_id, call.call_id);
        assert!(repo.get_call_by_room("room-2").await.unwrap().is_none());

        let duplicate = repo
            .create_call(NewCall {
                call_id: Uuid::new_v4(),
                room_name: "room-1".to_string(),
                call_type: CallType::Voice,
                created_by: alice.id,
            })
            .await;
        assert!(matches!(duplicate, Err(AppError::InvalidState(_))));
        assert!(repo.user_exists(alice.id).await.unwrap());
        assert!(!repo.user_exists(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_scheduled_call_drops_its_invitations() {
        let (repo, alice, bob, _) = seeded().await;
        let call = repo
            .create_scheduled_call(NewScheduledCall {
                call_id: Uuid::new_v4(),
                room_name: "weekly".to_string(),
                call_type: CallType::Video,
                created_by: alice.id,
                scheduled_at: Utc::now() + chrono::Duration::hours(1),
                timezone: "UTC".to_string(),
                recurrence: serde_json::json!({"type": "none"}),
                title: Some("Weekly".to_string()),
                description: None,
                join_link: String::new(),
                max_participants: 10,
                max_duration_seconds: 3600,
            })
            .await
            .unwrap();
        repo.create_scheduled_invitation(call.id, bob.id).await.unwrap();

        assert!(repo.delete_scheduled_call(call.id).await.unwrap());
        assert!(repo.get_scheduled_call(call.id).await.unwrap().is_none());
        assert!(repo.scheduled_invitations(call.id).await.unwrap().is_empty());
        assert!(!repo.delete_scheduled_call(call.id).await.unwrap());
    }

    #[tokio::test]
    async fn contacts_are_stored_both_ways() {
        let (repo, alice, bob, _) = seeded().await;
        let carol = repo.create_user("Caroline").await.unwrap();

        let contact = repo.add_contact(alice.id, bob.id).await.unwrap();
        assert_eq!(contact.username, "bob");
        repo.add_contact(alice.id, bob.id).await.unwrap();
        repo.add_contact(carol.id, alice.id).await.unwrap();

        assert!(repo.contact_exists(bob.id, alice.id).await.unwrap());
        assert_eq!(repo.contacts_for_user(alice.id).await.unwrap().len(), 2);
        assert_eq!(repo.contacts_for_user(bob.id).await.unwrap().len(), 1);

        let found = repo.search_contacts(alice.id, "caro").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].contact_user_id, carol.id);

        assert!(repo.remove_contact(bob.id, alice.id).await.unwrap());
        assert!(!repo.contact_exists(alice.id, bob.id).await.unwrap());
        assert!(!repo.remove_contact(bob.id, alice.id).await.unwrap());
        assert!(matches!(
            repo.add_contact(alice.id, alice.id).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
