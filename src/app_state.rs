use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    CallService, ContactService, HistoryService, ParticipantService, ScheduledService, UserService,
};
use crate::websocket::manager::ConnectionHub;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: ConnectionHub,
    pub calls: CallService,
    pub scheduled: ScheduledService,
    pub history: HistoryService,
    pub participants: ParticipantService,
    pub users: UserService,
    pub contacts: ContactService,
}
