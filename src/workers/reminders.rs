//! Sends at most one reminder per scheduled call.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{best_effort, AppResult};
use crate::models::scheduled::ScheduledCall;
use crate::models::websocket::{ReminderPayload, ServerEvent};
use crate::repository::Repository;
use crate::websocket::manager::ConnectionHub;

pub const DEFAULT_THRESHOLDS: [Duration; 2] =
    [Duration::from_secs(15 * 60), Duration::from_secs(5 * 60)];
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub interval: Duration,
    /// Checked in order; the first match wins.
    pub thresholds: Vec<Duration>,
    pub window: Duration,
    pub batch_size: i64,
}

impl ReminderSettings {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            window: DEFAULT_WINDOW,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn matching_threshold(&self, until_call: chrono::Duration) -> Option<Duration> {
        let until_ms = until_call.num_milliseconds();
        self.thresholds.iter().copied().find(|threshold| {
            let upper = threshold.as_millis() as i64;
            let lower = upper - self.window.as_millis() as i64;
            until_ms <= upper && until_ms > lower
        })
    }
}

pub struct ReminderWorker {
    repo: Arc<dyn Repository>,
    hub: ConnectionHub,
    settings: ReminderSettings,
}

impl ReminderWorker {
    pub fn new(repo: Arc<dyn Repository>, hub: ConnectionHub, settings: ReminderSettings) -> Self {
        Self {
            repo,
            hub,
            settings,
        }
    }

    /// Runs until `cancel_token` is cancelled.
    pub async fn run(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.settings.interval.as_secs(), "reminder worker started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.send_reminders(Utc::now()).await {
                        Ok(0) => {}
                        Ok(sent) => debug!(sent, "reminders sent"),
                        Err(e) => error!(error = %e, "failed to scan upcoming scheduled calls"),
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!("reminder worker received shutdown signal, exiting");
                    break;
                }
            }
        }
    }

    pub async fn send_reminders(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let upcoming = self
            .repo
            .upcoming_scheduled_calls(now, self.settings.batch_size)
            .await?;

        let mut sent = 0;
        for call in upcoming {
            if call.reminder_sent_at.is_some() {
                continue;
            }
            let Some(threshold) = self.settings.matching_threshold(call.scheduled_at - now) else {
                continue;
            };
            self.remind(call, threshold, now).await;
            sent += 1;
        }
        Ok(sent)
    }

    /// Only the creator is reminded.
    async fn remind(&self, call: ScheduledCall, threshold: Duration, now: DateTime<Utc>) {
        let id = call.id;
        let creator = best_effort("get_user", self.repo.get_user_by_id(call.created_by).await)
            .flatten();
        match creator {
            Some(creator) => {
                self.hub.send(
                    &creator.username,
                    ServerEvent::ScheduledCallReminder(ReminderPayload::new(call, threshold)),
                );
                info!(
                    scheduled_call_id = id,
                    creator = %creator.username,
                    threshold_secs = threshold.as_secs(),
                    "scheduled call reminder sent"
                );
            }
            None => debug!(scheduled_call_id = id, "creator not found, reminder not delivered"),
        }
        best_effort("mark_reminder_sent", self.repo.mark_reminder_sent(id, now).await);
    }
}
