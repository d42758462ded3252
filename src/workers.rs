pub mod reminders;

pub use reminders::ReminderWorker;
