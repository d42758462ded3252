pub mod calls;
pub mod contacts;
pub mod history;
pub mod participants;
pub mod scheduled;
