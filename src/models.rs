pub mod auth;
pub mod calls;
pub mod contacts;
pub mod scheduled;
pub mod users;
pub mod websocket;
