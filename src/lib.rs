pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod identity;
pub mod models;
pub mod outlets;
pub mod sanitize;
pub mod store;
pub mod web;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
