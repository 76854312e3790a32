//! HTTP route handlers.

pub mod dev;
pub mod health;
pub mod notifications;
pub mod tasks;
pub mod worker;
