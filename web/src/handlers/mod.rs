//! HTTP request handlers.

pub mod health;
pub mod home;
pub mod orders;

pub use health::health_check;
