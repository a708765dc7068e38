//! order-mirror service: configuration, signal handling and wiring.
//!
//! The binary in `main.rs` loads [`config::Config`] and hands it to
//! [`app::run`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod shutdown;
