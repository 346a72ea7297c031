//! Ghostwire relay server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod approval;
pub mod config;
pub mod console;
pub mod error;
pub mod hub;
pub mod ws;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
