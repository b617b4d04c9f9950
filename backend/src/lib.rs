//! AppKit Backend Library
//!
//! Control-plane orchestration for a platform-as-a-service: app setup
//! workflows, config var reconciliation and the platform gateway they drive.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod config;
pub mod config_vars;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod setup;
/// Application state management
///
/// Domain records, persistence seams and the SQLite store.
pub mod state;
