//! Lock access control for rental properties
//!
//! Issues time-windowed authorization codes, sends encrypted commands to
//! property locks, audits every round-trip and periodically scans lock
//! telemetry for temperature anomalies.

pub mod audit;
pub mod authority;
pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod repositories;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod state;
