//! Common library for the lock access services
//!
//! This crate provides shared infrastructure used by the services in this
//! workspace: PostgreSQL connectivity and migrations, the Redis-backed work
//! queue, and the database error type.

pub mod database;
pub mod error;
pub mod queue;
