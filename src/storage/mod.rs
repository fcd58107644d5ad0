//! Storage Layer
//!
//! SQLite persistence for sessions and messages.

pub mod database;

pub use database::*;
