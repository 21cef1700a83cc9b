//! Dear Self library
//!
//! Journaling core: the daily affirmation, styled journal entries,
//! favorites, streaks and device preferences, all kept in a local store.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
