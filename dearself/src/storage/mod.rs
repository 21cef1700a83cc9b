//! Storage module
//!
//! Provides the local key/value store every service persists through.

pub mod local_store;

pub use local_store::{ChangeOrigin, LocalStore, StoreChange};
