//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on, whose
//! implementations live in adapter crates.
//!
//! - [`IBackingStore`] - Remote authoritative store with push subscriptions

pub mod backing_store;

pub use backing_store::{IBackingStore, ItemsNotification, ListsNotification};
