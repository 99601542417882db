//! Integration tests for hearth-sync
//!
//! Drives the engine against an in-memory backing store that records every
//! call and can inject failures, stalls and push notifications.

mod common;

mod test_commit;
mod test_subscriptions;
