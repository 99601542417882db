//! Domain entities
//!
//! This module contains the core domain types for Hearth:
//! - Newtypes for client-generated identifiers
//! - List registry entries and their domain tag
//! - The three record shapes (shopping items, tasks, vouchers)
//! - The `SyncRecord` descriptor and field-level record patches
//! - Domain-specific error types

pub mod errors;
pub mod list;
pub mod newtypes;
pub mod record;
pub mod shopping;
pub mod task;
pub mod voucher;

// Re-export commonly used types
pub use errors::DomainError;
pub use list::{ListDomain, ListMeta};
pub use newtypes::*;
pub use record::{document_id, RecordDocument, RecordPatch, SyncRecord};
pub use shopping::ShoppingItem;
pub use task::{Task, TaskStatus, Urgency};
pub use voucher::{Voucher, VoucherKind};
