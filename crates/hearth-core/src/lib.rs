//! Hearth Core - Domain types and ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ListMeta`, `ShoppingItem`, `Task`, `Voucher`
//! - **Record descriptor** - `SyncRecord`, the per-domain plug-in for the sync engine
//! - **Port definitions** - `IBackingStore`, the remote multi-writer store
//! - **Configuration** - YAML-backed settings shared by the engine and the CLI
//!
//! # Architecture
//!
//! The domain module holds pure data and validation. Ports define trait
//! interfaces that adapter crates implement. The sync engine in
//! `hearth-sync` drives domain types through these ports.

pub mod config;
pub mod domain;
pub mod ports;
