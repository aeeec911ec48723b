//! Marea Core - Shared types library.
//!
//! This crate provides common types used across all Marea components:
//! - `checkout` - Cart, pricing, and order synchronization engine
//! - `integration-tests` - End-to-end checkout scenarios
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, and contact data

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
