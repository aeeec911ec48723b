//! Marea checkout engine.
//!
//! Tracks a shopping cart, computes the final payable price under stacked
//! discount mechanisms (loyalty points, gift certificates, free-delivery
//! thresholds), resolves delivery options against a destination, and keeps
//! this state synchronized with the authoritative server under concurrent,
//! possibly out-of-order updates.
//!
//! # Architecture
//!
//! - [`session::CheckoutSession`] - the explicit per-checkout context object;
//!   every UI-level action goes through it
//! - [`cart::CartLedger`] - authoritative local list of cart lines
//! - [`pricing`] - pure price computation, integer minor units only
//! - [`delivery::DeliveryResolver`] - destination/method state machine
//! - [`discount::DiscountStack`] - loyalty-point and certificate selection
//! - [`sync`] - debounced snapshot pushes with monotonic timestamps
//! - [`guest::GuestFlow`] - one-time-code gated guest identity capture
//! - [`services`] - collaborator contracts and the HTTP backend
//!
//! Local mutations are synchronous and optimistic: they apply in-memory
//! immediately, derived state is refreshed by a single explicit recompute
//! pass, and the network round-trip happens after the caller already sees
//! the result. A failed round-trip rolls the mutation back.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod delivery;
pub mod discount;
pub mod error;
pub mod guest;
pub mod policy;
pub mod pricing;
pub mod services;
pub mod session;
pub mod sync;
pub mod types;

pub use config::{CheckoutConfig, ConfigError};
pub use error::{CheckoutError, ValidationError};
pub use session::CheckoutSession;
