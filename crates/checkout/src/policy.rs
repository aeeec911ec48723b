//! Pricing and synchronization policy constants.
//!
//! Business-rule knobs live here rather than inline at their use sites, so
//! merchandising changes are one-line edits.

use std::time::Duration;

use marea_core::Money;

/// Smallest charge the payment gateway accepts.
///
/// The final payable total is clamped to this minimum: gateways reject
/// zero-amount charges, so an order fully covered by points and
/// certificates still pays this residual.
pub const MIN_CHARGE: Money = Money::from_minor(100);

/// Goods sum at which delivery becomes free, regardless of method.
pub const FREE_DELIVERY_THRESHOLD: Money = Money::from_major(15_000);

/// Delay before a burst of local edits is collapsed into one state push.
pub const SYNC_DEBOUNCE: Duration = Duration::from_millis(500);

/// How long per-city delivery rates are cached.
pub const RATES_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum number of cities kept in the rates cache.
pub const RATES_CACHE_CAPACITY: u64 = 500;

/// Length of a one-time login code.
pub const OTP_CODE_LENGTH: usize = 6;

/// Resend cooldown used when the OTP service does not report one.
pub const OTP_FALLBACK_COOLDOWN: Duration = Duration::from_secs(60);

/// Whether adding a certificate auto-selects it when the goods sum already
/// exceeds its value and nothing else is selected. Product has not settled
/// on this behavior; it ships as a flag so either answer is a one-line
/// change.
pub const AUTO_SELECT_COVERING_CERTIFICATE: bool = true;
