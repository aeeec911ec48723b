//! Checkout error taxonomy.
//!
//! Mutation-level errors (`Validation`, `StockUnavailable`, `UnknownLine`)
//! are handled locally with rollback and an inline message; they never
//! abort the session. Synchronization-level errors leave optimistic local
//! state intact and are retried by the next debounced cycle.

use marea_core::{CertificateCode, LineKey, Money};
use thiserror::Error;

use crate::services::ServiceError;

/// Engine-level error type for checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A collaborator request failed in transport or at the server.
    #[error("network error: {0}")]
    Network(#[from] ServiceError),

    /// The server rejected a state push as older than one it already
    /// accepted. Non-fatal for background pushes; surfaced only from
    /// final submission.
    #[error("state push rejected as stale")]
    StaleWrite,

    /// A discount mutation failed validation; nothing was applied.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The requested quantity exceeds available stock; the local
    /// mutation was reverted.
    #[error("only {available} in stock")]
    StockUnavailable {
        /// Units the catalog reports as available.
        available: u32,
    },

    /// The one-time code did not match.
    #[error("the code does not match")]
    OtpMismatch,

    /// The one-time code expired before submission.
    #[error("the code has expired, request a new one")]
    OtpExpired,

    /// The resend cooldown has not elapsed yet.
    #[error("wait before requesting another code")]
    OtpCooldown,

    /// No identity token at checkout submission. Blocks only the
    /// submission step, never cart editing.
    #[error("sign in or verify a code to place the order")]
    MissingIdentity,

    /// The referenced cart line does not exist.
    #[error("unknown cart line: {0}")]
    UnknownLine(LineKey),
}

/// Field-level validation failures for discount and delivery mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Requested more points than the identity owns.
    #[error("requested {requested} points, balance is {available}")]
    InsufficientBalance {
        /// Points requested.
        requested: Money,
        /// Points available on the identity.
        available: Money,
    },

    /// Requested more points than the tier cap allows for this order.
    #[error("requested {requested} points, cap for this order is {cap}")]
    CapExceeded {
        /// Points requested.
        requested: Money,
        /// Current cap (`floor(goods_sum × tier rate)`).
        cap: Money,
    },

    /// The wallet service does not know this certificate code.
    #[error("certificate {0} not found")]
    CertificateNotFound(CertificateCode),

    /// The certificate has been redeemed to zero value.
    #[error("certificate {0} has no remaining value")]
    CertificateExhausted(CertificateCode),

    /// The certificate is already in the session wallet.
    #[error("certificate {0} already added")]
    CertificateAlreadyAdded(CertificateCode),

    /// The chosen delivery method is not eligible for the current
    /// destination and cart.
    #[error("delivery method {0} is not available here")]
    MethodNotEligible(marea_core::MethodId),

    /// A pickup point was chosen without a pickup method selected.
    #[error("select a pickup delivery method first")]
    PickupMethodRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::CapExceeded {
            requested: Money::from_major(300),
            cap: Money::from_major(200),
        };
        assert_eq!(
            err.to_string(),
            "requested 300.00 points, cap for this order is 200.00"
        );

        let err = ValidationError::CertificateNotFound(CertificateCode::new("MAREA-1"));
        assert_eq!(err.to_string(), "certificate MAREA-1 not found");
    }

    #[test]
    fn test_validation_wraps_into_checkout_error() {
        let err: CheckoutError = ValidationError::PickupMethodRequired.into();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[test]
    fn test_stock_unavailable_message() {
        let err = CheckoutError::StockUnavailable { available: 2 };
        assert_eq!(err.to_string(), "only 2 in stock");
    }
}
