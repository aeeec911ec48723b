//! Collaborator service contracts.
//!
//! The engine consumes every external service (catalog, identity/wallet,
//! delivery rates, order state, OTP) through the [`CheckoutBackend`]
//! trait. Production uses [`HttpBackend`]; tests substitute an in-memory
//! double that also implements the server side of the protocol (staleness
//! rule, stock enforcement).

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use marea_core::{CertificateCode, CityId, ProductId, VariantId};
use thiserror::Error;

use crate::types::{
    CartLine, CartMutation, Certificate, CityRates, IdentityProfile, OrderSnapshot, OtpContact,
    OtpOutcome, PushOutcome, StoredOrder, VariantInfo,
};

/// Errors from the service transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP request failed (connect, timeout, TLS, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body did not decode.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server processed the request and reported an application
    /// error (`success: false`).
    #[error("backend error: {0}")]
    Api(String),
}

/// Everything the checkout engine needs from the outside world.
///
/// Token parameters are `None` for anonymous guest sessions; the server
/// then scopes state to the transport session instead.
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    /// Current price, stock, and availability for a variant.
    async fn get_variant(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<VariantInfo, ServiceError>;

    /// The identity behind a token: tier, balances, owned certificates.
    async fn get_current_identity(&self, token: &str) -> Result<IdentityProfile, ServiceError>;

    /// Look up a certificate by code in the wallet service. `None` means
    /// the code is unknown.
    async fn get_certificate(
        &self,
        token: Option<&str>,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, ServiceError>;

    /// Courier rates, ETAs, and the metro/express flag for a city.
    async fn get_rates_for_city(&self, city_id: &CityId) -> Result<CityRates, ServiceError>;

    /// Apply one cart mutation on the immediate path. Returns the full
    /// authoritative cart, which the caller adopts wholesale.
    async fn mutate_cart(
        &self,
        token: Option<&str>,
        mutation: CartMutation,
    ) -> Result<Vec<CartLine>, ServiceError>;

    /// Push an order-state snapshot. `accepted: false` means the push
    /// was stale (older `last_update` than one already accepted).
    async fn push_order_state(
        &self,
        token: Option<&str>,
        snapshot: &OrderSnapshot,
    ) -> Result<PushOutcome, ServiceError>;

    /// Pull the stored order for this identity, if any.
    async fn pull_order_state(&self, token: &str) -> Result<Option<StoredOrder>, ServiceError>;

    /// Send a one-time code. Returns the resend cooldown in seconds.
    async fn request_code(&self, contact: &OtpContact) -> Result<u64, ServiceError>;

    /// Verify a one-time code.
    async fn verify_code(
        &self,
        contact: &OtpContact,
        code: &str,
    ) -> Result<OtpOutcome, ServiceError>;
}
