//! HTTP implementation of the collaborator contracts.
//!
//! Talks JSON to the storefront backend with `reqwest`. Responses use the
//! backend's `{ success, error, ... }` envelope; per-city delivery rates
//! are cached with `moka` so repeated city edits don't hammer the rate
//! service.

use std::sync::Arc;

use async_trait::async_trait;
use marea_core::{CertificateCode, CityId, ProductId, VariantId};
use moka::future::Cache;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::config::CheckoutConfig;
use crate::policy;
use crate::services::{CheckoutBackend, ServiceError};
use crate::types::{
    CartLine, CartMutation, Certificate, CityRates, IdentityProfile, OrderSnapshot, OtpContact,
    OtpOutcome, PushOutcome, StoredOrder, VariantInfo,
};

// =============================================================================
// HttpBackend
// =============================================================================

/// HTTP client for the storefront backend API.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    rates_cache: Cache<CityId, CityRates>,
}

impl HttpBackend {
    /// Create a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &CheckoutConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()?;

        let rates_cache = Cache::builder()
            .max_capacity(policy::RATES_CACHE_CAPACITY)
            .time_to_live(policy::RATES_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_base_url.clone(),
                rates_cache,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ServiceError::Api(format!("invalid endpoint {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, ServiceError> {
        let mut request = self.inner.client.get(self.endpoint(path)?).query(query);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Self::decode(request.send().await?).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ServiceError> {
        let mut request = self.inner.client.post(self.endpoint(path)?).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Self::decode(request.send().await?).await
    }

    /// Check the status, then decode the body from text so a malformed
    /// response can be logged with its payload.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "failed to parse backend response"
            );
            ServiceError::Decode(e)
        })
    }
}

/// Unwrap the backend's `{ success, error }` envelope around `payload`.
fn unwrap_envelope<T>(
    success: bool,
    error: Option<String>,
    payload: Option<T>,
    what: &str,
) -> Result<T, ServiceError> {
    if !success {
        return Err(ServiceError::Api(
            error.unwrap_or_else(|| format!("{what} failed")),
        ));
    }
    payload.ok_or_else(|| ServiceError::Api(format!("{what}: empty response")))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantResponse {
    success: bool,
    error: Option<String>,
    variant: Option<VariantInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    success: bool,
    error: Option<String>,
    profile: Option<IdentityProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateResponse {
    success: bool,
    error: Option<String>,
    // Null when the code is unknown
    certificate: Option<Certificate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatesResponse {
    success: bool,
    error: Option<String>,
    rates: Option<CityRates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartResponse {
    success: bool,
    error: Option<String>,
    cart: Option<Vec<CartLine>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushResponse {
    success: bool,
    error: Option<String>,
    outcome: Option<PushOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    success: bool,
    error: Option<String>,
    order: Option<StoredOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestCodeResponse {
    success: bool,
    error: Option<String>,
    cooldown_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum VerifyStatus {
    Verified,
    Mismatch,
    Expired,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeResponse {
    success: bool,
    error: Option<String>,
    status: Option<VerifyStatus>,
    token: Option<String>,
}

// =============================================================================
// CheckoutBackend implementation
// =============================================================================

#[async_trait]
impl CheckoutBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn get_variant(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<VariantInfo, ServiceError> {
        let response: VariantResponse = self
            .get_json(
                "api/getVariant",
                &[
                    ("product", product_id.to_string()),
                    ("variant", variant_id.to_string()),
                ],
                None,
            )
            .await?;
        unwrap_envelope(response.success, response.error, response.variant, "getVariant")
    }

    #[instrument(skip(self, token))]
    async fn get_current_identity(&self, token: &str) -> Result<IdentityProfile, ServiceError> {
        let response: IdentityResponse = self
            .get_json("api/getCurrentIdentity", &[], Some(token))
            .await?;
        unwrap_envelope(
            response.success,
            response.error,
            response.profile,
            "getCurrentIdentity",
        )
    }

    #[instrument(skip(self, token))]
    async fn get_certificate(
        &self,
        token: Option<&str>,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, ServiceError> {
        let response: CertificateResponse = self
            .get_json(
                "api/getCertificate",
                &[("code", code.to_string())],
                token,
            )
            .await?;
        if !response.success {
            return Err(ServiceError::Api(
                response
                    .error
                    .unwrap_or_else(|| "getCertificate failed".to_owned()),
            ));
        }
        Ok(response.certificate)
    }

    #[instrument(skip(self))]
    async fn get_rates_for_city(&self, city_id: &CityId) -> Result<CityRates, ServiceError> {
        if let Some(rates) = self.inner.rates_cache.get(city_id).await {
            tracing::debug!(%city_id, "rates cache hit");
            return Ok(rates);
        }

        let response: RatesResponse = self
            .get_json(
                "api/getRatesForCity",
                &[("city", city_id.to_string())],
                None,
            )
            .await?;
        let rates = unwrap_envelope(
            response.success,
            response.error,
            response.rates,
            "getRatesForCity",
        )?;

        self.inner
            .rates_cache
            .insert(city_id.clone(), rates.clone())
            .await;
        Ok(rates)
    }

    #[instrument(skip(self, token))]
    async fn mutate_cart(
        &self,
        token: Option<&str>,
        mutation: CartMutation,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let response: CartResponse = self
            .post_json("api/mutateCart", token, &mutation)
            .await?;
        unwrap_envelope(response.success, response.error, response.cart, "mutateCart")
    }

    #[instrument(skip(self, token, snapshot), fields(last_update = snapshot.last_update))]
    async fn push_order_state(
        &self,
        token: Option<&str>,
        snapshot: &OrderSnapshot,
    ) -> Result<PushOutcome, ServiceError> {
        let response: PushResponse = self
            .post_json("api/pushOrderState", token, snapshot)
            .await?;
        unwrap_envelope(
            response.success,
            response.error,
            response.outcome,
            "pushOrderState",
        )
    }

    #[instrument(skip(self, token))]
    async fn pull_order_state(&self, token: &str) -> Result<Option<StoredOrder>, ServiceError> {
        let response: PullResponse = self
            .get_json("api/pullOrderState", &[], Some(token))
            .await?;
        if !response.success {
            return Err(ServiceError::Api(
                response
                    .error
                    .unwrap_or_else(|| "pullOrderState failed".to_owned()),
            ));
        }
        Ok(response.order)
    }

    #[instrument(skip(self, contact))]
    async fn request_code(&self, contact: &OtpContact) -> Result<u64, ServiceError> {
        let response: RequestCodeResponse = self
            .post_json(
                "api/requestCode",
                None,
                &serde_json::json!({ "contact": contact }),
            )
            .await?;
        unwrap_envelope(
            response.success,
            response.error,
            response.cooldown_seconds,
            "requestCode",
        )
    }

    #[instrument(skip(self, contact, code))]
    async fn verify_code(
        &self,
        contact: &OtpContact,
        code: &str,
    ) -> Result<OtpOutcome, ServiceError> {
        let response: VerifyCodeResponse = self
            .post_json(
                "api/verifyCode",
                None,
                &serde_json::json!({ "contact": contact, "code": code }),
            )
            .await?;
        if !response.success {
            return Err(ServiceError::Api(
                response
                    .error
                    .unwrap_or_else(|| "verifyCode failed".to_owned()),
            ));
        }
        match response.status {
            Some(VerifyStatus::Verified) => {
                let token = response
                    .token
                    .ok_or_else(|| ServiceError::Api("verifyCode: missing token".to_owned()))?;
                Ok(OtpOutcome::Verified { token })
            }
            Some(VerifyStatus::Mismatch) => Ok(OtpOutcome::Mismatch),
            Some(VerifyStatus::Expired) => Ok(OtpOutcome::Expired),
            None => Err(ServiceError::Api("verifyCode: missing status".to_owned())),
        }
    }
}
