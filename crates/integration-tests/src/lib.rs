//! Shared test fixtures for Marea integration tests.
//!
//! [`MockBackend`] is an in-memory stand-in for every collaborator the
//! checkout engine talks to. Unlike a stub, it also implements the server
//! side of the protocol contracts - the `last_update` staleness rule,
//! stock-checked cart mutations with server-assigned line keys, and OTP
//! verification - so the tests exercise both ends of the synchronization
//! protocol.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use marea_checkout::services::{CheckoutBackend, ServiceError};
use marea_checkout::types::{
    CartLine, CartMutation, Certificate, CityRates, DeliveryMethod, EtaRange, IdentityProfile,
    LineKind, OrderSnapshot, OtpContact, OtpOutcome, PushOutcome, StoredOrder, VariantInfo,
};
use marea_checkout::{CheckoutConfig, CheckoutSession};
use marea_core::{
    CertificateCode, CityId, LineKey, MethodId, Money, OrderId, ProductId, PvzCode, VariantId,
};
use secrecy::SecretString;
use url::Url;

/// The token the mock hands out after successful OTP verification.
pub const VERIFIED_TOKEN: &str = "tok-verified";

#[derive(Default)]
struct MockState {
    variants: HashMap<(ProductId, VariantId), VariantInfo>,
    rates: HashMap<CityId, CityRates>,
    identity: IdentityProfile,
    certificates: HashMap<CertificateCode, Certificate>,
    cart: Vec<CartLine>,
    next_line_key: u64,
    stored: Option<OrderSnapshot>,
    order_id: Option<OrderId>,
    next_order_id: i64,
    accepted_last_update: i64,
    otp_code: String,
    otp_expired: bool,
    cooldown_seconds: u64,
    push_attempts: u64,
    fail_cart_mutations: bool,
    fail_rates: bool,
}

/// In-memory backend double with a small builder API.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// An empty backend knowing nothing.
    #[must_use]
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.lock();
            state.next_order_id = 1;
            state.cooldown_seconds = 60;
            state.otp_code = "000000".to_owned();
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Register a purchasable variant.
    #[must_use]
    pub fn with_variant(
        self,
        product_id: ProductId,
        variant_id: VariantId,
        price_major: i64,
        stock: u32,
        kind: LineKind,
    ) -> Self {
        self.lock().variants.insert(
            (product_id, variant_id),
            VariantInfo {
                unit_price: Money::from_major(price_major),
                unit_old_price: None,
                stock_quantity: stock,
                available: stock > 0,
                kind,
            },
        );
        self
    }

    /// Register a city's rate table.
    #[must_use]
    pub fn with_rates(self, city_id: CityId, rates: CityRates) -> Self {
        self.lock().rates.insert(city_id, rates);
        self
    }

    /// Set the identity profile returned for any token.
    #[must_use]
    pub fn with_identity(self, identity: IdentityProfile) -> Self {
        self.lock().identity = identity;
        self
    }

    /// Register a certificate in the wallet service.
    #[must_use]
    pub fn with_certificate(self, code: &str, value_major: i64) -> Self {
        self.lock().certificates.insert(
            CertificateCode::new(code),
            Certificate {
                code: CertificateCode::new(code),
                remaining_value: Money::from_major(value_major),
            },
        );
        self
    }

    /// Set the one-time code the OTP service expects.
    #[must_use]
    pub fn with_otp_code(self, code: &str) -> Self {
        self.lock().otp_code = code.to_owned();
        self
    }

    /// Pre-store an order snapshot, as if written by another device.
    #[must_use]
    pub fn with_stored_order(self, snapshot: OrderSnapshot) -> Self {
        let mut state = self.lock();
        state.accepted_last_update = snapshot.last_update;
        state.cart = snapshot.lines.clone();
        state.stored = Some(snapshot);
        state.order_id = Some(OrderId::new(900));
        drop(state);
        self
    }

    /// Make every cart mutation fail at the server.
    pub fn fail_cart_mutations(&self, fail: bool) {
        self.lock().fail_cart_mutations = fail;
    }

    /// Make every rate lookup fail.
    pub fn fail_rates(&self, fail: bool) {
        self.lock().fail_rates = fail;
    }

    /// Expire the outstanding one-time code.
    pub fn expire_otp(&self) {
        self.lock().otp_expired = true;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// How many pushes reached the server (accepted or not).
    #[must_use]
    pub fn push_attempts(&self) -> u64 {
        self.lock().push_attempts
    }

    /// The last accepted snapshot, if any.
    #[must_use]
    pub fn stored_snapshot(&self) -> Option<OrderSnapshot> {
        self.lock().stored.clone()
    }

    /// The server's latest accepted timestamp.
    #[must_use]
    pub fn accepted_last_update(&self) -> i64 {
        self.lock().accepted_last_update
    }

    /// The authoritative server cart.
    #[must_use]
    pub fn server_cart(&self) -> Vec<CartLine> {
        self.lock().cart.clone()
    }
}

#[async_trait]
impl CheckoutBackend for MockBackend {
    async fn get_variant(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<VariantInfo, ServiceError> {
        self.lock()
            .variants
            .get(&(product_id, variant_id))
            .cloned()
            .ok_or_else(|| ServiceError::Api(format!("unknown variant {product_id}/{variant_id}")))
    }

    async fn get_current_identity(&self, _token: &str) -> Result<IdentityProfile, ServiceError> {
        Ok(self.lock().identity.clone())
    }

    async fn get_certificate(
        &self,
        _token: Option<&str>,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, ServiceError> {
        Ok(self.lock().certificates.get(code).cloned())
    }

    async fn get_rates_for_city(&self, city_id: &CityId) -> Result<CityRates, ServiceError> {
        let state = self.lock();
        if state.fail_rates {
            return Err(ServiceError::Api("rate service unavailable".to_owned()));
        }
        state
            .rates
            .get(city_id)
            .cloned()
            .ok_or_else(|| ServiceError::Api(format!("unknown city {city_id}")))
    }

    async fn mutate_cart(
        &self,
        _token: Option<&str>,
        mutation: CartMutation,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let mut state = self.lock();
        if state.fail_cart_mutations {
            return Err(ServiceError::Api("cart service unavailable".to_owned()));
        }

        match mutation {
            CartMutation::Add {
                product_id,
                variant_id,
                delta,
                ..
            } => {
                let info = state
                    .variants
                    .get(&(product_id, variant_id))
                    .cloned()
                    .ok_or_else(|| ServiceError::Api("unknown variant".to_owned()))?;
                let in_cart = state
                    .cart
                    .iter()
                    .find(|l| l.product_id == product_id && l.variant_id == variant_id)
                    .map_or(0, |l| l.quantity);
                if in_cart + delta > info.stock_quantity {
                    return Err(ServiceError::Api("out of stock".to_owned()));
                }

                if let Some(line) = state
                    .cart
                    .iter_mut()
                    .find(|l| l.product_id == product_id && l.variant_id == variant_id)
                {
                    line.quantity += delta;
                } else {
                    state.next_line_key += 1;
                    let key = LineKey::new(format!("srv-{}", state.next_line_key));
                    state.cart.push(CartLine {
                        key,
                        product_id,
                        variant_id,
                        quantity: delta,
                        unit_price: info.unit_price,
                        unit_old_price: info.unit_old_price,
                        kind: info.kind,
                    });
                }
            }
            CartMutation::SetQuantity { key, quantity } => {
                let (product_id, variant_id) = state
                    .cart
                    .iter()
                    .find(|l| l.key == key)
                    .map(|l| (l.product_id, l.variant_id))
                    .ok_or_else(|| ServiceError::Api("unknown line".to_owned()))?;
                let stock = state
                    .variants
                    .get(&(product_id, variant_id))
                    .map_or(u32::MAX, |v| v.stock_quantity);
                if quantity > stock {
                    return Err(ServiceError::Api("out of stock".to_owned()));
                }
                if let Some(line) = state.cart.iter_mut().find(|l| l.key == key) {
                    line.quantity = quantity;
                }
            }
            CartMutation::Remove { key } => {
                state.cart.retain(|l| l.key != key);
            }
        }
        Ok(state.cart.clone())
    }

    async fn push_order_state(
        &self,
        _token: Option<&str>,
        snapshot: &OrderSnapshot,
    ) -> Result<PushOutcome, ServiceError> {
        let mut state = self.lock();
        state.push_attempts += 1;

        // The staleness rule: never apply a push older than (or as old
        // as) the latest accepted one
        if snapshot.last_update <= state.accepted_last_update {
            return Ok(PushOutcome {
                accepted: false,
                order_id: state.order_id,
                server_last_update: state.accepted_last_update,
            });
        }

        state.accepted_last_update = snapshot.last_update;
        state.stored = Some(snapshot.clone());
        if state.order_id.is_none() {
            state.order_id = Some(OrderId::new(state.next_order_id));
            state.next_order_id += 1;
        }
        Ok(PushOutcome {
            accepted: true,
            order_id: state.order_id,
            server_last_update: state.accepted_last_update,
        })
    }

    async fn pull_order_state(&self, _token: &str) -> Result<Option<StoredOrder>, ServiceError> {
        let state = self.lock();
        Ok(state.stored.clone().map(|snapshot| StoredOrder {
            snapshot,
            order_id: state.order_id,
        }))
    }

    async fn request_code(&self, _contact: &OtpContact) -> Result<u64, ServiceError> {
        Ok(self.lock().cooldown_seconds)
    }

    async fn verify_code(
        &self,
        _contact: &OtpContact,
        code: &str,
    ) -> Result<OtpOutcome, ServiceError> {
        let state = self.lock();
        if state.otp_expired {
            return Ok(OtpOutcome::Expired);
        }
        if code == state.otp_code {
            return Ok(OtpOutcome::Verified {
                token: VERIFIED_TOKEN.to_owned(),
            });
        }
        Ok(OtpOutcome::Mismatch)
    }
}

// =============================================================================
// Fixture helpers
// =============================================================================

/// Install a test tracing subscriber once; later calls are no-ops.
/// Run with `RUST_LOG=marea_checkout=debug` to watch the sync protocol.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A checkout session wired to a mock backend.
#[must_use]
pub fn session_with(backend: &Arc<MockBackend>, token: Option<&str>) -> CheckoutSession {
    let config = CheckoutConfig::for_base_url(Url::parse("http://backend.test").unwrap());
    CheckoutSession::new(
        Arc::clone(backend) as Arc<dyn CheckoutBackend>,
        &config,
        token.map(SecretString::from),
    )
}

/// A courier + express + pickup rate table for a metro city.
#[must_use]
pub fn metro_rates() -> CityRates {
    CityRates {
        methods: vec![
            method("courier", 35, false, false),
            method("express", 90, true, false),
            method("pvz", 25, false, true),
        ],
        is_metro: true,
    }
}

/// A courier-only rate table for a non-metro city.
#[must_use]
pub fn regional_rates() -> CityRates {
    CityRates {
        methods: vec![
            method("courier", 45, false, false),
            method("express", 90, true, false),
        ],
        is_metro: false,
    }
}

/// Build a delivery method fixture.
#[must_use]
pub fn method(id: &str, cost_major: i64, express: bool, pickup: bool) -> DeliveryMethod {
    DeliveryMethod {
        id: MethodId::new(id),
        name: id.to_owned(),
        base_cost: Money::from_major(cost_major),
        eta: EtaRange {
            min_days: 1,
            max_days: 4,
        },
        express,
        pickup,
    }
}

/// Build a city fixture.
#[must_use]
pub fn city(id: &str, name: &str) -> marea_checkout::types::City {
    marea_checkout::types::City {
        id: CityId::new(id),
        name: name.to_owned(),
        region: "Region".to_owned(),
    }
}

/// Build a pickup point fixture.
#[must_use]
pub fn pvz(code: &str, cost_major: i64) -> marea_checkout::types::PvzPoint {
    marea_checkout::types::PvzPoint {
        code: PvzCode::new(code),
        address: "ул. Морская, 12".to_owned(),
        cost: Money::from_major(cost_major),
        work_time: "10:00-22:00".to_owned(),
    }
}
