//! The checkout session: one explicit context object per cart session.
//!
//! Every UI-level action goes through [`CheckoutSession`]. Mutations apply
//! to in-memory state immediately (the caller never waits on the network
//! to see a cart edit), a single `recompute()` pass refreshes
//! derived price and delivery state, and the synchronizer then either
//! debounces a snapshot push or, for cart-quantity changes, issues an
//! immediate request whose authoritative response is adopted wholesale.
//!
//! There is no hidden global store: embedders construct a session with a
//! backend and configuration and pass it where it is needed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use marea_core::{CertificateCode, LineKey, MethodId, Money, OrderId, ProductId, VariantId};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use crate::cart::CartLedger;
use crate::config::CheckoutConfig;
use crate::delivery::{DeliveryResolver, DeliveryState};
use crate::discount::DiscountStack;
use crate::error::{CheckoutError, ValidationError};
use crate::guest::{GuestFlow, OtpPhase};
use crate::pricing::{self, PriceBreakdown};
use crate::services::{CheckoutBackend, ServiceError};
use crate::sync::Synchronizer;
use crate::types::{
    CartLine, CartMutation, CheckoutReceipt, City, DeliverySelection, GuestIdentity,
    IdentityProfile, LoyaltyTier, OrderSnapshot, OtpContact, OtpOutcome, PushOutcome, PvzPoint,
};

/// One checkout session: working copy of the order plus synchronization.
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct CheckoutSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn CheckoutBackend>,
    sync: Synchronizer,
    state: Mutex<SessionState>,
}

/// The in-memory working state. Owned by the session, locked only for
/// synchronous mutation - never across an await point.
struct SessionState {
    token: Option<SecretString>,
    profile: Option<IdentityProfile>,
    order_id: Option<OrderId>,
    ledger: CartLedger,
    discounts: DiscountStack,
    delivery: DeliveryResolver,
    guest: GuestFlow,
    current_address: Option<String>,
    comment_for_courier: String,
    payment_method: Option<String>,
    breakdown: PriceBreakdown,
}

impl SessionState {
    fn new(token: Option<SecretString>) -> Self {
        Self {
            token,
            profile: None,
            order_id: None,
            ledger: CartLedger::new(),
            discounts: DiscountStack::new(),
            delivery: DeliveryResolver::new(),
            guest: GuestFlow::new(),
            current_address: None,
            comment_for_courier: String::new(),
            payment_method: None,
            breakdown: PriceBreakdown::empty(),
        }
    }

    fn tier(&self) -> LoyaltyTier {
        self.profile.as_ref().map_or_else(LoyaltyTier::default, |p| p.tier)
    }

    fn points_balance(&self) -> Money {
        self.profile.as_ref().map_or(Money::ZERO, |p| p.points_balance)
    }

    fn token_string(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().to_owned())
    }

    /// The single derived-state refresh: delivery re-validation, discount
    /// re-clamping, then a fresh price breakdown. Called after every
    /// mutation instead of relying on implicit reactivity.
    fn recompute(&mut self) {
        self.delivery.revalidate(self.ledger.has_physical_goods());
        let goods_sum = self.ledger.goods_sum();
        self.discounts
            .reclamp(goods_sum, self.points_balance(), self.tier());
        let delivery_cost = self.delivery.cost(goods_sum);
        self.breakdown = pricing::quote(
            self.ledger.lines(),
            &self.discounts.selection(),
            self.discounts.wallet(),
            delivery_cost,
        );
    }

    fn build_snapshot(&self, last_update: i64) -> OrderSnapshot {
        OrderSnapshot {
            lines: self.ledger.snapshot(),
            discounts: self.discounts.selection(),
            delivery: self.delivery.selection(self.ledger.goods_sum()),
            user_info: self.guest.identity().clone(),
            current_address: self.current_address.clone(),
            comment_for_courier: self.comment_for_courier.clone(),
            payment_method: self.payment_method.clone(),
            last_update,
        }
    }
}

impl CheckoutSession {
    /// Create a session against a backend.
    ///
    /// `token` is the identity token when the user is already known
    /// (authenticated, or a persisted guest session); `None` starts an
    /// anonymous session that gains a token through the guest flow.
    #[must_use]
    pub fn new(
        backend: Arc<dyn CheckoutBackend>,
        config: &CheckoutConfig,
        token: Option<SecretString>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                sync: Synchronizer::new(config.sync_debounce),
                state: Mutex::new(SessionState::new(token)),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn token_string(&self) -> Option<String> {
        self.lock().token_string()
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Arm a debounced push of the whole order state.
    fn schedule_push(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.sync.schedule(async move {
            push_order_state(&inner).await;
        });
    }

    /// Initial load: fetch the identity profile (when a token exists) and
    /// pull the stored order state once, server winning on every field it
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the identity or order pull fails; a session
    /// without a token loads as empty and never errors.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), CheckoutError> {
        self.refresh_identity().await?;
        self.reconcile().await
    }

    async fn refresh_identity(&self) -> Result<(), CheckoutError> {
        let Some(token) = self.token_string() else {
            return Ok(());
        };
        let profile = self.inner.backend.get_current_identity(&token).await?;
        let mut state = self.lock();
        state.discounts.merge_wallet(profile.certificates.clone());
        state
            .guest
            .merge_profile(&profile.name, &profile.surname, &profile.phone, &profile.email);
        state.profile = Some(profile);
        state.recompute();
        Ok(())
    }

    /// Pull the stored order and merge it: the server wins on every field
    /// present in its response; local-only in-progress fields (unsent
    /// guest keystrokes) are preserved.
    async fn reconcile(&self) -> Result<(), CheckoutError> {
        let Some(token) = self.token_string() else {
            return Ok(());
        };
        let Some(stored) = self.inner.backend.pull_order_state(&token).await? else {
            return Ok(());
        };

        let snapshot = stored.snapshot;
        self.inner.sync.observe_server_timestamp(snapshot.last_update);

        let stored_delivery = snapshot.delivery;
        {
            let mut state = self.lock();
            state.order_id = stored.order_id;
            state.ledger.adopt(snapshot.lines);
            state.discounts.restore_selection(snapshot.discounts);

            let local = state.guest.identity_mut();
            merge_field(&mut local.name, snapshot.user_info.name);
            merge_field(&mut local.surname, snapshot.user_info.surname);
            merge_field(&mut local.phone, snapshot.user_info.phone);
            merge_field(&mut local.email, snapshot.user_info.email);
            if !snapshot.user_info.saved_addresses.is_empty() {
                local.saved_addresses = snapshot.user_info.saved_addresses;
            }
            if snapshot.current_address.is_some() {
                state.current_address = snapshot.current_address;
            }
            merge_field(&mut state.comment_for_courier, snapshot.comment_for_courier);
            if snapshot.payment_method.is_some() {
                state.payment_method = snapshot.payment_method;
            }

            if let Some(city) = stored_delivery.destination.clone() {
                state.delivery.set_city(city);
            }
            state.recompute();
        }

        // Re-resolve the stored delivery choice against fresh rates; a
        // selection that is no longer eligible silently stays cleared
        if let Some(city) = stored_delivery.destination {
            self.load_rates(&city).await;
            let mut state = self.lock();
            if let Some(method_id) = stored_delivery.method_id
                && state.delivery.select_method(&method_id).is_ok()
                && let Some(pvz) = stored_delivery.pvz
            {
                let _ = state.delivery.select_pvz(pvz);
            }
            state.recompute();
        }
        Ok(())
    }

    /// Final submission: flush the state immediately and hand off to the
    /// payment step.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` without a token, `StaleWrite` if another
    /// device superseded this order, or `Network` on transport failure.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<CheckoutReceipt, CheckoutError> {
        let Some(token) = self.token_string() else {
            return Err(CheckoutError::MissingIdentity);
        };

        self.inner.sync.cancel_pending();
        let snapshot = {
            let state = self.lock();
            state.build_snapshot(self.inner.sync.next_timestamp())
        };

        let outcome = self
            .inner
            .backend
            .push_order_state(Some(&token), &snapshot)
            .await?;
        if !outcome.accepted {
            self.inner.sync.record_stale_write();
            return Err(CheckoutError::StaleWrite);
        }
        self.inner.sync.observe_server_timestamp(outcome.server_last_update);

        let order_id = outcome.order_id.ok_or_else(|| {
            CheckoutError::Network(ServiceError::Api(
                "pushOrderState: accepted without order id".to_owned(),
            ))
        })?;
        let mut state = self.lock();
        state.order_id = Some(order_id);
        Ok(CheckoutReceipt {
            order_id,
            total: state.breakdown.total,
        })
    }

    /// Pushes the server has rejected as stale this session.
    #[must_use]
    pub fn stale_write_count(&self) -> u64 {
        self.inner.sync.stale_write_count()
    }

    // =========================================================================
    // Cart (immediate request path)
    // =========================================================================

    /// Add `quantity` units of a variant to the cart.
    ///
    /// Applies optimistically, then confirms on the immediate cart path;
    /// the server's cart is adopted wholesale on success, and the local
    /// mutation is rolled back on failure.
    ///
    /// # Errors
    ///
    /// Returns `StockUnavailable` if the catalog cannot cover the
    /// requested quantity, or `Network` if the confirmation fails (after
    /// rollback).
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<LineKey, CheckoutError> {
        let info = self.inner.backend.get_variant(product_id, variant_id).await?;
        if !info.available {
            return Err(CheckoutError::StockUnavailable { available: 0 });
        }

        let (rollback, key, token) = {
            let mut state = self.lock();
            let in_cart = state
                .ledger
                .lines()
                .iter()
                .find(|l| l.product_id == product_id && l.variant_id == variant_id)
                .map_or(0, |l| l.quantity);
            if in_cart + quantity > info.stock_quantity {
                return Err(CheckoutError::StockUnavailable {
                    available: info.stock_quantity,
                });
            }
            let rollback = state.ledger.clone();
            let key = state.ledger.add_or_increment(product_id, variant_id, quantity, &info);
            state.recompute();
            (rollback, key, state.token_string())
        };

        let mutation = CartMutation::Add {
            key: key.clone(),
            product_id,
            variant_id,
            delta: quantity,
        };
        match self.inner.backend.mutate_cart(token.as_deref(), mutation).await {
            Ok(cart) => {
                let mut state = self.lock();
                state.ledger.adopt(cart);
                state.recompute();
                // The server may have re-keyed the optimistic line
                let key = state
                    .ledger
                    .lines()
                    .iter()
                    .find(|l| l.product_id == product_id && l.variant_id == variant_id)
                    .map_or(key, |l| l.key.clone());
                Ok(key)
            }
            Err(e) => {
                self.roll_back_cart(rollback);
                Err(e.into())
            }
        }
    }

    /// Set a line to an absolute quantity; ≤ 0 removes it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLine` for a missing key, `StockUnavailable` when
    /// increasing past stock, or `Network` after rollback.
    #[instrument(skip(self))]
    pub async fn set_line_quantity(&self, key: &LineKey, quantity: i64) -> Result<(), CheckoutError> {
        let line = self
            .lock()
            .ledger
            .line(key)
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownLine(key.clone()))?;

        if quantity > i64::from(line.quantity) {
            let info = self
                .inner
                .backend
                .get_variant(line.product_id, line.variant_id)
                .await?;
            if !info.available || quantity > i64::from(info.stock_quantity) {
                return Err(CheckoutError::StockUnavailable {
                    available: info.stock_quantity,
                });
            }
        }

        let (rollback, token) = {
            let mut state = self.lock();
            let rollback = state.ledger.clone();
            state.ledger.set_quantity(key, quantity);
            state.recompute();
            (rollback, state.token_string())
        };

        let mutation = if quantity <= 0 {
            CartMutation::Remove { key: key.clone() }
        } else {
            CartMutation::SetQuantity {
                key: key.clone(),
                quantity: u32::try_from(quantity).unwrap_or(u32::MAX),
            }
        };
        match self.inner.backend.mutate_cart(token.as_deref(), mutation).await {
            Ok(cart) => {
                let mut state = self.lock();
                state.ledger.adopt(cart);
                state.recompute();
                Ok(())
            }
            Err(e) => {
                self.roll_back_cart(rollback);
                Err(e.into())
            }
        }
    }

    /// Increase a line's quantity by one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_line_quantity`].
    pub async fn increment_line(&self, key: &LineKey) -> Result<(), CheckoutError> {
        let current = self.line_quantity(key)?;
        self.set_line_quantity(key, i64::from(current) + 1).await
    }

    /// Decrease a line's quantity by one; a line at 1 is removed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_line_quantity`].
    pub async fn decrement_line(&self, key: &LineKey) -> Result<(), CheckoutError> {
        let current = self.line_quantity(key)?;
        self.set_line_quantity(key, i64::from(current) - 1).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_line_quantity`].
    pub async fn remove_line(&self, key: &LineKey) -> Result<(), CheckoutError> {
        self.set_line_quantity(key, 0).await
    }

    fn line_quantity(&self, key: &LineKey) -> Result<u32, CheckoutError> {
        self.lock()
            .ledger
            .line(key)
            .map(|l| l.quantity)
            .ok_or_else(|| CheckoutError::UnknownLine(key.clone()))
    }

    fn roll_back_cart(&self, rollback: CartLedger) {
        let mut state = self.lock();
        state.ledger = rollback;
        state.recompute();
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Set the destination city and resolve its delivery rates.
    ///
    /// A failed rate lookup degrades to "no methods available" and does
    /// not error: checkout continues, only method selection is blocked.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` for parity with the other
    /// mutation entry points.
    #[instrument(skip(self), fields(city = %city.id))]
    pub async fn set_city(&self, city: City) -> Result<(), CheckoutError> {
        {
            let mut state = self.lock();
            state.delivery.set_city(city.clone());
            state.recompute();
        }
        self.load_rates(&city).await;
        self.schedule_push();
        Ok(())
    }

    async fn load_rates(&self, city: &City) {
        match self.inner.backend.get_rates_for_city(&city.id).await {
            Ok(rates) => {
                let mut state = self.lock();
                state.delivery.methods_loaded(rates);
                state.recompute();
            }
            Err(e) => {
                tracing::warn!(city = %city.id, error = %e, "rate lookup failed, degrading to no methods");
                let mut state = self.lock();
                state.delivery.methods_unavailable();
                state.recompute();
            }
        }
    }

    /// Choose a delivery method from the eligible set.
    ///
    /// # Errors
    ///
    /// Returns `Validation(MethodNotEligible)` for a method outside the
    /// currently eligible set.
    pub fn select_delivery_method(&self, id: &MethodId) -> Result<(), CheckoutError> {
        {
            let mut state = self.lock();
            state.delivery.select_method(id)?;
            state.recompute();
        }
        self.schedule_push();
        Ok(())
    }

    /// Choose a pickup point for the selected pickup method.
    ///
    /// # Errors
    ///
    /// Returns `Validation(PickupMethodRequired)` unless a pickup method
    /// is selected.
    pub fn select_pickup_point(&self, pvz: PvzPoint) -> Result<(), CheckoutError> {
        {
            let mut state = self.lock();
            state.delivery.select_pvz(pvz)?;
            state.recompute();
        }
        self.schedule_push();
        Ok(())
    }

    // =========================================================================
    // Discounts
    // =========================================================================

    /// Redeem loyalty points against the order.
    ///
    /// # Errors
    ///
    /// Returns `Validation(InsufficientBalance)` or
    /// `Validation(CapExceeded)`; nothing is applied on failure.
    pub fn redeem_points(&self, amount: Money) -> Result<(), CheckoutError> {
        {
            let mut state = self.lock();
            let balance = state.points_balance();
            let goods_sum = state.ledger.goods_sum();
            let tier = state.tier();
            state.discounts.redeem_points(amount, balance, goods_sum, tier)?;
            state.recompute();
        }
        self.schedule_push();
        Ok(())
    }

    /// Cancel the point redemption.
    pub fn cancel_points(&self) {
        {
            let mut state = self.lock();
            state.discounts.cancel_points();
            state.recompute();
        }
        self.schedule_push();
    }

    /// Validate a certificate code against the wallet service and add it
    /// to the session wallet.
    ///
    /// # Errors
    ///
    /// Returns `Validation(CertificateNotFound)` for an unknown code,
    /// `Validation(CertificateExhausted)` / `Validation(CertificateAlreadyAdded)`
    /// from the stack, or `Network` if the wallet lookup fails.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn add_certificate(&self, code: CertificateCode) -> Result<(), CheckoutError> {
        let token = self.token_string();
        let certificate = self
            .inner
            .backend
            .get_certificate(token.as_deref(), &code)
            .await?
            .ok_or(ValidationError::CertificateNotFound(code))?;

        {
            let mut state = self.lock();
            let goods_sum = state.ledger.goods_sum();
            state.discounts.add_certificate(certificate, goods_sum)?;
            state.recompute();
        }
        self.schedule_push();
        Ok(())
    }

    /// Select or deselect a certificate from the session wallet.
    ///
    /// # Errors
    ///
    /// Returns `Validation(CertificateNotFound)` or
    /// `Validation(CertificateExhausted)`.
    pub fn toggle_certificate(&self, code: &CertificateCode) -> Result<(), CheckoutError> {
        {
            let mut state = self.lock();
            state.discounts.toggle_certificate_selection(code)?;
            state.recompute();
        }
        self.schedule_push();
        Ok(())
    }

    // =========================================================================
    // Guest identity
    // =========================================================================

    /// Update the contact fields captured during guest checkout.
    pub fn set_guest_contact(&self, name: &str, surname: &str, phone: &str, email: &str) {
        {
            let mut state = self.lock();
            let identity = state.guest.identity_mut();
            identity.name = name.to_owned();
            identity.surname = surname.to_owned();
            identity.phone = phone.to_owned();
            identity.email = email.to_owned();
        }
        self.schedule_push();
    }

    /// Save a new two-line address into the address book and make it the
    /// current one.
    pub fn save_address(&self, first_line: &str, second_line: &str) {
        let address = format!("{first_line}, {second_line}");
        {
            let mut state = self.lock();
            state.guest.identity_mut().saved_addresses.push(address.clone());
            state.current_address = Some(address);
        }
        self.schedule_push();
    }

    /// Pick one of the saved addresses.
    pub fn select_address(&self, address: String) {
        self.lock().current_address = Some(address);
        self.schedule_push();
    }

    /// Set the free-form courier comment.
    pub fn set_courier_comment(&self, comment: String) {
        self.lock().comment_for_courier = comment;
        self.schedule_push();
    }

    /// Set the payment method, carried opaquely in the order state.
    pub fn set_payment_method(&self, method: Option<String>) {
        self.lock().payment_method = method;
        self.schedule_push();
    }

    /// Request a one-time login code.
    ///
    /// # Errors
    ///
    /// Returns `OtpCooldown` while the resend cooldown runs, or `Network`
    /// if the OTP service call fails.
    #[instrument(skip(self, contact))]
    pub async fn request_login_code(&self, contact: OtpContact) -> Result<u64, CheckoutError> {
        if !self.lock().guest.can_request_code(Instant::now()) {
            return Err(CheckoutError::OtpCooldown);
        }
        let cooldown = self.inner.backend.request_code(&contact).await?;
        self.lock()
            .guest
            .code_requested(contact, cooldown, Instant::now());
        Ok(cooldown)
    }

    /// Submit an entered one-time code.
    ///
    /// On success the session becomes authenticated: the token is stored,
    /// discount selections are cleared (identity change), and a full
    /// reconciliation pull runs. On mismatch or expiry the guest flow
    /// keeps its state so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns `OtpMismatch`, `OtpExpired`, or `Network`.
    #[instrument(skip(self, code))]
    pub async fn submit_login_code(&self, code: &str) -> Result<(), CheckoutError> {
        let Some(contact) = self.lock().guest.contact().cloned() else {
            return Err(CheckoutError::OtpExpired);
        };
        if !GuestFlow::is_submittable_code(code) {
            let mut state = self.lock();
            state.guest.code_rejected(CheckoutError::OtpMismatch.to_string());
            return Err(CheckoutError::OtpMismatch);
        }

        match self.inner.backend.verify_code(&contact, code).await? {
            OtpOutcome::Verified { token } => {
                {
                    let mut state = self.lock();
                    state.token = Some(SecretString::from(token));
                    state.guest.verified();
                    state.discounts.clear_selections();
                    state.recompute();
                }
                self.refresh_identity().await?;
                self.reconcile().await
            }
            OtpOutcome::Mismatch => {
                let mut state = self.lock();
                state.guest.code_rejected(CheckoutError::OtpMismatch.to_string());
                Err(CheckoutError::OtpMismatch)
            }
            OtpOutcome::Expired => {
                let mut state = self.lock();
                state.guest.code_rejected(CheckoutError::OtpExpired.to_string());
                Err(CheckoutError::OtpExpired)
            }
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    /// The current price breakdown.
    #[must_use]
    pub fn price(&self) -> PriceBreakdown {
        self.lock().breakdown.clone()
    }

    /// Snapshot of the current cart lines.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.lock().ledger.snapshot()
    }

    /// Current delivery resolution state.
    #[must_use]
    pub fn delivery_state(&self) -> DeliveryState {
        self.lock().delivery.state()
    }

    /// The derived delivery selection.
    #[must_use]
    pub fn delivery_selection(&self) -> DeliverySelection {
        let state = self.lock();
        state.delivery.selection(state.ledger.goods_sum())
    }

    /// Current guest flow phase.
    #[must_use]
    pub fn guest_phase(&self) -> OtpPhase {
        self.lock().guest.phase()
    }

    /// The guest identity fields as typed so far.
    #[must_use]
    pub fn guest_identity(&self) -> GuestIdentity {
        self.lock().guest.identity().clone()
    }

    /// Whether the session holds an authenticated identity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let state = self.lock();
        state.profile.as_ref().is_some_and(|p| p.authenticated) || state.guest.is_verified()
    }

    /// The order id, once the server has allocated one.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.lock().order_id
    }
}

/// Overwrite `local` only when the server sent a non-empty value.
fn merge_field(local: &mut String, server: String) {
    if !server.is_empty() {
        *local = server;
    }
}

/// Build and send one order-state push. Runs on the debounce task.
async fn push_order_state(inner: &Arc<SessionInner>) {
    let (token, snapshot) = {
        let state = inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (
            state.token_string(),
            state.build_snapshot(inner.sync.next_timestamp()),
        )
    };

    match inner
        .backend
        .push_order_state(token.as_deref(), &snapshot)
        .await
    {
        Ok(PushOutcome {
            accepted: true,
            order_id,
            server_last_update,
        }) => {
            inner.sync.observe_server_timestamp(server_last_update);
            if let Some(order_id) = order_id {
                inner
                    .state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .order_id = Some(order_id);
            }
        }
        Ok(PushOutcome { accepted: false, .. }) => {
            // Another device made a newer edit; our state is already the
            // most recent on this device, so there is nothing to undo
            inner.sync.record_stale_write();
        }
        Err(e) => {
            tracing::warn!(error = %e, "order state push failed, retrying on next mutation");
        }
    }
}
