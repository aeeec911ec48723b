//! Domain types for the checkout engine.
//!
//! These are the working-state and wire types shared by the ledger,
//! resolver, discount stack, and synchronizer. Wire types serialize in
//! camelCase to match the storefront JSON API.

use marea_core::{
    CertificateCode, CityId, LineKey, MethodId, Money, OrderId, ProductId, PvzCode, VariantId,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// Cart
// =============================================================================

/// Product class of a cart line.
///
/// Gift certificates bought as cart items are a separate product class:
/// they are excluded from the goods sum, cannot be discounted by points or
/// certificates, and do not require physical delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LineKind {
    /// Regular physical goods, discountable.
    #[default]
    Goods,
    /// A gift certificate purchased as a present.
    GiftCertificate,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Opaque line key, server-assigned or client-generated.
    pub key: LineKey,
    /// Product the line refers to.
    pub product_id: ProductId,
    /// Selected variant (size/color vector entry).
    pub variant_id: VariantId,
    /// Quantity, always ≥ 1. A line that would reach 0 is removed instead.
    pub quantity: u32,
    /// Current unit price.
    pub unit_price: Money,
    /// Pre-sale unit price, when the item is discounted in the catalog.
    pub unit_old_price: Option<Money>,
    /// Product class.
    #[serde(default)]
    pub kind: LineKind,
}

impl CartLine {
    /// Total price of the line (`unit_price × quantity`).
    #[must_use]
    pub const fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Whether points and certificates apply to this line.
    #[must_use]
    pub const fn is_discountable(&self) -> bool {
        matches!(self.kind, LineKind::Goods)
    }

    /// Whether the line needs physical delivery.
    #[must_use]
    pub const fn is_physical(&self) -> bool {
        matches!(self.kind, LineKind::Goods)
    }
}

/// Catalog data for one variant, as returned by the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInfo {
    /// Current unit price.
    pub unit_price: Money,
    /// Pre-sale unit price, if any.
    pub unit_old_price: Option<Money>,
    /// Units currently in stock.
    pub stock_quantity: u32,
    /// Whether the variant can be purchased at all.
    pub available: bool,
    /// Product class of the variant.
    #[serde(default)]
    pub kind: LineKind,
}

/// A cart mutation sent on the immediate (non-debounced) request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum CartMutation {
    /// Add a new line or increase an existing one.
    Add {
        /// Client-generated key for the optimistic line.
        key: LineKey,
        /// Product to add.
        product_id: ProductId,
        /// Variant to add.
        variant_id: VariantId,
        /// Units to add.
        delta: u32,
    },
    /// Set an existing line to an absolute quantity.
    SetQuantity {
        /// Line to change.
        key: LineKey,
        /// New absolute quantity (≥ 1).
        quantity: u32,
    },
    /// Remove a line entirely.
    Remove {
        /// Line to remove.
        key: LineKey,
    },
}

// =============================================================================
// Delivery
// =============================================================================

/// A destination city, as resolved by the address service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// Stable city identifier.
    pub id: CityId,
    /// Display name.
    pub name: String,
    /// Administrative region.
    pub region: String,
}

/// Estimated delivery window in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaRange {
    /// Earliest delivery, in days from dispatch.
    pub min_days: u32,
    /// Latest delivery, in days from dispatch.
    pub max_days: u32,
}

/// One delivery method offered for a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMethod {
    /// Method identifier.
    pub id: MethodId,
    /// Display name.
    pub name: String,
    /// Base delivery cost before free-delivery and PVZ overrides.
    pub base_cost: Money,
    /// Estimated delivery window.
    pub eta: EtaRange,
    /// Express/same-day methods require a metro-area destination.
    pub express: bool,
    /// Whether the method delivers to a pickup point (PVZ).
    pub pickup: bool,
}

/// Per-city rate table from the delivery-rate service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRates {
    /// Methods available for the city.
    pub methods: Vec<DeliveryMethod>,
    /// Whether the city is in a metro area (enables express methods).
    pub is_metro: bool,
}

/// A fixed parcel pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvzPoint {
    /// Point code within the carrier's network.
    pub code: PvzCode,
    /// Street address.
    pub address: String,
    /// Per-point cost; overrides the method's base cost once chosen.
    pub cost: Money,
    /// Opening hours, free-form.
    pub work_time: String,
}

/// The current delivery choice with its derived cost and ETA.
///
/// `cost` and `eta` are always derived by the resolver, never set by the
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySelection {
    /// Chosen method, if any.
    pub method_id: Option<MethodId>,
    /// Destination city, if known.
    pub destination: Option<City>,
    /// Chosen pickup point, for pickup methods.
    pub pvz: Option<PvzPoint>,
    /// Derived delivery window.
    pub eta: Option<EtaRange>,
    /// Derived delivery cost (zero above the free-delivery threshold).
    pub cost: Money,
}

// =============================================================================
// Discounts & identity
// =============================================================================

/// A stored-value gift certificate from the wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Redemption code.
    pub code: CertificateCode,
    /// Value left on the certificate.
    pub remaining_value: Money,
}

/// Loyalty tier of the current identity.
///
/// The tier caps how many points can be redeemed against an order, as a
/// percentage of the goods sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LoyaltyTier {
    /// Entry tier, 10% cap.
    #[default]
    Base,
    /// Mid tier, 15% cap.
    Silver,
    /// Top tier, 20% cap.
    Gold,
}

impl LoyaltyTier {
    /// Redemption cap as a percentage of the goods sum.
    #[must_use]
    pub const fn rate_percent(self) -> u8 {
        match self {
            Self::Base => 10,
            Self::Silver => 15,
            Self::Gold => 20,
        }
    }
}

/// The chosen discount stack: redeemed points plus selected certificates
/// in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiscountSelection {
    /// Points redeemed against the goods sum.
    pub points_redeemed: Money,
    /// Selected certificate codes, insertion-ordered.
    pub certificate_codes: Vec<CertificateCode>,
}

/// Identity data from the identity/session service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    /// Whether the identity is authenticated (vs. an anonymous guest).
    pub authenticated: bool,
    /// Loyalty tier.
    #[serde(default)]
    pub tier: LoyaltyTier,
    /// Redeemable point balance.
    #[serde(default)]
    pub points_balance: Money,
    /// Certificates owned by the identity.
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    /// First name, when known.
    #[serde(default)]
    pub name: String,
    /// Surname, when known.
    #[serde(default)]
    pub surname: String,
    /// Phone, when known.
    #[serde(default)]
    pub phone: String,
    /// Email, when known.
    #[serde(default)]
    pub email: String,
}

/// Identity fields captured during guest checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestIdentity {
    /// First name.
    pub name: String,
    /// Surname.
    pub surname: String,
    /// Phone, as typed.
    pub phone: String,
    /// Email, as typed.
    pub email: String,
    /// Saved delivery addresses.
    pub saved_addresses: Vec<String>,
}

/// Where a one-time login code is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OtpContact {
    /// Code sent by SMS.
    Phone(marea_core::Phone),
    /// Code sent by email.
    Email(marea_core::Email),
}

impl std::fmt::Display for OtpContact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phone(phone) => write!(f, "{phone}"),
            Self::Email(email) => write!(f, "{email}"),
        }
    }
}

/// Result of a one-time-code verification attempt.
#[derive(Debug, Clone)]
pub enum OtpOutcome {
    /// Code accepted; the identity token for the session.
    Verified {
        /// Token identifying the now-authenticated session.
        token: String,
    },
    /// Code did not match.
    Mismatch,
    /// Code expired before submission.
    Expired,
}

// =============================================================================
// Order state
// =============================================================================

/// The serializable union of the working order state.
///
/// Constructed for every push, sent with a monotonic `last_update`
/// timestamp, and discarded after acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    /// Cart lines.
    #[serde(default)]
    pub lines: Vec<CartLine>,
    /// Discount selections.
    #[serde(default)]
    pub discounts: DiscountSelection,
    /// Delivery selection, with derived cost and ETA.
    #[serde(default)]
    pub delivery: DeliverySelection,
    /// Guest identity fields.
    #[serde(default)]
    pub user_info: GuestIdentity,
    /// Currently chosen saved address.
    #[serde(default)]
    pub current_address: Option<String>,
    /// Free-form note for the courier.
    #[serde(default)]
    pub comment_for_courier: String,
    /// Chosen payment method, carried opaquely.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Wall-clock seconds at push time, strictly increasing per session.
    pub last_update: i64,
}

/// A stored order pulled from the server on initial load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrder {
    /// The stored snapshot.
    pub snapshot: OrderSnapshot,
    /// Order id, once the server has allocated one.
    pub order_id: Option<OrderId>,
}

/// Server response to a state push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    /// Whether the push was applied. `false` means the push was stale.
    pub accepted: bool,
    /// Order id, once allocated.
    pub order_id: Option<OrderId>,
    /// The server's latest accepted timestamp.
    pub server_last_update: i64,
}

/// Terminal result of [`crate::CheckoutSession::submit`]: what the payment
/// step needs.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    /// The order being paid for.
    pub order_id: OrderId,
    /// Final payable total.
    pub total: Money,
}
