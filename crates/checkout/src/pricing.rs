//! Price computation.
//!
//! Pure functions only: cart lines + discount selections in, a
//! [`PriceBreakdown`] out. Recomputed on every mutation by the session's
//! recompute pass; nothing here caches or observes anything.
//!
//! All arithmetic is integer minor units. The deduction chain is:
//! goods sum → minus points → minus certificates in selection order →
//! plus delivery → plus non-discountable lines → clamped to
//! [`policy::MIN_CHARGE`].

use marea_core::{CertificateCode, Money};

use crate::policy;
use crate::types::{CartLine, Certificate, DiscountSelection, LoyaltyTier};

/// How much of one selected certificate was applied to this order.
///
/// Order of selection decides which certificate absorbs the remainder when
/// the selected total exceeds the goods sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateApplication {
    /// The certificate.
    pub code: CertificateCode,
    /// Amount deducted from the running price by this certificate.
    pub applied: Money,
}

/// The fully derived price of the current order state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBreakdown {
    /// Sum of discountable line totals.
    pub goods_sum: Money,
    /// Points applied, `min(points_redeemed, goods_sum)`.
    pub points_deduction: Money,
    /// Per-certificate applied amounts, in selection order.
    pub certificate_applications: Vec<CertificateApplication>,
    /// Total deducted by certificates.
    pub certificate_deduction: Money,
    /// Delivery cost as resolved (zero above the free-delivery threshold).
    pub delivery_cost: Money,
    /// Non-discountable line totals (gift certificates in the cart),
    /// added back untouched.
    pub non_discountable_sum: Money,
    /// Final payable amount, never below [`policy::MIN_CHARGE`].
    pub total: Money,
}

impl PriceBreakdown {
    /// The breakdown of an empty order.
    #[must_use]
    pub fn empty() -> Self {
        quote(&[], &DiscountSelection::default(), &[], Money::ZERO)
    }
}

/// Sum of discountable line totals.
#[must_use]
pub fn goods_sum(lines: &[CartLine]) -> Money {
    lines
        .iter()
        .filter(|l| l.is_discountable())
        .map(CartLine::line_total)
        .sum()
}

/// Sum of non-discountable line totals.
#[must_use]
pub fn non_discountable_sum(lines: &[CartLine]) -> Money {
    lines
        .iter()
        .filter(|l| !l.is_discountable())
        .map(CartLine::line_total)
        .sum()
}

/// Maximum points redeemable against a goods sum at a loyalty tier:
/// `floor(goods_sum × tier rate)`.
#[must_use]
pub fn points_cap(goods_sum: Money, tier: LoyaltyTier) -> Money {
    goods_sum.percent_floor(tier.rate_percent())
}

/// Compute the payable price for the given order state.
///
/// Certificates are applied in selection order; each deducts
/// `min(remaining_value, running_price)` and the chain stops once the
/// running price reaches zero. Codes not found in `wallet` contribute
/// nothing (the discount stack validates codes before selection; this
/// keeps the function total).
#[must_use]
pub fn quote(
    lines: &[CartLine],
    selection: &DiscountSelection,
    wallet: &[Certificate],
    delivery_cost: Money,
) -> PriceBreakdown {
    let goods = goods_sum(lines);

    let points_deduction = selection.points_redeemed.min(goods);
    let mut running = goods.saturating_sub(points_deduction);

    let mut certificate_applications = Vec::new();
    let mut certificate_deduction = Money::ZERO;
    for code in &selection.certificate_codes {
        if running.is_zero() {
            break;
        }
        let Some(certificate) = wallet.iter().find(|c| &c.code == code) else {
            continue;
        };
        let applied = certificate.remaining_value.min(running);
        running = running.saturating_sub(applied);
        certificate_deduction += applied;
        certificate_applications.push(CertificateApplication {
            code: code.clone(),
            applied,
        });
    }

    let non_discountable = non_discountable_sum(lines);
    let total = (running + delivery_cost + non_discountable).max(policy::MIN_CHARGE);

    PriceBreakdown {
        goods_sum: goods,
        points_deduction,
        certificate_applications,
        certificate_deduction,
        delivery_cost,
        non_discountable_sum: non_discountable,
        total,
    }
}
