//! Loyalty-point and gift-certificate redemption.
//!
//! Owns the [`DiscountSelection`]; balances come from the identity service
//! and certificate values from the wallet service, both only referenced
//! here. The points cap is re-clamped by the session's recompute pass
//! whenever the goods sum or loyalty tier changes.

use marea_core::{CertificateCode, Money};

use crate::error::ValidationError;
use crate::policy;
use crate::pricing;
use crate::types::{Certificate, DiscountSelection, LoyaltyTier};

/// Redeemed points and selected certificates for the current order.
#[derive(Debug, Clone, Default)]
pub struct DiscountStack {
    points_redeemed: Money,
    wallet: Vec<Certificate>,
    selected: Vec<CertificateCode>,
}

impl DiscountStack {
    /// An empty stack with nothing redeemed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points_redeemed: Money::ZERO,
            wallet: Vec::new(),
            selected: Vec::new(),
        }
    }

    /// Redeem `amount` of points against the order.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` when `amount` exceeds the identity's
    /// balance, or `CapExceeded` when it exceeds
    /// `floor(goods_sum × tier rate)`.
    pub fn redeem_points(
        &mut self,
        amount: Money,
        balance: Money,
        goods_sum: Money,
        tier: LoyaltyTier,
    ) -> Result<(), ValidationError> {
        if amount > balance {
            return Err(ValidationError::InsufficientBalance {
                requested: amount,
                available: balance,
            });
        }
        let cap = pricing::points_cap(goods_sum, tier);
        if amount > cap {
            return Err(ValidationError::CapExceeded {
                requested: amount,
                cap,
            });
        }
        self.points_redeemed = amount;
        Ok(())
    }

    /// Cancel the point redemption.
    pub fn cancel_points(&mut self) {
        self.points_redeemed = Money::ZERO;
    }

    /// Add a wallet-validated certificate to the session wallet.
    ///
    /// Does not select it, unless the goods sum already exceeds its value
    /// and no other certificate is selected
    /// ([`policy::AUTO_SELECT_COVERING_CERTIFICATE`]).
    ///
    /// # Errors
    ///
    /// Returns `CertificateExhausted` for a zero-value certificate or
    /// `CertificateAlreadyAdded` for a duplicate code.
    pub fn add_certificate(
        &mut self,
        certificate: Certificate,
        goods_sum: Money,
    ) -> Result<(), ValidationError> {
        if certificate.remaining_value.is_zero() {
            return Err(ValidationError::CertificateExhausted(certificate.code));
        }
        if self.wallet.iter().any(|c| c.code == certificate.code) {
            return Err(ValidationError::CertificateAlreadyAdded(certificate.code));
        }

        let auto_select = policy::AUTO_SELECT_COVERING_CERTIFICATE
            && self.selected.is_empty()
            && goods_sum > certificate.remaining_value;
        if auto_select {
            self.selected.push(certificate.code.clone());
        }
        self.wallet.push(certificate);
        Ok(())
    }

    /// Select or deselect a certificate. Selection order is preserved and
    /// decides which certificate absorbs the remainder during pricing.
    ///
    /// # Errors
    ///
    /// Returns `CertificateNotFound` for a code not in the session wallet
    /// and `CertificateExhausted` when selecting a zero-value certificate.
    pub fn toggle_certificate_selection(
        &mut self,
        code: &CertificateCode,
    ) -> Result<(), ValidationError> {
        if let Some(pos) = self.selected.iter().position(|c| c == code) {
            self.selected.remove(pos);
            return Ok(());
        }
        let certificate = self
            .wallet
            .iter()
            .find(|c| &c.code == code)
            .ok_or_else(|| ValidationError::CertificateNotFound(code.clone()))?;
        if certificate.remaining_value.is_zero() {
            return Err(ValidationError::CertificateExhausted(code.clone()));
        }
        self.selected.push(code.clone());
        Ok(())
    }

    /// Merge certificates owned by the identity into the session wallet.
    ///
    /// Exhausted and already-known certificates are skipped silently;
    /// nothing gets auto-selected on a bulk merge.
    pub fn merge_wallet(&mut self, certificates: impl IntoIterator<Item = Certificate>) {
        for certificate in certificates {
            if certificate.remaining_value.is_zero()
                || self.wallet.iter().any(|c| c.code == certificate.code)
            {
                continue;
            }
            self.wallet.push(certificate);
        }
    }

    /// Restore a stored selection (initial pull). Codes missing from the
    /// wallet stay selected and simply apply nothing until the wallet
    /// catches up.
    pub fn restore_selection(&mut self, selection: DiscountSelection) {
        self.points_redeemed = selection.points_redeemed;
        self.selected = selection.certificate_codes;
        self.selected.dedup();
    }

    /// Re-clamp the redemption to the current cap, and drop all
    /// selections once the order has no goods left to discount.
    pub fn reclamp(&mut self, goods_sum: Money, balance: Money, tier: LoyaltyTier) {
        if goods_sum.is_zero() {
            self.clear_selections();
            return;
        }
        let cap = pricing::points_cap(goods_sum, tier).min(balance);
        self.points_redeemed = self.points_redeemed.min(cap);
    }

    /// Drop points and certificate selections (identity change, emptied
    /// cart). The wallet itself is kept.
    pub fn clear_selections(&mut self) {
        self.points_redeemed = Money::ZERO;
        self.selected.clear();
    }

    /// Drop everything including the wallet (guest → authenticated
    /// transition must not leak discount state across identities).
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Certificates known to this session.
    #[must_use]
    pub fn wallet(&self) -> &[Certificate] {
        &self.wallet
    }

    /// The current selection, as priced and pushed.
    #[must_use]
    pub fn selection(&self) -> DiscountSelection {
        DiscountSelection {
            points_redeemed: self.points_redeemed,
            certificate_codes: self.selected.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cert(code: &str, value_major: i64) -> Certificate {
        Certificate {
            code: CertificateCode::new(code),
            remaining_value: Money::from_major(value_major),
        }
    }

    #[test]
    fn test_redeem_within_cap() {
        let mut stack = DiscountStack::new();
        // cap = floor(2000 × 10%) = 200
        stack
            .redeem_points(
                Money::from_major(200),
                Money::from_major(500),
                Money::from_major(2000),
                LoyaltyTier::Base,
            )
            .unwrap();
        assert_eq!(stack.selection().points_redeemed, Money::from_major(200));
    }

    #[test]
    fn test_redeem_over_cap_fails() {
        let mut stack = DiscountStack::new();
        let result = stack.redeem_points(
            Money::from_major(300),
            Money::from_major(500),
            Money::from_major(2000),
            LoyaltyTier::Base,
        );
        assert_eq!(
            result,
            Err(ValidationError::CapExceeded {
                requested: Money::from_major(300),
                cap: Money::from_major(200),
            })
        );
        // Nothing applied
        assert_eq!(stack.selection().points_redeemed, Money::ZERO);
    }

    #[test]
    fn test_redeem_over_cap_fails_for_every_tier() {
        let goods = Money::from_major(2000);
        for (tier, cap_major) in [
            (LoyaltyTier::Base, 200),
            (LoyaltyTier::Silver, 300),
            (LoyaltyTier::Gold, 400),
        ] {
            let mut stack = DiscountStack::new();
            let over = Money::from_major(cap_major + 1);
            assert!(
                stack
                    .redeem_points(over, Money::from_major(10_000), goods, tier)
                    .is_err()
            );
            assert!(
                stack
                    .redeem_points(Money::from_major(cap_major), Money::from_major(10_000), goods, tier)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_redeem_over_balance_fails() {
        let mut stack = DiscountStack::new();
        let result = stack.redeem_points(
            Money::from_major(100),
            Money::from_major(50),
            Money::from_major(2000),
            LoyaltyTier::Base,
        );
        assert!(matches!(
            result,
            Err(ValidationError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_cancel_points() {
        let mut stack = DiscountStack::new();
        stack
            .redeem_points(
                Money::from_major(100),
                Money::from_major(500),
                Money::from_major(2000),
                LoyaltyTier::Base,
            )
            .unwrap();
        stack.cancel_points();
        assert_eq!(stack.selection().points_redeemed, Money::ZERO);
    }

    #[test]
    fn test_add_certificate_no_auto_select_when_it_covers_goods() {
        let mut stack = DiscountStack::new();
        // Certificate value ≥ goods sum: no auto-selection
        stack
            .add_certificate(cert("A", 1000), Money::from_major(600))
            .unwrap();
        assert!(stack.selection().certificate_codes.is_empty());
    }

    #[test]
    fn test_add_certificate_auto_selects_when_goods_exceed_value() {
        let mut stack = DiscountStack::new();
        stack
            .add_certificate(cert("A", 500), Money::from_major(600))
            .unwrap();
        assert_eq!(
            stack.selection().certificate_codes,
            vec![CertificateCode::new("A")]
        );

        // A second certificate is never auto-selected
        stack
            .add_certificate(cert("B", 300), Money::from_major(600))
            .unwrap();
        assert_eq!(stack.selection().certificate_codes.len(), 1);
    }

    #[test]
    fn test_add_exhausted_certificate_fails() {
        let mut stack = DiscountStack::new();
        let result = stack.add_certificate(cert("A", 0), Money::from_major(600));
        assert!(matches!(
            result,
            Err(ValidationError::CertificateExhausted(_))
        ));
    }

    #[test]
    fn test_add_duplicate_certificate_fails() {
        let mut stack = DiscountStack::new();
        stack
            .add_certificate(cert("A", 500), Money::ZERO)
            .unwrap();
        let result = stack.add_certificate(cert("A", 500), Money::ZERO);
        assert!(matches!(
            result,
            Err(ValidationError::CertificateAlreadyAdded(_))
        ));
    }

    #[test]
    fn test_toggle_selection_roundtrip_preserves_order() {
        let mut stack = DiscountStack::new();
        stack.merge_wallet([cert("A", 500), cert("B", 300)]);

        stack
            .toggle_certificate_selection(&CertificateCode::new("B"))
            .unwrap();
        stack
            .toggle_certificate_selection(&CertificateCode::new("A"))
            .unwrap();
        assert_eq!(
            stack.selection().certificate_codes,
            vec![CertificateCode::new("B"), CertificateCode::new("A")]
        );

        stack
            .toggle_certificate_selection(&CertificateCode::new("B"))
            .unwrap();
        assert_eq!(
            stack.selection().certificate_codes,
            vec![CertificateCode::new("A")]
        );
    }

    #[test]
    fn test_toggle_unknown_certificate_fails() {
        let mut stack = DiscountStack::new();
        assert!(matches!(
            stack.toggle_certificate_selection(&CertificateCode::new("GHOST")),
            Err(ValidationError::CertificateNotFound(_))
        ));
    }

    #[test]
    fn test_merge_wallet_skips_exhausted_and_duplicates() {
        let mut stack = DiscountStack::new();
        stack.merge_wallet([cert("A", 500), cert("A", 500), cert("B", 0)]);
        assert_eq!(stack.wallet().len(), 1);
    }

    #[test]
    fn test_reclamp_shrinks_redemption_with_goods_sum() {
        let mut stack = DiscountStack::new();
        stack
            .redeem_points(
                Money::from_major(200),
                Money::from_major(500),
                Money::from_major(2000),
                LoyaltyTier::Base,
            )
            .unwrap();

        // Cart shrank: cap is now floor(500 × 10%) = 50
        stack.reclamp(
            Money::from_major(500),
            Money::from_major(500),
            LoyaltyTier::Base,
        );
        assert_eq!(stack.selection().points_redeemed, Money::from_major(50));
    }

    #[test]
    fn test_zero_goods_clears_selections() {
        let mut stack = DiscountStack::new();
        stack.merge_wallet([cert("A", 500)]);
        stack
            .toggle_certificate_selection(&CertificateCode::new("A"))
            .unwrap();
        stack
            .redeem_points(
                Money::from_major(10),
                Money::from_major(500),
                Money::from_major(2000),
                LoyaltyTier::Base,
            )
            .unwrap();

        stack.reclamp(Money::ZERO, Money::from_major(500), LoyaltyTier::Base);

        let selection = stack.selection();
        assert_eq!(selection.points_redeemed, Money::ZERO);
        assert!(selection.certificate_codes.is_empty());
        // Wallet survives; only selections are discount state
        assert_eq!(stack.wallet().len(), 1);
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut stack = DiscountStack::new();
        stack.merge_wallet([cert("A", 500)]);
        stack.reset();
        assert!(stack.wallet().is_empty());
    }
}
