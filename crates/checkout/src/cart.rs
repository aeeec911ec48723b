//! The cart ledger: authoritative local list of cart lines.
//!
//! The ledger owns `CartLine` lifecycle. Mutations are local-first: callers
//! apply them immediately, then reconcile with the server on the immediate
//! request path; on failure the session restores a pre-mutation snapshot of
//! the whole ledger, so a rejected mutation leaves no partial state behind.

use marea_core::{LineKey, Money, ProductId, VariantId};

use crate::types::{CartLine, LineKind, VariantInfo};

/// Ordered list of cart lines with quantity invariants.
///
/// A line's quantity is always ≥ 1; any mutation that would drive it to 0
/// removes the line instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartLedger {
    lines: Vec<CartLine>,
}

impl CartLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add `delta` units of a variant, merging into an existing line for
    /// the same product+variant if one exists.
    ///
    /// Repeated calls with the same delta accumulate; this never no-ops.
    /// Returns the key of the affected line. For a new line the key is
    /// client-generated and replaced by the server-assigned key when the
    /// authoritative cart is adopted.
    pub fn add_or_increment(
        &mut self,
        product_id: ProductId,
        variant_id: VariantId,
        delta: u32,
        info: &VariantInfo,
    ) -> LineKey {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.variant_id == variant_id)
        {
            line.quantity += delta;
            line.unit_price = info.unit_price;
            line.unit_old_price = info.unit_old_price;
            return line.key.clone();
        }

        let key = LineKey::generate();
        self.lines.push(CartLine {
            key: key.clone(),
            product_id,
            variant_id,
            quantity: delta.max(1),
            unit_price: info.unit_price,
            unit_old_price: info.unit_old_price,
            kind: info.kind,
        });
        key
    }

    /// Set a line to an absolute quantity. `qty` ≤ 0 removes the line.
    ///
    /// Returns `false` if the key does not exist.
    pub fn set_quantity(&mut self, key: &LineKey, qty: i64) -> bool {
        if qty <= 0 {
            return self.remove(key);
        }
        match self.lines.iter_mut().find(|l| &l.key == key) {
            Some(line) => {
                // qty > 0 and bounded by stock checks upstream
                line.quantity = u32::try_from(qty).unwrap_or(u32::MAX);
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns `false` if the key does not exist.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.key != key);
        self.lines.len() != before
    }

    /// Replace the whole ledger with the authoritative server cart.
    pub fn adopt(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
        // The server should never store zero-quantity lines, but adopting
        // is the one place foreign data enters the ledger
        self.lines.retain(|l| l.quantity >= 1);
    }

    /// Look up a line by key.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.key == key)
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Clone of the current lines for a snapshot or rollback point.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of discountable (goods-class) line totals.
    #[must_use]
    pub fn goods_sum(&self) -> Money {
        self.lines
            .iter()
            .filter(|l| l.is_discountable())
            .map(CartLine::line_total)
            .sum()
    }

    /// Whether any line needs physical delivery.
    #[must_use]
    pub fn has_physical_goods(&self) -> bool {
        self.lines.iter().any(CartLine::is_physical)
    }

    /// Whether the cart is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn goods(price: i64) -> VariantInfo {
        VariantInfo {
            unit_price: Money::from_major(price),
            unit_old_price: None,
            stock_quantity: 10,
            available: true,
            kind: LineKind::Goods,
        }
    }

    #[test]
    fn test_add_merges_same_variant() {
        let mut ledger = CartLedger::new();
        let key1 = ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 2, &goods(100));
        let key2 = ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));
        assert_eq!(key1, key2);
        assert_eq!(ledger.lines().len(), 1);
        assert_eq!(ledger.total_quantity(), 3);
    }

    #[test]
    fn test_add_separate_variants_are_separate_lines() {
        let mut ledger = CartLedger::new();
        ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));
        ledger.add_or_increment(ProductId::new(1), VariantId::new(2), 1, &goods(100));
        assert_eq!(ledger.lines().len(), 2);
    }

    #[test]
    fn test_increment_then_decrement_restores_prior_state() {
        let mut ledger = CartLedger::new();
        let key = ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 2, &goods(100));
        let before = ledger.clone();

        ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));
        assert_eq!(ledger.line(&key).unwrap().quantity, 3);

        ledger.set_quantity(&key, 2);
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut ledger = CartLedger::new();
        let key = ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));
        assert!(ledger.set_quantity(&key, 0));
        assert!(ledger.is_empty());
        assert!(ledger.line(&key).is_none());
    }

    #[test]
    fn test_set_quantity_unknown_key() {
        let mut ledger = CartLedger::new();
        assert!(!ledger.set_quantity(&LineKey::new("missing"), 2));
    }

    #[test]
    fn test_remove() {
        let mut ledger = CartLedger::new();
        let key = ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));
        assert!(ledger.remove(&key));
        assert!(!ledger.remove(&key));
    }

    #[test]
    fn test_adopt_replaces_and_drops_zero_quantity() {
        let mut ledger = CartLedger::new();
        ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 1, &goods(100));

        ledger.adopt(vec![
            CartLine {
                key: LineKey::new("srv-1"),
                product_id: ProductId::new(2),
                variant_id: VariantId::new(1),
                quantity: 2,
                unit_price: Money::from_major(50),
                unit_old_price: None,
                kind: LineKind::Goods,
            },
            CartLine {
                key: LineKey::new("srv-2"),
                product_id: ProductId::new(3),
                variant_id: VariantId::new(1),
                quantity: 0,
                unit_price: Money::from_major(10),
                unit_old_price: None,
                kind: LineKind::Goods,
            },
        ]);

        assert_eq!(ledger.lines().len(), 1);
        assert_eq!(ledger.lines()[0].key, LineKey::new("srv-1"));
    }

    #[test]
    fn test_goods_sum_excludes_gift_certificates() {
        let mut ledger = CartLedger::new();
        ledger.add_or_increment(ProductId::new(1), VariantId::new(1), 2, &goods(100));
        ledger.add_or_increment(
            ProductId::new(9),
            VariantId::new(1),
            1,
            &VariantInfo {
                unit_price: Money::from_major(5000),
                unit_old_price: None,
                stock_quantity: 99,
                available: true,
                kind: LineKind::GiftCertificate,
            },
        );
        assert_eq!(ledger.goods_sum(), Money::from_major(200));
        assert!(ledger.has_physical_goods());
    }

    #[test]
    fn test_certificate_only_cart_has_no_physical_goods() {
        let mut ledger = CartLedger::new();
        ledger.add_or_increment(
            ProductId::new(9),
            VariantId::new(1),
            1,
            &VariantInfo {
                unit_price: Money::from_major(3000),
                unit_old_price: None,
                stock_quantity: 99,
                available: true,
                kind: LineKind::GiftCertificate,
            },
        );
        assert!(!ledger.has_physical_goods());
        assert_eq!(ledger.goods_sum(), Money::ZERO);
    }
}
