//! Delivery resolution state machine.
//!
//! `Unresolved → CityKnown → MethodsLoaded → MethodSelected`, driven by the
//! destination city, the per-city rate table, and the user's method choice.
//! The resolver is synchronous and holds no I/O: the session performs the
//! rate lookup and feeds the result in, so a failed lookup degrades to an
//! empty method list instead of blocking checkout.
//!
//! Cost and ETA are always derived here, never assigned by callers.

use marea_core::{MethodId, Money};

use crate::error::ValidationError;
use crate::policy;
use crate::types::{City, CityRates, DeliveryMethod, DeliverySelection, EtaRange, PvzPoint};

/// Resolution progress for the current destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// No destination known (or the cart needs no delivery).
    Unresolved,
    /// Destination set; rates not loaded (lookup pending or failed).
    CityKnown,
    /// Rate table loaded; no method chosen yet.
    MethodsLoaded,
    /// A method (and possibly a pickup point) is chosen.
    MethodSelected,
}

/// Destination, rate table, and method choice for the order.
#[derive(Debug, Clone)]
pub struct DeliveryResolver {
    state: DeliveryState,
    city: Option<City>,
    is_metro: bool,
    methods: Vec<DeliveryMethod>,
    selected: Option<MethodId>,
    pvz: Option<PvzPoint>,
}

impl Default for DeliveryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryResolver {
    /// A resolver with no destination.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DeliveryState::Unresolved,
            city: None,
            is_metro: false,
            methods: Vec::new(),
            selected: None,
            pvz: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        self.state
    }

    /// The destination city, if set.
    #[must_use]
    pub const fn city(&self) -> Option<&City> {
        self.city.as_ref()
    }

    /// Set (or change) the destination city.
    ///
    /// Any previously loaded rate table and selection belong to the old
    /// city and are dropped; state moves to `CityKnown` until new rates
    /// arrive.
    pub fn set_city(&mut self, city: City) {
        self.city = Some(city);
        self.is_metro = false;
        self.methods.clear();
        self.selected = None;
        self.pvz = None;
        self.state = DeliveryState::CityKnown;
    }

    /// Feed in the rate table for the current city.
    pub fn methods_loaded(&mut self, rates: CityRates) {
        if self.city.is_none() {
            return;
        }
        self.methods = rates.methods;
        self.is_metro = rates.is_metro;
        self.selected = None;
        self.pvz = None;
        self.state = DeliveryState::MethodsLoaded;
    }

    /// Record that the rate lookup failed.
    ///
    /// Stays at `CityKnown` with no methods; checkout is not blocked, but
    /// no delivery method can be finalized until a later lookup succeeds.
    pub fn methods_unavailable(&mut self) {
        if self.city.is_none() {
            return;
        }
        self.methods.clear();
        self.selected = None;
        self.pvz = None;
        self.state = DeliveryState::CityKnown;
    }

    /// Methods eligible for the current city. Express methods are offered
    /// only in metro-area cities.
    pub fn eligible_methods(&self) -> impl Iterator<Item = &DeliveryMethod> {
        self.methods
            .iter()
            .filter(|m| !m.express || self.is_metro)
    }

    /// Choose a delivery method from the eligible set.
    ///
    /// # Errors
    ///
    /// Returns `MethodNotEligible` if the method is unknown for this city
    /// or express-only while the city is not a metro area.
    pub fn select_method(&mut self, id: &MethodId) -> Result<(), ValidationError> {
        if self.state == DeliveryState::Unresolved || self.state == DeliveryState::CityKnown {
            return Err(ValidationError::MethodNotEligible(id.clone()));
        }
        if !self.eligible_methods().any(|m| &m.id == id) {
            return Err(ValidationError::MethodNotEligible(id.clone()));
        }
        self.selected = Some(id.clone());
        self.pvz = None;
        self.state = DeliveryState::MethodSelected;
        Ok(())
    }

    /// Choose a pickup point for the selected pickup method.
    ///
    /// # Errors
    ///
    /// Returns `PickupMethodRequired` unless the currently selected method
    /// delivers to pickup points.
    pub fn select_pvz(&mut self, pvz: PvzPoint) -> Result<(), ValidationError> {
        if !self.selected_method().is_some_and(|m| m.pickup) {
            return Err(ValidationError::PickupMethodRequired);
        }
        self.pvz = Some(pvz);
        Ok(())
    }

    /// Re-check the current selection after a cart or city change.
    ///
    /// A cart with no physical goods needs no delivery at all: state is
    /// forced back to `Unresolved` and every field is cleared. Otherwise,
    /// if the selected method fell out of the eligible set (e.g. the
    /// express option disappeared with a city change), the selection is
    /// cleared and state regresses to `MethodsLoaded`.
    pub fn revalidate(&mut self, has_physical_goods: bool) {
        if !has_physical_goods {
            *self = Self::new();
            return;
        }
        if self.state != DeliveryState::MethodSelected {
            return;
        }
        let still_eligible = self
            .selected
            .as_ref()
            .is_some_and(|id| self.methods.iter().any(|m| &m.id == id && (!m.express || self.is_metro)));
        if !still_eligible {
            self.selected = None;
            self.pvz = None;
            self.state = DeliveryState::MethodsLoaded;
        }
    }

    /// The selected method, if any.
    #[must_use]
    pub fn selected_method(&self) -> Option<&DeliveryMethod> {
        let id = self.selected.as_ref()?;
        self.methods.iter().find(|m| &m.id == id)
    }

    /// Derived delivery cost for the given goods sum.
    ///
    /// Zero when no method is selected or the goods sum clears the
    /// free-delivery threshold; otherwise the chosen pickup point's cost
    /// when one is set, else the method's base cost.
    #[must_use]
    pub fn cost(&self, goods_sum: Money) -> Money {
        let Some(method) = self.selected_method() else {
            return Money::ZERO;
        };
        if goods_sum >= policy::FREE_DELIVERY_THRESHOLD {
            return Money::ZERO;
        }
        self.pvz
            .as_ref()
            .map_or(method.base_cost, |point| point.cost)
    }

    /// Derived delivery window. Reported even when delivery is free.
    #[must_use]
    pub fn eta(&self) -> Option<EtaRange> {
        self.selected_method().map(|m| m.eta)
    }

    /// The derived selection for snapshots.
    #[must_use]
    pub fn selection(&self, goods_sum: Money) -> DeliverySelection {
        DeliverySelection {
            method_id: self.selected.clone(),
            destination: self.city.clone(),
            pvz: self.pvz.clone(),
            eta: self.eta(),
            cost: self.cost(goods_sum),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marea_core::{CityId, PvzCode};

    use super::*;

    fn city(id: &str, name: &str) -> City {
        City {
            id: CityId::new(id),
            name: name.to_owned(),
            region: "Region".to_owned(),
        }
    }

    fn method(id: &str, cost_major: i64, express: bool, pickup: bool) -> DeliveryMethod {
        DeliveryMethod {
            id: MethodId::new(id),
            name: id.to_owned(),
            base_cost: Money::from_major(cost_major),
            eta: EtaRange {
                min_days: 1,
                max_days: 3,
            },
            express,
            pickup,
        }
    }

    fn metro_rates() -> CityRates {
        CityRates {
            methods: vec![
                method("courier", 35, false, false),
                method("express", 90, true, false),
                method("pvz", 25, false, true),
            ],
            is_metro: true,
        }
    }

    fn loaded_resolver() -> DeliveryResolver {
        let mut resolver = DeliveryResolver::new();
        resolver.set_city(city("msk", "Москва"));
        resolver.methods_loaded(metro_rates());
        resolver
    }

    #[test]
    fn test_transitions_to_city_known_then_methods_loaded() {
        let mut resolver = DeliveryResolver::new();
        assert_eq!(resolver.state(), DeliveryState::Unresolved);

        resolver.set_city(city("msk", "Москва"));
        assert_eq!(resolver.state(), DeliveryState::CityKnown);

        resolver.methods_loaded(metro_rates());
        assert_eq!(resolver.state(), DeliveryState::MethodsLoaded);
    }

    #[test]
    fn test_lookup_failure_degrades_to_city_known() {
        let mut resolver = loaded_resolver();
        resolver.set_city(city("tver", "Тверь"));
        resolver.methods_unavailable();
        assert_eq!(resolver.state(), DeliveryState::CityKnown);
        assert_eq!(resolver.eligible_methods().count(), 0);
        // Cannot finalize a method with no rate table
        assert!(resolver.select_method(&MethodId::new("courier")).is_err());
    }

    #[test]
    fn test_express_needs_metro() {
        let mut resolver = DeliveryResolver::new();
        resolver.set_city(city("tver", "Тверь"));
        resolver.methods_loaded(CityRates {
            methods: vec![
                method("courier", 35, false, false),
                method("express", 90, true, false),
            ],
            is_metro: false,
        });

        assert_eq!(resolver.eligible_methods().count(), 1);
        assert!(matches!(
            resolver.select_method(&MethodId::new("express")),
            Err(ValidationError::MethodNotEligible(_))
        ));
        assert!(resolver.select_method(&MethodId::new("courier")).is_ok());
    }

    #[test]
    fn test_city_change_clears_selection_and_regresses() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("express")).unwrap();
        assert_eq!(resolver.state(), DeliveryState::MethodSelected);

        // Move to a non-metro city: rates reload without the express flag
        resolver.set_city(city("tver", "Тверь"));
        resolver.methods_loaded(CityRates {
            methods: vec![
                method("courier", 35, false, false),
                method("express", 90, true, false),
            ],
            is_metro: false,
        });

        assert_eq!(resolver.state(), DeliveryState::MethodsLoaded);
        assert!(resolver.selected_method().is_none());
        assert_eq!(resolver.cost(Money::from_major(100)), Money::ZERO);
    }

    #[test]
    fn test_revalidate_drops_no_longer_eligible_method() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("express")).unwrap();

        // Metro flag flips off (e.g., refreshed rates downgraded the city)
        resolver.is_metro = false;
        resolver.revalidate(true);

        assert_eq!(resolver.state(), DeliveryState::MethodsLoaded);
        assert!(resolver.selected_method().is_none());
    }

    #[test]
    fn test_revalidate_keeps_eligible_selection() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("courier")).unwrap();
        resolver.revalidate(true);
        assert_eq!(resolver.state(), DeliveryState::MethodSelected);
    }

    #[test]
    fn test_digital_only_cart_forces_unresolved() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("courier")).unwrap();

        resolver.revalidate(false);

        assert_eq!(resolver.state(), DeliveryState::Unresolved);
        let selection = resolver.selection(Money::ZERO);
        assert!(selection.method_id.is_none());
        assert!(selection.destination.is_none());
        assert_eq!(selection.cost, Money::ZERO);
    }

    #[test]
    fn test_free_delivery_threshold() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("courier")).unwrap();

        let below = policy::FREE_DELIVERY_THRESHOLD.saturating_sub(Money::from_minor(1));
        assert_eq!(resolver.cost(below), Money::from_major(35));
        assert_eq!(resolver.cost(policy::FREE_DELIVERY_THRESHOLD), Money::ZERO);
        // ETA still reported when delivery is free
        assert!(resolver.eta().is_some());
    }

    #[test]
    fn test_pvz_cost_overrides_method_cost() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("pvz")).unwrap();
        assert_eq!(resolver.cost(Money::from_major(100)), Money::from_major(25));

        resolver
            .select_pvz(PvzPoint {
                code: PvzCode::new("PVZ-77"),
                address: "ул. Морская, 12".to_owned(),
                cost: Money::from_major(19),
                work_time: "10:00-22:00".to_owned(),
            })
            .unwrap();
        assert_eq!(resolver.cost(Money::from_major(100)), Money::from_major(19));
    }

    #[test]
    fn test_pvz_requires_pickup_method() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("courier")).unwrap();
        let result = resolver.select_pvz(PvzPoint {
            code: PvzCode::new("PVZ-77"),
            address: "ул. Морская, 12".to_owned(),
            cost: Money::from_major(19),
            work_time: "10:00-22:00".to_owned(),
        });
        assert!(matches!(result, Err(ValidationError::PickupMethodRequired)));
    }

    #[test]
    fn test_selection_is_fully_derived() {
        let mut resolver = loaded_resolver();
        resolver.select_method(&MethodId::new("courier")).unwrap();
        let selection = resolver.selection(Money::from_major(100));
        assert_eq!(selection.method_id, Some(MethodId::new("courier")));
        assert_eq!(selection.cost, Money::from_major(35));
        assert_eq!(
            selection.eta,
            Some(EtaRange {
                min_days: 1,
                max_days: 3
            })
        );
    }
}
