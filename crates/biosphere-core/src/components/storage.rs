//! Storage capability: bounded currency balances.

use biosphere_logic::units::{Dimension, Unit};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::currency::{ClassId, CurrencyId, CurrencyRegistry, View};
use crate::error::StorageError;

/// Per-member capacity of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub value: f64,
    pub unit: Unit,
}

/// Balances and capacities of a storage-capable agent.
///
/// Capacities are per member; the effective bound of a balance is
/// `capacity * multiplicity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub capacities: IndexMap<CurrencyId, Capacity>,
    pub balances: IndexMap<CurrencyId, f64>,
    /// Sum of member capacities per class.
    pub class_capacities: IndexMap<ClassId, f64>,
    /// Gas volume (m3), when the storage holds an atmosphere.
    pub volume: Option<f64>,
}

impl Storage {
    pub fn new(volume: Option<f64>) -> Self {
        Self {
            volume,
            ..Default::default()
        }
    }

    /// Declare a capacity; the balance starts at zero.
    pub fn add_capacity(&mut self, registry: &CurrencyRegistry, currency: CurrencyId, capacity: Capacity) {
        self.capacities.insert(currency, capacity);
        self.balances.entry(currency).or_insert(0.0);
        let class = registry.currency(currency).class;
        *self.class_capacities.entry(class).or_insert(0.0) += capacity.value;
    }

    pub fn has(&self, currency: CurrencyId) -> bool {
        self.capacities.contains_key(&currency)
    }

    pub fn balance(&self, currency: CurrencyId) -> f64 {
        self.balances.get(&currency).copied().unwrap_or(0.0)
    }

    /// Effective capacity for `multiplicity` members.
    pub fn capacity(&self, currency: CurrencyId, multiplicity: u32) -> f64 {
        self.capacities
            .get(&currency)
            .map(|c| c.value * multiplicity as f64)
            .unwrap_or(0.0)
    }

    pub fn unit(&self, currency: CurrencyId) -> Option<Unit> {
        self.capacities.get(&currency).map(|c| c.unit)
    }

    /// Room left before `currency` hits capacity.
    pub fn headroom(&self, currency: CurrencyId, multiplicity: u32) -> f64 {
        (self.capacity(currency, multiplicity) - self.balance(currency)).max(0.0)
    }

    /// Sum of balances of the view's members held here.
    pub fn view_total(&self, registry: &CurrencyRegistry, view: View) -> f64 {
        registry
            .members(view)
            .iter()
            .filter_map(|c| self.balances.get(c))
            .sum()
    }

    /// Set a balance directly, clamped to `[0, capacity * multiplicity]`.
    pub fn set_balance(&mut self, currency: CurrencyId, value: f64, multiplicity: u32) {
        let cap = self.capacity(currency, multiplicity);
        if let Some(b) = self.balances.get_mut(&currency) {
            *b = value.clamp(0.0, cap.max(0.0));
        }
    }

    /// Deposit (`amount > 0`) or withdraw (`amount < 0`).
    ///
    /// Deposits must name one currency and are cut at capacity. Withdrawals
    /// may name a class; they are spread over member currencies in
    /// proportion to their balances and never drive the view below zero.
    /// A balance left above a shrunken `capacity * multiplicity` is cut back
    /// to it. Returns the signed change per currency.
    pub fn increment(
        &mut self,
        registry: &CurrencyRegistry,
        view: View,
        amount: f64,
        multiplicity: u32,
    ) -> Result<Vec<(CurrencyId, f64)>, StorageError> {
        if amount > 0.0 {
            let currency = match view {
                View::Currency(c) => c,
                View::Class(_) => return Err(StorageError::ClassDeposit(registry.name(view).to_string())),
            };
            if !self.has(currency) {
                return Err(StorageError::NoCapacity(registry.name(view).to_string()));
            }
            let cap = self.capacity(currency, multiplicity);
            let old = self.balance(currency);
            let new = (old + amount).min(cap);
            self.balances.insert(currency, new);
            Ok(vec![(currency, new - old)])
        } else if amount < 0.0 {
            let members: Vec<(CurrencyId, f64, f64)> = registry
                .members(view)
                .iter()
                .filter_map(|c| self.balances.get(c).map(|b| (*c, *b, self.capacity(*c, multiplicity))))
                .collect();
            let total: f64 = members.iter().map(|(_, b, _)| b.max(0.0)).sum();
            if total <= 0.0 {
                return Ok(members.into_iter().map(|(c, _, _)| (c, 0.0)).collect());
            }
            let take = (-amount).min(total);
            let deltas = members
                .into_iter()
                .map(|(c, old, cap)| {
                    let share = take * old.max(0.0) / total;
                    let new = (old - share).clamp(0.0, cap.max(0.0));
                    self.balances.insert(c, new);
                    (c, new - old)
                })
                .collect();
            Ok(deltas)
        } else {
            Ok(Vec::new())
        }
    }

    /// Fraction of each currency in the total stored amount of its
    /// dimension, after converting to base units.
    pub fn ratios(&self) -> Vec<(CurrencyId, f64)> {
        let mut totals: IndexMap<Dimension, f64> = IndexMap::new();
        for (c, cap) in &self.capacities {
            *totals.entry(cap.unit.dimension()).or_insert(0.0) += cap.unit.to_base(self.balance(*c));
        }
        self.capacities
            .iter()
            .map(|(c, cap)| {
                let value = cap.unit.to_base(self.balance(*c));
                let total = totals.get(&cap.unit.dimension()).copied().unwrap_or(0.0);
                let ratio = if value > 0.0 && total > 0.0 { value / total } else { 0.0 };
                (*c, ratio)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CurrencyClassDesc, CurrencyDesc};
    use proptest::prelude::*;

    fn registry() -> CurrencyRegistry {
        CurrencyRegistry::from_config(&[
            CurrencyClassDesc {
                name: "atmosphere".into(),
                currencies: vec![
                    CurrencyDesc { name: "o2".into(), unit: Unit::Kilogram },
                    CurrencyDesc { name: "co2".into(), unit: Unit::Kilogram },
                    CurrencyDesc { name: "n2".into(), unit: Unit::Kilogram },
                ],
            },
            CurrencyClassDesc {
                name: "water".into(),
                currencies: vec![CurrencyDesc { name: "potable".into(), unit: Unit::Liter }],
            },
        ])
    }

    fn atmosphere(reg: &CurrencyRegistry, o2: f64, co2: f64, n2: f64) -> Storage {
        let mut s = Storage::new(Some(10.0));
        for (name, balance) in [("o2", o2), ("co2", co2), ("n2", n2)] {
            let id = reg.currency_id(name).unwrap();
            s.add_capacity(reg, id, Capacity { value: 100.0, unit: Unit::Kilogram });
            s.balances.insert(id, balance);
        }
        s
    }

    #[test]
    fn test_class_capacity_is_sum_of_members() {
        let reg = registry();
        let s = atmosphere(&reg, 0.0, 0.0, 0.0);
        assert_eq!(s.class_capacities[&ClassId(0)], 300.0);
    }

    #[test]
    fn test_deposit_capped_at_capacity() {
        let reg = registry();
        let mut s = atmosphere(&reg, 95.0, 0.0, 0.0);
        let o2 = reg.currency_id("o2").unwrap();
        let delta = s.increment(&reg, View::Currency(o2), 10.0, 1).unwrap();
        assert_eq!(delta, vec![(o2, 5.0)]);
        assert_eq!(s.balance(o2), 100.0);
        // Multiplicity scales the bound
        let delta = s.increment(&reg, View::Currency(o2), 10.0, 2).unwrap();
        assert_eq!(delta, vec![(o2, 10.0)]);
    }

    #[test]
    fn test_balance_cut_back_after_multiplicity_shrinks() {
        let reg = registry();
        let mut s = atmosphere(&reg, 0.0, 0.0, 0.0);
        let o2 = reg.currency_id("o2").unwrap();
        s.increment(&reg, View::Currency(o2), 150.0, 2).unwrap();
        assert_eq!(s.balance(o2), 150.0);

        // One of two members is gone: a deposit finds the bound at 100
        let delta = s.increment(&reg, View::Currency(o2), 10.0, 1).unwrap();
        assert_eq!(delta, vec![(o2, -50.0)]);
        assert_eq!(s.balance(o2), 100.0);

        // Withdrawals are cut back the same way
        s.balances.insert(o2, 150.0);
        s.increment(&reg, View::Currency(o2), -10.0, 1).unwrap();
        assert_eq!(s.balance(o2), 100.0);
    }

    #[test]
    fn test_deposit_to_class_is_rejected() {
        let reg = registry();
        let mut s = atmosphere(&reg, 0.0, 0.0, 0.0);
        let err = s.increment(&reg, View::Class(ClassId(0)), 1.0, 1).unwrap_err();
        assert_eq!(err, StorageError::ClassDeposit("atmosphere".into()));
    }

    #[test]
    fn test_withdraw_from_empty_view() {
        let reg = registry();
        let mut s = atmosphere(&reg, 0.0, 0.0, 0.0);
        let delta = s.increment(&reg, View::Class(ClassId(0)), -5.0, 1).unwrap();
        assert!(delta.iter().all(|(_, d)| *d == 0.0));
    }

    #[test]
    fn test_withdraw_more_than_available() {
        let reg = registry();
        let mut s = atmosphere(&reg, 3.0, 1.0, 0.0);
        let delta = s.increment(&reg, View::Class(ClassId(0)), -10.0, 1).unwrap();
        let total: f64 = delta.iter().map(|(_, d)| d).sum();
        assert!((total + 4.0).abs() < 1e-12);
        assert_eq!(s.view_total(&reg, View::Class(ClassId(0))), 0.0);
    }

    #[test]
    fn test_ratios_by_dimension() {
        let reg = registry();
        let mut s = atmosphere(&reg, 21.0, 0.0, 79.0);
        let potable = reg.currency_id("potable").unwrap();
        s.add_capacity(&reg, potable, Capacity { value: 1000.0, unit: Unit::Liter });
        s.balances.insert(potable, 500.0);
        let ratios: IndexMap<CurrencyId, f64> = s.ratios().into_iter().collect();
        assert!((ratios[&reg.currency_id("o2").unwrap()] - 0.21).abs() < 1e-12);
        assert_eq!(ratios[&reg.currency_id("co2").unwrap()], 0.0);
        // Water is alone in its dimension
        assert!((ratios[&potable] - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_balance_stays_in_bounds(
            start in 0.0f64..100.0,
            amounts in proptest::collection::vec(-150.0f64..150.0, 1..40),
            multiplicity in 1u32..4,
        ) {
            let reg = registry();
            let o2 = reg.currency_id("o2").unwrap();
            let mut s = atmosphere(&reg, start, 0.0, 0.0);
            for amount in amounts {
                s.increment(&reg, View::Currency(o2), amount, multiplicity).unwrap();
                let b = s.balance(o2);
                prop_assert!(b >= 0.0);
                prop_assert!(b <= 100.0 * multiplicity as f64 + 1e-9);
            }
        }

        #[test]
        fn prop_class_withdrawal_is_proportional(
            o2 in 0.0f64..100.0,
            co2 in 0.0f64..100.0,
            n2 in 0.0f64..100.0,
            request in 0.01f64..400.0,
        ) {
            let reg = registry();
            let mut s = atmosphere(&reg, o2, co2, n2);
            let total = o2 + co2 + n2;
            prop_assume!(total > 0.0);
            let before: Vec<f64> = [o2, co2, n2].to_vec();
            let delta = s.increment(&reg, View::Class(ClassId(0)), -request, 1).unwrap();
            let taken = request.min(total);
            let sum: f64 = delta.iter().map(|(_, d)| d).sum();
            prop_assert!((sum + taken).abs() < 1e-9 * total.max(1.0));
            for ((_, d), b) in delta.iter().zip(before) {
                prop_assert!((-d - taken * b / total).abs() < 1e-9 * total.max(1.0));
            }
        }
    }
}
