//! Currency registry.
//!
//! Currencies are the tracked substances (gases, water, biomass, energy).
//! Each belongs to exactly one class, and flows or storage views may name
//! either a single currency or a whole class.

use std::collections::HashMap;

use biosphere_logic::Unit;
use serde::{Deserialize, Serialize};

use crate::config::CurrencyClassDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub name: String,
    pub class: ClassId,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyClass {
    pub id: ClassId,
    pub name: String,
    pub currencies: Vec<CurrencyId>,
}

/// What a flow or storage lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    Currency(CurrencyId),
    Class(ClassId),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrencyRegistry {
    currencies: Vec<Currency>,
    classes: Vec<CurrencyClass>,
    by_name: HashMap<String, View>,
}

impl CurrencyRegistry {
    /// Build from validated descriptors; ids follow declaration order.
    pub fn from_config(descs: &[CurrencyClassDesc]) -> Self {
        let mut registry = Self::default();
        for desc in descs {
            let class_id = ClassId(registry.classes.len() as u32);
            let mut members = Vec::with_capacity(desc.currencies.len());
            for c in &desc.currencies {
                let id = CurrencyId(registry.currencies.len() as u32);
                registry.currencies.push(Currency {
                    id,
                    name: c.name.clone(),
                    class: class_id,
                    unit: c.unit,
                });
                registry.by_name.insert(c.name.clone(), View::Currency(id));
                members.push(id);
            }
            registry.classes.push(CurrencyClass {
                id: class_id,
                name: desc.name.clone(),
                currencies: members,
            });
            registry.by_name.insert(desc.name.clone(), View::Class(class_id));
        }
        registry
    }

    pub fn lookup(&self, name: &str) -> Option<View> {
        self.by_name.get(name).copied()
    }

    pub fn currency_id(&self, name: &str) -> Option<CurrencyId> {
        match self.lookup(name)? {
            View::Currency(id) => Some(id),
            View::Class(_) => None,
        }
    }

    pub fn currency(&self, id: CurrencyId) -> &Currency {
        &self.currencies[id.0 as usize]
    }

    pub fn class(&self, id: ClassId) -> &CurrencyClass {
        &self.classes[id.0 as usize]
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    /// Member currencies of a view.
    pub fn members(&self, view: View) -> &[CurrencyId] {
        match view {
            View::Currency(id) => std::slice::from_ref(&self.currency(id).id),
            View::Class(id) => &self.class(id).currencies,
        }
    }

    pub fn name(&self, view: View) -> &str {
        match view {
            View::Currency(id) => &self.currency(id).name,
            View::Class(id) => &self.class(id).name,
        }
    }

    /// Whether `view` is `currency` or a class containing it.
    pub fn contains(&self, view: View, currency: CurrencyId) -> bool {
        self.members(view).contains(&currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyDesc;

    fn registry() -> CurrencyRegistry {
        CurrencyRegistry::from_config(&[
            CurrencyClassDesc {
                name: "atmosphere".into(),
                currencies: vec![
                    CurrencyDesc { name: "o2".into(), unit: Unit::Kilogram },
                    CurrencyDesc { name: "co2".into(), unit: Unit::Kilogram },
                ],
            },
            CurrencyClassDesc {
                name: "energy".into(),
                currencies: vec![CurrencyDesc { name: "kwh".into(), unit: Unit::KilowattHour }],
            },
        ])
    }

    #[test]
    fn test_sequential_ids() {
        let r = registry();
        assert_eq!(r.currency_id("o2"), Some(CurrencyId(0)));
        assert_eq!(r.currency_id("co2"), Some(CurrencyId(1)));
        assert_eq!(r.currency_id("kwh"), Some(CurrencyId(2)));
        assert_eq!(r.lookup("energy"), Some(View::Class(ClassId(1))));
    }

    #[test]
    fn test_views() {
        let r = registry();
        let atmo = r.lookup("atmosphere").unwrap();
        assert_eq!(r.members(atmo), &[CurrencyId(0), CurrencyId(1)]);
        assert_eq!(r.members(View::Currency(CurrencyId(2))), &[CurrencyId(2)]);
        assert!(r.contains(atmo, CurrencyId(1)));
        assert!(!r.contains(atmo, CurrencyId(2)));
        assert_eq!(r.name(atmo), "atmosphere");
        assert_eq!(r.currency_id("atmosphere"), None);
        assert_eq!(r.lookup("nitrogen"), None);
    }
}
