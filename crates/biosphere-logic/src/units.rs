//! Unit-tagged quantities.
//!
//! Only a handful of units ever appear in habitat configurations, so instead
//! of a general quantity library this module keeps a small closed table:
//! every unit belongs to a [`Dimension`] and has a factor to that
//! dimension's base unit (kg, kWh, L, mol). Conversions across dimensions
//! are refused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Mass,
    Energy,
    Volume,
    Amount,
    /// Countable items and dimensionless quantities.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "mg")]
    Milligram,
    #[serde(rename = "t")]
    Tonne,
    #[serde(rename = "kWh")]
    KilowattHour,
    #[serde(rename = "Wh")]
    WattHour,
    #[serde(rename = "L")]
    Liter,
    #[serde(rename = "mL")]
    Milliliter,
    #[serde(rename = "m3")]
    CubicMeter,
    #[serde(rename = "mol")]
    Mole,
    #[serde(rename = "umol", alias = "µmol")]
    Micromole,
    #[serde(rename = "count", alias = "unit")]
    Count,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("cannot convert {from} to {to}: incompatible dimensions")]
    Incompatible { from: Unit, to: Unit },
    #[error("unknown unit '{0}'")]
    Unknown(String),
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Kilogram | Unit::Gram | Unit::Milligram | Unit::Tonne => Dimension::Mass,
            Unit::KilowattHour | Unit::WattHour => Dimension::Energy,
            Unit::Liter | Unit::Milliliter | Unit::CubicMeter => Dimension::Volume,
            Unit::Mole | Unit::Micromole => Dimension::Amount,
            Unit::Count => Dimension::Count,
        }
    }

    /// Factor from this unit to its dimension's base unit.
    pub fn base_factor(self) -> f64 {
        match self {
            Unit::Kilogram => 1.0,
            Unit::Gram => 1e-3,
            Unit::Milligram => 1e-6,
            Unit::Tonne => 1e3,
            Unit::KilowattHour => 1.0,
            Unit::WattHour => 1e-3,
            Unit::Liter => 1.0,
            Unit::Milliliter => 1e-3,
            Unit::CubicMeter => 1e3,
            Unit::Mole => 1.0,
            Unit::Micromole => 1e-6,
            Unit::Count => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Milligram => "mg",
            Unit::Tonne => "t",
            Unit::KilowattHour => "kWh",
            Unit::WattHour => "Wh",
            Unit::Liter => "L",
            Unit::Milliliter => "mL",
            Unit::CubicMeter => "m3",
            Unit::Mole => "mol",
            Unit::Micromole => "umol",
            Unit::Count => "count",
        }
    }

    /// Value expressed in the dimension's base unit.
    pub fn to_base(self, value: f64) -> f64 {
        value * self.base_factor()
    }

    pub fn convert(self, value: f64, to: Unit) -> Result<f64, UnitError> {
        if self.dimension() != to.dimension() {
            return Err(UnitError::Incompatible { from: self, to });
        }
        Ok(value * self.base_factor() / to.base_factor())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "kg" => Unit::Kilogram,
            "g" => Unit::Gram,
            "mg" => Unit::Milligram,
            "t" => Unit::Tonne,
            "kWh" => Unit::KilowattHour,
            "Wh" => Unit::WattHour,
            "L" => Unit::Liter,
            "mL" => Unit::Milliliter,
            "m3" => Unit::CubicMeter,
            "mol" => Unit::Mole,
            "umol" | "µmol" => Unit::Micromole,
            "count" | "unit" => Unit::Count,
            other => return Err(UnitError::Unknown(other.to_string())),
        })
    }
}

/// A scalar tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn to(self, unit: Unit) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.unit.convert(self.value, unit)?, unit))
    }

    /// Value in the dimension's base unit.
    pub fn base_value(self) -> f64 {
        self.unit.to_base(self.value)
    }
}
