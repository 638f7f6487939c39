//! Time units used by flow rates, lifetimes, deprivation budgets and
//! termination rules.
//!
//! `day` and `year` depend on the simulated location, so every conversion
//! takes the local day length explicitly.

use serde::{Deserialize, Serialize};

/// Days per year, regardless of location.
pub const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[serde(alias = "min", alias = "minutes")]
    Minute,
    #[serde(alias = "hours")]
    Hour,
    #[serde(alias = "days")]
    Day,
    #[serde(alias = "years")]
    Year,
}

impl TimeUnit {
    /// Length of one unit in minutes.
    pub fn minutes(self, day_length_minutes: f64) -> f64 {
        match self {
            TimeUnit::Minute => 1.0,
            TimeUnit::Hour => 60.0,
            TimeUnit::Day => day_length_minutes,
            TimeUnit::Year => day_length_minutes * DAYS_PER_YEAR,
        }
    }

    /// Express `minutes` in this unit.
    pub fn from_minutes(self, minutes: f64, day_length_minutes: f64) -> f64 {
        minutes / self.minutes(day_length_minutes)
    }

    /// Express `value` of this unit in minutes.
    pub fn to_minutes(self, value: f64, day_length_minutes: f64) -> f64 {
        value * self.minutes(day_length_minutes)
    }
}

/// Multiplier turning a rate given per `unit` into a rate per step.
pub fn per_step_factor(unit: TimeUnit, minutes_per_step: f64, day_length_minutes: f64) -> f64 {
    minutes_per_step / unit.minutes(day_length_minutes)
}

/// Number of whole steps in one local day (at least one).
pub fn steps_per_day(minutes_per_step: f64, day_length_minutes: f64) -> usize {
    ((day_length_minutes / minutes_per_step).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_lengths() {
        assert_eq!(TimeUnit::Minute.minutes(1440.0), 1.0);
        assert_eq!(TimeUnit::Hour.minutes(1440.0), 60.0);
        assert_eq!(TimeUnit::Day.minutes(1479.0), 1479.0);
        assert_eq!(TimeUnit::Year.minutes(1440.0), 525_600.0);
    }

    #[test]
    fn test_per_step_factor() {
        // 1 kg/day at hourly steps on earth
        let f = per_step_factor(TimeUnit::Day, 60.0, 1440.0);
        assert!((f - 1.0 / 24.0).abs() < 1e-12);
        let f = per_step_factor(TimeUnit::Minute, 60.0, 1440.0);
        assert!((f - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_steps_per_day() {
        assert_eq!(steps_per_day(60.0, 1440.0), 24);
        assert_eq!(steps_per_day(60.0, 1479.0), 25);
        assert_eq!(steps_per_day(10_000.0, 1440.0), 1);
    }

    #[test]
    fn test_aliases_deserialize() {
        let u: TimeUnit = serde_json::from_str("\"min\"").unwrap();
        assert_eq!(u, TimeUnit::Minute);
        let u: TimeUnit = serde_json::from_str("\"hours\"").unwrap();
        assert_eq!(u, TimeUnit::Hour);
    }
}
