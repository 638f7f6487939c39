//! Simulated location. The only thing the engine needs from it is the length
//! of a local day, which sets the daily curve period and the `day`/`year`
//! time units.

use serde::{Deserialize, Serialize};

/// Where the habitat is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    #[default]
    Earth,
    Mars,
    Moon,
}

impl Location {
    /// Length of one local day in minutes.
    pub fn day_length_minutes(self) -> f64 {
        match self {
            Location::Earth => 24.0 * 60.0,
            // 24h 39m
            Location::Mars => 1479.0,
            // 27d 7h 43m (sidereal month)
            Location::Moon => ((27.0 * 24.0 + 7.0) * 60.0) + 43.0,
        }
    }

    pub fn day_length_hours(self) -> f64 {
        self.day_length_minutes() / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_lengths() {
        assert_eq!(Location::Earth.day_length_minutes(), 1440.0);
        assert_eq!(Location::Mars.day_length_minutes(), 1479.0);
        assert_eq!(Location::Moon.day_length_minutes(), 39343.0);
        assert!((Location::Earth.day_length_hours() - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_is_earth() {
        assert_eq!(Location::default(), Location::Earth);
    }
}
