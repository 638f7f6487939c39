//! Growth and plant lifecycle state.

use biosphere_logic::photosynthesis::Pathway;
use serde::{Deserialize, Serialize};

use super::agent::AgentId;
use crate::currency::CurrencyId;

/// Lifetime and growth tracking for agents with a lifetime or a growth
/// criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Growth {
    /// Zero means the agent never matures.
    pub lifetime_steps: u64,
    pub reproduce: bool,
    /// Index of the output flow whose transfers measure growth.
    pub criteria_flow: Option<usize>,
    /// Position in the growth cycle; advances only when growth advances.
    pub step_index: u64,
    /// Sum of the criteria flow's curve over one lifetime.
    pub total_growth: f64,
    /// Accumulated per-member growth.
    pub current_growth: f64,
    /// `current_growth / total_growth`.
    pub growth_rate: f64,
    pub grown: bool,
}

impl Growth {
    /// Back to a seedling.
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.current_growth = 0.0;
        self.growth_rate = 0.0;
        self.grown = false;
    }

    /// Record `per_member` growth for one step.
    pub fn advance(&mut self, per_member: f64) {
        self.step_index += 1;
        self.current_growth += per_member;
        self.growth_rate = if self.total_growth > 0.0 {
            self.current_growth / self.total_growth
        } else {
            0.0
        };
    }
}

/// Where a plant's light comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    pub agent: AgentId,
    /// Electric light is withdrawn from the lamp; ambient light is shared.
    pub electric: bool,
}

/// Plant-only state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Daily light-need envelope, one value per step of day, mean one.
    pub envelope: Vec<f64>,
    /// Light needed per member per step at envelope value one.
    pub par_baseline: f64,
    pub light: Option<LightSource>,
    pub light_currency: Option<CurrencyId>,
    pub pathway: Pathway,
    /// Storage whose CO2 ratio drives the CO2 response.
    pub co2_storage: Option<AgentId>,
    pub co2_currency: Option<CurrencyId>,
    /// Output flow receiving the biomass of members that die early.
    pub inedible_flow: Option<usize>,
}

impl Plant {
    pub fn envelope_at(&self, step_of_day: usize) -> f64 {
        if self.envelope.is_empty() {
            return 1.0;
        }
        self.envelope[step_of_day % self.envelope.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_rate_tracks_total() {
        let mut g = Growth {
            total_growth: 10.0,
            ..Default::default()
        };
        g.advance(2.5);
        g.advance(2.5);
        assert_eq!(g.step_index, 2);
        assert!((g.growth_rate - 0.5).abs() < 1e-12);
        g.grown = true;
        g.reset();
        assert_eq!(g, Growth { total_growth: 10.0, ..Default::default() });
    }

    #[test]
    fn test_zero_total_growth() {
        let mut g = Growth::default();
        g.advance(1.0);
        assert_eq!(g.growth_rate, 0.0);
    }

    #[test]
    fn test_envelope_wraps() {
        let p = Plant {
            envelope: vec![0.0, 2.0],
            ..Default::default()
        };
        assert_eq!(p.envelope_at(3), 2.0);
        assert_eq!(Plant::default().envelope_at(5), 1.0);
    }
}
