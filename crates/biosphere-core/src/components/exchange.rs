//! Exchange capability: declared inputs and outputs with their runtime state.

use biosphere_logic::units::Unit;
use biosphere_logic::VariationSpec;
use serde::{Deserialize, Serialize};

use super::agent::AgentId;
use crate::config::{AgentField, Direction, Limit, Required};
use crate::currency::{CurrencyId, View};

/// Where a criteria reads its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CriteriaSource {
    Field(AgentField),
    /// Cached ratio of `currency` in storages of `storage_type`.
    Ratio {
        currency: CurrencyId,
        storage_type: String,
    },
}

/// Gate on a flow, with a buffer of tolerated failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub source: CriteriaSource,
    pub limit: Limit,
    pub value: f64,
    pub buffer: u32,
}

/// Extra multiplier applied to a flow's target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Weight {
    Field(AgentField),
    /// Own balance of a currency, per member.
    Balance(CurrencyId),
}

/// One storage touched by a flow this step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub storage: AgentId,
    pub currency: CurrencyId,
    /// Magnitude moved; the direction comes from the flow.
    pub amount: f64,
}

/// What a flow did this step. Reset at the start of every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub target: f64,
    pub actual: f64,
    pub transfers: Vec<Transfer>,
    /// Growth rate after this flow advanced growth, if it did.
    pub growth: Option<f64>,
}

impl Ledger {
    pub fn clear(&mut self) {
        self.target = 0.0;
        self.actual = 0.0;
        self.transfers.clear();
        self.growth = None;
    }
}

/// A declared input or output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub direction: Direction,
    pub view: View,
    pub currency: String,
    pub unit: Unit,
    /// Configured rate; zero flows only register connections.
    pub base_value: f64,
    /// Connected storages in draw-down order.
    pub connections: Vec<AgentId>,
    /// Per-member amount per step, indexed by lifetime step.
    pub curve: Vec<f64>,
    pub criteria: Option<Criteria>,
    pub weights: Vec<Weight>,
    pub requires: Vec<View>,
    pub required: Option<Required>,
    /// Deprivation budget in minutes.
    pub deprive: Option<f64>,
    pub harvest: bool,

    pub buffer_remaining: u32,
    pub deprive_remaining: f64,
    pub ledger: Ledger,
}

impl Flow {
    /// Curve value for `index`, wrapping past the end.
    pub fn curve_value(&self, index: u64) -> f64 {
        if self.curve.is_empty() {
            return 0.0;
        }
        self.curve[(index % self.curve.len() as u64) as usize]
    }
}

/// Kill switch on a connected storage ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub currency: CurrencyId,
    pub limit: Limit,
    pub value: f64,
    /// Storage agent types whose cached ratio is checked.
    pub storage_types: Vec<String>,
}

/// Physiological and schedule factors readable as weights or criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    pub daily_growth_factor: f64,
    pub par_factor: f64,
    pub cu_factor: f64,
    pub te_factor: f64,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            daily_growth_factor: 1.0,
            par_factor: 1.0,
            cu_factor: 1.0,
            te_factor: 1.0,
        }
    }
}

/// Exchange capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Inputs first, then outputs, each in declaration order.
    pub flows: Vec<Flow>,
    /// Drawn once at construction.
    pub initial_variation: f64,
    pub step_variation: Option<VariationSpec>,
    /// Drawn every step.
    pub step_factor: f64,
    pub factors: Factors,
    /// A desired input was short this step.
    pub stalled: bool,
    pub thresholds: Vec<Threshold>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self {
            flows: Vec::new(),
            initial_variation: 1.0,
            step_variation: None,
            step_factor: 1.0,
            factors: Factors::default(),
            stalled: false,
            thresholds: Vec::new(),
        }
    }
}

impl Exchange {
    pub fn clear_ledgers(&mut self) {
        for flow in &mut self.flows {
            flow.ledger.clear();
        }
    }

    pub fn flow(&self, direction: Direction, currency: &str) -> Option<&Flow> {
        self.flows
            .iter()
            .find(|f| f.direction == direction && f.currency == currency)
    }

    pub fn flow_index(&self, direction: Direction, currency: &str) -> Option<usize> {
        self.flows
            .iter()
            .position(|f| f.direction == direction && f.currency == currency)
    }
}
