//! Probabilistic events and custom behaviours.

use biosphere_logic::VariationSpec;
use serde::{Deserialize, Serialize};

use super::agent::AgentId;
use crate::config::{CustomFunction, EventKind, EventScope};
use crate::currency::{ClassId, CurrencyId, CurrencyRegistry, View};

/// One active occurrence of an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventInstance {
    pub magnitude: f64,
    pub remaining_minutes: f64,
}

/// A configured event with its active instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    pub name: String,
    pub kind: EventKind,
    pub scope: EventScope,
    /// Chance that one free slot fires during one step.
    pub p_step: f64,
    pub magnitude: f64,
    pub magnitude_variation: Option<VariationSpec>,
    /// Lasts one step when absent.
    pub duration_minutes: Option<f64>,
    pub duration_variation: Option<VariationSpec>,
    /// Flows affected by a multiplier; all flows when absent.
    pub target: Option<View>,
    pub instances: Vec<EventInstance>,
    /// Aggregate multiplier for the current step.
    pub multiplier: f64,
}

impl EventState {
    /// Members that can be affected at once.
    pub fn scope_size(&self, amount: u32) -> u32 {
        match self.scope {
            EventScope::Individual => amount,
            EventScope::Group => 1,
        }
    }

    pub fn affects(&self, registry: &CurrencyRegistry, view: View) -> bool {
        match self.target {
            None => true,
            Some(target) if target == view => true,
            Some(target) => registry
                .members(view)
                .iter()
                .any(|c| registry.contains(target, *c)),
        }
    }
}

/// Event capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub events: Vec<EventState>,
}

impl Events {
    /// Product of active multipliers that apply to flows of `view`.
    pub fn multiplier_for(&self, registry: &CurrencyRegistry, view: View) -> f64 {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Multiplier && e.affects(registry, view))
            .map(|e| e.multiplier)
            .product()
    }

    pub fn active_count(&self) -> usize {
        self.events.iter().map(|e| e.instances.len()).sum()
    }
}

/// Resolved state of a custom function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Custom {
    /// Moves gases between connected atmospheres toward equal density.
    AtmosphereEqualizer {
        storages: Vec<AgentId>,
        class: ClassId,
        /// Largest total mass moved per step.
        max_flow: f64,
    },
    /// Electric lamp sized to the plants it lights.
    ElectricLamp {
        light: CurrencyId,
        /// Single plant served; all plants when absent.
        target: Option<AgentId>,
    },
    /// Ambient light source.
    Sun { light: CurrencyId },
}

impl Custom {
    pub fn function(&self) -> CustomFunction {
        match self {
            Custom::AtmosphereEqualizer { .. } => CustomFunction::AtmosphereEqualizer,
            Custom::ElectricLamp { .. } => CustomFunction::ElectricLamp,
            Custom::Sun { .. } => CustomFunction::Sun,
        }
    }
}
