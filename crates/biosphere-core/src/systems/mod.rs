//! Systems - logic that operates on agent components.
//!
//! One agent steps at a time. [`step_agent`] takes the agent's mutable
//! capabilities out of the world, runs the phases below in order, and puts
//! them back, so storages of other agents (and of the agent itself) can be
//! borrowed freely in between.
//!
//! 1. lifecycle (reproduce or die once grown)
//! 2. storage ratios
//! 3. thresholds
//! 4. custom function
//! 5. events and per-step variation
//! 6. plant light and CO2 response
//! 7. inputs, then outputs

mod agent;
mod custom;
mod events;
mod exchange;
mod plant;
mod storage;

use std::collections::HashMap;

use hecs::{Entity, World};
use rand_chacha::ChaCha8Rng;

use crate::clock::Clock;
use crate::components::{Agent, AgentId};
use crate::currency::CurrencyRegistry;

pub use agent::step_agent;
pub use events::step_events;
pub use plant::Co2Cache;
pub use storage::{compute_all_ratios, RatioCache};

/// Shared model state borrowed by one agent's step.
pub struct StepContext<'a> {
    pub world: &'a mut World,
    pub index: &'a HashMap<AgentId, Entity>,
    pub registry: &'a CurrencyRegistry,
    pub rng: &'a mut ChaCha8Rng,
    pub ratios: &'a mut RatioCache,
    pub co2: &'a mut Co2Cache,
    pub clock: &'a Clock,
}

impl StepContext<'_> {
    pub fn entity(&self, id: AgentId) -> Option<Entity> {
        self.index.get(&id).copied()
    }

    /// Multiplicity of another agent as currently stored in the world.
    pub fn amount_of(&self, id: AgentId) -> u32 {
        self.entity(id)
            .and_then(|e| self.world.get::<&Agent>(e).ok().map(|a| a.amount))
            .unwrap_or(0)
    }

    pub fn agent_type_of(&self, id: AgentId) -> Option<String> {
        let e = self.entity(id)?;
        let agent = self.world.get::<&Agent>(e).ok()?;
        Some(agent.agent_type.clone())
    }
}
