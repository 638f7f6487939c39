//! Simulation engine - main entry point for running the habitat model

use std::collections::HashMap;

use biosphere_logic::CurveCache;
use hecs::{Entity, World};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::components::*;
use crate::config::{Direction, SimulationConfig, TerminationRule};
use crate::currency::CurrencyRegistry;
use crate::error::BuildError;
use crate::report::StepReport;
use crate::scheduler::Scheduler;
use crate::spawn::populate;
use crate::systems::*;

/// Termination rules and whether one has fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Termination {
    pub rules: Vec<TerminationRule>,
    pub is_terminated: bool,
    pub reason: Option<String>,
}

/// A running habitat model.
pub struct Model {
    /// ECS world containing every agent
    pub world: World,
    pub(crate) clock: Clock,
    pub(crate) termination: Termination,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) registry: CurrencyRegistry,
    /// Latest storage ratios per agent type
    pub(crate) ratios: RatioCache,
    /// CO2 responses computed this step
    pub(crate) co2: Co2Cache,
    pub(crate) scheduler: Scheduler,
    pub(crate) index: HashMap<AgentId, Entity>,
    pub(crate) next_id: u64,
}

impl Model {
    /// Validate `config` and build every agent it describes.
    pub fn new(config: &SimulationConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let registry = CurrencyRegistry::from_config(&config.currencies);
        let clock = Clock::new(config.location, config.minutes_per_step);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut cache = CurveCache::new();

        let population = populate(config, &registry, &clock, &mut rng, &mut cache)?;
        let mut ratios = RatioCache::new();
        compute_all_ratios(&population.world, &mut ratios);

        info!(
            "built model: {} agents of {} types, {} currencies, {:?} day of {} steps ({} curves, {} cache hits)",
            population.index.len(),
            config.agents.len(),
            registry.currencies().len(),
            config.location,
            clock.day_steps(),
            cache.len(),
            cache.hits(),
        );

        Ok(Self {
            world: population.world,
            clock,
            termination: Termination {
                rules: config.termination.clone(),
                ..Default::default()
            },
            rng,
            registry,
            ratios,
            co2: Co2Cache::new(),
            scheduler: population.scheduler,
            index: population.index,
            next_id: population.next_id,
        })
    }

    /// Run one step. Returns false once the model has terminated.
    pub fn step(&mut self) -> bool {
        if self.termination.is_terminated {
            return false;
        }
        if let Some(rule) = self.clock.exceeded(&self.termination.rules) {
            info!(
                "terminated at step {}: {} {:?} elapsed",
                self.clock.step_num, rule.value, rule.unit
            );
            self.termination.is_terminated = true;
            self.termination.reason = Some("time".to_string());
            return false;
        }

        self.clock.advance();
        self.co2.clear();
        let order = self.scheduler.order(&mut self.rng);
        let mut ctx = StepContext {
            world: &mut self.world,
            index: &self.index,
            registry: &self.registry,
            rng: &mut self.rng,
            ratios: &mut self.ratios,
            co2: &mut self.co2,
            clock: &self.clock,
        };
        for id in order {
            if let Some(entity) = ctx.entity(id) {
                step_agent(&mut ctx, entity);
            }
        }
        true
    }

    /// Step `n_steps` times, or until termination when `None`.
    /// Returns the number of steps run.
    pub fn step_to(&mut self, n_steps: Option<u64>) -> u64 {
        let mut ran = 0;
        while n_steps.map_or(true, |n| ran < n) && self.step() {
            ran += 1;
        }
        ran
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn step_num(&self) -> u64 {
        self.clock.step_num
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.clock.elapsed_minutes
    }

    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    pub fn ratios(&self) -> &RatioCache {
        &self.ratios
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_terminated
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination.reason.as_deref()
    }

    fn entity(&self, id: AgentId) -> Option<Entity> {
        self.index.get(&id).copied()
    }

    /// Ids of all agents of `agent_type`, or of every agent when `None`.
    pub fn agents_by_type(&self, agent_type: Option<&str>) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .world
            .query::<&Agent>()
            .iter()
            .filter(|(_, a)| agent_type.map_or(true, |t| a.agent_type == t))
            .map(|(_, a)| a.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn agents_by_class(&self, agent_class: &str) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .world
            .query::<&Agent>()
            .iter()
            .filter(|(_, a)| a.agent_class == agent_class)
            .map(|(_, a)| a.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn agent(&self, id: AgentId) -> Option<Agent> {
        let entity = self.entity(id)?;
        let agent = self.world.get::<&Agent>(entity).ok()?;
        Some((*agent).clone())
    }

    pub fn storage(&self, id: AgentId) -> Option<Storage> {
        let entity = self.entity(id)?;
        let storage = self.world.get::<&Storage>(entity).ok()?;
        Some((*storage).clone())
    }

    pub fn exchange(&self, id: AgentId) -> Option<Exchange> {
        let entity = self.entity(id)?;
        let exchange = self.world.get::<&Exchange>(entity).ok()?;
        Some((*exchange).clone())
    }

    pub fn growth(&self, id: AgentId) -> Option<Growth> {
        let entity = self.entity(id)?;
        let growth = self.world.get::<&Growth>(entity).ok()?;
        Some((*growth).clone())
    }

    pub fn events(&self, id: AgentId) -> Option<Events> {
        let entity = self.entity(id)?;
        let events = self.world.get::<&Events>(entity).ok()?;
        Some((*events).clone())
    }

    /// Balance of a named currency in an agent's storage.
    pub fn balance(&self, id: AgentId, currency: &str) -> Option<f64> {
        let currency = self.registry.currency_id(currency)?;
        let entity = self.entity(id)?;
        let storage = self.world.get::<&Storage>(entity).ok()?;
        storage.has(currency).then(|| storage.balance(currency))
    }

    /// Last step's ledger of an agent's flow.
    pub fn ledger(&self, id: AgentId, direction: Direction, currency: &str) -> Option<Ledger> {
        let entity = self.entity(id)?;
        let exchange = self.world.get::<&Exchange>(entity).ok()?;
        exchange.flow(direction, currency).map(|f| f.ledger.clone())
    }

    /// Remove an agent from the world and the schedule.
    pub fn remove(&mut self, id: AgentId) -> bool {
        self.scheduler.remove(id);
        let Some(entity) = self.index.remove(&id) else {
            return false;
        };
        self.world.despawn(entity).is_ok()
    }

    /// Reporting feed for the step just run.
    pub fn report(&self) -> StepReport {
        StepReport::collect(self)
    }
}
