//! Per-agent step orchestration.

use hecs::{Entity, World};
use log::debug;

use super::exchange::{run_flows, FlowOutcome};
use super::{custom, events, plant, storage, StepContext};
use crate::clock::Clock;
use crate::components::*;
use crate::config::AgentField;
use crate::currency::{CurrencyId, View};

/// Counters restored when a mandatory input aborts the step.
struct Checkpoint {
    amount: u32,
    growth: Option<Growth>,
    factors: Option<Factors>,
    stalled: bool,
    counters: Vec<(u32, f64)>,
}

/// One agent's mutable capabilities, taken out of the world for its step.
pub(crate) struct AgentStep {
    pub entity: Entity,
    pub agent: Agent,
    pub exchange: Option<Exchange>,
    pub growth: Option<Growth>,
    pub plant: Option<Plant>,
    pub events: Option<Events>,
    pub custom: Option<Custom>,
    /// Prior balances of every storage touched this step.
    journal: Vec<(AgentId, CurrencyId, f64)>,
}

fn take<T: hecs::Component + Default>(world: &World, entity: Entity) -> Option<T> {
    world
        .get::<&mut T>(entity)
        .ok()
        .map(|mut c| std::mem::take(&mut *c))
}

fn put<T: hecs::Component>(world: &World, entity: Entity, value: Option<T>) {
    if let Some(value) = value {
        if let Ok(mut slot) = world.get::<&mut T>(entity) {
            *slot = value;
        }
    }
}

impl AgentStep {
    fn load(world: &World, entity: Entity) -> Option<Self> {
        let agent = (*world.get::<&Agent>(entity).ok()?).clone();
        Some(Self {
            entity,
            agent,
            exchange: take::<Exchange>(world, entity),
            growth: world.get::<&Growth>(entity).ok().map(|g| (*g).clone()),
            plant: world.get::<&Plant>(entity).ok().map(|p| (*p).clone()),
            events: take::<Events>(world, entity),
            custom: world.get::<&Custom>(entity).ok().map(|c| (*c).clone()),
            journal: Vec::new(),
        })
    }

    fn store(self, world: &World) {
        put(world, self.entity, Some(self.agent));
        put(world, self.entity, self.exchange);
        put(world, self.entity, self.growth);
        put(world, self.entity, self.events);
    }

    pub fn id(&self) -> AgentId {
        self.agent.id
    }

    /// Multiplicity that scales a storage's capacities.
    pub fn multiplicity(&self, ctx: &StepContext, storage: AgentId) -> u32 {
        if storage == self.agent.id {
            self.agent.amount
        } else {
            ctx.amount_of(storage)
        }
    }

    fn with_storage<T>(&self, ctx: &StepContext, storage: AgentId, f: impl FnOnce(&Storage) -> T) -> Option<T> {
        let entity = ctx.entity(storage)?;
        let s = ctx.world.get::<&Storage>(entity).ok()?;
        Some(f(&s))
    }

    pub fn balance(&self, ctx: &StepContext, storage: AgentId, currency: CurrencyId) -> f64 {
        self.with_storage(ctx, storage, |s| s.balance(currency)).unwrap_or(0.0)
    }

    pub fn view_total(&self, ctx: &StepContext, storage: AgentId, view: View) -> f64 {
        self.with_storage(ctx, storage, |s| s.view_total(ctx.registry, view))
            .unwrap_or(0.0)
    }

    pub fn headroom(&self, ctx: &StepContext, storage: AgentId, currency: CurrencyId) -> f64 {
        let multiplicity = self.multiplicity(ctx, storage);
        self.with_storage(ctx, storage, |s| s.headroom(currency, multiplicity))
            .unwrap_or(0.0)
    }

    pub fn volume(&self, ctx: &StepContext, storage: AgentId) -> f64 {
        self.with_storage(ctx, storage, |s| s.volume).flatten().unwrap_or(0.0)
    }

    /// Journaled [`Storage::increment`] on any agent's storage.
    pub fn increment(&mut self, ctx: &mut StepContext, storage: AgentId, view: View, amount: f64) -> Vec<(CurrencyId, f64)> {
        let multiplicity = self.multiplicity(ctx, storage);
        let Some(entity) = ctx.entity(storage) else {
            return Vec::new();
        };
        let Ok(mut s) = ctx.world.get::<&mut Storage>(entity) else {
            return Vec::new();
        };
        for c in ctx.registry.members(view) {
            if let Some(b) = s.balances.get(c) {
                self.journal.push((storage, *c, *b));
            }
        }
        match s.increment(ctx.registry, view, amount, multiplicity) {
            Ok(deltas) => deltas,
            Err(err) => {
                log::warn!("{} {}: {err}", self.agent.agent_type, self.agent.id);
                Vec::new()
            }
        }
    }

    /// Journaled [`Storage::set_balance`].
    pub fn set_balance(&mut self, ctx: &mut StepContext, storage: AgentId, currency: CurrencyId, value: f64) {
        let multiplicity = self.multiplicity(ctx, storage);
        let Some(entity) = ctx.entity(storage) else {
            return;
        };
        if let Ok(mut s) = ctx.world.get::<&mut Storage>(entity) {
            if let Some(b) = s.balances.get(&currency) {
                self.journal.push((storage, currency, *b));
            }
            s.set_balance(currency, value, multiplicity);
        }
    }

    /// Value of an agent field for criteria and weights.
    pub fn field(&self, field: AgentField, factors: &Factors, clock: &Clock) -> f64 {
        let growth = self.growth.as_ref();
        match field {
            AgentField::Amount => self.agent.amount as f64,
            AgentField::Age => self.agent.age_steps as f64 * clock.hours_per_step(),
            AgentField::GrowthRate => growth.map_or(0.0, |g| g.growth_rate),
            AgentField::CurrentGrowth => growth.map_or(0.0, |g| g.current_growth),
            AgentField::DailyGrowthFactor => factors.daily_growth_factor,
            AgentField::ParFactor => factors.par_factor,
            AgentField::CuFactor => factors.cu_factor,
            AgentField::TeFactor => factors.te_factor,
        }
    }

    /// Destroy the whole agent; its ledgers read zero from now on.
    pub fn kill(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("{} {} died: {reason}", self.agent.agent_type, self.agent.id);
        self.agent.destroy(reason);
        if let Some(ex) = &mut self.exchange {
            ex.clear_ledgers();
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        let ex = self.exchange.as_ref();
        Checkpoint {
            amount: self.agent.amount,
            growth: self.growth.clone(),
            factors: ex.map(|e| e.factors),
            stalled: ex.is_some_and(|e| e.stalled),
            counters: ex
                .map(|e| {
                    e.flows
                        .iter()
                        .map(|f| (f.buffer_remaining, f.deprive_remaining))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Undo every storage change and counter update since `checkpoint`.
    fn rollback(&mut self, ctx: &mut StepContext, checkpoint: Checkpoint) {
        for (storage, currency, old) in self.journal.drain(..).rev() {
            let Some(entity) = ctx.entity(storage) else {
                continue;
            };
            if let Ok(mut s) = ctx.world.get::<&mut Storage>(entity) {
                s.balances.insert(currency, old);
            }
        }
        self.agent.amount = checkpoint.amount;
        self.growth = checkpoint.growth;
        if let Some(ex) = &mut self.exchange {
            if let Some(factors) = checkpoint.factors {
                ex.factors = factors;
            }
            ex.stalled = checkpoint.stalled;
            for (flow, (buffer, deprive)) in ex.flows.iter_mut().zip(checkpoint.counters) {
                flow.buffer_remaining = buffer;
                flow.deprive_remaining = deprive;
            }
            ex.clear_ledgers();
        }
    }

    fn run(&mut self, ctx: &mut StepContext) {
        if let Some(ex) = &mut self.exchange {
            ex.clear_ledgers();
            ex.stalled = false;
        }
        if !self.agent.active {
            return;
        }
        if !plant::lifecycle(self, ctx) {
            return;
        }
        let checkpoint = self.checkpoint();

        storage::update_ratios(self, ctx);
        if storage::check_thresholds(self, ctx) {
            return;
        }
        custom::run(self, ctx);
        if events::run(self, ctx) {
            return;
        }
        if let Some(ex) = &mut self.exchange {
            ex.step_factor = match ex.step_variation {
                Some(spec) => spec.sample(ctx.rng),
                None => 1.0,
            };
        }
        plant::update_factors(self, ctx);

        match run_flows(self, ctx) {
            FlowOutcome::Completed => {}
            FlowOutcome::Aborted => self.rollback(ctx, checkpoint),
            FlowOutcome::Died => return,
        }
        self.agent.age_steps += 1;
    }
}

/// Step one agent entity.
pub fn step_agent(ctx: &mut StepContext, entity: Entity) {
    let Some(mut step) = AgentStep::load(ctx.world, entity) else {
        return;
    };
    step.run(ctx);
    step.store(ctx.world);
}
