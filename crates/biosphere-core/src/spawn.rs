//! Agent construction from a validated configuration.
//!
//! Two passes: every agent and its storage is created first, then each
//! agent's capabilities are resolved against the storages it connects to.
//! Entities are spawned only once every agent resolved.

use std::collections::HashMap;

use biosphere_logic::growth::compose_daily;
use biosphere_logic::photosynthesis::photoperiod_envelope;
use biosphere_logic::time::per_step_factor;
use biosphere_logic::{get_growth_values, CurveCache, Unit};
use hecs::{Entity, EntityBuilder, World};
use indexmap::IndexMap;
use rand::Rng;

use crate::clock::Clock;
use crate::components::*;
use crate::config::*;
use crate::currency::{CurrencyId, CurrencyRegistry, View};
use crate::error::InitError;
use crate::scheduler::Scheduler;

/// Largest total gas mass the atmosphere equalizer moves per step.
const EQUALIZER_MAX_FLOW: f64 = 50.0;

/// Spawned agents and their lookup tables.
pub(crate) struct Population {
    pub world: World,
    pub index: HashMap<AgentId, Entity>,
    pub scheduler: Scheduler,
    pub next_id: u64,
}

struct Pending {
    agent: Agent,
    storage: Option<Storage>,
}

struct Builder<'a, R: Rng + ?Sized> {
    config: &'a SimulationConfig,
    registry: &'a CurrencyRegistry,
    clock: &'a Clock,
    rng: &'a mut R,
    cache: &'a mut CurveCache,
    pending: &'a [Pending],
    by_type: &'a IndexMap<String, Vec<usize>>,
}

#[derive(Default)]
struct Capabilities {
    exchange: Option<Exchange>,
    growth: Option<Growth>,
    plant: Option<Plant>,
    events: Option<Events>,
    custom: Option<Custom>,
}

fn build_storage(registry: &CurrencyRegistry, desc: &AgentDesc, instance: &AgentInstance, amount: u32) -> Option<Storage> {
    let ch = &desc.characteristics;
    if ch.capacities.is_empty() && ch.volume.is_none() {
        return None;
    }
    let mut storage = Storage::new(ch.volume);
    for (name, cap) in &ch.capacities {
        if let Some(id) = registry.currency_id(name) {
            storage.add_capacity(registry, id, Capacity { value: cap.value, unit: cap.unit });
        }
    }
    for (name, value) in &instance.balances {
        if let Some(id) = registry.currency_id(name) {
            storage.set_balance(id, *value, amount);
        }
    }
    Some(storage)
}

/// Create every configured agent.
pub(crate) fn populate<R: Rng + ?Sized>(
    config: &SimulationConfig,
    registry: &CurrencyRegistry,
    clock: &Clock,
    rng: &mut R,
    cache: &mut CurveCache,
) -> Result<Population, InitError> {
    let mut pending = Vec::new();
    let mut by_type: IndexMap<String, Vec<usize>> = IndexMap::new();
    let mut next_id = 1u64;

    for (agent_type, instance) in &config.agents {
        let Some((type_id, _, desc)) = config.agent_desc.get_full(agent_type) else {
            continue;
        };
        let (copies, amount) = if config.single_agent {
            (1, instance.amount)
        } else {
            (instance.amount, 1)
        };
        for _ in 0..copies {
            let agent = Agent::new(AgentId(next_id), agent_type, type_id as u32, &desc.agent_class, amount);
            next_id += 1;
            by_type.entry(agent_type.clone()).or_default().push(pending.len());
            pending.push(Pending {
                agent,
                storage: build_storage(registry, desc, instance, amount),
            });
        }
    }

    let mut resolved = Vec::with_capacity(pending.len());
    {
        let mut builder = Builder {
            config,
            registry,
            clock,
            rng,
            cache,
            pending: &pending,
            by_type: &by_type,
        };
        for p in &pending {
            resolved.push(builder.capabilities(&p.agent)?);
        }
    }

    let mut world = World::new();
    let mut index = HashMap::new();
    let mut scheduler = Scheduler::new(config.priorities.clone());
    for (p, caps) in pending.into_iter().zip(resolved) {
        let id = p.agent.id;
        scheduler.add(id, &p.agent.agent_class);
        let mut entity = EntityBuilder::new();
        entity.add(p.agent);
        if let Some(c) = p.storage {
            entity.add(c);
        }
        if let Some(c) = caps.exchange {
            entity.add(c);
        }
        if let Some(c) = caps.growth {
            entity.add(c);
        }
        if let Some(c) = caps.plant {
            entity.add(c);
        }
        if let Some(c) = caps.events {
            entity.add(c);
        }
        if let Some(c) = caps.custom {
            entity.add(c);
        }
        index.insert(id, world.spawn(entity.build()));
    }

    Ok(Population {
        world,
        index,
        scheduler,
        next_id,
    })
}

impl<R: Rng + ?Sized> Builder<'_, R> {
    fn desc(&self, agent: &Agent) -> &AgentDesc {
        &self.config.agent_desc[agent.agent_type_id as usize]
    }

    fn ids_of(&self, agent_type: &str) -> Vec<AgentId> {
        self.by_type
            .get(agent_type)
            .map(|idx| idx.iter().map(|i| self.pending[*i].agent.id).collect())
            .unwrap_or_default()
    }

    fn first_of(&self, agent_type: &str) -> Option<&Pending> {
        self.by_type
            .get(agent_type)
            .and_then(|idx| idx.first())
            .map(|i| &self.pending[*i])
    }

    fn lookup(&self, agent: &Agent, name: &str) -> Result<View, InitError> {
        self.registry.lookup(name).ok_or_else(|| InitError::UnknownCurrency {
            agent: agent.agent_type.clone(),
            currency: name.to_string(),
        })
    }

    fn currency(&self, agent: &Agent, name: &str) -> Result<CurrencyId, InitError> {
        self.registry.currency_id(name).ok_or_else(|| InitError::UnknownCurrency {
            agent: agent.agent_type.clone(),
            currency: name.to_string(),
        })
    }

    fn lifetime_steps(&self, desc: &AgentDesc) -> u64 {
        desc.characteristics.lifetime.map_or(0, |d| {
            let minutes = d.unit.to_minutes(d.value, self.clock.day_length_minutes);
            (minutes / self.clock.minutes_per_step).round().max(0.0) as u64
        })
    }

    /// Check that `storage_type` can hold the flow and return its agents.
    fn connect(&self, agent: &Agent, flow: &FlowDesc, view: View, storage_type: &str) -> Result<Vec<AgentId>, InitError> {
        let Some(first) = self.first_of(storage_type) else {
            return Ok(Vec::new());
        };
        let missing = || InitError::MissingCapacity {
            agent: agent.agent_type.clone(),
            storage: storage_type.to_string(),
            currency: flow.currency.clone(),
        };
        let storage = first.storage.as_ref().ok_or_else(missing)?;
        let units: Vec<Unit> = self
            .registry
            .members(view)
            .iter()
            .filter_map(|c| storage.unit(*c))
            .collect();
        if units.is_empty() {
            return Err(missing());
        }
        if let Some(unit) = units.into_iter().find(|u| *u != flow.unit) {
            return Err(InitError::UnitMismatch {
                agent: agent.agent_type.clone(),
                currency: flow.currency.clone(),
                storage: storage_type.to_string(),
                flow_unit: flow.unit,
                storage_unit: unit,
            });
        }
        Ok(self.ids_of(storage_type))
    }

    fn curve(&mut self, agent: &Agent, flow: &FlowDesc, n_steps: usize) -> Result<Vec<f64>, InitError> {
        let base = flow.value
            * flow.flow_time.map_or(1.0, |unit| {
                per_step_factor(unit, self.clock.minutes_per_step, self.clock.day_length_minutes)
            });
        let Some(growth) = &flow.growth else {
            return Ok(vec![base]);
        };
        let wrap = |source| InitError::Curve {
            agent: agent.agent_type.clone(),
            currency: flow.currency.clone(),
            source,
        };
        let mut y = match &growth.lifetime {
            Some(spec) => get_growth_values(base, n_steps, spec, &mut *self.rng, &mut *self.cache).map_err(wrap)?,
            None => vec![base; n_steps],
        };
        if let Some(daily) = &growth.daily {
            y = compose_daily(&y, self.clock.day_steps(), daily, &mut *self.rng, &mut *self.cache).map_err(wrap)?;
        }
        Ok(y)
    }

    /// Storage type a `<currency>_ratio_<direction>` criteria reads from.
    fn ratio_storage(&self, desc: &AgentDesc, currency: &str, direction: Direction, fallback: &[String]) -> String {
        let flows = match direction {
            Direction::In => &desc.inputs,
            Direction::Out => &desc.outputs,
        };
        flows
            .iter()
            .find(|f| f.currency == currency)
            .and_then(|f| f.connections.first())
            .or_else(|| fallback.first())
            .cloned()
            .unwrap_or_default()
    }

    fn flow(&mut self, agent: &Agent, desc: &AgentDesc, direction: Direction, fd: &FlowDesc, n_steps: usize) -> Result<Flow, InitError> {
        let view = self.lookup(agent, &fd.currency)?;
        let mut connections = Vec::new();
        for storage_type in &fd.connections {
            connections.extend(self.connect(agent, fd, view, storage_type)?);
        }
        if connections.is_empty() {
            return Err(InitError::NoConnection {
                agent: agent.agent_type.clone(),
                currency: fd.currency.clone(),
            });
        }

        let criteria = match &fd.criteria {
            None => None,
            Some(c) => {
                let source = match c.name.parse::<CriteriaName>() {
                    Ok(CriteriaName::Field(field)) => CriteriaSource::Field(field),
                    Ok(CriteriaName::Ratio { currency, direction }) => CriteriaSource::Ratio {
                        currency: self.currency(agent, &currency)?,
                        storage_type: self.ratio_storage(desc, &currency, direction, &fd.connections),
                    },
                    Err(()) => {
                        return Err(InitError::UnknownCurrency {
                            agent: agent.agent_type.clone(),
                            currency: c.name.clone(),
                        })
                    }
                };
                Some(Criteria {
                    source,
                    limit: c.limit,
                    value: c.value,
                    buffer: c.buffer,
                })
            }
        };

        let mut weights = Vec::with_capacity(fd.weighted.len());
        for w in &fd.weighted {
            weights.push(match w.parse::<AgentField>() {
                Ok(field) => Weight::Field(field),
                Err(()) => Weight::Balance(self.currency(agent, w)?),
            });
        }
        let requires = fd
            .requires
            .iter()
            .map(|r| self.lookup(agent, r))
            .collect::<Result<Vec<_>, _>>()?;
        let deprive = fd
            .deprive
            .map(|d| d.unit.to_minutes(d.value, self.clock.day_length_minutes));

        Ok(Flow {
            direction,
            view,
            currency: fd.currency.clone(),
            unit: fd.unit,
            base_value: fd.value,
            connections,
            curve: self.curve(agent, fd, n_steps)?,
            criteria,
            weights,
            requires,
            required: fd.required,
            deprive,
            harvest: fd.harvest,
            buffer_remaining: 0,
            deprive_remaining: deprive.unwrap_or(0.0),
            ledger: Ledger::default(),
        })
    }

    fn events(&mut self, agent: &Agent, desc: &AgentDesc) -> Result<Option<Events>, InitError> {
        if desc.events.is_empty() {
            return Ok(None);
        }
        let day = self.clock.day_length_minutes;
        let mut events = Vec::with_capacity(desc.events.len());
        for e in &desc.events {
            let per_unit = e.probability.unit.minutes(day);
            let p_step = 1.0 - (1.0 - e.probability.value).powf(self.clock.minutes_per_step / per_unit);
            let target = match &e.currency {
                Some(c) => Some(self.lookup(agent, c)?),
                None => None,
            };
            events.push(EventState {
                name: e.name.clone(),
                kind: e.kind,
                scope: e.scope,
                p_step,
                magnitude: e.magnitude.map_or(1.0, |m| m.value),
                magnitude_variation: e.magnitude.and_then(|m| m.variation),
                duration_minutes: e.duration.map(|d| d.unit.to_minutes(d.value, day)),
                duration_variation: e.duration.and_then(|d| d.variation),
                target,
                instances: Vec::new(),
                multiplier: 1.0,
            });
        }
        Ok(Some(Events { events }))
    }

    fn light_currency(&self, agent: &Agent) -> Result<CurrencyId, InitError> {
        let missing = || InitError::MissingCapacity {
            agent: agent.agent_type.clone(),
            storage: agent.agent_type.clone(),
            currency: LIGHT_CURRENCY.to_string(),
        };
        let id = self.registry.currency_id(LIGHT_CURRENCY).ok_or_else(missing)?;
        let own = self.first_of(&agent.agent_type).and_then(|p| p.storage.as_ref());
        match own {
            Some(s) if s.has(id) => Ok(id),
            _ => Err(missing()),
        }
    }

    fn custom(&self, agent: &Agent, desc: &AgentDesc, flows: &[Flow]) -> Result<Option<Custom>, InitError> {
        let Some(function) = desc.custom_function else {
            return Ok(None);
        };
        let custom = match function {
            CustomFunction::AtmosphereEqualizer => {
                let Some((flow, class)) = flows.iter().find_map(|f| match f.view {
                    View::Class(class) => Some((f, class)),
                    View::Currency(_) => None,
                }) else {
                    return Err(InitError::NoConnection {
                        agent: agent.agent_type.clone(),
                        currency: "atmosphere".to_string(),
                    });
                };
                for storage in &flow.connections {
                    let p = self.pending.iter().find(|p| p.agent.id == *storage);
                    if p.and_then(|p| p.storage.as_ref()).and_then(|s| s.volume).is_none() {
                        return Err(InitError::MissingVolume {
                            agent: agent.agent_type.clone(),
                            storage: p.map(|p| p.agent.agent_type.clone()).unwrap_or_default(),
                        });
                    }
                }
                Custom::AtmosphereEqualizer {
                    storages: flow.connections.clone(),
                    class,
                    max_flow: EQUALIZER_MAX_FLOW,
                }
            }
            CustomFunction::ElectricLamp => {
                let target = match &desc.characteristics.lamp_target {
                    None => None,
                    Some(t) => {
                        let Some(plant) = self.first_of(t) else {
                            return Err(InitError::UnknownAgent {
                                agent: agent.agent_type.clone(),
                                target: t.clone(),
                            });
                        };
                        if plant.agent.agent_class != PLANT_CLASS {
                            return Err(InitError::NotAPlant {
                                agent: agent.agent_type.clone(),
                                target: t.clone(),
                            });
                        }
                        Some(plant.agent.id)
                    }
                };
                Custom::ElectricLamp {
                    light: self.light_currency(agent)?,
                    target,
                }
            }
            CustomFunction::Sun => Custom::Sun {
                light: self.light_currency(agent)?,
            },
        };
        Ok(Some(custom))
    }

    fn plant(&self, agent: &Agent, desc: &AgentDesc, flows: &[Flow]) -> Result<Plant, InitError> {
        let ch = &desc.characteristics;
        let day_steps = self.clock.day_steps();
        let photoperiod = ch.photoperiod.unwrap_or(self.clock.day_length_minutes / 60.0);
        let envelope = photoperiod_envelope(day_steps, photoperiod, self.clock.hours_per_step());

        let light = match &ch.light_source {
            None => None,
            Some(source) => {
                let Some(p) = self.first_of(source) else {
                    return Err(InitError::UnknownAgent {
                        agent: agent.agent_type.clone(),
                        target: source.clone(),
                    });
                };
                let electric = self.desc(&p.agent).custom_function == Some(CustomFunction::ElectricLamp);
                Some(LightSource {
                    agent: p.agent.id,
                    electric,
                })
            }
        };
        let co2_currency = self.registry.currency_id(CO2_CURRENCY);
        let co2_storage = co2_currency.and_then(|co2| {
            flows
                .iter()
                .find(|f| self.registry.contains(f.view, co2))
                .and_then(|f| f.connections.first().copied())
        });
        let inedible_flow = ch.inedible.as_ref().and_then(|name| {
            flows
                .iter()
                .position(|f| f.direction == Direction::Out && &f.currency == name)
        });

        Ok(Plant {
            envelope,
            par_baseline: ch.par_baseline.unwrap_or(0.0),
            light,
            light_currency: light.and_then(|_| self.registry.currency_id(LIGHT_CURRENCY)),
            pathway: ch.carbon_fixation.unwrap_or_default(),
            co2_storage,
            co2_currency,
            inedible_flow,
        })
    }

    fn capabilities(&mut self, agent: &Agent) -> Result<Capabilities, InitError> {
        let config = self.config;
        let desc = &config.agent_desc[agent.agent_type_id as usize];
        let ch = &desc.characteristics;
        let lifetime_steps = self.lifetime_steps(desc);
        let n_steps = if lifetime_steps > 0 {
            lifetime_steps as usize
        } else {
            self.clock.day_steps()
        };

        let mut flows = Vec::with_capacity(desc.inputs.len() + desc.outputs.len());
        for fd in &desc.inputs {
            flows.push(self.flow(agent, desc, Direction::In, fd, n_steps)?);
        }
        for fd in &desc.outputs {
            flows.push(self.flow(agent, desc, Direction::Out, fd, n_steps)?);
        }

        let mut thresholds = Vec::with_capacity(desc.thresholds.len());
        for t in &desc.thresholds {
            let currency = self.currency(agent, &t.currency)?;
            let mut storage_types: Vec<String> = Vec::new();
            for (f, fd) in flows.iter().zip(desc.inputs.iter().chain(&desc.outputs)) {
                if self.registry.contains(f.view, currency) {
                    for c in &fd.connections {
                        if !storage_types.contains(c) {
                            storage_types.push(c.clone());
                        }
                    }
                }
            }
            thresholds.push(Threshold {
                currency,
                limit: t.limit,
                value: t.value,
                storage_types,
            });
        }

        let mut caps = Capabilities {
            events: self.events(agent, desc)?,
            custom: self.custom(agent, desc, &flows)?,
            ..Default::default()
        };

        if lifetime_steps > 0 || ch.growth_criteria.is_some() {
            let criteria_flow = ch.growth_criteria.as_ref().and_then(|name| {
                flows
                    .iter()
                    .position(|f| f.direction == Direction::Out && &f.currency == name)
            });
            let total_growth = criteria_flow.map_or(0.0, |i| {
                let curve = &flows[i].curve;
                if curve.len() == 1 {
                    curve[0] * n_steps as f64
                } else {
                    curve.iter().sum()
                }
            });
            caps.growth = Some(Growth {
                lifetime_steps,
                reproduce: ch.reproduce,
                criteria_flow,
                total_growth,
                ..Default::default()
            });
        }
        if desc.agent_class == PLANT_CLASS {
            caps.plant = Some(self.plant(agent, desc, &flows)?);
        }

        let needs_exchange = !flows.is_empty() || !thresholds.is_empty() || caps.custom.is_some() || caps.plant.is_some();
        if needs_exchange {
            let variation = desc.variation;
            caps.exchange = Some(Exchange {
                flows,
                initial_variation: variation.initial.map_or(1.0, |v| v.sample(&mut *self.rng)),
                step_variation: variation.step,
                thresholds,
                ..Default::default()
            });
        }
        Ok(caps)
    }
}
