//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for compact binary snapshots and serde_json for a readable
//! form. Components are serialized per agent then reassembled on load; the
//! random stream, clock and ratio cache travel with them so a restored model
//! continues exactly where the saved one stopped.

use std::collections::HashMap;
use std::io::{Read, Write};

use hecs::{EntityBuilder, World};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::components::*;
use crate::currency::CurrencyRegistry;
use crate::engine::{Model, Termination};
use crate::error::SnapshotError;
use crate::scheduler::Scheduler;
use crate::systems::{Co2Cache, RatioCache};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub clock: Clock,
    pub termination: Termination,
    pub registry: CurrencyRegistry,
    /// Random stream, including its position
    pub rng: ChaCha8Rng,
    pub ratios: RatioCache,
    pub scheduler: Scheduler,
    pub next_id: u64,
    /// Every agent with its components, in id order
    pub agents: Vec<SerializableAgent>,
}

/// All possible components for an agent, serialized as optionals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableAgent {
    pub agent: Agent,
    pub storage: Option<Storage>,
    pub exchange: Option<Exchange>,
    pub growth: Option<Growth>,
    pub plant: Option<Plant>,
    pub events: Option<Events>,
    pub custom: Option<Custom>,
}

fn serialize_agents(world: &World) -> Vec<SerializableAgent> {
    let mut agents: Vec<SerializableAgent> = world
        .query::<(
            &Agent,
            Option<&Storage>,
            Option<&Exchange>,
            Option<&Growth>,
            Option<&Plant>,
            Option<&Events>,
            Option<&Custom>,
        )>()
        .iter()
        .map(|(_, (agent, storage, exchange, growth, plant, events, custom))| SerializableAgent {
            agent: agent.clone(),
            storage: storage.cloned(),
            exchange: exchange.cloned(),
            growth: growth.cloned(),
            plant: plant.cloned(),
            events: events.cloned(),
            custom: custom.cloned(),
        })
        .collect();
    agents.sort_by_key(|a| a.agent.id);
    agents
}

impl Model {
    /// Capture the full model state.
    pub fn snapshot(&self) -> SaveData {
        SaveData {
            version: SAVE_VERSION,
            clock: self.clock,
            termination: self.termination.clone(),
            registry: self.registry.clone(),
            rng: self.rng.clone(),
            ratios: self.ratios.clone(),
            scheduler: self.scheduler.clone(),
            next_id: self.next_id,
            agents: serialize_agents(&self.world),
        }
    }

    /// Rebuild a model from a snapshot without restepping.
    pub fn from_snapshot(data: SaveData) -> Result<Self, SnapshotError> {
        if data.version != SAVE_VERSION {
            log::warn!("refusing snapshot version {} (expected {SAVE_VERSION})", data.version);
            return Err(SnapshotError::VersionMismatch {
                expected: SAVE_VERSION,
                found: data.version,
            });
        }

        let mut world = World::new();
        let mut index = HashMap::with_capacity(data.agents.len());
        for sa in data.agents {
            let id = sa.agent.id;
            let mut builder = EntityBuilder::new();
            builder.add(sa.agent);
            if let Some(c) = sa.storage {
                builder.add(c);
            }
            if let Some(c) = sa.exchange {
                builder.add(c);
            }
            if let Some(c) = sa.growth {
                builder.add(c);
            }
            if let Some(c) = sa.plant {
                builder.add(c);
            }
            if let Some(c) = sa.events {
                builder.add(c);
            }
            if let Some(c) = sa.custom {
                builder.add(c);
            }
            index.insert(id, world.spawn(builder.build()));
        }

        Ok(Self {
            world,
            clock: data.clock,
            termination: data.termination,
            rng: data.rng,
            registry: data.registry,
            ratios: data.ratios,
            co2: Co2Cache::new(),
            scheduler: data.scheduler,
            index,
            next_id: data.next_id,
        })
    }

    /// Save simulation state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        bincode::serialize_into(writer, &self.snapshot())?;
        Ok(())
    }

    /// Load simulation state from a reader
    pub fn load<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let data: SaveData = bincode::deserialize_from(reader)?;
        Self::from_snapshot(data)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let data: SaveData = serde_json::from_str(text)?;
        Self::from_snapshot(data)
    }
}
