//! Step-level reporting feed.
//!
//! A plain serde snapshot of what happened in the last step: agent counts,
//! storage balances against capacity, and every flow's ledger. Dead agents
//! stay in the feed with zero multiplicity and empty ledgers.

use biosphere_logic::Unit;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::config::Direction;
use crate::engine::Model;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub currency: String,
    pub balance: f64,
    /// Capacity scaled by the agent's multiplicity.
    pub capacity: f64,
    pub unit: Unit,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub storage: AgentId,
    pub currency: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub direction: Direction,
    pub currency: String,
    pub target: f64,
    pub actual: f64,
    pub transfers: Vec<TransferRecord>,
    /// Criteria buffer steps left, when the flow has criteria.
    pub buffer: Option<u32>,
    /// Deprivation minutes left, when the flow has a budget.
    pub deprive: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    pub step_index: u64,
    pub total_growth: f64,
    pub current_growth: f64,
    pub growth_rate: f64,
    pub grown: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub active: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub agent_type: String,
    pub amount: u32,
    pub age_steps: u64,
    pub active: bool,
    pub cause_of_death: Option<String>,
    pub storage: Vec<StorageRecord>,
    pub flows: Vec<FlowRecord>,
    pub growth: Option<GrowthRecord>,
    pub events: Vec<EventRecord>,
    pub step_variation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step_num: u64,
    pub elapsed_minutes: f64,
    pub is_terminated: bool,
    pub termination_reason: Option<String>,
    /// Live multiplicity per agent type, in id order of first appearance.
    pub agent_counts: IndexMap<String, u32>,
    pub agents: Vec<AgentRecord>,
}

impl StepReport {
    pub(crate) fn collect(model: &Model) -> Self {
        let registry = model.registry();
        let mut agents = Vec::new();
        let mut agent_counts: IndexMap<String, u32> = IndexMap::new();

        for id in model.agents_by_type(None) {
            let Some(agent) = model.agent(id) else {
                continue;
            };
            *agent_counts.entry(agent.agent_type.clone()).or_default() += agent.amount;

            let storage = model
                .storage(id)
                .map(|s| {
                    let ratios = model.ratios().get(&agent.agent_type);
                    s.capacities
                        .iter()
                        .map(|(c, cap)| StorageRecord {
                            currency: registry.currency(*c).name.clone(),
                            balance: s.balance(*c),
                            capacity: s.capacity(*c, agent.amount),
                            unit: cap.unit,
                            ratio: ratios.and_then(|r| r.get(c)).copied().unwrap_or(0.0),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let exchange = model.exchange(id);
            let flows = exchange
                .as_ref()
                .map(|ex| {
                    ex.flows
                        .iter()
                        .map(|f| FlowRecord {
                            direction: f.direction,
                            currency: f.currency.clone(),
                            target: f.ledger.target,
                            actual: f.ledger.actual,
                            transfers: f
                                .ledger
                                .transfers
                                .iter()
                                .map(|t| TransferRecord {
                                    storage: t.storage,
                                    currency: registry.currency(t.currency).name.clone(),
                                    amount: t.amount,
                                })
                                .collect(),
                            buffer: f.criteria.as_ref().map(|_| f.buffer_remaining),
                            deprive: f.deprive.map(|_| f.deprive_remaining),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let growth = model.growth(id).map(|g| GrowthRecord {
                step_index: g.step_index,
                total_growth: g.total_growth,
                current_growth: g.current_growth,
                growth_rate: g.growth_rate,
                grown: g.grown,
            });

            let events = model
                .events(id)
                .map(|ev| {
                    ev.events
                        .iter()
                        .map(|e| EventRecord {
                            name: e.name.clone(),
                            active: e.instances.len(),
                            multiplier: e.multiplier,
                        })
                        .collect()
                })
                .unwrap_or_default();

            agents.push(AgentRecord {
                id,
                agent_type: agent.agent_type,
                amount: agent.amount,
                age_steps: agent.age_steps,
                active: agent.active,
                cause_of_death: agent.cause_of_death,
                storage,
                flows,
                growth,
                events,
                step_variation: exchange
                    .filter(|ex| ex.step_variation.is_some())
                    .map(|ex| ex.step_factor),
            });
        }

        Self {
            step_num: model.step_num(),
            elapsed_minutes: model.elapsed_minutes(),
            is_terminated: model.is_terminated(),
            termination_reason: model.termination_reason().map(str::to_string),
            agent_counts,
            agents,
        }
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
