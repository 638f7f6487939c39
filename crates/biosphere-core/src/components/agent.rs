//! Agent identity and multiplicity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable agent identifier, unique within a model and preserved by snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Core identity of every agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub agent_type: String,
    /// Index of the type in the configuration's descriptor table.
    pub agent_type_id: u32,
    pub agent_class: String,
    pub active: bool,
    /// How many physical instances this agent represents.
    pub amount: u32,
    /// Nominal multiplicity, restored on reproduction.
    pub full_amount: u32,
    /// Steps lived since spawn or last reproduction.
    pub age_steps: u64,
    pub cause_of_death: Option<String>,
}

impl Agent {
    pub fn new(id: AgentId, agent_type: &str, agent_type_id: u32, agent_class: &str, amount: u32) -> Self {
        Self {
            id,
            agent_type: agent_type.to_string(),
            agent_type_id,
            agent_class: agent_class.to_string(),
            active: true,
            amount,
            full_amount: amount,
            age_steps: 0,
            cause_of_death: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.active && self.amount > 0
    }

    /// Mark as destroyed. Multiplicity is zeroed and never restored.
    pub fn destroy(&mut self, reason: impl Into<String>) {
        self.active = false;
        self.amount = 0;
        self.cause_of_death = Some(reason.into());
    }
}
