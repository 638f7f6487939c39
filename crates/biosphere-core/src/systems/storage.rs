//! Storage ratio cache and threshold checks.

use hecs::World;
use indexmap::IndexMap;

use super::agent::AgentStep;
use super::StepContext;
use crate::components::{Agent, Storage};
use crate::currency::CurrencyId;

/// Per agent type, each stored currency's share of its dimension's total.
pub type RatioCache = IndexMap<String, IndexMap<CurrencyId, f64>>;

/// Refresh the cache entry of the stepping storage agent.
pub(crate) fn update_ratios(step: &AgentStep, ctx: &mut StepContext) {
    let Ok(storage) = ctx.world.get::<&Storage>(step.entity) else {
        return;
    };
    if storage.capacities.is_empty() {
        return;
    }
    ctx.ratios
        .insert(step.agent.agent_type.clone(), storage.ratios().into_iter().collect());
}

/// Fill the cache from every storage in the world.
pub fn compute_all_ratios(world: &World, ratios: &mut RatioCache) {
    for (_, (agent, storage)) in world.query::<(&Agent, &Storage)>().iter() {
        if storage.capacities.is_empty() {
            continue;
        }
        ratios.insert(agent.agent_type.clone(), storage.ratios().into_iter().collect());
    }
}

/// Destroy the agent if any threshold is crossed. Returns true when it was.
pub(crate) fn check_thresholds(step: &mut AgentStep, ctx: &StepContext) -> bool {
    let Some(ex) = &step.exchange else {
        return false;
    };
    let breached = ex.thresholds.iter().find(|t| {
        t.storage_types.iter().any(|ty| {
            ctx.ratios
                .get(ty)
                .and_then(|r| r.get(&t.currency))
                .is_some_and(|ratio| t.limit.holds(*ratio, t.value))
        })
    });
    let Some(threshold) = breached else {
        return false;
    };
    let reason = format!("{} threshold", ctx.registry.currency(threshold.currency).name);
    step.kill(reason);
    true
}
