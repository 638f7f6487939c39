//! Plant lifecycle, light competition and CO2 response.

use std::collections::HashMap;

use biosphere_logic::photosynthesis::{co2_response, mass_ratio_to_ppm, Co2Response, Pathway};
use log::debug;

use super::agent::AgentStep;
use super::StepContext;
use crate::components::{AgentId, Storage};
use crate::currency::{CurrencyId, View};

/// Molar mass of CO2 and of the carrier atmosphere (g/mol).
const CO2_MOLAR_MASS: f64 = 44.01;
const AIR_MOLAR_MASS: f64 = 28.97;

/// CO2 responses computed during one step, keyed by
/// `(tick, atmosphere storage, pathway)`.
pub type Co2Cache = HashMap<(u64, AgentId, Pathway), Co2Response>;

/// Reproduce or die once grown, then mark maturity for this step.
/// Returns false when the agent was destroyed.
pub(crate) fn lifecycle(step: &mut AgentStep, ctx: &StepContext) -> bool {
    let Some(growth) = step.growth.as_mut() else {
        return true;
    };
    if growth.grown {
        if !growth.reproduce {
            step.kill("lifetime reached");
            return false;
        }
        growth.reset();
        step.agent.age_steps = 0;
        step.agent.amount = step.agent.full_amount;
        if let Some(ex) = &mut step.exchange {
            for flow in &mut ex.flows {
                if let Some(budget) = flow.deprive {
                    flow.deprive_remaining = budget;
                }
            }
        }
        debug!(
            "{} {} reproduced at step {}",
            step.agent.agent_type, step.agent.id, ctx.clock.step_num
        );
    }
    if let Some(growth) = step.growth.as_mut() {
        if growth.lifetime_steps > 0 && step.agent.age_steps + 1 >= growth.lifetime_steps {
            growth.grown = true;
        }
    }
    true
}

fn co2_mass_ratio(ctx: &StepContext, storage: AgentId, co2: CurrencyId) -> f64 {
    let Some(entity) = ctx.entity(storage) else {
        return 0.0;
    };
    let Ok(s) = ctx.world.get::<&Storage>(entity) else {
        return 0.0;
    };
    s.ratios()
        .into_iter()
        .find(|(c, _)| *c == co2)
        .map_or(0.0, |(_, r)| r)
}

/// Light received and CO2 response for this step, stored as exchange
/// factors.
pub(crate) fn update_factors(step: &mut AgentStep, ctx: &mut StepContext) {
    let Some(plant) = step.plant.take() else {
        return;
    };
    let Some(mut factors) = step.exchange.as_ref().map(|e| e.factors) else {
        step.plant = Some(plant);
        return;
    };

    let envelope = plant.envelope_at(ctx.clock.step_of_day());
    factors.daily_growth_factor = envelope;

    factors.par_factor = 1.0;
    if let (Some(light), Some(currency)) = (plant.light, plant.light_currency) {
        let ideal = plant.par_baseline * envelope * step.agent.amount as f64;
        if ideal > 0.0 {
            let delivered = ideal.min(step.balance(ctx, light.agent, currency));
            if light.electric && delivered > 0.0 {
                step.increment(ctx, light.agent, View::Currency(currency), -delivered);
            }
            factors.par_factor = delivered / ideal;
        }
    }

    if let (Some(storage), Some(co2)) = (plant.co2_storage, plant.co2_currency) {
        let key = (ctx.clock.tick(), storage, plant.pathway);
        let response = match ctx.co2.get(&key) {
            Some(r) => *r,
            None => {
                let ppm = mass_ratio_to_ppm(co2_mass_ratio(ctx, storage, co2), CO2_MOLAR_MASS, AIR_MOLAR_MASS);
                let r = co2_response(ppm, plant.pathway);
                ctx.co2.insert(key, r);
                r
            }
        };
        factors.cu_factor = response.uptake;
        factors.te_factor = response.transpiration_efficiency;
    }

    if let Some(ex) = &mut step.exchange {
        ex.factors = factors;
    }
    step.plant = Some(plant);
}
