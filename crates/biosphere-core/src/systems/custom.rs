//! Custom agent behaviours: atmosphere equalizer, electric lamp, sun.

use super::agent::AgentStep;
use super::exchange::VALUE_EPS;
use super::StepContext;
use crate::components::{Agent, AgentId, Custom, Plant, Transfer};
use crate::config::PLANT_CLASS;
use crate::currency::{ClassId, CurrencyId, View};

pub(crate) fn run(step: &mut AgentStep, ctx: &mut StepContext) {
    let Some(custom) = step.custom.clone() else {
        return;
    };
    match custom {
        Custom::AtmosphereEqualizer {
            storages,
            class,
            max_flow,
        } => equalize(step, ctx, &storages, class, max_flow),
        Custom::ElectricLamp { light, target } => lamp(step, ctx, light, target),
        Custom::Sun { light } => {
            let id = step.id();
            step.set_balance(ctx, id, light, 0.0);
        }
    }
}

/// Move each gas toward equal density across `storages`, moving at most
/// `max_flow` in total and scaling every move by the same factor. The
/// factor is also capped by receiver headroom, so the class total is kept.
fn equalize(step: &mut AgentStep, ctx: &mut StepContext, storages: &[AgentId], class: ClassId, max_flow: f64) {
    let volumes: Vec<f64> = storages.iter().map(|s| step.volume(ctx, *s)).collect();
    let total_volume: f64 = volumes.iter().sum();
    if total_volume <= 0.0 {
        return;
    }

    // Positive excess leaves the storage.
    let mut moves: Vec<(AgentId, CurrencyId, f64)> = Vec::new();
    for gas in ctx.registry.members(View::Class(class)) {
        let balances: Vec<f64> = storages.iter().map(|s| step.balance(ctx, *s, *gas)).collect();
        let density = balances.iter().sum::<f64>() / total_volume;
        for ((storage, balance), volume) in storages.iter().zip(&balances).zip(&volumes) {
            moves.push((*storage, *gas, balance - density * volume));
        }
    }
    let moved: f64 = moves.iter().map(|(_, _, excess)| excess.max(0.0)).sum();
    if moved <= VALUE_EPS {
        return;
    }
    // No receiver may be pushed past its capacity, or clamping would lose mass.
    let mut rate = (max_flow / moved).min(1.0);
    for (storage, gas, excess) in &moves {
        if *excess < -VALUE_EPS {
            rate = rate.min(step.headroom(ctx, *storage, *gas) / -excess);
        }
    }
    if moved * rate <= VALUE_EPS {
        return;
    }

    let mut transfers = Vec::new();
    for (storage, gas, excess) in moves {
        let balance = step.balance(ctx, storage, gas);
        step.set_balance(ctx, storage, gas, balance - excess * rate);
        if excess > 0.0 {
            transfers.push(Transfer {
                storage,
                currency: gas,
                amount: excess * rate,
            });
        }
    }
    if let Some(flow) = step.exchange.as_mut().and_then(|e| e.flows.first_mut()) {
        flow.ledger.actual = moved * rate;
        flow.ledger.transfers = transfers;
    }
}

/// Clear leftover light and size the lamp to the plants it serves.
fn lamp(step: &mut AgentStep, ctx: &mut StepContext, light: CurrencyId, target: Option<AgentId>) {
    let id = step.id();
    step.set_balance(ctx, id, light, 0.0);

    let (amount, daily_growth_factor) = match target.and_then(|t| ctx.entity(t)) {
        Some(entity) => {
            let amount = ctx.world.get::<&Agent>(entity).map_or(0, |a| a.amount);
            let factor = ctx
                .world
                .get::<&Plant>(entity)
                .map_or(1.0, |p| p.envelope_at(ctx.clock.step_of_day()));
            (amount, factor)
        }
        None => {
            let amount = ctx
                .world
                .query::<&Agent>()
                .iter()
                .filter(|(_, a)| a.active && a.agent_class == PLANT_CLASS)
                .map(|(_, a)| a.amount)
                .sum();
            (amount, 1.0)
        }
    };
    step.agent.amount = amount;
    if let Some(ex) = &mut step.exchange {
        ex.factors.daily_growth_factor = daily_growth_factor;
    }
}
