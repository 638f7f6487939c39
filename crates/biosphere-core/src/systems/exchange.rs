//! Resource exchange: inputs and outputs against connected storages.

use log::debug;

use super::agent::AgentStep;
use super::StepContext;
use crate::components::{AgentId, CriteriaSource, Exchange, Factors, Transfer, Weight};
use crate::config::{Direction, Required};
use crate::currency::View;

/// Committed amounts below this are numerical noise.
pub const VALUE_EPS: f64 = 1e-12;

pub(crate) enum FlowOutcome {
    Completed,
    /// A mandatory input was short; nothing from this step may stick.
    Aborted,
    /// The last member died.
    Died,
}

pub(crate) fn run_flows(step: &mut AgentStep, ctx: &mut StepContext) -> FlowOutcome {
    let Some(mut ex) = step.exchange.take() else {
        return FlowOutcome::Completed;
    };
    let outcome = exchange(step, &mut ex, ctx);
    if matches!(outcome, FlowOutcome::Died) {
        ex.clear_ledgers();
    }
    step.exchange = Some(ex);
    outcome
}

fn criteria_value(step: &AgentStep, ctx: &StepContext, factors: &Factors, source: &CriteriaSource) -> f64 {
    match source {
        CriteriaSource::Field(field) => step.field(*field, factors, ctx.clock),
        CriteriaSource::Ratio { currency, storage_type } => ctx
            .ratios
            .get(storage_type)
            .and_then(|r| r.get(currency))
            .copied()
            .unwrap_or(0.0),
    }
}

fn exchange(step: &mut AgentStep, ex: &mut Exchange, ctx: &mut StepContext) -> FlowOutcome {
    // Realized fraction of each input view this step, for `requires`.
    let mut influx: Vec<(View, f64)> = Vec::new();
    let grown = step.growth.as_ref().is_some_and(|g| g.grown);
    let criteria_flow = step.growth.as_ref().and_then(|g| g.criteria_flow);
    let index = match (&step.growth, criteria_flow) {
        (Some(g), Some(_)) => g.step_index,
        _ => step.agent.age_steps,
    };
    let variation = ex.initial_variation * ex.step_factor;
    let factors = ex.factors;

    for i in 0..ex.flows.len() {
        let flow = &ex.flows[i];
        if flow.base_value == 0.0 || grown != flow.harvest {
            continue;
        }

        let mut requires_factor = 1.0;
        let mut satisfied = true;
        for req in &flow.requires {
            match influx.iter().find(|(v, _)| v == req) {
                Some((_, ratio)) => requires_factor *= ratio,
                None => satisfied = false,
            }
        }
        if !satisfied {
            continue;
        }

        let mut value = flow.curve_value(index);
        if let Some(criteria) = &flow.criteria {
            let source = criteria_value(step, ctx, &factors, &criteria.source);
            let holds = criteria.limit.holds(source, criteria.value);
            let buffer = criteria.buffer;
            let flow = &mut ex.flows[i];
            if holds {
                flow.buffer_remaining = buffer;
            } else if flow.buffer_remaining > 0 {
                flow.buffer_remaining -= 1;
            } else {
                value = 0.0;
            }
        }

        let flow = &ex.flows[i];
        let amount = step.agent.amount;
        for weight in &flow.weights {
            value *= match weight {
                Weight::Field(field) => step.field(*field, &factors, ctx.clock),
                Weight::Balance(currency) => step.balance(ctx, step.id(), *currency) / amount.max(1) as f64,
            };
        }
        let events = step
            .events
            .as_ref()
            .map_or(1.0, |e| e.multiplier_for(ctx.registry, flow.view));
        value *= requires_factor * variation * events;

        let target = value * amount as f64;
        let direction = flow.direction;
        let view = flow.view;
        let connections = flow.connections.clone();
        let required = flow.required;
        let deprive = flow.deprive;

        let mut actual = target;
        if target > VALUE_EPS && direction == Direction::Out {
            let room: f64 = connections.iter().map(|c| output_room(step, ctx, *c, view)).sum();
            actual = actual.min(room);
        }
        if target > VALUE_EPS && direction == Direction::In {
            let available: f64 = connections.iter().map(|c| step.view_total(ctx, *c, view)).sum();
            if available < target {
                match required {
                    Some(Required::Mandatory) => return FlowOutcome::Aborted,
                    Some(Required::Desired) => ex.stalled = true,
                    None => {}
                }
                actual = available;
                if deprive.is_some() {
                    let flow = &mut ex.flows[i];
                    if flow.deprive_remaining > 0.0 {
                        flow.deprive_remaining = (flow.deprive_remaining - ctx.clock.minutes_per_step).max(0.0);
                    } else {
                        let n_satisfied = ((available / value).floor() as u32).min(amount);
                        actual = n_satisfied as f64 * value;
                        let n_die = amount - n_satisfied;
                        if n_die > 0 && !partial_death(step, ex, ctx, n_die, i) {
                            return FlowOutcome::Died;
                        }
                    }
                }
            } else if let Some(budget) = deprive {
                ex.flows[i].deprive_remaining = budget;
            }
        }

        let mut transfers = Vec::new();
        let mut realized = 0.0;
        if actual > VALUE_EPS {
            match direction {
                Direction::In => {
                    let mut remaining = actual;
                    for storage in &connections {
                        if remaining <= VALUE_EPS {
                            break;
                        }
                        let take = remaining.min(step.view_total(ctx, *storage, view));
                        if take <= 0.0 {
                            continue;
                        }
                        for (currency, delta) in step.increment(ctx, *storage, view, -take) {
                            if delta < 0.0 {
                                transfers.push(Transfer { storage: *storage, currency, amount: -delta });
                                realized -= delta;
                                remaining += delta;
                            }
                        }
                    }
                }
                Direction::Out => {
                    // Even split; storages with less room than their share
                    // fill first and pass the rest on.
                    let mut order: Vec<(AgentId, f64)> = connections
                        .iter()
                        .map(|c| (*c, output_room(step, ctx, *c, view)))
                        .collect();
                    order.sort_by(|a, b| a.1.total_cmp(&b.1));
                    let mut remaining = actual;
                    for (k, (storage, room)) in order.iter().enumerate() {
                        let share = (remaining / (order.len() - k) as f64).min(*room);
                        if share <= VALUE_EPS {
                            continue;
                        }
                        for (currency, delta) in step.increment(ctx, *storage, view, share) {
                            if delta > 0.0 {
                                transfers.push(Transfer { storage: *storage, currency, amount: delta });
                                realized += delta;
                                remaining -= delta;
                            }
                        }
                    }
                }
            }
        }

        let flow = &mut ex.flows[i];
        if realized >= VALUE_EPS {
            flow.ledger.target = target;
            flow.ledger.actual = realized;
            flow.ledger.transfers = transfers;
            if direction == Direction::In {
                influx.push((view, if target > 0.0 { realized / target } else { 1.0 }));
            }
        }
        if criteria_flow == Some(i) && !ex.stalled {
            if let Some(growth) = step.growth.as_mut() {
                growth.advance(realized / step.agent.amount.max(1) as f64);
                flow.ledger.growth = Some(growth.growth_rate);
            }
        }
    }
    FlowOutcome::Completed
}

/// Room left in `storage` for a deposit into `view`. Class views cannot be
/// deposited into, so they report none.
fn output_room(step: &AgentStep, ctx: &StepContext, storage: AgentId, view: View) -> f64 {
    match view {
        View::Currency(currency) => step.headroom(ctx, storage, currency),
        View::Class(_) => 0.0,
    }
}

/// Remove `n_die` members starved of flow `flow_index`. Plants hand the
/// biomass of the dead to their inedible output. Returns false once no
/// member is left.
fn partial_death(step: &mut AgentStep, ex: &mut Exchange, ctx: &mut StepContext, n_die: u32, flow_index: usize) -> bool {
    let currency = ex.flows[flow_index].currency.clone();
    let inedible = step.plant.as_ref().and_then(|p| p.inedible_flow);
    let per_member = step.growth.as_ref().map_or(0.0, |g| g.current_growth);
    if let Some(j) = inedible {
        let biomass = per_member * n_die as f64;
        if biomass > VALUE_EPS {
            let view = ex.flows[j].view;
            let connections = ex.flows[j].connections.clone();
            let share = biomass / connections.len().max(1) as f64;
            for storage in connections {
                for (c, delta) in step.increment(ctx, storage, view, share) {
                    if delta > 0.0 {
                        let ledger = &mut ex.flows[j].ledger;
                        ledger.actual += delta;
                        ledger.transfers.push(Transfer { storage, currency: c, amount: delta });
                    }
                }
            }
        }
    }

    step.agent.amount = step.agent.amount.saturating_sub(n_die);
    debug!(
        "{} {}: {n_die} deprived of {currency}, {} left",
        step.agent.agent_type, step.agent.id, step.agent.amount
    );
    if step.agent.amount == 0 {
        step.kill(format!("deprived of {currency}"));
        return false;
    }
    true
}
