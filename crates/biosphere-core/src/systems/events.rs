//! Event occurrence, decay and aggregate multipliers.

use rand::Rng;

use super::agent::AgentStep;
use super::StepContext;
use crate::components::{EventInstance, Events};
use crate::config::EventKind;

/// Advance every event by one step.
///
/// Active instances lose `minutes_per_step` of duration and expire at zero;
/// survivors are capped at the scope size. Each free slot then fires with
/// the event's per-step probability. Returns the name of a termination
/// event that fired, if any.
pub fn step_events<R: Rng + ?Sized>(
    events: &mut Events,
    amount: u32,
    minutes_per_step: f64,
    rng: &mut R,
) -> Option<String> {
    for event in &mut events.events {
        for instance in &mut event.instances {
            instance.remaining_minutes -= minutes_per_step;
        }
        event.instances.retain(|i| i.remaining_minutes > 1e-9);
        let scope = event.scope_size(amount) as usize;
        event.instances.truncate(scope);

        let free = scope - event.instances.len();
        for _ in 0..free {
            if rng.gen::<f64>() >= event.p_step {
                continue;
            }
            match event.kind {
                EventKind::Termination => return Some(event.name.clone()),
                EventKind::Multiplier => {
                    let magnitude = event.magnitude * event.magnitude_variation.map_or(1.0, |v| v.sample(rng));
                    let remaining_minutes = match event.duration_minutes {
                        Some(d) => d * event.duration_variation.map_or(1.0, |v| v.sample(rng)),
                        None => minutes_per_step,
                    };
                    event.instances.push(EventInstance {
                        magnitude,
                        remaining_minutes,
                    });
                }
            }
        }

        event.multiplier = if scope == 0 {
            1.0
        } else {
            let affected: f64 = event.instances.iter().map(|i| i.magnitude).sum();
            let unaffected = (scope - event.instances.len()) as f64;
            (affected + unaffected) / scope as f64
        };
    }
    None
}

/// Returns true when a termination event destroyed the agent.
pub(crate) fn run(step: &mut AgentStep, ctx: &mut StepContext) -> bool {
    let Some(events) = step.events.as_mut() else {
        return false;
    };
    match step_events(events, step.agent.amount, ctx.clock.minutes_per_step, ctx.rng) {
        Some(name) => {
            step.kill(format!("{name} event"));
            true
        }
        None => false,
    }
}
