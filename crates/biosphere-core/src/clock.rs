//! Simulated time.

use biosphere_logic::time::steps_per_day;
use biosphere_logic::{Location, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::config::TerminationRule;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub location: Location,
    pub minutes_per_step: f64,
    pub day_length_minutes: f64,
    pub elapsed_minutes: f64,
    /// Completed steps, including the one in progress while agents step.
    pub step_num: u64,
}

impl Clock {
    pub fn new(location: Location, minutes_per_step: f64) -> Self {
        Self {
            location,
            minutes_per_step,
            day_length_minutes: location.day_length_minutes(),
            elapsed_minutes: 0.0,
            step_num: 0,
        }
    }

    pub fn hours_per_step(&self) -> f64 {
        self.minutes_per_step / 60.0
    }

    pub fn day_steps(&self) -> usize {
        steps_per_day(self.minutes_per_step, self.day_length_minutes)
    }

    /// Zero-based index of the step being run.
    pub fn tick(&self) -> u64 {
        self.step_num.saturating_sub(1)
    }

    pub fn step_of_day(&self) -> usize {
        (self.tick() % self.day_steps() as u64) as usize
    }

    /// Minutes expressed in `unit` at this location.
    pub fn in_unit(&self, minutes: f64, unit: TimeUnit) -> f64 {
        unit.from_minutes(minutes, self.day_length_minutes)
    }

    /// First rule that would be exceeded after one more step.
    pub fn exceeded(&self, rules: &[TerminationRule]) -> Option<TerminationRule> {
        let next = self.elapsed_minutes + self.minutes_per_step;
        rules
            .iter()
            .find(|r| self.in_unit(next, r.unit) > r.value)
            .copied()
    }

    pub fn advance(&mut self) {
        self.elapsed_minutes += self.minutes_per_step;
        self.step_num += 1;
    }
}
