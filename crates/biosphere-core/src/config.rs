//! Simulation configuration.
//!
//! Plain serde data describing currencies, agent types, agent instances and
//! global parameters. Loading and merging files is left to callers;
//! [`SimulationConfig::validate`] runs before any model is built and
//! reports every problem it finds at once.

use std::collections::HashSet;
use std::str::FromStr;

use biosphere_logic::photosynthesis::Pathway;
use biosphere_logic::{CurveSpec, Location, TimeUnit, Unit, VariationSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigIssue};

/// Agent class that receives the plant lifecycle extension.
pub const PLANT_CLASS: &str = "plants";
/// Currency carrying light from lamps or the sun to plants.
pub const LIGHT_CURRENCY: &str = "par";
/// Currency whose concentration drives the plant CO2 response.
pub const CO2_CURRENCY: &str = "co2";

fn default_minutes_per_step() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_amount() -> u32 {
    1
}

fn default_hour() -> TimeUnit {
    TimeUnit::Hour
}

/// Top-level configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub location: Location,
    #[serde(default = "default_minutes_per_step")]
    pub minutes_per_step: f64,
    /// Agent classes in stepping order.
    #[serde(default)]
    pub priorities: Vec<String>,
    #[serde(default)]
    pub termination: Vec<TerminationRule>,
    /// One entity per configured instance (multiplicity = amount) when true,
    /// otherwise `amount` entities of multiplicity one.
    #[serde(default = "default_true")]
    pub single_agent: bool,
    pub currencies: Vec<CurrencyClassDesc>,
    pub agent_desc: IndexMap<String, AgentDesc>,
    pub agents: IndexMap<String, AgentInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCondition {
    Time,
}

fn default_condition() -> TerminationCondition {
    TerminationCondition::Time
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminationRule {
    #[serde(default = "default_condition")]
    pub condition: TerminationCondition,
    pub value: f64,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyClassDesc {
    pub name: String,
    pub currencies: Vec<CurrencyDesc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyDesc {
    pub name: String,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    #[serde(default = "default_amount")]
    pub amount: u32,
    /// Starting balances by currency name.
    #[serde(default)]
    pub balances: IndexMap<String, f64>,
}

impl Default for AgentInstance {
    fn default() -> Self {
        Self {
            amount: 1,
            balances: IndexMap::new(),
        }
    }
}

/// Behaviour of one agent type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDesc {
    pub agent_class: String,
    #[serde(default)]
    pub characteristics: Characteristics,
    #[serde(default)]
    pub inputs: Vec<FlowDesc>,
    #[serde(default)]
    pub outputs: Vec<FlowDesc>,
    #[serde(default)]
    pub events: Vec<EventDesc>,
    #[serde(default)]
    pub variation: VariationDesc,
    #[serde(default)]
    pub custom_function: Option<CustomFunction>,
    #[serde(default)]
    pub thresholds: Vec<ThresholdDesc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    pub lifetime: Option<DurationDesc>,
    pub reproduce: bool,
    /// Output currency whose flow drives growth.
    pub growth_criteria: Option<String>,
    pub capacities: IndexMap<String, CapacityDesc>,
    /// Gas volume in m3, used by the atmosphere equalizer.
    pub volume: Option<f64>,
    /// Agent type supplying light to a plant.
    pub light_source: Option<String>,
    /// Light needed per plant per step at a daily-mean hour.
    pub par_baseline: Option<f64>,
    /// Hours of light needed per day; a full day when absent.
    pub photoperiod: Option<f64>,
    pub carbon_fixation: Option<Pathway>,
    /// Output currency receiving biomass of plants that die early.
    pub inedible: Option<String>,
    /// Plant type served by an electric lamp; all plants when absent.
    pub lamp_target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationDesc {
    pub value: f64,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityDesc {
    pub value: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Required {
    /// Abort the whole step when short.
    Mandatory,
    /// Stall growth when short.
    Desired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "=")]
    Equal,
}

impl Limit {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Limit::Greater => value > threshold,
            Limit::Less => value < threshold,
            Limit::Equal => value == threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaDesc {
    /// An agent field (`growth_rate`) or a storage ratio (`co2_ratio_in`).
    pub name: String,
    pub limit: Limit,
    pub value: f64,
    #[serde(default)]
    pub buffer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepriveDesc {
    pub value: f64,
    #[serde(default = "default_hour")]
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthDesc {
    pub lifetime: Option<CurveSpec>,
    pub daily: Option<CurveSpec>,
}

/// One input or output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDesc {
    /// Currency or currency class name.
    pub currency: String,
    pub value: f64,
    /// Time base of `value`; per step when absent.
    #[serde(default)]
    pub flow_time: Option<TimeUnit>,
    pub unit: Unit,
    /// Connected agent types, in draw-down priority order.
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub criteria: Option<CriteriaDesc>,
    #[serde(default)]
    pub weighted: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub required: Option<Required>,
    #[serde(default)]
    pub deprive: Option<DepriveDesc>,
    #[serde(default)]
    pub growth: Option<GrowthDesc>,
    /// Runs only once the agent is grown.
    #[serde(default)]
    pub harvest: bool,
}

impl FlowDesc {
    pub fn new(currency: &str, value: f64, unit: Unit, connections: &[&str]) -> Self {
        Self {
            currency: currency.to_string(),
            value,
            flow_time: None,
            unit,
            connections: connections.iter().map(|c| c.to_string()).collect(),
            criteria: None,
            weighted: Vec::new(),
            requires: Vec::new(),
            required: None,
            deprive: None,
            growth: None,
            harvest: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationDesc {
    /// Drawn once per agent.
    pub initial: Option<VariationSpec>,
    /// Redrawn every step.
    pub step: Option<VariationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFunction {
    AtmosphereEqualizer,
    ElectricLamp,
    Sun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Termination,
    Multiplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    Individual,
    #[default]
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityDesc {
    pub value: f64,
    #[serde(default = "default_hour")]
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeDesc {
    pub value: f64,
    #[serde(default)]
    pub variation: Option<VariationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventDurationDesc {
    pub value: f64,
    #[serde(default = "default_hour")]
    pub unit: TimeUnit,
    #[serde(default)]
    pub variation: Option<VariationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDesc {
    pub name: String,
    pub kind: EventKind,
    #[serde(default)]
    pub scope: EventScope,
    pub probability: ProbabilityDesc,
    #[serde(default)]
    pub magnitude: Option<MagnitudeDesc>,
    #[serde(default)]
    pub duration: Option<EventDurationDesc>,
    /// Restrict a multiplier to flows of this currency.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Kill the agent once a connected storage ratio crosses `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDesc {
    pub currency: String,
    pub limit: Limit,
    pub value: f64,
}

/// Agent fields that criteria and weights may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentField {
    Amount,
    Age,
    GrowthRate,
    CurrentGrowth,
    DailyGrowthFactor,
    ParFactor,
    CuFactor,
    TeFactor,
}

impl FromStr for AgentField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "amount" => AgentField::Amount,
            "age" => AgentField::Age,
            "growth_rate" => AgentField::GrowthRate,
            "current_growth" => AgentField::CurrentGrowth,
            "daily_growth_factor" => AgentField::DailyGrowthFactor,
            "par_factor" => AgentField::ParFactor,
            "cu_factor" => AgentField::CuFactor,
            "te_factor" => AgentField::TeFactor,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Parsed criteria name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriteriaName {
    Field(AgentField),
    /// `<currency>_ratio_<in|out>`: ratio of `currency` in the first storage
    /// connected to this agent's flow of that currency and direction.
    Ratio { currency: String, direction: Direction },
}

impl FromStr for CriteriaName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(field) = s.parse::<AgentField>() {
            return Ok(CriteriaName::Field(field));
        }
        for (suffix, direction) in [("_ratio_in", Direction::In), ("_ratio_out", Direction::Out)] {
            if let Some(currency) = s.strip_suffix(suffix) {
                if !currency.is_empty() {
                    return Ok(CriteriaName::Ratio {
                        currency: currency.to_string(),
                        direction,
                    });
                }
            }
        }
        Err(())
    }
}

impl SimulationConfig {
    /// Parse from JSON text without validating.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check cross-references and ranges, collecting every issue.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if !(self.minutes_per_step > 0.0) {
            issues.push(ConfigIssue::new("minutes_per_step", "must be positive"));
        }
        for (i, rule) in self.termination.iter().enumerate() {
            if !(rule.value >= 0.0) {
                issues.push(ConfigIssue::new(format!("termination[{i}]"), "value must be non-negative"));
            }
        }

        // Currencies and classes share one namespace.
        let mut names: HashSet<&str> = HashSet::new();
        let mut currencies: HashSet<&str> = HashSet::new();
        let mut classes: HashSet<&str> = HashSet::new();
        for (ci, class) in self.currencies.iter().enumerate() {
            if !names.insert(&class.name) {
                issues.push(ConfigIssue::new(
                    format!("currencies[{ci}]"),
                    format!("duplicate currency name '{}'", class.name),
                ));
            }
            classes.insert(&class.name);
            for currency in &class.currencies {
                if !names.insert(&currency.name) {
                    issues.push(ConfigIssue::new(
                        format!("currencies[{ci}].{}", class.name),
                        format!("duplicate currency name '{}'", currency.name),
                    ));
                }
                currencies.insert(&currency.name);
            }
        }
        let known = |name: &str| currencies.contains(name) || classes.contains(name);

        for (agent_type, instance) in &self.agents {
            let path = format!("agents.{agent_type}");
            let Some(desc) = self.agent_desc.get(agent_type) else {
                issues.push(ConfigIssue::new(path, "no agent descriptor"));
                continue;
            };
            if instance.amount == 0 {
                issues.push(ConfigIssue::new(&path, "amount must be at least 1"));
            }
            for currency in instance.balances.keys() {
                if !desc.characteristics.capacities.contains_key(currency) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.balances.{currency}"),
                        "balance given for a currency without capacity",
                    ));
                }
            }
        }

        for (agent_type, desc) in &self.agent_desc {
            let path = format!("agent_desc.{agent_type}");
            let ch = &desc.characteristics;

            for currency in ch.capacities.keys() {
                if !currencies.contains(currency.as_str()) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.characteristics.capacities.{currency}"),
                        "unknown currency",
                    ));
                }
            }
            for (field, target) in [
                ("light_source", &ch.light_source),
                ("lamp_target", &ch.lamp_target),
            ] {
                if let Some(target) = target {
                    if !self.agents.contains_key(target) {
                        issues.push(ConfigIssue::new(
                            format!("{path}.characteristics.{field}"),
                            format!("unresolved agent '{target}'"),
                        ));
                    }
                }
            }
            if let Some(growth) = &ch.growth_criteria {
                if !desc.outputs.iter().any(|f| &f.currency == growth) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.characteristics.growth_criteria"),
                        format!("no output flow of '{growth}'"),
                    ));
                }
            }
            if let Some(inedible) = &ch.inedible {
                if !desc.outputs.iter().any(|f| &f.currency == inedible) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.characteristics.inedible"),
                        format!("no output flow of '{inedible}'"),
                    ));
                }
            }

            for (dir, flows) in [("inputs", &desc.inputs), ("outputs", &desc.outputs)] {
                for (i, flow) in flows.iter().enumerate() {
                    let fpath = format!("{path}.{dir}[{i}]");
                    if !known(&flow.currency) {
                        issues.push(ConfigIssue::new(&fpath, format!("unknown currency '{}'", flow.currency)));
                    } else if dir == "outputs" && classes.contains(flow.currency.as_str()) {
                        issues.push(ConfigIssue::new(&fpath, "outputs must name a single currency"));
                    }
                    for conn in &flow.connections {
                        if !self.agents.contains_key(conn) {
                            issues.push(ConfigIssue::new(
                                format!("{fpath}.connections"),
                                format!("unresolved connection '{conn}'"),
                            ));
                        }
                    }
                    if let Some(criteria) = &flow.criteria {
                        match criteria.name.parse::<CriteriaName>() {
                            Ok(CriteriaName::Ratio { currency, .. }) if !currencies.contains(currency.as_str()) => {
                                issues.push(ConfigIssue::new(
                                    format!("{fpath}.criteria"),
                                    format!("unknown currency '{currency}'"),
                                ));
                            }
                            Ok(_) => {}
                            Err(()) => issues.push(ConfigIssue::new(
                                format!("{fpath}.criteria"),
                                format!("unknown criteria '{}'", criteria.name),
                            )),
                        }
                    }
                    for weight in &flow.weighted {
                        if weight.parse::<AgentField>().is_err() && !ch.capacities.contains_key(weight) {
                            issues.push(ConfigIssue::new(
                                format!("{fpath}.weighted"),
                                format!("unknown weight '{weight}'"),
                            ));
                        }
                    }
                    for req in &flow.requires {
                        if !known(req) {
                            issues.push(ConfigIssue::new(
                                format!("{fpath}.requires"),
                                format!("unknown currency '{req}'"),
                            ));
                        }
                    }
                    if let Some(deprive) = &flow.deprive {
                        if !(deprive.value >= 0.0) {
                            issues.push(ConfigIssue::new(format!("{fpath}.deprive"), "must be non-negative"));
                        }
                    }
                }
            }

            for (i, event) in desc.events.iter().enumerate() {
                let epath = format!("{path}.events[{i}]");
                if !(0.0..=1.0).contains(&event.probability.value) {
                    issues.push(ConfigIssue::new(&epath, "probability must be within [0, 1]"));
                }
                if event.kind == EventKind::Multiplier && event.magnitude.is_none() {
                    issues.push(ConfigIssue::new(&epath, "multiplier event needs a magnitude"));
                }
                if let Some(currency) = &event.currency {
                    if !known(currency) {
                        issues.push(ConfigIssue::new(&epath, format!("unknown currency '{currency}'")));
                    }
                }
            }

            for (i, threshold) in desc.thresholds.iter().enumerate() {
                if !currencies.contains(threshold.currency.as_str()) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.thresholds[{i}]"),
                        format!("unknown currency '{}'", threshold.currency),
                    ));
                }
            }
        }

        let classes_in_use: HashSet<&str> = self
            .agents
            .keys()
            .filter_map(|t| self.agent_desc.get(t))
            .map(|d| d.agent_class.as_str())
            .collect();
        for class in &self.priorities {
            if !classes_in_use.contains(class.as_str()) {
                issues.push(ConfigIssue::new(
                    "priorities",
                    format!("class '{class}' has no agents"),
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SimulationConfig {
        serde_json::from_str(
            r#"{
                "currencies": [
                    {"name": "atmosphere", "currencies": [
                        {"name": "o2", "unit": "kg"},
                        {"name": "co2", "unit": "kg"}
                    ]}
                ],
                "agent_desc": {
                    "habitat": {
                        "agent_class": "structures",
                        "characteristics": {"capacities": {
                            "o2": {"value": 100, "unit": "kg"},
                            "co2": {"value": 100, "unit": "kg"}
                        }}
                    },
                    "human": {
                        "agent_class": "humans",
                        "inputs": [{"currency": "o2", "value": 0.035, "unit": "kg",
                                    "connections": ["habitat"]}],
                        "outputs": [{"currency": "co2", "value": 0.04, "unit": "kg",
                                     "connections": ["habitat"], "requires": ["o2"]}]
                    }
                },
                "agents": {
                    "habitat": {"balances": {"o2": 50}},
                    "human": {"amount": 4}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.minutes_per_step, 60.0);
        assert!(config.single_agent);
        assert_eq!(config.location, Location::Earth);
        assert_eq!(config.agents["habitat"].amount, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_issues_are_aggregated() {
        let mut config = minimal();
        config.currencies[0].currencies.push(CurrencyDesc {
            name: "o2".into(),
            unit: Unit::Kilogram,
        });
        config.agents.insert("rover".into(), AgentInstance::default());
        config.agent_desc["human"].inputs[0].connections.push("greenhouse".into());
        config.agent_desc["human"].inputs[0].weighted.push("charisma".into());

        let err = config.validate().unwrap_err();
        let issues = err.issues();
        assert_eq!(issues.len(), 4, "{issues:?}");
        assert!(issues.iter().any(|i| i.message.contains("duplicate currency name 'o2'")));
        assert!(issues.iter().any(|i| i.path == "agents.rover"));
        assert!(issues.iter().any(|i| i.message.contains("unresolved connection 'greenhouse'")));
        assert!(issues.iter().any(|i| i.message.contains("unknown weight 'charisma'")));
    }

    #[test]
    fn test_output_to_class_rejected() {
        let mut config = minimal();
        config.agent_desc["human"].outputs[0].currency = "atmosphere".into();
        let err = config.validate().unwrap_err();
        assert!(err.issues()[0].message.contains("single currency"));
    }

    #[test]
    fn test_unknown_priority_class() {
        let mut config = minimal();
        config.priorities = vec!["humans".into(), "robots".into()];
        let err = config.validate().unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert!(err.issues()[0].message.contains("robots"));
    }

    #[test]
    fn test_unknown_curve_type_fails_to_parse() {
        let json = r#"{"currency": "o2", "value": 1, "unit": "kg",
                       "growth": {"lifetime": {"type": "cubic"}}}"#;
        assert!(serde_json::from_str::<FlowDesc>(json).is_err());
    }

    #[test]
    fn test_criteria_names() {
        assert_eq!(
            "growth_rate".parse::<CriteriaName>(),
            Ok(CriteriaName::Field(AgentField::GrowthRate))
        );
        assert_eq!(
            "co2_ratio_in".parse::<CriteriaName>(),
            Ok(CriteriaName::Ratio {
                currency: "co2".into(),
                direction: Direction::In
            })
        );
        assert!("_ratio_out".parse::<CriteriaName>().is_err());
        assert!("mood".parse::<CriteriaName>().is_err());
    }

    #[test]
    fn test_limits() {
        assert!(Limit::Greater.holds(2.0, 1.0));
        assert!(!Limit::Less.holds(2.0, 1.0));
        assert!(Limit::Equal.holds(1.0, 1.0));
    }
}
