//! Plants, lamps and the atmosphere equalizer.

use biosphere_core::prelude::*;
use serde_json::{json, Value};

// ── Helpers ────────────────────────────────────────────────────────────────

fn build(config: Value) -> Model {
    let config: SimulationConfig = serde_json::from_value(config).expect("valid config json");
    Model::new(&config).expect("model builds")
}

/// A greenhouse, a shelf for produce, one lamp and ten wheat plants.
fn greenhouse(lamp_output: f64) -> Value {
    json!({
        "seed": 5,
        "priorities": ["structures", "lights", "plants"],
        "currencies": [
            {"name": "atmosphere", "currencies": [
                {"name": "o2", "unit": "kg"}, {"name": "co2", "unit": "kg"}
            ]},
            {"name": "light", "currencies": [{"name": "par", "unit": "mol"}]},
            {"name": "food", "currencies": [
                {"name": "biomass", "unit": "kg"}, {"name": "waste", "unit": "kg"}
            ]}
        ],
        "agent_desc": {
            "greenhouse": {"agent_class": "structures", "characteristics": {
                "volume": 10,
                "capacities": {"o2": {"value": 1000, "unit": "kg"}, "co2": {"value": 1000, "unit": "kg"}}
            }},
            "shelf": {"agent_class": "structures", "characteristics": {"capacities": {
                "biomass": {"value": 1000, "unit": "kg"}, "waste": {"value": 1000, "unit": "kg"}
            }}},
            "lamp": {"agent_class": "lights", "custom_function": "electric_lamp",
                "characteristics": {"capacities": {"par": {"value": 10, "unit": "mol"}}},
                "outputs": [{"currency": "par", "value": lamp_output, "unit": "mol", "connections": ["lamp"]}]},
            "wheat": {"agent_class": "plants",
                "characteristics": {
                    "lifetime": {"value": 3, "unit": "hour"},
                    "growth_criteria": "biomass",
                    "light_source": "lamp",
                    "par_baseline": 1.0
                },
                "inputs": [{"currency": "co2", "value": 0.01, "unit": "kg", "connections": ["greenhouse"]}],
                "outputs": [{"currency": "biomass", "value": 0.1, "unit": "kg", "connections": ["shelf"],
                             "weighted": ["par_factor"]}]}
        },
        "agents": {
            "greenhouse": {"balances": {"o2": 20, "co2": 10}},
            "shelf": {},
            "lamp": {},
            "wheat": {"amount": 10}
        }
    })
}

fn only(model: &Model, agent_type: &str) -> AgentId {
    model.agents_by_type(Some(agent_type))[0]
}

fn actual(model: &Model, id: AgentId, direction: Direction, currency: &str) -> f64 {
    model.ledger(id, direction, currency).map_or(0.0, |l| l.actual)
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn lamp_sizes_to_plants_and_light_is_consumed() {
    let mut model = build(greenhouse(1.0));
    let lamp = only(&model, "lamp");
    let wheat = only(&model, "wheat");
    model.step();

    assert_eq!(model.agent(lamp).unwrap().amount, 10);
    assert!((actual(&model, lamp, Direction::Out, "par") - 10.0).abs() < 1e-9);
    // Electric light is withdrawn by the plants.
    assert!(model.balance(lamp, "par").unwrap().abs() < 1e-9);
    let factors = model.exchange(wheat).unwrap().factors;
    assert!((factors.par_factor - 1.0).abs() < 1e-12);
    assert!((actual(&model, wheat, Direction::Out, "biomass") - 1.0).abs() < 1e-9);
}

#[test]
fn dim_light_scales_growth() {
    let mut model = build(greenhouse(0.5));
    let wheat = only(&model, "wheat");
    model.step();
    let factors = model.exchange(wheat).unwrap().factors;
    assert!((factors.par_factor - 0.5).abs() < 1e-12);
    assert!((actual(&model, wheat, Direction::Out, "biomass") - 0.5).abs() < 1e-9);
}

#[test]
fn lamp_target_follows_one_plant() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["lamp"]["characteristics"]["lamp_target"] = json!("wheat");
    let mut model = build(config);
    let lamp = only(&model, "lamp");
    model.step();
    assert_eq!(model.agent(lamp).unwrap().amount, 10);
    let factors = model.exchange(lamp).unwrap().factors;
    assert_eq!(factors.daily_growth_factor, 1.0);
}

#[test]
fn lamp_target_must_be_a_plant() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["lamp"]["characteristics"]["lamp_target"] = json!("shelf");
    let config: SimulationConfig = serde_json::from_value(config).unwrap();
    assert!(matches!(
        Model::new(&config),
        Err(BuildError::Init(InitError::NotAPlant { .. }))
    ));
}

#[test]
fn plant_dies_after_lifetime() {
    let mut model = build(greenhouse(1.0));
    let wheat = only(&model, "wheat");

    model.step_to(Some(3));
    let growth = model.growth(wheat).unwrap();
    assert!(growth.grown);
    assert!(model.agent(wheat).unwrap().is_alive());
    // Two growing steps out of a three step lifetime.
    assert!((growth.growth_rate - 2.0 / 3.0).abs() < 1e-9);

    model.step();
    let agent = model.agent(wheat).unwrap();
    assert!(!agent.is_alive());
    assert_eq!(agent.cause_of_death.as_deref(), Some("lifetime reached"));
}

#[test]
fn plant_reproduces_after_lifetime() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["wheat"]["characteristics"]["reproduce"] = json!(true);
    let mut model = build(config);
    let wheat = only(&model, "wheat");

    model.step_to(Some(4));
    let agent = model.agent(wheat).unwrap();
    assert!(agent.is_alive());
    assert_eq!(agent.amount, 10);
    assert_eq!(agent.age_steps, 1);
    let growth = model.growth(wheat).unwrap();
    assert!(!growth.grown);
    assert_eq!(growth.step_index, 1);
}

#[test]
fn starved_plants_leave_inedible_biomass() {
    let mut config = greenhouse(1.0);
    let wheat = &mut config["agent_desc"]["wheat"];
    wheat["characteristics"]["lifetime"] = Value::Null;
    wheat["characteristics"]["inedible"] = json!("waste");
    wheat["inputs"] = json!([{"currency": "co2", "value": 0.125, "unit": "kg",
                              "connections": ["greenhouse"], "deprive": {"value": 0}}]);
    wheat["outputs"]
        .as_array_mut()
        .unwrap()
        .push(json!({"currency": "waste", "value": 0.01, "unit": "kg", "connections": ["shelf"]}));
    // Exactly one step of CO2
    config["agents"]["greenhouse"]["balances"]["co2"] = json!(1.25);
    let mut model = build(config);
    let wheat = only(&model, "wheat");
    let shelf = only(&model, "shelf");

    model.step();
    assert_eq!(model.agent(wheat).unwrap().amount, 10);
    assert!((model.balance(shelf, "waste").unwrap() - 0.1).abs() < 1e-9);

    model.step();
    let agent = model.agent(wheat).unwrap();
    assert!(!agent.is_alive());
    assert_eq!(agent.cause_of_death.as_deref(), Some("deprived of co2"));
    // 0.1 kg of growth per plant goes to waste
    assert!((model.balance(shelf, "waste").unwrap() - 1.1).abs() < 1e-9);
}

#[test]
fn partial_co2_shortage_kills_proportionally() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["wheat"]["inputs"] = json!([{"currency": "co2", "value": 0.125, "unit": "kg",
        "connections": ["greenhouse"], "deprive": {"value": 0}}]);
    config["agents"]["greenhouse"]["balances"]["co2"] = json!(0.5);
    let mut model = build(config);
    let wheat = only(&model, "wheat");
    model.step();
    assert_eq!(model.agent(wheat).unwrap().amount, 4);
    assert!((actual(&model, wheat, Direction::In, "co2") - 0.5).abs() < 1e-9);
}

#[test]
fn sunlight_is_shared_not_consumed() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["sun"] = json!({"agent_class": "nature", "custom_function": "sun",
        "characteristics": {"capacities": {"par": {"value": 100, "unit": "mol"}}},
        "outputs": [{"currency": "par", "value": 10, "unit": "mol", "connections": ["sun"]}]});
    config["agents"]["sun"] = json!({});
    config["agent_desc"]["wheat"]["characteristics"]["light_source"] = json!("sun");
    config["agent_desc"]["barley"] = config["agent_desc"]["wheat"].clone();
    config["agents"]["barley"] = json!({"amount": 10});
    config["priorities"] = json!(["structures", "nature", "lights", "plants"]);
    let mut model = build(config);
    let sun = only(&model, "sun");
    let wheat = only(&model, "wheat");
    let barley = only(&model, "barley");

    for _ in 0..2 {
        model.step();
        assert!((model.balance(sun, "par").unwrap() - 10.0).abs() < 1e-9);
        for plant in [wheat, barley] {
            let factors = model.exchange(plant).unwrap().factors;
            assert!((factors.par_factor - 1.0).abs() < 1e-12);
        }
    }
}

#[test]
fn equalizer_mixes_atmospheres() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["cabin"] = json!({"agent_class": "structures", "characteristics": {
        "volume": 30,
        "capacities": {"o2": {"value": 1000, "unit": "kg"}, "co2": {"value": 1000, "unit": "kg"}}
    }});
    config["agent_desc"]["fan"] = json!({"agent_class": "machines", "custom_function": "atmosphere_equalizer",
        "inputs": [{"currency": "atmosphere", "value": 0, "unit": "kg",
                    "connections": ["greenhouse", "cabin"]}]});
    config["agents"]["cabin"] = json!({});
    config["agents"]["fan"] = json!({});
    config["agents"]["greenhouse"]["balances"] = json!({"o2": 20, "co2": 1});
    config["priorities"] = json!(["machines", "structures", "lights", "plants"]);
    let mut model = build(config);
    let fan = only(&model, "fan");
    let greenhouse = only(&model, "greenhouse");
    let cabin = only(&model, "cabin");

    // Only the fan steps, so nothing else touches the gases.
    model.remove(only(&model, "wheat"));
    model.step();

    assert!((model.balance(greenhouse, "o2").unwrap() - 5.0).abs() < 1e-9);
    assert!((model.balance(cabin, "o2").unwrap() - 15.0).abs() < 1e-9);
    assert!((model.balance(greenhouse, "co2").unwrap() - 0.25).abs() < 1e-9);
    assert!((model.balance(cabin, "co2").unwrap() - 0.75).abs() < 1e-9);
    assert!((actual(&model, fan, Direction::In, "atmosphere") - 15.75).abs() < 1e-9);
}

#[test]
fn equalizer_caps_mass_moved_per_step() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["cabin"] = json!({"agent_class": "structures", "characteristics": {
        "volume": 10,
        "capacities": {"o2": {"value": 1000, "unit": "kg"}, "co2": {"value": 1000, "unit": "kg"}}
    }});
    config["agent_desc"]["fan"] = json!({"agent_class": "machines", "custom_function": "atmosphere_equalizer",
        "inputs": [{"currency": "atmosphere", "value": 0, "unit": "kg",
                    "connections": ["greenhouse", "cabin"]}]});
    config["agents"]["cabin"] = json!({});
    config["agents"]["fan"] = json!({});
    config["agents"]["greenhouse"]["balances"] = json!({"o2": 200});
    config["priorities"] = json!(["machines", "structures", "lights", "plants"]);
    let mut model = build(config);
    let greenhouse = only(&model, "greenhouse");
    let cabin = only(&model, "cabin");
    model.remove(only(&model, "wheat"));

    model.step();
    assert!((model.balance(greenhouse, "o2").unwrap() - 150.0).abs() < 1e-9);
    assert!((model.balance(cabin, "o2").unwrap() - 50.0).abs() < 1e-9);
    model.step();
    assert!((model.balance(greenhouse, "o2").unwrap() - 100.0).abs() < 1e-9);
    assert!((model.balance(cabin, "o2").unwrap() - 100.0).abs() < 1e-9);
}

#[test]
fn equalizer_stops_at_receiver_capacity() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["cabin"] = json!({"agent_class": "structures", "characteristics": {
        "volume": 30,
        "capacities": {"o2": {"value": 4, "unit": "kg"}, "co2": {"value": 1000, "unit": "kg"}}
    }});
    config["agent_desc"]["fan"] = json!({"agent_class": "machines", "custom_function": "atmosphere_equalizer",
        "inputs": [{"currency": "atmosphere", "value": 0, "unit": "kg",
                    "connections": ["greenhouse", "cabin"]}]});
    config["agents"]["cabin"] = json!({});
    config["agents"]["fan"] = json!({});
    config["agents"]["greenhouse"]["balances"] = json!({"o2": 20, "co2": 1});
    config["priorities"] = json!(["machines", "structures", "lights", "plants"]);
    let mut model = build(config);
    let fan = only(&model, "fan");
    let greenhouse = only(&model, "greenhouse");
    let cabin = only(&model, "cabin");
    model.remove(only(&model, "wheat"));

    model.step();

    // The cabin takes 4 of the 15 kg o2 it is short, so every gas moves at 4/15.
    let o2 = (model.balance(greenhouse, "o2").unwrap(), model.balance(cabin, "o2").unwrap());
    let co2 = (model.balance(greenhouse, "co2").unwrap(), model.balance(cabin, "co2").unwrap());
    assert!((o2.1 - 4.0).abs() < 1e-9);
    assert!((o2.0 + o2.1 - 20.0).abs() < 1e-9);
    assert!((co2.1 - 0.2).abs() < 1e-9);
    assert!((co2.0 + co2.1 - 1.0).abs() < 1e-9);
    assert!((actual(&model, fan, Direction::In, "atmosphere") - 4.2).abs() < 1e-9);

    // Full cabin: nothing more moves
    model.step();
    assert!((model.balance(greenhouse, "o2").unwrap() - 16.0).abs() < 1e-9);
    assert!((model.balance(cabin, "co2").unwrap() - 0.2).abs() < 1e-9);
}

#[test]
fn equalizer_needs_volumes() {
    let mut config = greenhouse(1.0);
    config["agent_desc"]["fan"] = json!({"agent_class": "machines", "custom_function": "atmosphere_equalizer",
        "inputs": [{"currency": "atmosphere", "value": 0, "unit": "kg",
                    "connections": ["greenhouse", "shelf"]}]});
    config["agents"]["fan"] = json!({});
    config["priorities"] = json!(["machines", "structures", "lights", "plants"]);
    let config: SimulationConfig = serde_json::from_value(config).unwrap();
    assert!(Model::new(&config).is_err());
}
