//! Curve generation across families, as the engine requests them: one
//! lifetime curve per flow, optionally with a daily shape layered inside.

use biosphere_logic::growth::compose_daily;
use biosphere_logic::time::{per_step_factor, steps_per_day};
use biosphere_logic::{get_growth_values, CurveCache, CurveSpec, GrowthType, Location, TimeUnit};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ── Helpers ────────────────────────────────────────────────────────────────

fn mean(y: &[f64]) -> f64 {
    y.iter().sum::<f64>() / y.len() as f64
}

fn spec_from_json(json: &str) -> CurveSpec {
    serde_json::from_str(json).expect("valid curve json")
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn every_family_hits_the_requested_mean() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut cache = CurveCache::new();
    for kind in ["linear", "log", "sigmoid", "norm", "clipped", "switch"] {
        let mut spec = spec_from_json(&format!(r#"{{"type": "{kind}"}}"#));
        if spec.kind == GrowthType::Switch {
            spec = spec.with_window(0.2, 0.6);
        }
        if spec.kind == GrowthType::Clipped {
            spec.scale = Some(0.25);
        }
        let y = get_growth_values(0.5, 96, &spec, &mut rng, &mut cache).unwrap();
        let m = mean(&y);
        assert!((m - 0.5).abs() / 0.5 < 1e-4, "{kind}: mean {m}");
        assert!(y.iter().all(|v| v.is_finite() && *v >= -1e-12), "{kind}");
    }
}

#[test]
fn plant_style_lifetime_with_daily_cycle() {
    // 5 kg/day of biomass over a 20 day lifetime at hourly steps
    let location = Location::Earth;
    let minutes_per_step = 60.0;
    let day_steps = steps_per_day(minutes_per_step, location.day_length_minutes());
    let per_step = 5.0 * per_step_factor(TimeUnit::Day, minutes_per_step, location.day_length_minutes());
    let lifetime_steps = 20 * day_steps;

    let lifetime = spec_from_json(r#"{"type": "sigmoid"}"#);
    let daily = spec_from_json(r#"{"type": "switch", "min_threshold": 0.25, "max_threshold": 0.75}"#);

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut cache = CurveCache::new();
    let y = get_growth_values(per_step, lifetime_steps, &lifetime, &mut rng, &mut cache).unwrap();
    let y = compose_daily(&y, day_steps, &daily, &mut rng, &mut cache).unwrap();

    assert_eq!(y.len(), lifetime_steps);
    assert!((mean(&y) - per_step).abs() / per_step < 1e-4);
    // Nights are dark
    assert!(y.chunks(day_steps).all(|day| day[0] == day[day_steps - 1]));
}

#[test]
fn noisy_curves_differ_by_seed_but_repeat_per_seed() {
    let spec = spec_from_json(r#"{"type": "linear", "noise": true}"#);
    let run = |seed| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        get_growth_values(1.0, 48, &spec, &mut rng, &mut CurveCache::new()).unwrap()
    };
    assert_eq!(run(3), run(3));
    assert_ne!(run(3), run(4));
}
