//! Biosphere Headless Simulation Harness
//!
//! Loads a habitat configuration, runs it, and checks engine invariants.
//! Runs entirely in-process, with no rendering and no files written.
//!
//! Usage:
//!   cargo run -p biosphere-simtest
//!   cargo run -p biosphere-simtest -- habitat.json --steps 240 --verbose

use biosphere_core::prelude::*;
use biosphere_logic::photosynthesis::photoperiod_envelope;
use biosphere_logic::{get_growth_values, CurveCache, CurveSpec, GrowthType};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ── Demo habitat (used when no configuration is given) ──────────────────
const DEMO_JSON: &str = include_str!("../../../data/demo_habitat.json");

/// Steps compared between twin models and across a snapshot.
const COMPARE_STEPS: u64 = 48;

/// Run length for configurations without a termination rule.
const DEFAULT_DAYS: u64 = 30;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Args {
    path: Option<String>,
    steps: Option<u64>,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        path: None,
        steps: None,
        verbose: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--verbose" | "-v" => args.verbose = true,
            "--steps" => {
                let value = it.next().ok_or("--steps needs a value")?;
                let steps = value
                    .parse()
                    .map_err(|_| format!("--steps expects a number, got '{}'", value))?;
                args.steps = Some(steps);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{}'", flag)),
            path => args.path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: biosphere-simtest [config.json] [--steps N] [--verbose]");
            std::process::exit(2);
        }
    };
    println!("=== Biosphere Simulation Harness ===\n");

    let text = match &args.path {
        None => DEMO_JSON.to_string(),
        Some(path) => match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("cannot read {}: {}", path, e);
                std::process::exit(2);
            }
        },
    };

    let mut results = Vec::new();

    // 1. Configuration parsing and validation
    let config = validate_config(&text, args.verbose, &mut results);

    // 2. Curve and envelope sanity
    results.extend(validate_curves(args.verbose));

    if let Some(config) = config {
        // 3. Full run with storage bounds checked every step
        results.extend(validate_run(&config, args.steps, args.verbose));

        // 4. Same seed, same history
        results.extend(validate_determinism(&config, args.verbose));

        // 5. Snapshot round trip
        results.extend(validate_snapshot(&config, args.verbose));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(text: &str, verbose: bool, results: &mut Vec<TestResult>) -> Option<SimulationConfig> {
    println!("--- Configuration ---");

    let config = match SimulationConfig::from_json(text) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult {
                name: "config_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return None;
        }
    };
    results.push(TestResult {
        name: "config_parse".into(),
        passed: true,
        detail: format!(
            "{} currency classes, {} agent types, {} instances",
            config.currencies.len(),
            config.agent_desc.len(),
            config.agents.len()
        ),
    });

    match config.validate() {
        Ok(()) => results.push(TestResult {
            name: "config_valid".into(),
            passed: true,
            detail: "no configuration issues".into(),
        }),
        Err(e) => {
            results.push(TestResult {
                name: "config_valid".into(),
                passed: false,
                detail: format!("{} issues", e.issues().len()),
            });
            for issue in e.issues() {
                println!("  {}", issue);
            }
            return None;
        }
    }

    // Every class that has agents should be scheduled.
    let unscheduled: Vec<&str> = config
        .agents
        .keys()
        .filter_map(|t| config.agent_desc.get(t))
        .map(|d| d.agent_class.as_str())
        .filter(|class| !config.priorities.iter().any(|p| p == class))
        .collect();
    results.push(TestResult {
        name: "config_classes_scheduled".into(),
        passed: unscheduled.is_empty(),
        detail: if unscheduled.is_empty() {
            format!("{} priority classes", config.priorities.len())
        } else {
            format!("never stepped: {}", unscheduled.join(", "))
        },
    });

    if verbose {
        for (agent_type, instance) in &config.agents {
            if let Some(desc) = config.agent_desc.get(agent_type) {
                println!(
                    "  {:20} {:18} x{}",
                    agent_type, desc.agent_class, instance.amount
                );
            }
        }
    }

    Some(config)
}

// ── 2. Curves ───────────────────────────────────────────────────────────

fn validate_curves(verbose: bool) -> Vec<TestResult> {
    println!("--- Curves ---");
    let mut results = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut cache = CurveCache::new();

    let kinds = [
        GrowthType::Linear,
        GrowthType::Logarithmic,
        GrowthType::Sigmoid,
        GrowthType::Normal,
        GrowthType::Clipped,
        GrowthType::Switch,
    ];
    let mean_value = 2.0;
    let n = 48;
    for kind in kinds {
        let mut spec = CurveSpec::new(kind);
        if kind == GrowthType::Switch {
            spec = spec.with_window(0.25, 0.75);
        }
        let name = format!("curve_{:?}", kind).to_lowercase();
        match get_growth_values(mean_value, n, &spec, &mut rng, &mut cache) {
            Ok(y) => {
                let mean = y.iter().sum::<f64>() / y.len() as f64;
                let sane = y.len() == n && y.iter().all(|v| v.is_finite() && *v >= 0.0);
                // Exact families match the mean; fitted ones land close to it.
                let tolerance = match kind {
                    GrowthType::Linear | GrowthType::Switch => 1e-9,
                    _ => 0.05 * mean_value,
                };
                results.push(TestResult {
                    name,
                    passed: sane && (mean - mean_value).abs() <= tolerance,
                    detail: format!(
                        "mean {:.4} (target {}), range {:.3}..{:.3}",
                        mean,
                        mean_value,
                        y.iter().cloned().fold(f64::INFINITY, f64::min),
                        y.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                    ),
                });
            }
            Err(e) => results.push(TestResult {
                name,
                passed: false,
                detail: e.to_string(),
            }),
        }
    }

    for photoperiod in [12.0, 16.0, 20.0, 24.0] {
        let envelope = photoperiod_envelope(24, photoperiod, 1.0);
        let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
        let lit = envelope.iter().filter(|v| **v > 0.0).count();
        results.push(TestResult {
            name: format!("envelope_{}h", photoperiod),
            passed: (mean - 1.0).abs() < 1e-9 && lit == photoperiod as usize,
            detail: format!("mean {:.6}, {} lit steps", mean, lit),
        });
    }

    if verbose {
        println!("  {} curves memoized, {} cache hits", cache.len(), cache.hits());
    }

    results
}

// ── 3. Run ──────────────────────────────────────────────────────────────

const BOUND_EPS: f64 = 1e-6;

/// Storage entries outside `[0, capacity]` in a report.
fn bound_violations(report: &StepReport) -> Vec<String> {
    let mut out = Vec::new();
    for agent in &report.agents {
        for s in &agent.storage {
            if s.balance < -BOUND_EPS || s.balance > s.capacity + BOUND_EPS {
                out.push(format!(
                    "step {}: {} {} {} = {:.6} (capacity {:.6})",
                    report.step_num, agent.agent_type, agent.id, s.currency, s.balance, s.capacity
                ));
            }
        }
    }
    out
}

fn negative_transfers(report: &StepReport) -> Vec<String> {
    let mut out = Vec::new();
    for agent in &report.agents {
        for f in &agent.flows {
            if f.actual < -BOUND_EPS || f.transfers.iter().any(|t| t.amount < -BOUND_EPS) {
                out.push(format!(
                    "step {}: {} {} {:?} {} moved {:.6}",
                    report.step_num, agent.agent_type, agent.id, f.direction, f.currency, f.actual
                ));
            }
        }
    }
    out
}

fn validate_run(config: &SimulationConfig, steps: Option<u64>, verbose: bool) -> Vec<TestResult> {
    println!("--- Run ---");
    let mut results = Vec::new();

    let mut model = match Model::new(config) {
        Ok(m) => m,
        Err(e) => {
            results.push(TestResult {
                name: "model_build".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    let initial = model.report();
    results.push(TestResult {
        name: "model_build".into(),
        passed: true,
        detail: format!(
            "{} entities, {} per step, {} steps per day",
            initial.agents.len(),
            format_minutes(model.clock().minutes_per_step),
            model.clock().day_steps()
        ),
    });

    // Without a termination rule or --steps, run a month of days.
    let steps = steps.or_else(|| {
        config
            .termination
            .is_empty()
            .then(|| DEFAULT_DAYS * model.clock().day_steps() as u64)
    });

    let mut bounds = bound_violations(&initial);
    let mut negatives = Vec::new();
    let mut ran = 0u64;
    let mut reports_match_clock = true;
    while steps.map_or(true, |n| ran < n) && model.step() {
        ran += 1;
        let report = model.report();
        bounds.extend(bound_violations(&report));
        negatives.extend(negative_transfers(&report));
        if report.step_num != ran {
            reports_match_clock = false;
        }
        if verbose && ran % model.clock().day_steps().max(1) as u64 == 0 {
            let counts: Vec<String> = report
                .agent_counts
                .iter()
                .map(|(t, n)| format!("{}={}", t, n))
                .collect();
            println!("  day {:>3}: {}", ran / model.clock().day_steps().max(1) as u64, counts.join(" "));
        }
    }

    results.push(TestResult {
        name: "run_steps".into(),
        passed: reports_match_clock,
        detail: format!(
            "{} steps, {} elapsed, terminated: {}",
            ran,
            format_minutes(model.elapsed_minutes()),
            model.termination_reason().unwrap_or("no")
        ),
    });

    results.push(TestResult {
        name: "run_storage_bounds".into(),
        passed: bounds.is_empty(),
        detail: if bounds.is_empty() {
            "every balance within [0, capacity]".into()
        } else {
            format!("{} violations, first: {}", bounds.len(), bounds[0])
        },
    });

    results.push(TestResult {
        name: "run_non_negative_transfers".into(),
        passed: negatives.is_empty(),
        detail: if negatives.is_empty() {
            "no negative ledger entries".into()
        } else {
            format!("{} negative entries, first: {}", negatives.len(), negatives[0])
        },
    });

    // Dead agents stay queryable with zero multiplicity and a cause.
    let report = model.report();
    let dead: Vec<_> = report.agents.iter().filter(|a| !a.active).collect();
    let dead_consistent = dead
        .iter()
        .all(|a| a.amount == 0 && a.cause_of_death.is_some());
    results.push(TestResult {
        name: "run_deaths_recorded".into(),
        passed: dead_consistent,
        detail: if dead.is_empty() {
            "no agents died".into()
        } else {
            dead.iter()
                .map(|a| {
                    format!(
                        "{} {}: {}",
                        a.agent_type,
                        a.id,
                        a.cause_of_death.as_deref().unwrap_or("?")
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        },
    });

    if verbose {
        println!("  Final storage:");
        for agent in &report.agents {
            for s in &agent.storage {
                println!(
                    "    {:16} {:8} {:>12.4} / {:<12.4} {:?}",
                    agent.agent_type, s.currency, s.balance, s.capacity, s.unit
                );
            }
        }
    }

    results
}

fn format_minutes(minutes: f64) -> String {
    if minutes >= 1440.0 {
        format!("{:.2} days", minutes / 1440.0)
    } else if minutes >= 60.0 {
        format!("{:.2} hours", minutes / 60.0)
    } else {
        format!("{} minutes", minutes)
    }
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(config: &SimulationConfig, _verbose: bool) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    let (Ok(mut a), Ok(mut b)) = (Model::new(config), Model::new(config)) else {
        return results;
    };
    let mut diverged_at = None;
    let mut compared = 0;
    for _ in 0..COMPARE_STEPS {
        let (stepped_a, stepped_b) = (a.step(), b.step());
        if stepped_a != stepped_b || a.report() != b.report() {
            diverged_at = Some(a.step_num());
            break;
        }
        if !stepped_a {
            break;
        }
        compared += 1;
    }
    results.push(TestResult {
        name: "determinism_same_seed".into(),
        passed: diverged_at.is_none(),
        detail: match diverged_at {
            None => format!("{} steps identical", compared),
            Some(step) => format!("diverged at step {}", step),
        },
    });

    // A different seed should still build and step.
    let mut reseeded = config.clone();
    reseeded.seed = config.seed.wrapping_add(1);
    let ok = Model::new(&reseeded).map(|mut m| m.step_to(Some(COMPARE_STEPS)));
    results.push(TestResult {
        name: "determinism_other_seed_runs".into(),
        passed: ok.is_ok(),
        detail: match ok {
            Ok(n) => format!("seed {} ran {} steps", reseeded.seed, n),
            Err(e) => e.to_string(),
        },
    });

    results
}

// ── 5. Snapshot ─────────────────────────────────────────────────────────

fn validate_snapshot(config: &SimulationConfig, _verbose: bool) -> Vec<TestResult> {
    println!("--- Snapshot ---");
    let mut results = Vec::new();

    let Ok(mut original) = Model::new(config) else {
        return results;
    };
    original.step_to(Some(COMPARE_STEPS / 2));

    let mut buffer = Vec::new();
    if let Err(e) = original.save(&mut buffer) {
        results.push(TestResult {
            name: "snapshot_save".into(),
            passed: false,
            detail: e.to_string(),
        });
        return results;
    }
    let mut restored = match Model::load(&buffer[..]) {
        Ok(m) => m,
        Err(e) => {
            results.push(TestResult {
                name: "snapshot_load".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    results.push(TestResult {
        name: "snapshot_restores_state".into(),
        passed: restored.report() == original.report(),
        detail: format!("{} bytes at step {}", buffer.len(), original.step_num()),
    });

    let mut diverged_at = None;
    for _ in 0..COMPARE_STEPS / 2 {
        let (a, b) = (original.step(), restored.step());
        if a != b || original.report() != restored.report() {
            diverged_at = Some(original.step_num());
            break;
        }
        if !a {
            break;
        }
    }
    results.push(TestResult {
        name: "snapshot_continues_identically".into(),
        passed: diverged_at.is_none(),
        detail: match diverged_at {
            None => format!("identical through step {}", original.step_num()),
            Some(step) => format!("diverged at step {}", step),
        },
    });

    let json = original
        .to_json()
        .and_then(|text| Model::from_json(&text).map(|m| (text.len(), m)));
    results.push(TestResult {
        name: "snapshot_json".into(),
        passed: matches!(&json, Ok((_, m)) if m.step_num() == original.step_num()
            && m.agents_by_type(None) == original.agents_by_type(None)),
        detail: match &json {
            Ok((len, _)) => format!("{} bytes of JSON", len),
            Err(e) => e.to_string(),
        },
    });

    results
}
