//! Step-value curves.
//!
//! A curve is an array of per-step flow values shaping a rate across an
//! agent's lifetime or across one local day. Every family is built in three
//! stages:
//!
//! 1. **Shape**: the raw family between `min_value` and `max_value`.
//! 2. **Mean matching**: when `max_value` is not given it is solved for, so
//!    that the curve's mean equals the requested value. Linear and switch
//!    curves have closed forms; the others are solved numerically, and the
//!    bell and sigmoid families additionally infer a missing `scale` or
//!    `steepness` with [`nelder_mead`](crate::optimize::nelder_mead).
//! 3. **Finish**: optional inversion (reflect about `min + max`), additive
//!    Gaussian noise with standard deviation `std(curve) / noise_factor`,
//!    and clipping to `[min, max]`.
//!
//! Stages 1 and 2 are deterministic and cached in a [`CurveCache`] keyed by
//! the full parameter tuple, since many agents of one type request the same
//! curve. Noise is drawn from the caller's stream on every request.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::optimize::{nelder_mead, solve_increasing, NelderMeadOptions};
use crate::variation::standard_normal;

/// Sigmoid x-axis spans `[-SIGMOID_WIDTH, SIGMOID_WIDTH]`.
pub const SIGMOID_WIDTH: f64 = 10.0;
pub const DEFAULT_BELL_SCALE: f64 = 0.1;
pub const DEFAULT_STEEPNESS: f64 = 1.0;
pub const DEFAULT_CLIP_FACTOR: f64 = 2.0;
pub const DEFAULT_NOISE_FACTOR: f64 = 10.0;
/// Smallest positive value of a log curve (relative when `max < 1e-2`).
pub const LOG_ZERO_VALUE: f64 = 1e-2;

const MAX_VALUE_CEILING: f64 = 1e10;
const MEAN_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("unknown growth curve type '{0}'")]
    UnknownType(String),
    #[error("curve must have at least one point")]
    Empty,
    #[error("invalid curve parameters: {0}")]
    InvalidParams(String),
}

/// Curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthType {
    #[serde(alias = "lin")]
    Linear,
    #[serde(alias = "log")]
    Logarithmic,
    #[serde(alias = "sig")]
    Sigmoid,
    /// Bell curve from a normal pdf.
    #[serde(alias = "norm", alias = "bell")]
    Normal,
    /// Bell curve stretched by `factor` and clipped at `max_value`.
    #[serde(alias = "clip", alias = "clipped_bell")]
    Clipped,
    /// `max_value` inside `[min_threshold, max_threshold)`, `min_value` elsewhere.
    #[serde(alias = "step")]
    Switch,
}

impl FromStr for GrowthType {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "linear" | "lin" => GrowthType::Linear,
            "logarithmic" | "log" => GrowthType::Logarithmic,
            "sigmoid" | "sig" => GrowthType::Sigmoid,
            "normal" | "norm" | "bell" => GrowthType::Normal,
            "clipped" | "clip" | "clipped_bell" => GrowthType::Clipped,
            "switch" | "step" => GrowthType::Switch,
            other => return Err(CurveError::UnknownType(other.to_string())),
        })
    }
}

/// Parameters for one curve.
///
/// `center`, `min_threshold` and `max_threshold` are fractions of the curve
/// length so the same description works for any number of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSpec {
    #[serde(rename = "type")]
    pub kind: GrowthType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub center: Option<f64>,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub noise: bool,
    pub noise_factor: Option<f64>,
    #[serde(default)]
    pub clip: bool,
    pub scale: Option<f64>,
    pub steepness: Option<f64>,
    pub factor: Option<f64>,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
}

impl CurveSpec {
    pub fn new(kind: GrowthType) -> Self {
        Self {
            kind,
            min_value: None,
            max_value: None,
            center: None,
            invert: false,
            noise: false,
            noise_factor: None,
            clip: false,
            scale: None,
            steepness: None,
            factor: None,
            min_threshold: None,
            max_threshold: None,
        }
    }

    pub fn with_bounds(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = Some(min_value);
        self.max_value = Some(max_value);
        self
    }

    pub fn with_window(mut self, min_threshold: f64, max_threshold: f64) -> Self {
        self.min_threshold = Some(min_threshold);
        self.max_threshold = Some(max_threshold);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CurveKey {
    kind: GrowthType,
    n: usize,
    mean: u64,
    params: [Option<u64>; 9],
    invert: bool,
}

impl CurveKey {
    fn new(mean: f64, n: usize, spec: &CurveSpec) -> Self {
        let bits = |v: Option<f64>| v.map(f64::to_bits);
        Self {
            kind: spec.kind,
            n,
            mean: mean.to_bits(),
            params: [
                bits(spec.min_value),
                bits(spec.max_value),
                bits(spec.center),
                bits(spec.scale),
                bits(spec.steepness),
                bits(spec.factor),
                bits(spec.min_threshold),
                bits(spec.max_threshold),
                bits(spec.noise_factor),
            ],
            invert: spec.invert,
        }
    }
}

/// Memo of noise-free curves by parameter tuple.
#[derive(Debug, Default)]
pub struct CurveCache {
    entries: HashMap<CurveKey, Vec<f64>>,
    hits: usize,
}

impl CurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of requests served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Shape parameters after defaults and inference.
#[derive(Debug, Clone, Copy)]
struct Shape {
    kind: GrowthType,
    n: usize,
    min: f64,
    max: f64,
    scale: f64,
    steepness: f64,
    factor: f64,
    center: usize,
    window: (usize, usize),
    invert: bool,
}

// ── Raw families ──────────────────────────────────────────────────────────

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

fn geomspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let ratio = end / start;
    (0..n)
        .map(|i| start * ratio.powf(i as f64 / (n - 1) as f64))
        .collect()
}

/// Rescale `y` linearly so its range becomes `[lo, hi]`. A flat input maps to `lo`.
fn min_max_scale(y: &mut [f64], lo: f64, hi: f64) {
    let (ymin, ymax) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &v| (a.min(v), b.max(v)));
    let range = ymax - ymin;
    for v in y.iter_mut() {
        *v = if range > 0.0 { lo + (*v - ymin) / range * (hi - lo) } else { lo };
    }
}

fn bell_pdf(n: usize, scale: f64, center: usize) -> Vec<f64> {
    let x = linspace(0.0, 1.0, n);
    let mu = x[center];
    x.iter()
        .map(|&xi| (-0.5 * ((xi - mu) / scale).powi(2)).exp())
        .collect()
}

fn raw_curve(s: &Shape) -> Vec<f64> {
    let n = s.n;
    let mut y = match s.kind {
        GrowthType::Linear => linspace(s.min, s.max, n),
        GrowthType::Logarithmic => {
            let span = s.max - s.min;
            if span <= 0.0 {
                vec![s.min; n]
            } else {
                let zero = if LOG_ZERO_VALUE < span { LOG_ZERO_VALUE } else { span * LOG_ZERO_VALUE };
                geomspace(zero, span, n).into_iter().map(|v| v + s.min).collect()
            }
        }
        GrowthType::Sigmoid => {
            let x = linspace(-SIGMOID_WIDTH, SIGMOID_WIDTH, n);
            let x0 = x[s.center];
            let mut y: Vec<f64> = x
                .iter()
                .map(|&xi| 1.0 / (1.0 + (-s.steepness * (xi - x0)).exp()))
                .collect();
            min_max_scale(&mut y, s.min, s.max);
            y
        }
        GrowthType::Normal => {
            let mut y = bell_pdf(n, s.scale, s.center);
            min_max_scale(&mut y, s.min, s.max);
            y
        }
        GrowthType::Clipped => {
            let mut y = bell_pdf(n, s.scale, s.center);
            min_max_scale(&mut y, s.min, s.max * s.factor);
            for v in y.iter_mut() {
                *v = v.clamp(s.min.min(s.max), s.max.max(s.min));
            }
            y
        }
        GrowthType::Switch => {
            let (lo, hi) = s.window;
            (0..n)
                .map(|i| if i >= lo && i < hi { s.max } else { s.min })
                .collect()
        }
    };
    if s.invert {
        let pivot = s.min + s.max;
        for v in y.iter_mut() {
            *v = pivot - *v;
        }
    }
    y
}

fn mean(y: &[f64]) -> f64 {
    y.iter().sum::<f64>() / y.len() as f64
}

fn stdev(y: &[f64]) -> f64 {
    let m = mean(y);
    (y.iter().map(|v| (v - m).powi(2)).sum::<f64>() / y.len() as f64).sqrt()
}

// ── Parameter inference ───────────────────────────────────────────────────

fn shape_mean(s: &Shape) -> f64 {
    mean(&raw_curve(s))
}

/// Solve for the `max_value` giving `target` mean with every other
/// parameter fixed.
fn solve_max(s: &Shape, target: f64) -> Result<f64, CurveError> {
    match s.kind {
        GrowthType::Linear => Ok(2.0 * target - s.min),
        GrowthType::Switch => {
            let inside = s.window.1.saturating_sub(s.window.0);
            if inside == 0 {
                return Err(CurveError::InvalidParams(
                    "switch window contains no steps".to_string(),
                ));
            }
            let n = s.n as f64;
            let k = inside as f64;
            if s.invert {
                // Inverted window sits at `min`, everything else at `max`.
                let outside = n - k;
                if outside == 0.0 {
                    return Err(CurveError::InvalidParams(
                        "inverted switch window covers every step".to_string(),
                    ));
                }
                Ok(s.min + (target - s.min) * n / outside)
            } else {
                Ok(s.min + (target - s.min) * n / k)
            }
        }
        _ => {
            let f = |max: f64| shape_mean(&Shape { max, ..*s });
            let start = (2.0 * target - s.min).max(s.min + 1e-9);
            Ok(solve_increasing(f, target, s.min, start, MAX_VALUE_CEILING, MEAN_TOLERANCE))
        }
    }
}

fn relative_error(value: f64, target: f64) -> f64 {
    (value - target).abs() / target.abs().max(1e-12)
}

/// Fit a missing bell `scale` (and `max_value` when also missing), keeping
/// both curve ends near `min_value`.
fn fit_bell(s: &mut Shape, target: f64, fit_max: bool) {
    let opts = NelderMeadOptions::default();
    let edge_loss = |y: &[f64], min: f64| {
        ((y[0] - min).abs() + (y[y.len() - 1] - min).abs()) / target.abs().max(1e-12)
    };
    if fit_max {
        let base = *s;
        let loss = |x: &[f64]| {
            let y = raw_curve(&Shape { scale: x[0], max: x[1], ..base });
            relative_error(mean(&y), target) + edge_loss(&y, base.min)
        };
        let lo_max = target.max(base.min + 1e-8);
        let m = nelder_mead(loss, &[DEFAULT_BELL_SCALE, lo_max * 2.0], &[(1e-3, 10.0), (lo_max, 1e8)], opts);
        s.scale = m.x[0];
        s.max = m.x[1];
    } else {
        let base = *s;
        let loss = |x: &[f64]| {
            let y = raw_curve(&Shape { scale: x[0], ..base });
            relative_error(mean(&y), target) + edge_loss(&y, base.min)
        };
        let m = nelder_mead(loss, &[DEFAULT_BELL_SCALE], &[(1e-3, 10.0)], opts);
        s.scale = m.x[0];
    }
}

/// Fit a missing sigmoid `steepness` (and `max_value` when also missing),
/// preferring gentler slopes.
fn fit_sigmoid(s: &mut Shape, target: f64, fit_max: bool) {
    let n = s.n as f64;
    let opts = NelderMeadOptions::default();
    let upper_k = (n / 2.0).max(1e-2 * 2.0);
    let base = *s;
    if fit_max {
        let loss = |x: &[f64]| {
            let y = raw_curve(&Shape { steepness: x[0], max: x[1], ..base });
            relative_error(mean(&y), target) + x[0] / n
        };
        let m = nelder_mead(loss, &[DEFAULT_STEEPNESS.min(upper_k), target], &[(1e-2, upper_k), (1e-10, MAX_VALUE_CEILING)], opts);
        s.steepness = m.x[0];
        s.max = m.x[1];
    } else {
        let loss = |x: &[f64]| {
            let y = raw_curve(&Shape { steepness: x[0], ..base });
            relative_error(mean(&y), target) + x[0] / n
        };
        let m = nelder_mead(loss, &[DEFAULT_STEEPNESS.min(upper_k)], &[(1e-2, upper_k)], opts);
        s.steepness = m.x[0];
    }
}

fn index_of(fraction: f64, n: usize) -> usize {
    ((fraction * n as f64).round().max(0.0) as usize).min(n)
}

fn resolve(mean_value: f64, n: usize, spec: &CurveSpec) -> Result<Vec<f64>, CurveError> {
    let min = spec.min_value.unwrap_or(0.0);
    let center = match spec.center {
        Some(c) if (0.0..=1.0).contains(&c) => ((c * (n - 1) as f64).round() as usize).min(n - 1),
        Some(c) => {
            return Err(CurveError::InvalidParams(format!(
                "center must be a fraction in [0, 1], got {c}"
            )))
        }
        None => n / 2,
    };
    let window = (
        index_of(spec.min_threshold.unwrap_or(0.0), n),
        index_of(spec.max_threshold.unwrap_or(1.0), n),
    );
    if let Some(scale) = spec.scale {
        if scale <= 0.0 {
            return Err(CurveError::InvalidParams(format!("scale must be positive, got {scale}")));
        }
    }

    let mut shape = Shape {
        kind: spec.kind,
        n,
        min,
        max: spec.max_value.unwrap_or(mean_value),
        scale: spec.scale.unwrap_or(DEFAULT_BELL_SCALE),
        steepness: spec.steepness.unwrap_or(DEFAULT_STEEPNESS),
        factor: spec.factor.unwrap_or(DEFAULT_CLIP_FACTOR),
        center,
        window,
        invert: spec.invert,
    };

    if n == 1 {
        return Ok(vec![spec.max_value.unwrap_or(mean_value)]);
    }

    let fit_max = spec.max_value.is_none();
    if fit_max && mean_value <= min {
        // Nothing to shape; the whole curve sits at the requested value.
        return Ok(vec![mean_value; n]);
    }

    match spec.kind {
        GrowthType::Normal | GrowthType::Clipped if spec.scale.is_none() => {
            fit_bell(&mut shape, mean_value, fit_max);
        }
        GrowthType::Sigmoid if spec.steepness.is_none() => {
            fit_sigmoid(&mut shape, mean_value, fit_max);
        }
        _ => {}
    }
    if fit_max {
        shape.max = solve_max(&shape, mean_value)?;
    }
    Ok(raw_curve(&shape))
}

/// Build a curve of `n` points whose mean is `mean_value`.
///
/// When `spec.max_value` is given the curve spans `[min_value, max_value]`
/// as configured and its mean follows from the shape; otherwise
/// `max_value` is inferred so the mean matches.
pub fn get_growth_values<R: Rng + ?Sized>(
    mean_value: f64,
    n: usize,
    spec: &CurveSpec,
    rng: &mut R,
    cache: &mut CurveCache,
) -> Result<Vec<f64>, CurveError> {
    if n == 0 {
        return Err(CurveError::Empty);
    }
    let key = CurveKey::new(mean_value, n, spec);
    let mut y = match cache.entries.get(&key) {
        Some(cached) => {
            cache.hits += 1;
            cached.clone()
        }
        None => {
            let y = resolve(mean_value, n, spec)?;
            cache.entries.insert(key, y.clone());
            y
        }
    };

    let lo = spec.min_value.unwrap_or(0.0);
    let hi = spec
        .max_value
        .unwrap_or_else(|| y.iter().cloned().fold(lo, f64::max));

    if spec.noise {
        let factor = spec.noise_factor.unwrap_or(DEFAULT_NOISE_FACTOR);
        if factor <= 0.0 {
            return Err(CurveError::InvalidParams(format!(
                "noise_factor must be positive, got {factor}"
            )));
        }
        let sd = stdev(&y) / factor;
        for v in y.iter_mut() {
            *v += sd * standard_normal(rng);
        }
    }
    if spec.clip {
        for v in y.iter_mut() {
            *v = v.clamp(lo, hi.max(lo));
        }
    }
    Ok(y)
}

/// Layer a daily curve inside a lifetime curve.
///
/// `lifetime` is cut into chunks of `day_steps`; each chunk is replaced by a
/// `daily` curve whose mean is the chunk's mean, so the lifetime trend is
/// kept while the daily shape repeats. In `daily`, `min_value` and
/// `max_value` are fractions of the day's mean. Without a `min_value` the
/// day starts at the chunk minimum (or zero for a flat chunk).
pub fn compose_daily<R: Rng + ?Sized>(
    lifetime: &[f64],
    day_steps: usize,
    daily: &CurveSpec,
    rng: &mut R,
    cache: &mut CurveCache,
) -> Result<Vec<f64>, CurveError> {
    if day_steps == 0 || lifetime.is_empty() {
        return Err(CurveError::Empty);
    }
    let mut out = Vec::with_capacity(lifetime.len());
    for chunk in lifetime.chunks(day_steps) {
        let day_mean = mean(chunk);
        let (dmin, dmax) = chunk
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &v| (a.min(v), b.max(v)));
        let start = match daily.min_value {
            Some(fraction) => day_mean * fraction,
            None if dmin < dmax => dmin,
            None => 0.0,
        };
        if (start - day_mean).abs() <= f64::EPSILON * day_mean.abs().max(1.0) {
            out.extend(std::iter::repeat(day_mean).take(chunk.len()));
            continue;
        }
        let mut spec = daily.clone();
        spec.min_value = Some(start);
        spec.max_value = daily.max_value.map(|fraction| day_mean * fraction);
        out.extend(get_growth_values(day_mean, chunk.len(), &spec, rng, cache)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0)
    }

    fn curve(mean: f64, n: usize, spec: &CurveSpec) -> Vec<f64> {
        get_growth_values(mean, n, spec, &mut rng(), &mut CurveCache::new()).unwrap()
    }

    fn rel(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs()
    }

    #[test]
    fn test_linear_with_bounds() {
        let spec = CurveSpec::new(GrowthType::Linear).with_bounds(2.0, 10.0);
        let y = curve(6.0, 50, &spec);
        assert_eq!(y.len(), 50);
        assert!((y[0] - 2.0).abs() < 1e-12);
        assert!((y[49] - 10.0).abs() < 1e-12);
        assert!(y.windows(2).all(|w| w[1] >= w[0]));
        assert!((mean(&y) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_infers_max_from_mean() {
        let y = curve(5.0, 24, &CurveSpec::new(GrowthType::Linear));
        assert!((mean(&y) - 5.0).abs() < 1e-9);
        assert!((y[23] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_switch_window() {
        let spec = CurveSpec::new(GrowthType::Switch)
            .with_bounds(1.0, 4.0)
            .with_window(0.25, 0.5);
        let y = curve(2.0, 24, &spec);
        for (i, v) in y.iter().enumerate() {
            let expected = if (6..12).contains(&i) { 4.0 } else { 1.0 };
            assert_eq!(*v, expected, "index {i}");
        }
    }

    #[test]
    fn test_switch_infers_max() {
        let spec = CurveSpec::new(GrowthType::Switch).with_window(0.25, 0.75);
        let y = curve(3.0, 24, &spec);
        assert!((mean(&y) - 3.0).abs() < 1e-12);
        assert_eq!(y[0], 0.0);
        assert!((y[12] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_switch_empty_window_is_an_error() {
        let spec = CurveSpec::new(GrowthType::Switch).with_window(0.5, 0.5);
        let err = get_growth_values(1.0, 10, &spec, &mut rng(), &mut CurveCache::new()).unwrap_err();
        assert!(matches!(err, CurveError::InvalidParams(_)));
    }

    #[test]
    fn test_log_matches_mean() {
        let y = curve(3.0, 100, &CurveSpec::new(GrowthType::Logarithmic));
        assert!(rel(mean(&y), 3.0) < 1e-6);
        assert!(y.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_bell_with_scale_matches_mean() {
        let mut spec = CurveSpec::new(GrowthType::Normal);
        spec.scale = Some(0.15);
        let y = curve(1.5, 24, &spec);
        assert!(rel(mean(&y), 1.5) < 1e-4);
        // Peak at the center, ends at min
        assert!(y[12] > y[0]);
        assert!(y[0].abs() < 1e-6);
    }

    #[test]
    fn test_bell_optimizer_converges() {
        let y = curve(0.8, 48, &CurveSpec::new(GrowthType::Normal));
        assert!(rel(mean(&y), 0.8) < 1e-4, "mean {}", mean(&y));
    }

    #[test]
    fn test_clipped_bell_matches_mean() {
        let mut spec = CurveSpec::new(GrowthType::Clipped);
        spec.scale = Some(0.3);
        let y = curve(2.0, 24, &spec);
        assert!(rel(mean(&y), 2.0) < 1e-4, "mean {}", mean(&y));
        let max = y.iter().cloned().fold(f64::MIN, f64::max);
        // Clipping flattens the top
        assert!(y.iter().filter(|v| (*v - max).abs() < 1e-9).count() > 1);
    }

    #[test]
    fn test_sigmoid_optimizer_converges() {
        let y = curve(4.0, 120, &CurveSpec::new(GrowthType::Sigmoid));
        assert!(rel(mean(&y), 4.0) < 1e-4, "mean {}", mean(&y));
        assert!(y.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn test_invert_reflects() {
        let mut spec = CurveSpec::new(GrowthType::Linear).with_bounds(0.0, 1.0);
        spec.invert = true;
        let y = curve(0.5, 11, &spec);
        assert!((y[0] - 1.0).abs() < 1e-12);
        assert!(y[10].abs() < 1e-12);
    }

    #[test]
    fn test_noise_then_clip() {
        let mut spec = CurveSpec::new(GrowthType::Linear).with_bounds(0.0, 1.0);
        spec.noise = true;
        spec.noise_factor = Some(2.0);
        spec.clip = true;
        let y = curve(0.5, 200, &spec);
        assert!(y.iter().all(|v| (0.0..=1.0).contains(v)));
        let clean = curve(0.5, 200, &CurveSpec::new(GrowthType::Linear).with_bounds(0.0, 1.0));
        assert!(y.iter().zip(&clean).any(|(a, b)| (a - b).abs() > 1e-6));
    }

    #[test]
    fn test_cache_reuses_noise_free_curve() {
        let spec = CurveSpec::new(GrowthType::Normal);
        let mut cache = CurveCache::new();
        let mut r = rng();
        let a = get_growth_values(1.0, 24, &spec, &mut r, &mut cache).unwrap();
        let b = get_growth_values(1.0, 24, &spec, &mut r, &mut cache).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!("cubic".parse::<GrowthType>(), Err(CurveError::UnknownType(_))));
        assert!(serde_json::from_str::<GrowthType>("\"cubic\"").is_err());
        assert_eq!("norm".parse::<GrowthType>().unwrap(), GrowthType::Normal);
        assert_eq!(serde_json::from_str::<GrowthType>("\"sig\"").unwrap(), GrowthType::Sigmoid);
    }

    #[test]
    fn test_zero_points_rejected() {
        let err = get_growth_values(1.0, 0, &CurveSpec::new(GrowthType::Linear), &mut rng(), &mut CurveCache::new());
        assert_eq!(err.unwrap_err(), CurveError::Empty);
    }

    #[test]
    fn test_single_point_is_the_mean() {
        assert_eq!(curve(7.0, 1, &CurveSpec::new(GrowthType::Sigmoid)), vec![7.0]);
    }

    #[test]
    fn test_daily_composition_keeps_lifetime_mean() {
        let lifetime = curve(2.0, 24 * 10, &CurveSpec::new(GrowthType::Linear));
        let daily = CurveSpec::new(GrowthType::Normal);
        let y = compose_daily(&lifetime, 24, &daily, &mut rng(), &mut CurveCache::new()).unwrap();
        assert_eq!(y.len(), lifetime.len());
        for (day, (a, b)) in y.chunks(24).zip(lifetime.chunks(24)).enumerate() {
            assert!(rel(mean(a), mean(b)) < 1e-4, "day {day}");
        }
        assert!(rel(mean(&y), 2.0) < 1e-4);
    }

    #[test]
    fn test_daily_on_flat_lifetime() {
        let lifetime = vec![1.0; 48];
        let daily = CurveSpec::new(GrowthType::Switch).with_window(0.25, 0.75);
        let y = compose_daily(&lifetime, 24, &daily, &mut rng(), &mut CurveCache::new()).unwrap();
        assert_eq!(y[0], 0.0);
        assert!((y[12] - 2.0).abs() < 1e-12);
        assert!((mean(&y) - 1.0).abs() < 1e-12);
    }
}
