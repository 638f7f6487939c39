//! Small derivative-free optimizers for curve parameter inference.
//!
//! Curve families whose mean depends non-linearly on a shape parameter
//! (bell scale, sigmoid steepness) are fitted once per parameter tuple, so
//! speed matters far less than robustness. Bounds are enforced by
//! projecting every trial point into the box.

/// Options for [`nelder_mead`].
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Stop once the spread of simplex values falls below this.
    pub f_tolerance: f64,
    /// Stop once the simplex diameter falls below this.
    pub x_tolerance: f64,
    /// Relative size of the initial simplex.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            f_tolerance: 1e-12,
            x_tolerance: 1e-10,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

fn project(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *xi = xi.clamp(lo, hi);
    }
}

/// Minimize `f` starting from `x0`, keeping every point inside `bounds`.
///
/// Standard reflection/expansion/contraction/shrink coefficients
/// (1, 2, 0.5, 0.5). `bounds` must have one `(lo, hi)` pair per dimension.
pub fn nelder_mead<F>(f: F, x0: &[f64], bounds: &[(f64, f64)], opts: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let mut start = x0.to_vec();
    project(&mut start, bounds);

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.clone());
    for i in 0..n {
        let mut p = start.clone();
        let (lo, hi) = bounds[i];
        let step = if p[i].abs() > 1e-12 { p[i] * opts.initial_step } else { opts.initial_step };
        p[i] += step;
        if p[i] > hi {
            p[i] = start[i] - step;
        }
        p[i] = p[i].clamp(lo, hi);
        simplex.push(p);
    }
    let mut values: Vec<f64> = simplex.iter().map(|p| eval(p)).collect();

    let mut iterations = 0;
    while iterations < opts.max_iterations {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let spread = (values[n] - values[0]).abs();
        let diameter = simplex[1..]
            .iter()
            .flat_map(|p| p.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        if spread <= opts.f_tolerance && diameter <= opts.x_tolerance {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|d| simplex[..n].iter().map(|p| p[d]).sum::<f64>() / n as f64)
            .collect();
        let along = |t: f64| -> Vec<f64> {
            let mut p: Vec<f64> = centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + t * (w - c))
                .collect();
            project(&mut p, bounds);
            p
        };

        let reflected = along(-1.0);
        let fr = eval(&reflected);
        if fr < values[0] {
            let expanded = along(-2.0);
            let fe = eval(&expanded);
            if fe < fr {
                simplex[n] = expanded;
                values[n] = fe;
            } else {
                simplex[n] = reflected;
                values[n] = fr;
            }
            continue;
        }
        if fr < values[n - 1] {
            simplex[n] = reflected;
            values[n] = fr;
            continue;
        }

        let (contracted, fc) = if fr < values[n] {
            let p = along(-0.5);
            let v = eval(&p);
            (p, v)
        } else {
            let p = along(0.5);
            let v = eval(&p);
            (p, v)
        };
        if fc < values[n].min(fr) {
            simplex[n] = contracted;
            values[n] = fc;
            continue;
        }

        // Shrink toward the best vertex.
        let best = simplex[0].clone();
        for i in 1..=n {
            let mut p: Vec<f64> = simplex[i]
                .iter()
                .zip(&best)
                .map(|(x, b)| b + 0.5 * (x - b))
                .collect();
            project(&mut p, bounds);
            values[i] = eval(&p);
            simplex[i] = p;
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);
    Minimum {
        x: simplex[best].clone(),
        value: values[best],
        iterations,
    }
}

/// Solve `f(x) = target` for a non-decreasing `f` on `[lo, hi]`.
///
/// The upper bound is doubled (up to `max_hi`) until it brackets the target.
/// Returns the bracket end closest to the target when no root exists.
pub fn solve_increasing<F>(f: F, target: f64, mut lo: f64, mut hi: f64, max_hi: f64, rel_tol: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    if f(lo) >= target {
        return lo;
    }
    while f(hi) < target && hi < max_hi {
        lo = hi;
        hi = (hi * 2.0).min(max_hi);
    }
    if f(hi) < target {
        return hi;
    }
    let tol = rel_tol * target.abs().max(1e-12);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let v = f(mid);
        if (v - target).abs() <= tol {
            return mid;
        }
        if v < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
        let m = nelder_mead(f, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)], NelderMeadOptions::default());
        assert!((m.x[0] - 3.0).abs() < 1e-4);
        assert!((m.x[1] + 1.0).abs() < 1e-4);
        assert!(m.value < 1e-8);
    }

    #[test]
    fn test_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let m = nelder_mead(f, &[-1.2, 1.0], &[(-5.0, 5.0), (-5.0, 5.0)], NelderMeadOptions::default());
        assert!((m.x[0] - 1.0).abs() < 1e-3, "{:?}", m.x);
        assert!((m.x[1] - 1.0).abs() < 1e-3, "{:?}", m.x);
    }

    #[test]
    fn test_bounds_are_respected() {
        // Unconstrained minimum at x = -5, bound at 0
        let f = |x: &[f64]| (x[0] + 5.0).powi(2);
        let m = nelder_mead(f, &[2.0], &[(0.0, 10.0)], NelderMeadOptions::default());
        assert!(m.x[0] >= 0.0);
        assert!(m.x[0] < 1e-6);
    }

    #[test]
    fn test_solve_increasing() {
        let x = solve_increasing(|x| x * x, 49.0, 0.0, 1.0, 1e6, 1e-12);
        assert!((x - 7.0).abs() < 1e-8);
    }

    #[test]
    fn test_solve_increasing_unreachable() {
        let x = solve_increasing(|x| x.min(5.0), 10.0, 0.0, 1.0, 64.0, 1e-9);
        assert_eq!(x, 64.0);
    }
}
