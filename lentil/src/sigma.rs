use crate::common::*;
use crate::distance::DistanceMatrix;
use crate::error::SynthError;
use matrix_util::utils::generate_minibatch_intervals;
use rayon::prelude::*;

/// width of the Riemann sum over the neighbour-distance envelope
pub const RIEMANN_STEP: f64 = 0.01;

/// sigma_max / sigma_min when only one of them can be calibrated
pub const FALLBACK_RATIO: f64 = 5.0;

/// the smallest default neighbour count for `sigma_min`
pub const MIN_NEIGHBOUR_CELLS: usize = 20;

const MAX_GRID_POINTS: usize = 10_000_000;
const MAX_BISECTION_ITER: usize = 200;
const BISECTION_TOL: f64 = 1e-12;
const CELL_BLOCK_SIZE: usize = 1000;

/// Kernel bandwidth range for the Gaussian mixtures
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmaBounds {
    pub min: f64,
    pub max: f64,
}

impl SigmaBounds {
    /// `n` bandwidths evenly spaced on the log scale between `min`
    /// and `max`, both included
    pub fn log_spaced_grid(&self, n: usize) -> Vec<f64> {
        let (lo, hi) = (self.min.ln(), self.max.ln());
        match n {
            0 => vec![],
            1 => vec![self.min],
            _ => (0..n)
                .map(|i| {
                    let t = i as f64 / (n - 1) as f64;
                    (lo + t * (hi - lo)).exp()
                })
                .collect(),
        }
    }
}

/// Target numbers of nearest neighbours for `sigma_min` and `sigma_max`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighbourCounts {
    pub n_min: usize,
    pub n_max: usize,
}

impl NeighbourCounts {
    /// Defaults: `n_min = max(20, round(cells/100))` and
    /// `n_max = max(cells/5, n_min)`, unless given explicitly.
    pub fn resolve(
        ncells: usize,
        n_min: Option<usize>,
        n_max: Option<usize>,
    ) -> anyhow::Result<Self> {
        let n_min =
            n_min.unwrap_or_else(|| MIN_NEIGHBOUR_CELLS.max((ncells as f64 / 100.).round() as usize));
        let n_max = n_max.unwrap_or_else(|| (ncells / 5).max(n_min));

        if n_min == 0 || n_max == 0 {
            return Err(SynthError::invalid("neighbour counts must be positive"));
        }
        if n_min > n_max {
            return Err(SynthError::invalid(format!(
                "sigma_min_cells ({}) exceeds sigma_max_cells ({})",
                n_min, n_max
            )));
        }
        Ok(Self { n_min, n_max })
    }
}

/// Average distance to the 1st, 2nd, ..., `k`-th nearest neighbour
/// over all cells. The first neighbour of a cell is itself, so the
/// curve starts at zero.
pub fn average_knn_distances(dist: &DistanceMatrix, k: usize) -> anyhow::Result<Vec<f64>> {
    let nn = dist.num_cells();
    if k == 0 || k > nn {
        return Err(anyhow::anyhow!(
            "{} nearest neighbours requested among {} cells",
            k,
            nn
        ));
    }

    // partial sums over fixed blocks, combined in order, so the curve
    // does not depend on thread scheduling
    let block_sums = generate_minibatch_intervals(nn, CELL_BLOCK_SIZE)
        .into_par_iter()
        .map(|(lb, ub)| {
            let mut sums = vec![0_f64; k];
            for cell in lb..ub {
                let neighbours = dist.nearest_neighbours(cell);
                for (s, (_, d)) in sums.iter_mut().zip(neighbours.into_iter().take(k)) {
                    *s += d;
                }
            }
            sums
        })
        .collect::<Vec<_>>();

    let mut k_dist = vec![0_f64; k];
    for sums in block_sums {
        for (acc, s) in k_dist.iter_mut().zip(sums) {
            *acc += s;
        }
    }
    k_dist.iter_mut().for_each(|x| *x /= nn as f64);
    Ok(k_dist)
}

/// Riemann sum of the `N(0, sigma^2)` density over `0, step, 2 step,
/// ... <= upper`, minus one half.
///
/// ```text
/// f(σ) = Σ_i φ(x_i; σ) · step − 0.5
/// ```
pub fn half_kernel_mass_gap(sigma: f64, upper: f64) -> f64 {
    let npoints = (upper / RIEMANN_STEP + 1e-9).floor() as usize + 1;
    let norm = (2. * std::f64::consts::PI).sqrt() * sigma;
    let denom = 2. * sigma * sigma;

    let mass: f64 = (0..npoints)
        .map(|i| {
            let x = i as f64 * RIEMANN_STEP;
            (-x * x / denom).exp() / norm
        })
        .sum();

    mass * RIEMANN_STEP - 0.5
}

/// Find a root of `f` in `[lo, hi]` by bisection. Returns `None` if
/// `f` does not change its sign on the interval.
pub fn find_root_bisection<F>(f: F, lo: f64, hi: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
        return None;
    }

    let (mut lo, mut hi) = (lo, hi);
    let (f_lo, f_hi) = (f(lo), f(hi));

    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }

    let lo_positive = f_lo > 0.0;
    for _ in 0..MAX_BISECTION_ITER {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return Some(mid);
        }
        if (f_mid > 0.0) == lo_positive {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= BISECTION_TOL * hi.abs().max(1.0) {
            break;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Bandwidth whose Gaussian kernel holds half of its mass within the
/// average distance to the `k` nearest neighbours.
///
/// The root is searched between the smallest positive and the largest
/// average neighbour distance.
pub fn solve_sigma(dist: &DistanceMatrix, k: usize) -> anyhow::Result<f64> {
    let k_dist = average_knn_distances(dist, k)?;

    if k_dist.iter().any(|x| !x.is_finite()) {
        return Err(anyhow::anyhow!("non-finite neighbour distances"));
    }

    let upper = k_dist.iter().copied().fold(0_f64, f64::max);
    let lower = k_dist
        .iter()
        .copied()
        .filter(|&x| x > 0.0)
        .fold(f64::INFINITY, f64::min);

    if !lower.is_finite() {
        return Err(anyhow::anyhow!("all {} neighbours at zero distance", k));
    }

    if upper / RIEMANN_STEP > MAX_GRID_POINTS as f64 {
        return Err(anyhow::anyhow!(
            "neighbour distances up to {} are too wide for the integration grid",
            upper
        ));
    }

    find_root_bisection(|s| half_kernel_mass_gap(s, upper), lower, upper).ok_or_else(|| {
        anyhow::anyhow!(
            "no sign change of the kernel mass in [{}, {}] with {} neighbours",
            lower,
            upper,
            k
        )
    })
}

/// Calibrate `sigma_min` and `sigma_max` from the neighbour structure.
///
/// If only one of them can be solved, the other one is set by
/// [`FALLBACK_RATIO`]. Fails if neither can be solved.
pub fn calibrate_sigma(
    dist: &DistanceMatrix,
    counts: &NeighbourCounts,
    verbose: bool,
) -> anyhow::Result<SigmaBounds> {
    let sigma_min = solve_sigma(dist, counts.n_min);
    let sigma_max = solve_sigma(dist, counts.n_max);

    let bounds = match (sigma_min, sigma_max) {
        (Ok(min), Ok(max)) => SigmaBounds { min, max },
        (Ok(min), Err(e)) => {
            warn!(
                "sigma_max with {} neighbours: {}; using {} x sigma_min",
                counts.n_max, e, FALLBACK_RATIO
            );
            SigmaBounds {
                min,
                max: min * FALLBACK_RATIO,
            }
        }
        (Err(e), Ok(max)) => {
            warn!(
                "sigma_min with {} neighbours: {}; using sigma_max / {}",
                counts.n_min, e, FALLBACK_RATIO
            );
            SigmaBounds {
                min: max / FALLBACK_RATIO,
                max,
            }
        }
        (Err(e_min), Err(e_max)) => {
            warn!("sigma_min: {}", e_min);
            warn!("sigma_max: {}", e_max);
            return Err(SynthError::CalibrationFailed {
                n_min: counts.n_min,
                n_max: counts.n_max,
            }
            .into());
        }
    };

    if verbose {
        info!(
            "sigma in [{:.4}, {:.4}] with {} and {} nearest neighbours",
            bounds.min, bounds.max, counts.n_min, counts.n_max
        );
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bisection_finds_a_simple_root() {
        let root = find_root_bisection(|x| x * x - 2.0, 0.0, 2.0);
        assert_relative_eq!(root.unwrap_or(f64::NAN), 2_f64.sqrt(), epsilon = 1e-9);
        assert!(find_root_bisection(|x| x * x + 1.0, -1.0, 1.0).is_none());
        assert!(find_root_bisection(|x| x, 1.0, 1.0).is_none());
    }

    #[test]
    fn kernel_mass_decreases_with_sigma() {
        let upper = 2.0;
        let gaps = [0.05, 0.2, 0.5, 1.0, 2.0]
            .iter()
            .map(|&s| half_kernel_mass_gap(s, upper))
            .collect::<Vec<_>>();
        assert!(gaps.windows(2).all(|w| w[0] > w[1]));
        assert!(gaps[0] > 0.0);
        assert!(gaps[4] < 0.0);
    }

    #[test]
    fn default_neighbour_counts() -> anyhow::Result<()> {
        assert_eq!(
            NeighbourCounts::resolve(50, None, None)?,
            NeighbourCounts { n_min: 20, n_max: 20 }
        );
        assert_eq!(
            NeighbourCounts::resolve(10_000, None, None)?,
            NeighbourCounts {
                n_min: 100,
                n_max: 2000
            }
        );
        assert_eq!(
            NeighbourCounts::resolve(1000, Some(5), None)?,
            NeighbourCounts { n_min: 5, n_max: 200 }
        );
        assert!(NeighbourCounts::resolve(1000, Some(50), Some(10)).is_err());
        Ok(())
    }

    #[test]
    fn log_grid_spans_the_bounds() {
        let bounds = SigmaBounds { min: 0.1, max: 10.0 };
        let grid = bounds.log_spaced_grid(3);
        assert_eq!(grid.len(), 3);
        assert_relative_eq!(grid[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(grid[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(grid[2], 10.0, epsilon = 1e-12);
    }
}
