use crate::error::SynthError;
use crate::sigma::SigmaBounds;
use rand::Rng;

/// mixing weights are drawn from `1..=MAX_MIXING_WEIGHT` and normalized
pub const MAX_MIXING_WEIGHT: usize = 100;

/// One Gaussian kernel centred at a reference cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixtureComponent {
    pub center: usize,
    pub sigma: f64,
    pub weight: f64,
}

/// A Gaussian mixture over the latent space that defines one synthetic
/// example. Centres are distinct cells; weights sum to one.
#[derive(Clone, Debug, PartialEq)]
pub struct MixtureSpec {
    components: Vec<MixtureComponent>,
}

impl MixtureSpec {
    pub fn new(components: Vec<MixtureComponent>) -> anyhow::Result<Self> {
        if components.is_empty() {
            return Err(SynthError::invalid("a mixture needs at least one centre"));
        }
        if components
            .iter()
            .any(|c| !(c.sigma.is_finite() && c.sigma > 0.0))
        {
            return Err(SynthError::invalid("mixture bandwidths must be positive"));
        }
        if components
            .iter()
            .any(|c| !(c.weight.is_finite() && c.weight >= 0.0))
        {
            return Err(SynthError::invalid("mixing weights must be non-negative"));
        }
        let wsum: f64 = components.iter().map(|c| c.weight).sum();
        if (wsum - 1.0).abs() > 1e-9 {
            return Err(SynthError::invalid(format!(
                "mixing weights sum to {} instead of 1",
                wsum
            )));
        }
        let mut centers = components.iter().map(|c| c.center).collect::<Vec<_>>();
        centers.sort_unstable();
        centers.dedup();
        if centers.len() != components.len() {
            return Err(SynthError::invalid("mixture centres must be distinct"));
        }
        Ok(Self { components })
    }

    pub fn components(&self) -> &[MixtureComponent] {
        &self.components
    }

    pub fn num_centers(&self) -> usize {
        self.components.len()
    }

    /// Fixed-width parameter row `[k, centres.., sigmas.., weights..]`
    /// with `max_cent` slots per field; unused slots are zero.
    pub fn to_param_row(&self, max_cent: usize) -> anyhow::Result<Vec<f64>> {
        let k = self.num_centers();
        if k > max_cent {
            return Err(anyhow::anyhow!(
                "{} centres do not fit in {} slots",
                k,
                max_cent
            ));
        }
        let mut row = vec![0_f64; 1 + 3 * max_cent];
        row[0] = k as f64;
        for (i, c) in self.components.iter().enumerate() {
            row[1 + i] = c.center as f64;
            row[1 + max_cent + i] = c.sigma;
            row[1 + 2 * max_cent + i] = c.weight;
        }
        Ok(row)
    }
}

/// Draws random mixtures: `k ~ U{min_cent..=max_cent}` distinct centre
/// cells, bandwidths from a log-spaced grid over the sigma bounds and
/// normalized integer weights.
#[derive(Clone, Debug)]
pub struct MixtureSampler {
    ncells: usize,
    min_cent: usize,
    max_cent: usize,
    sigma_grid: Vec<f64>,
}

impl MixtureSampler {
    pub fn new(
        ncells: usize,
        min_cent: usize,
        max_cent: usize,
        sigma: &SigmaBounds,
        grid_size: usize,
    ) -> anyhow::Result<Self> {
        if min_cent == 0 || min_cent > max_cent {
            return Err(SynthError::invalid(format!(
                "need 1 <= min_cent ({}) <= max_cent ({})",
                min_cent, max_cent
            )));
        }
        if max_cent > ncells {
            return Err(SynthError::invalid(format!(
                "max_cent ({}) exceeds the number of cells ({})",
                max_cent, ncells
            )));
        }
        if !(sigma.min > 0.0 && sigma.min <= sigma.max && sigma.max.is_finite()) {
            return Err(SynthError::invalid(format!(
                "invalid sigma bounds [{}, {}]",
                sigma.min, sigma.max
            )));
        }
        let sigma_grid = sigma.log_spaced_grid(grid_size);
        if sigma_grid.is_empty() {
            return Err(SynthError::invalid("empty bandwidth grid"));
        }
        Ok(Self {
            ncells,
            min_cent,
            max_cent,
            sigma_grid,
        })
    }

    pub fn sigma_grid(&self) -> &[f64] {
        &self.sigma_grid
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> MixtureSpec {
        let k = rng.random_range(self.min_cent..=self.max_cent);
        let centers = rand::seq::index::sample(rng, self.ncells, k).into_vec();

        let sigmas = (0..k)
            .map(|_| self.sigma_grid[rng.random_range(0..self.sigma_grid.len())])
            .collect::<Vec<_>>();

        let weights = (0..k)
            .map(|_| rng.random_range(1..=MAX_MIXING_WEIGHT) as f64)
            .collect::<Vec<_>>();
        let wsum: f64 = weights.iter().sum();

        let components = centers
            .into_iter()
            .zip(sigmas)
            .zip(weights)
            .map(|((center, sigma), w)| MixtureComponent {
                center,
                sigma,
                weight: w / wsum,
            })
            .collect();

        MixtureSpec { components }
    }
}
