use crate::common::*;
use crate::distance::DistanceMatrix;
use crate::error::SynthError;
use crate::mixture::{MixtureSampler, MixtureSpec};
use rand::Rng;

/// Probability of each reference cell under a Gaussian mixture
///
/// ```text
/// p(x) ∝ Σ_c w_c / (sqrt(2π) σ_c) · exp(−d(x,c)² / (2σ_c²))
/// ```
///
/// Returns `None` if the densities vanish (or overflow) everywhere, so
/// the vector cannot be normalized.
pub fn cell_probability(spec: &MixtureSpec, dist: &DistanceMatrix) -> Option<DVec> {
    let sqrt_2pi = (2. * std::f64::consts::PI).sqrt();
    let mut prob = DVec::zeros(dist.num_cells());

    for comp in spec.components() {
        let coef = comp.weight / (sqrt_2pi * comp.sigma);
        let denom = 2. * comp.sigma * comp.sigma;
        prob.iter_mut()
            .zip(dist.from_cell(comp.center).iter())
            .for_each(|(p, &d)| *p += coef * (-d * d / denom).exp());
    }

    let total = prob.sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    prob.unscale_mut(total);
    Some(prob)
}

/// Draw a mixture and its cell probabilities for one example, drawing
/// a fresh mixture when the probabilities degenerate.
///
/// * `example` - index of the example, for error reporting
/// * `max_retries` - additional draws allowed after the first one
pub fn draw_mixture_probability<R: Rng>(
    sampler: &MixtureSampler,
    dist: &DistanceMatrix,
    rng: &mut R,
    max_retries: usize,
    example: usize,
) -> anyhow::Result<(MixtureSpec, DVec)> {
    let attempts = max_retries + 1;
    for attempt in 0..attempts {
        let spec = sampler.sample(rng);
        if let Some(prob) = cell_probability(&spec, dist) {
            return Ok((spec, prob));
        }
        warn!(
            "example {}: degenerate cell probabilities (draw {}/{})",
            example,
            attempt + 1,
            attempts
        );
    }
    Err(SynthError::DegenerateProbability { example, attempts }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::MixtureComponent;
    use crate::sigma::SigmaBounds;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line_of_cells(n: usize, spacing: f64) -> anyhow::Result<DistanceMatrix> {
        let latent = Mat::from_fn(n, 1, |i, _| i as f64 * spacing);
        DistanceMatrix::from_latent(&latent, 1)
    }

    #[test]
    fn single_centre_density() -> anyhow::Result<()> {
        let dist = line_of_cells(5, 1.0)?;
        let spec = MixtureSpec::new(vec![MixtureComponent {
            center: 2,
            sigma: 1.0,
            weight: 1.0,
        }])?;

        let prob = cell_probability(&spec, &dist).ok_or(anyhow::anyhow!("degenerate"))?;
        assert_abs_diff_eq!(prob.sum(), 1.0, epsilon = 1e-12);

        // symmetric around the centre, peaked at the centre
        assert_abs_diff_eq!(prob[1], prob[3], epsilon = 1e-15);
        assert_abs_diff_eq!(prob[0], prob[4], epsilon = 1e-15);
        assert!(prob[2] > prob[1] && prob[1] > prob[0]);
        assert_abs_diff_eq!(prob[1] / prob[2], (-0.5_f64).exp(), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn vanishing_densities_are_detected() -> anyhow::Result<()> {
        let dist = line_of_cells(3, 1e3)?;
        let spec = MixtureSpec::new(vec![MixtureComponent {
            center: 0,
            sigma: 1e-6,
            weight: 1.0,
        }])?;
        // the centre itself keeps all the mass
        let prob = cell_probability(&spec, &dist).ok_or(anyhow::anyhow!("degenerate"))?;
        assert_abs_diff_eq!(prob[0], 1.0);

        // bandwidth so tiny that the density at distance 0 overflows
        let spec = MixtureSpec::new(vec![MixtureComponent {
            center: 0,
            sigma: 1e-320,
            weight: 1.0,
        }])?;
        assert!(cell_probability(&spec, &dist).is_none());
        Ok(())
    }

    #[test]
    fn degenerate_draws_are_reported_after_retries() -> anyhow::Result<()> {
        let dist = line_of_cells(4, 1.0)?;
        let bounds = SigmaBounds {
            min: 1e-320,
            max: 1e-320,
        };
        let sampler = MixtureSampler::new(4, 1, 2, &bounds, 3)?;
        let mut rng = StdRng::seed_from_u64(3);

        let err = draw_mixture_probability(&sampler, &dist, &mut rng, 2, 11).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SynthError>(),
            Some(&SynthError::DegenerateProbability {
                example: 11,
                attempts: 3
            })
        );
        Ok(())
    }
}
