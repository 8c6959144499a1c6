use crate::common::*;
use crate::error::SynthError;
use rand::rngs::StdRng;
use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Draw `n` cell indices with replacement, each cell picked with its
/// probability in `prob`. Cells with zero probability are never picked.
pub fn sample_cells<R: Rng>(prob: &DVec, n: usize, rng: &mut R) -> anyhow::Result<Vec<usize>> {
    let disc = WeightedIndex::new(prob.iter())
        .map_err(|e| anyhow::anyhow!("invalid cell probabilities: {}", e))?;
    Ok((0..n).map(|_| disc.sample(rng)).collect())
}

/// Pick cells for the examples `lb..ub`. Example `i` draws from its own
/// generator seeded by `seeds[i]`, so the picks do not depend on how
/// examples are grouped into batches.
pub fn sample_cells_batch(
    probs: &[DVec],
    (lb, ub): (usize, usize),
    n: usize,
    seeds: &[u64],
) -> anyhow::Result<Vec<Vec<usize>>> {
    if ub > probs.len() || ub > seeds.len() || lb > ub {
        return Err(SynthError::invalid(format!(
            "batch [{}, {}) out of {} examples",
            lb,
            ub,
            probs.len()
        )));
    }

    (lb..ub)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seeds[i]);
            sample_cells(&probs[i], n, &mut rng)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_only_positive_cells() -> anyhow::Result<()> {
        let prob = DVec::from_vec(vec![0.0, 0.5, 0.0, 0.25, 0.25]);
        let mut rng = StdRng::seed_from_u64(5);
        let picked = sample_cells(&prob, 1000, &mut rng)?;

        assert_eq!(picked.len(), 1000);
        assert!(picked.iter().all(|&c| c == 1 || c == 3 || c == 4));

        let ones = picked.iter().filter(|&&c| c == 1).count();
        assert!(ones > 400 && ones < 600);
        Ok(())
    }

    #[test]
    fn all_zero_probabilities_fail() {
        let prob = DVec::zeros(3);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(sample_cells(&prob, 10, &mut rng).is_err());
    }

    #[test]
    fn batch_picks_match_single_draws() -> anyhow::Result<()> {
        let probs = vec![
            DVec::from_vec(vec![0.2, 0.8]),
            DVec::from_vec(vec![0.9, 0.1]),
            DVec::from_vec(vec![0.5, 0.5]),
        ];
        let seeds = vec![10, 20, 30];
        let batch = sample_cells_batch(&probs, (1, 3), 7, &seeds)?;
        assert_eq!(batch.len(), 2);

        let mut rng = StdRng::seed_from_u64(30);
        assert_eq!(batch[1], sample_cells(&probs[2], 7, &mut rng)?);
        assert!(sample_cells_batch(&probs, (2, 4), 7, &seeds).is_err());
        Ok(())
    }
}
