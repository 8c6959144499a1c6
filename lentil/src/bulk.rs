use crate::cell_sampler::sample_cells_batch;
use crate::common::*;
use crate::error::SynthError;

use indicatif::ProgressIterator;
use matrix_util::dmatrix_util::concatenate_horizontal;
use matrix_util::traits::{MatOps, MatTriplets};
use matrix_util::utils::generate_minibatch_intervals;
use rayon::prelude::*;

/// Reference gene x cell count matrix, dense or sparse
pub trait ReferenceCounts: Sync {
    fn num_genes(&self) -> usize;

    fn num_cells(&self) -> usize;

    /// all counts finite and non-negative
    fn validate(&self) -> anyhow::Result<()>;

    /// `genes x batch` product of the counts with a `cells x batch`
    /// weight matrix
    fn aggregate(&self, weights: &CscMat) -> anyhow::Result<Mat>;
}

impl ReferenceCounts for Mat {
    fn num_genes(&self) -> usize {
        self.nrows()
    }

    fn num_cells(&self) -> usize {
        self.ncols()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.iter().any(|x| !(x.is_finite() && *x >= 0.0)) {
            return Err(SynthError::invalid(
                "count matrix has negative or non-finite entries",
            ));
        }
        Ok(())
    }

    fn aggregate(&self, weights: &CscMat) -> anyhow::Result<Mat> {
        check_weights_shape(self.num_cells(), weights)?;

        let columns = weights
            .col_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|w_j| {
                let mut y_j = DVec::zeros(self.nrows());
                for (&c, &w) in w_j.row_indices().iter().zip(w_j.values()) {
                    y_j.axpy(w, &self.column(c), 1.0);
                }
                y_j
            })
            .collect::<Vec<_>>();

        if columns.is_empty() {
            return Ok(Mat::zeros(self.nrows(), 0));
        }
        concatenate_horizontal(&columns)
    }
}

impl ReferenceCounts for CscMat {
    fn num_genes(&self) -> usize {
        self.nrows()
    }

    fn num_cells(&self) -> usize {
        self.ncols()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.values().iter().any(|x| !(x.is_finite() && *x >= 0.0)) {
            return Err(SynthError::invalid(
                "count matrix has negative or non-finite entries",
            ));
        }
        Ok(())
    }

    fn aggregate(&self, weights: &CscMat) -> anyhow::Result<Mat> {
        check_weights_shape(self.num_cells(), weights)?;
        let y = self * weights;
        Ok(Mat::from(&y))
    }
}

fn check_weights_shape(ncells: usize, weights: &CscMat) -> anyhow::Result<()> {
    if weights.nrows() != ncells {
        return Err(anyhow::anyhow!(
            "weight matrix has {} rows for {} cells",
            weights.nrows(),
            ncells
        ));
    }
    Ok(())
}

/// Count how often each cell was picked in each example: a sparse
/// `cells x examples` matrix
pub fn picked_cells_to_weights(picked: &[Vec<usize>], ncells: usize) -> anyhow::Result<CscMat> {
    let triplets = picked
        .iter()
        .enumerate()
        .flat_map(|(j, cells)| cells.iter().map(move |&c| (c, j, 1_f64)))
        .collect::<Vec<_>>();
    CscMat::from_nonzero_triplets(ncells, picked.len(), triplets)
}

/// Turns picked cells into counts-per-million synthetic bulk profiles
pub struct BulkAggregator<'a, C: ReferenceCounts + ?Sized> {
    counts: &'a C,
}

impl<'a, C: ReferenceCounts + ?Sized> BulkAggregator<'a, C> {
    pub fn new(counts: &'a C) -> Self {
        Self { counts }
    }

    /// `genes x picked.len()` matrix of CPM-normalized bulk profiles
    ///
    /// * `picked` - picked cells of the examples `offset..offset+picked.len()`
    /// * `offset` - index of the first example, for error reporting
    pub fn aggregate_batch(&self, picked: &[Vec<usize>], offset: usize) -> anyhow::Result<Mat> {
        let weights = picked_cells_to_weights(picked, self.counts.num_cells())?;
        let mut bulk = self.counts.aggregate(&weights)?;
        drop(weights);

        let degenerate = bulk.normalize_columns_to_sum_inplace(CPM_TOTAL);
        if let Some(&j) = degenerate.first() {
            return Err(SynthError::DegenerateBulk {
                example: offset + j,
            }
            .into());
        }
        Ok(bulk)
    }

    /// Sample cells and aggregate them for all the examples, `step`
    /// examples at a time. Columns follow the order of `probs`.
    ///
    /// * `probs` - cell probability vector of each example
    /// * `n` - cells drawn per example
    /// * `step` - examples per batch
    /// * `seeds` - random seed of each example
    pub fn aggregate_all(
        &self,
        probs: &[DVec],
        n: usize,
        step: usize,
        seeds: &[u64],
        verbose: bool,
    ) -> anyhow::Result<Mat> {
        let ntot = probs.len();
        let mut bulk_gn = Mat::zeros(self.counts.num_genes(), ntot);

        let batches = generate_minibatch_intervals(ntot, step);
        let nbatches = batches.len();

        for (lb, ub) in batches
            .into_iter()
            .progress_with(new_progress_bar(nbatches, verbose))
        {
            let picked = sample_cells_batch(probs, (lb, ub), n, seeds)?;
            let bulk = self.aggregate_batch(&picked, lb)?;
            bulk_gn.columns_mut(lb, ub - lb).copy_from(&bulk);

            if verbose {
                info!("aggregated examples [{}, {})", lb, ub);
            }
        }
        Ok(bulk_gn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn toy_counts() -> Mat {
        // 3 genes x 4 cells; cell 3 has no counts
        Mat::from_row_slice(3, 4, &[1., 0., 2., 0., 3., 1., 0., 0., 0., 4., 2., 0.])
    }

    #[test]
    fn weights_count_repeated_cells() -> anyhow::Result<()> {
        let picked = vec![vec![0, 0, 2], vec![1]];
        let w = picked_cells_to_weights(&picked, 4)?;
        let w = Mat::from(&w);
        assert_eq!(w.shape(), (4, 2));
        assert_eq!(w[(0, 0)], 2.0);
        assert_eq!(w[(2, 0)], 1.0);
        assert_eq!(w[(1, 1)], 1.0);
        assert_eq!(w.sum(), 4.0);
        Ok(())
    }

    #[test]
    fn dense_and_sparse_counts_agree() -> anyhow::Result<()> {
        let dense = toy_counts();
        let triplets = dense
            .iter()
            .enumerate()
            .filter(|(_, &x)| x > 0.0)
            .map(|(k, &x)| (k % 3, k / 3, x))
            .collect::<Vec<_>>();
        let sparse = CscMat::from_nonzero_triplets(3, 4, triplets)?;

        let picked = vec![vec![0, 1, 1], vec![2, 3], vec![0, 2, 1, 1]];
        let a = BulkAggregator::new(&dense).aggregate_batch(&picked, 0)?;
        let b = BulkAggregator::new(&sparse).aggregate_batch(&picked, 0)?;

        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        for j in 0..a.ncols() {
            assert_abs_diff_eq!(a.column(j).sum(), CPM_TOTAL, epsilon = 1e-6);
        }

        // raw aggregate of the first example: cell 0 + 2 x cell 1
        let raw = [1.0, 3.0 + 2.0, 8.0];
        let total: f64 = raw.iter().sum();
        for g in 0..3 {
            assert_abs_diff_eq!(a[(g, 0)], raw[g] / total * CPM_TOTAL, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn empty_profile_is_an_error() -> anyhow::Result<()> {
        let counts = toy_counts();
        let picked = vec![vec![0], vec![3, 3]];
        let err = BulkAggregator::new(&counts)
            .aggregate_batch(&picked, 40)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SynthError>(),
            Some(&SynthError::DegenerateBulk { example: 41 })
        );
        Ok(())
    }

    #[test]
    fn negative_counts_are_invalid() {
        let mut counts = toy_counts();
        counts[(0, 0)] = -1.0;
        assert!(counts.validate().is_err());
        assert!(toy_counts().validate().is_ok());
    }
}
