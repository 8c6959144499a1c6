use crate::bulk::{BulkAggregator, ReferenceCounts};
use crate::common::*;
use crate::distance::DistanceMatrix;
use crate::error::SynthError;
use crate::mixture::{MixtureSampler, MixtureSpec};
use crate::probability::draw_mixture_probability;
use crate::sigma::{calibrate_sigma, NeighbourCounts, SigmaBounds};

use clap::Args;
use indicatif::ParallelProgressIterator;
use matrix_util::common_io::mkdir;
use matrix_util::dmatrix_util::concatenate_horizontal;
use matrix_util::traits::IoOps;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// examples per aggregation batch unless `step` is given
pub const DEFAULT_MAX_STEP: usize = 10_000;

#[derive(Args, Debug, Clone)]
pub struct TrainingSetArgs {
    /// number of synthetic bulk examples
    #[arg(long, default_value_t = 5000)]
    pub max_iter: usize,

    /// maximum number of Gaussian mixture centres per example
    #[arg(long, default_value_t = 5)]
    pub max_cent: usize,

    /// minimum number of Gaussian mixture centres per example
    #[arg(long, default_value_t = 1)]
    pub min_cent: usize,

    /// examples aggregated per batch (default: min(max_iter, 10000))
    #[arg(long)]
    pub step: Option<usize>,

    /// number of leading latent dimensions to measure distances
    #[arg(long, short = 'd', default_value_t = 10)]
    pub dims: usize,

    /// cells sampled per example (default: half of the cells)
    #[arg(long = "cells-per-example", short = 'n')]
    pub n: Option<usize>,

    /// nearest neighbours to calibrate the smallest bandwidth
    /// (default: max(20, cells/100))
    #[arg(long)]
    pub sigma_min_cells: Option<usize>,

    /// nearest neighbours to calibrate the largest bandwidth
    /// (default: max(cells/5, sigma_min_cells))
    #[arg(long)]
    pub sigma_max_cells: Option<usize>,

    /// number of log-spaced bandwidths to choose from
    #[arg(long, default_value_t = 100)]
    pub sigma_grid: usize,

    /// extra mixture draws allowed when cell probabilities degenerate
    #[arg(long, default_value_t = 10)]
    pub max_retries: usize,

    /// random seed
    #[arg(long, short = 'r', default_value_t = 42)]
    pub rseed: u64,

    /// verbosity
    #[arg(long, short)]
    pub verbose: bool,
}

impl Default for TrainingSetArgs {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            max_cent: 5,
            min_cent: 1,
            step: None,
            dims: 10,
            n: None,
            sigma_min_cells: None,
            sigma_max_cells: None,
            sigma_grid: 100,
            max_retries: 10,
            rseed: 42,
            verbose: false,
        }
    }
}

/// [`TrainingSetArgs`] with all the defaults filled in for a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgs {
    pub max_iter: usize,
    pub max_cent: usize,
    pub min_cent: usize,
    pub step: usize,
    pub dims: usize,
    pub n: usize,
    pub neighbours: NeighbourCounts,
    pub sigma_grid: usize,
    pub max_retries: usize,
}

impl TrainingSetArgs {
    /// Check the arguments against a dataset of `ncells` cells with a
    /// `latent_dims`-dimensional embedding and fill in the defaults.
    pub fn resolve(&self, ncells: usize, latent_dims: usize) -> anyhow::Result<ResolvedArgs> {
        if ncells < 2 {
            return Err(SynthError::invalid(format!(
                "need at least two reference cells, got {}",
                ncells
            )));
        }
        if self.max_iter == 0 {
            return Err(SynthError::invalid("max_iter must be positive"));
        }
        if self.dims == 0 || self.dims > latent_dims {
            return Err(SynthError::invalid(format!(
                "dims = {} but the latent embedding has {} columns",
                self.dims, latent_dims
            )));
        }
        if self.min_cent == 0 || self.min_cent > self.max_cent {
            return Err(SynthError::invalid(format!(
                "need 1 <= min_cent ({}) <= max_cent ({})",
                self.min_cent, self.max_cent
            )));
        }
        if self.max_cent > ncells {
            return Err(SynthError::invalid(format!(
                "max_cent ({}) exceeds the number of cells ({})",
                self.max_cent, ncells
            )));
        }
        if self.sigma_grid == 0 {
            return Err(SynthError::invalid("sigma_grid must be positive"));
        }

        let n = self
            .n
            .unwrap_or_else(|| (ncells as f64 / 2.).round() as usize);
        if n == 0 {
            return Err(SynthError::invalid("n (cells per example) must be positive"));
        }

        let step = self
            .step
            .unwrap_or_else(|| self.max_iter.min(DEFAULT_MAX_STEP));
        if step == 0 {
            return Err(SynthError::invalid("step must be positive"));
        }

        let neighbours =
            NeighbourCounts::resolve(ncells, self.sigma_min_cells, self.sigma_max_cells)?;

        Ok(ResolvedArgs {
            max_iter: self.max_iter,
            max_cent: self.max_cent,
            min_cent: self.min_cent,
            step,
            dims: self.dims,
            n,
            neighbours,
            sigma_grid: self.sigma_grid,
            max_retries: self.max_retries,
        })
    }
}

/// Synthetic bulk profiles paired with the cell probabilities that
/// generated them. Column `i` of [`TrainingSet::probabilities`] and of
/// [`TrainingSet::bulk`] describe the same example.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    distance: DistanceMatrix,
    sigma: SigmaBounds,
    max_cent: usize,
    mixtures: Vec<MixtureSpec>,
    prob_cn: Mat,
    bulk_gn: Mat,
}

impl TrainingSet {
    pub fn distance(&self) -> &DistanceMatrix {
        &self.distance
    }

    pub fn dims(&self) -> usize {
        self.distance.dims()
    }

    pub fn sigma_bounds(&self) -> SigmaBounds {
        self.sigma
    }

    pub fn mixtures(&self) -> &[MixtureSpec] {
        &self.mixtures
    }

    /// `cells x examples`, each column sums to one
    pub fn probabilities(&self) -> &Mat {
        &self.prob_cn
    }

    /// `genes x examples`, each column sums to a million
    pub fn bulk(&self) -> &Mat {
        &self.bulk_gn
    }

    pub fn num_cells(&self) -> usize {
        self.prob_cn.nrows()
    }

    pub fn num_genes(&self) -> usize {
        self.bulk_gn.nrows()
    }

    pub fn num_examples(&self) -> usize {
        self.mixtures.len()
    }

    /// `examples x (1 + 3 max_cent)` table; each row is
    /// `[k, centres.., sigmas.., weights..]` padded with zeros
    pub fn parameter_table(&self) -> anyhow::Result<Mat> {
        let ncols = 1 + 3 * self.max_cent;
        let mut table = Mat::zeros(self.num_examples(), ncols);
        for (i, spec) in self.mixtures.iter().enumerate() {
            let row = spec.to_param_row(self.max_cent)?;
            for (j, x) in row.into_iter().enumerate() {
                table[(i, j)] = x;
            }
        }
        Ok(table)
    }

    /// Write `{prefix}.dist.tsv.gz`, `{prefix}.params.tsv.gz`,
    /// `{prefix}.prob.tsv.gz` and `{prefix}.bulk.tsv.gz`
    pub fn write_tsv(&self, prefix: &str) -> anyhow::Result<Vec<Box<str>>> {
        let files = ["dist", "params", "prob", "bulk"]
            .iter()
            .map(|x| format!("{}.{}.tsv.gz", prefix, x).into_boxed_str())
            .collect::<Vec<_>>();

        mkdir(&files[0])?;
        self.distance.as_mat().to_tsv(&files[0])?;
        self.parameter_table()?.to_tsv(&files[1])?;
        self.prob_cn.to_tsv(&files[2])?;
        self.bulk_gn.to_tsv(&files[3])?;

        info!("wrote training set: {:?}", files);
        Ok(files)
    }
}

/// Build a synthetic training set from a reference dataset.
///
/// * `count` - `genes x cells` non-negative counts
/// * `latent` - `cells x latent_dims` embedding
/// * `args` - synthesis parameters
///
/// Stages:
/// 1. distances between cells on the first `dims` latent coordinates
/// 2. bandwidth range from the nearest-neighbour distances
/// 3. a random Gaussian mixture and its cell probabilities per example
/// 4. `n` cells picked per example, aggregated into CPM profiles,
///    `step` examples at a time
pub fn build_training_set<C>(
    count: &C,
    latent: &Mat,
    args: &TrainingSetArgs,
) -> anyhow::Result<TrainingSet>
where
    C: ReferenceCounts + ?Sized,
{
    let ncells = latent.nrows();
    if count.num_cells() != ncells {
        return Err(SynthError::invalid(format!(
            "count matrix has {} cells, latent embedding has {}",
            count.num_cells(),
            ncells
        )));
    }
    if count.num_genes() == 0 {
        return Err(SynthError::invalid("count matrix has no genes"));
    }
    count.validate()?;

    let resolved = args.resolve(ncells, latent.ncols())?;
    let verbose = args.verbose;

    // 1. distance matrix
    let distance = DistanceMatrix::from_latent(latent, resolved.dims)?;
    if verbose {
        info!(
            "distance matrix: {} x {} cells on {} latent dimensions",
            ncells, ncells, resolved.dims
        );
    }

    // 2. bandwidths
    let sigma = calibrate_sigma(&distance, &resolved.neighbours, verbose)?;

    // 3. mixtures and cell probabilities
    let sampler = MixtureSampler::new(
        ncells,
        resolved.min_cent,
        resolved.max_cent,
        &sigma,
        resolved.sigma_grid,
    )?;

    let mut rng = StdRng::seed_from_u64(args.rseed);
    let mixture_seeds: Vec<u64> = (0..resolved.max_iter).map(|_| rng.random()).collect();
    let picking_seeds: Vec<u64> = (0..resolved.max_iter).map(|_| rng.random()).collect();

    if verbose {
        info!("sampling {} Gaussian mixtures", resolved.max_iter);
    }

    let (mixtures, probs): (Vec<MixtureSpec>, Vec<DVec>) = mixture_seeds
        .par_iter()
        .enumerate()
        .progress_with(new_progress_bar(resolved.max_iter, verbose))
        .map(|(i, &seed)| {
            let mut rng = StdRng::seed_from_u64(seed);
            draw_mixture_probability(&sampler, &distance, &mut rng, resolved.max_retries, i)
        })
        .collect::<anyhow::Result<Vec<_>>>()?
        .into_iter()
        .unzip();

    // 4. synthetic bulk profiles
    if verbose {
        info!(
            "aggregating {} cells per example, {} examples per batch",
            resolved.n, resolved.step
        );
    }

    let bulk_gn = BulkAggregator::new(count).aggregate_all(
        &probs,
        resolved.n,
        resolved.step,
        &picking_seeds,
        verbose,
    )?;

    let prob_cn = concatenate_horizontal(&probs)?;

    if verbose {
        info!(
            "training set: {} examples, {} cells, {} genes",
            prob_cn.ncols(),
            prob_cn.nrows(),
            bulk_gn.nrows()
        );
    }

    Ok(TrainingSet {
        distance,
        sigma,
        max_cent: resolved.max_cent,
        mixtures,
        prob_cn,
        bulk_gn,
    })
}
