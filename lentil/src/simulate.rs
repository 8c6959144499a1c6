use crate::common::*;
use crate::error::SynthError;

use clap::Args;
use matrix_util::traits::{MatOps, MatTriplets, SampleOps};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;

#[derive(Args, Debug, Clone)]
pub struct SimRefArgs {
    /// number of reference cells
    #[arg(long, default_value_t = 500)]
    pub cells: usize,

    /// number of genes
    #[arg(long, default_value_t = 200)]
    pub genes: usize,

    /// number of cell types (clusters in the latent space)
    #[arg(long, default_value_t = 5)]
    pub cell_types: usize,

    /// dimension of the simulated latent embedding
    #[arg(long, default_value_t = 10)]
    pub latent_dims: usize,

    /// expected total count per cell
    #[arg(long, default_value_t = 1000.)]
    pub depth: f64,

    /// distance scale between cell type centres
    #[arg(long, default_value_t = 10.)]
    pub separation: f64,

    /// spread of the cells around their cell type centre
    #[arg(long, default_value_t = 1.)]
    pub cluster_sd: f64,

    /// random seed of the reference data
    #[arg(long, default_value_t = 7)]
    pub sim_seed: u64,
}

impl Default for SimRefArgs {
    fn default() -> Self {
        Self {
            cells: 500,
            genes: 200,
            cell_types: 5,
            latent_dims: 10,
            depth: 1000.,
            separation: 10.,
            cluster_sd: 1.,
            sim_seed: 7,
        }
    }
}

pub struct SimRefOut {
    /// `genes x cells` sparse counts
    pub counts: CscMat,
    /// `cells x latent_dims` embedding
    pub latent: Mat,
    /// cell type of each cell
    pub cell_types: Vec<usize>,
    /// `genes x cell_types` expression signature
    pub beta_gk: Mat,
}

/// Simulate a reference single-cell dataset
///
/// ```text
/// type(j) ~ Uniform{0..K}
/// z(j,:)  ~ N(μ(type(j)) · separation, cluster_sd²)
/// Y(g,j)  ~ Poisson(depth · β(g, type(j)))
/// ```
///
/// where each column of `β ~ Gamma(1, 1)` is normalized to one.
pub fn simulate_reference(args: &SimRefArgs) -> anyhow::Result<SimRefOut> {
    let (nn, dd, kk) = (args.cells, args.genes, args.cell_types);
    if nn == 0 || dd == 0 || kk == 0 || args.latent_dims == 0 {
        return Err(SynthError::invalid(
            "cells, genes, cell types and latent dimensions must be positive",
        ));
    }
    if !(args.depth > 0.0 && args.separation >= 0.0 && args.cluster_sd >= 0.0) {
        return Err(SynthError::invalid("depth, separation and spread must be positive"));
    }

    let mut rng = StdRng::seed_from_u64(args.sim_seed);

    // 1. cell types and their latent centres
    let cell_types: Vec<usize> = (0..nn).map(|_| rng.random_range(0..kk)).collect();
    let centres_kl = Mat::rnorm_rng(kk, args.latent_dims, &mut rng) * args.separation;
    let noise_nl = Mat::rnorm_rng(nn, args.latent_dims, &mut rng) * args.cluster_sd;

    let mut latent = noise_nl;
    for (j, &k) in cell_types.iter().enumerate() {
        let mut z_j = latent.row_mut(j);
        z_j += &centres_kl.row(k);
    }

    // 2. gene expression signature of each cell type
    let mut beta_gk = Mat::rgamma_rng(dd, kk, (1., 1.), &mut rng)?;
    let degenerate = beta_gk.normalize_columns_to_sum_inplace(1.0);
    if !degenerate.is_empty() {
        return Err(anyhow::anyhow!("empty signature for cell types {:?}", degenerate));
    }

    // 3. Poisson counts
    let rseed = args.sim_seed;
    let triplets = cell_types
        .par_iter()
        .enumerate()
        .map(|(j, &k)| {
            let mut rng = StdRng::seed_from_u64(rseed.wrapping_add(1 + j as u64));
            beta_gk
                .column(k)
                .iter()
                .enumerate()
                .filter_map(|(g, &b)| {
                    let rpois = Poisson::new(args.depth * b).ok()?;
                    let y = rpois.sample(&mut rng);
                    (y > 0.0).then_some((g, j, y))
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .concat();

    info!(
        "simulated {} genes x {} cells with {} non-zero counts",
        dd,
        nn,
        triplets.len()
    );

    let counts = CscMat::from_nonzero_triplets(dd, nn, triplets)?;

    Ok(SimRefOut {
        counts,
        latent,
        cell_types,
        beta_gk,
    })
}
