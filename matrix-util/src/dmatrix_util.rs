use crate::common_io::write_types;
use crate::traits::*;

pub use nalgebra::{DMatrix, DVector, RealField};
use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::{Distribution, Gamma, StandardNormal};
use rayon::prelude::*;
use std::fmt::Display;

/// Stack column vectors side by side into a `d x n` matrix
/// * `columns` - `n` vectors of the same length `d`
pub fn concatenate_horizontal<T>(columns: &[DVector<T>]) -> anyhow::Result<DMatrix<T>>
where
    T: nalgebra::Scalar + Copy + num_traits::Zero,
{
    let nrows = columns.first().map(|x| x.len()).unwrap_or(0);

    if columns.iter().any(|x| x.len() != nrows) {
        return Err(anyhow::anyhow!("columns have different lengths"));
    }

    let mut ret = DMatrix::<T>::zeros(nrows, columns.len());
    for (j, x_j) in columns.iter().enumerate() {
        ret.column_mut(j).copy_from(x_j);
    }
    Ok(ret)
}

impl<T> MatOps for DMatrix<T>
where
    T: RealField + Copy,
{
    type Scalar = T;

    fn normalize_columns_to_sum_inplace(&mut self, total: T) -> Vec<usize> {
        let mut degenerate = vec![];
        for (j, mut x_j) in self.column_iter_mut().enumerate() {
            let denom = x_j.sum();
            if denom.is_finite() && denom > T::zero() {
                x_j *= total / denom;
            } else {
                degenerate.push(j);
            }
        }
        degenerate
    }
}

impl SampleOps for DMatrix<f64> {
    type Mat = Self;
    type Scalar = f64;

    fn runif_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        DMatrix::<f64>::from_fn(dd, nn, |_, _| StandardUniform.sample(&mut *rng))
    }

    fn rnorm_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        DMatrix::<f64>::from_fn(dd, nn, |_, _| StandardNormal.sample(&mut *rng))
    }

    fn rgamma_rng<R: Rng>(
        dd: usize,
        nn: usize,
        (shape, scale): (f64, f64),
        rng: &mut R,
    ) -> anyhow::Result<Self::Mat> {
        let pdf = Gamma::new(shape, scale)?;
        Ok(DMatrix::<f64>::from_fn(dd, nn, |_, _| pdf.sample(&mut *rng)))
    }
}

impl<T> DistanceOps for DMatrix<T>
where
    T: RealField + Copy + Send + Sync,
{
    type Scalar = T;
    type Mat = Self;

    fn pairwise_row_distances(&self, ncols_used: usize) -> anyhow::Result<Self::Mat> {
        if ncols_used == 0 || ncols_used > self.ncols() {
            return Err(anyhow::anyhow!(
                "requested {} coordinates, but only {} columns available",
                ncols_used,
                self.ncols()
            ));
        }

        if let Some((i, j)) = (0..ncols_used)
            .flat_map(|j| (0..self.nrows()).map(move |i| (i, j)))
            .find(|&(i, j)| !self[(i, j)].is_finite())
        {
            return Err(anyhow::anyhow!("non-finite coordinate at ({}, {})", i, j));
        }

        let nn = self.nrows();
        let xx = self.columns(0, ncols_used);

        // column i holds the distances from i to all the others
        let dist = (0..nn)
            .into_par_iter()
            .map(|i| {
                let x_i = xx.row(i);
                (0..nn)
                    .map(|j| (&x_i - &xx.row(j)).norm())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .concat();

        Ok(DMatrix::<T>::from_vec(nn, nn, dist))
    }
}

impl<T> IoOps for DMatrix<T>
where
    T: nalgebra::Scalar + Display,
{
    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()> {
        // rows stay in order
        let lines: Vec<Box<str>> = self
            .row_iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(|x| x.to_string()).collect();
                cells.join(delim).into_boxed_str()
            })
            .collect();
        write_types(&lines, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pairwise_distances_use_leading_columns() -> anyhow::Result<()> {
        let xx = DMatrix::<f64>::from_row_slice(3, 3, &[0., 0., 100., 3., 4., -7., 6., 8., 0.]);
        let dd = xx.pairwise_row_distances(2)?;
        assert_abs_diff_eq!(dd[(0, 1)], 5.0);
        assert_abs_diff_eq!(dd[(0, 2)], 10.0);
        assert_abs_diff_eq!(dd[(1, 2)], 5.0);
        assert_eq!(dd, dd.transpose());
        assert!(xx.pairwise_row_distances(4).is_err());
        assert!(xx.pairwise_row_distances(0).is_err());
        Ok(())
    }

    #[test]
    fn degenerate_columns_are_reported() {
        let mut xx = DMatrix::<f64>::from_row_slice(2, 3, &[1., 0., 3., 3., 0., 1.]);
        let bad = xx.normalize_columns_to_sum_inplace(100.);
        assert_eq!(bad, vec![1]);
        assert_abs_diff_eq!(xx.column(0).sum(), 100.0);
        assert_abs_diff_eq!(xx.column(2).sum(), 100.0);
        assert_abs_diff_eq!(xx.column(1).sum(), 0.0);
    }
}
