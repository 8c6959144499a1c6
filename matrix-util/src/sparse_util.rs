use crate::traits::MatTriplets;
use nalgebra_sparse::{CooMatrix, CscMatrix};

impl MatTriplets for CscMatrix<f64> {
    type Mat = Self;
    type Scalar = f64;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut coo = CooMatrix::<f64>::new(nrow, ncol);
        for (ii, jj, x_ij) in triplets {
            let ii: usize = ii
                .try_into()
                .map_err(|e| anyhow::anyhow!("invalid row index: {:?}", e))?;
            let jj: usize = jj
                .try_into()
                .map_err(|e| anyhow::anyhow!("invalid column index: {:?}", e))?;
            if ii >= nrow || jj >= ncol {
                return Err(anyhow::anyhow!(
                    "triplet ({}, {}) out of bounds for {} x {}",
                    ii,
                    jj,
                    nrow,
                    ncol
                ));
            }
            coo.push(ii, jj, x_ij);
        }
        // duplicate entries are summed up
        Ok(CscMatrix::from(&coo))
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        let triplets = self
            .triplet_iter()
            .filter(|&(_, _, &x)| x != 0.0)
            .map(|(i, j, &x)| (i, j, x))
            .collect();
        Ok((self.nrows(), self.ncols(), triplets))
    }
}
