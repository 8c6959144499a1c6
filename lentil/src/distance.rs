use crate::common::*;
use crate::error::SynthError;
use matrix_util::traits::DistanceOps;

/// Euclidean distances between cells in a truncated latent space.
///
/// Symmetric `cells x cells`, non-negative, zero diagonal. Column `c`
/// holds the distances from cell `c` to every cell.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    dist: Mat,
    dims: usize,
}

impl DistanceMatrix {
    /// * `latent` - `cells x total_dims` embedding, one row per cell
    /// * `dims` - use the first `dims` coordinates only
    pub fn from_latent(latent: &Mat, dims: usize) -> anyhow::Result<Self> {
        if latent.nrows() == 0 {
            return Err(SynthError::invalid("empty latent embedding"));
        }
        if dims == 0 || dims > latent.ncols() {
            return Err(SynthError::invalid(format!(
                "dims = {} but the latent embedding has {} columns",
                dims,
                latent.ncols()
            )));
        }

        let dist = latent
            .pairwise_row_distances(dims)
            .map_err(|e| SynthError::invalid(format!("latent embedding: {}", e)))?;

        Ok(Self { dist, dims })
    }

    pub fn num_cells(&self) -> usize {
        self.dist.nrows()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn as_mat(&self) -> &Mat {
        &self.dist
    }

    /// distances from `cell` to all cells
    pub fn from_cell(&self, cell: usize) -> nalgebra::DVectorView<'_, f64> {
        self.dist.column(cell)
    }

    /// Indices of cells sorted by the distance from `cell`, nearest first
    /// (the cell itself comes first). Ties go to the smaller index.
    pub fn nearest_neighbours(&self, cell: usize) -> Vec<(usize, f64)> {
        let mut neighbours = self
            .from_cell(cell)
            .iter()
            .copied()
            .enumerate()
            .collect::<Vec<_>>();
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        neighbours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn truncated_latent_distances() -> anyhow::Result<()> {
        let latent = Mat::from_row_slice(3, 3, &[0., 0., 9., 3., 4., 9., 0., 1., -9.]);
        let dd = DistanceMatrix::from_latent(&latent, 2)?;

        assert_eq!(dd.num_cells(), 3);
        assert_eq!(dd.dims(), 2);
        assert_abs_diff_eq!(dd.as_mat()[(0, 1)], 5.0);
        assert_abs_diff_eq!(dd.as_mat()[(2, 0)], 1.0);
        for i in 0..3 {
            assert_eq!(dd.as_mat()[(i, i)], 0.0);
            for j in 0..3 {
                assert_eq!(dd.as_mat()[(i, j)], dd.as_mat()[(j, i)]);
                assert!(dd.as_mat()[(i, j)] >= 0.0);
            }
        }
        Ok(())
    }

    #[test]
    fn malformed_latent_is_rejected() {
        let latent = Mat::from_row_slice(2, 2, &[0., 1., f64::NAN, 0.]);
        let err = DistanceMatrix::from_latent(&latent, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SynthError>(),
            Some(SynthError::InvalidInput(_))
        ));

        let latent = Mat::zeros(4, 2);
        assert!(DistanceMatrix::from_latent(&latent, 3).is_err());
        assert!(DistanceMatrix::from_latent(&latent, 0).is_err());
    }

    #[test]
    fn ties_are_broken_by_index() -> anyhow::Result<()> {
        // cells 1 and 2 are equally far from cell 0
        let latent = Mat::from_row_slice(3, 1, &[0., 1., -1.]);
        let dd = DistanceMatrix::from_latent(&latent, 1)?;
        let order = dd
            .nearest_neighbours(0)
            .into_iter()
            .map(|(j, _)| j)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2]);
        Ok(())
    }
}
