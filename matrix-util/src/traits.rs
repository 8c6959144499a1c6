use rand::Rng;

/// Convert to and from the vector of triplets
pub trait MatTriplets {
    type Mat;
    type Scalar;

    /// Build a matrix from `(row, col, value)` triplets. Repeated
    /// `(row, col)` pairs are summed.
    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug;

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)>;
}

/// Normalize columns
pub trait MatOps {
    type Scalar;

    /// Rescale every column so that it sums to `total`.
    ///
    /// Columns whose sum is zero or not finite are left untouched and
    /// their indices are returned, so the caller can decide what a
    /// degenerate column means.
    fn normalize_columns_to_sum_inplace(&mut self, total: Self::Scalar) -> Vec<usize>;
}

/// Random matrices drawn from a caller-owned generator
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// `dd x nn` entries from `U(0, 1)`
    fn runif_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;

    /// `dd x nn` entries from `N(0, 1)`
    fn rnorm_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;

    /// `dd x nn` entries from `Gamma(shape, scale)` with mean
    /// `shape * scale`
    fn rgamma_rng<R: Rng>(
        dd: usize,
        nn: usize,
        shape_scale: (Self::Scalar, Self::Scalar),
        rng: &mut R,
    ) -> anyhow::Result<Self::Mat>;
}

pub trait DistanceOps {
    type Scalar;
    type Mat;

    /// Pairwise Euclidean distances between rows, using only the first
    /// `ncols_used` columns. Returns a symmetric `nrows x nrows` matrix
    /// with zero diagonal.
    fn pairwise_row_distances(&self, ncols_used: usize) -> anyhow::Result<Self::Mat>;
}

/// Delimited text output, one matrix row per line
pub trait IoOps {
    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, file: &str) -> anyhow::Result<()> {
        self.write_file_delim(file, "\t")
    }
}
