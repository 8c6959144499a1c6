use approx::assert_abs_diff_eq;
use matrix_util::traits::{MatOps, SampleOps};
use rand::SeedableRng;

#[test]
fn dmatrix_test() {
    use matrix_util::*;

    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut xx = dmatrix_util::DMatrix::<f64>::runif_rng(100, 10, &mut rng);
    let degenerate = xx.normalize_columns_to_sum_inplace(1e6);
    assert!(degenerate.is_empty());

    for j in 0..xx.ncols() {
        assert_abs_diff_eq!(xx.column(j).sum(), 1e6, epsilon = 1e-6);
        assert!(xx.column(j).iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn seeded_sampling_is_reproducible() -> anyhow::Result<()> {
    use matrix_util::dmatrix_util::DMatrix;

    let mut rng1 = rand::rngs::StdRng::seed_from_u64(7);
    let mut rng2 = rand::rngs::StdRng::seed_from_u64(7);
    let aa = DMatrix::<f64>::rgamma_rng(20, 5, (2.0, 0.5), &mut rng1)?;
    let bb = DMatrix::<f64>::rgamma_rng(20, 5, (2.0, 0.5), &mut rng2)?;
    assert_eq!(aa, bb);
    assert!(aa.iter().all(|&x| x > 0.0));

    let zz = DMatrix::<f64>::rnorm_rng(3, 4, &mut rng1);
    assert_eq!(zz.shape(), (3, 4));
    Ok(())
}
