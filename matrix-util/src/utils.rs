/// Consecutive `[lb, ub)` intervals of at most `batch_size` covering
/// `0..ntot`; only the last one may be shorter.
pub fn generate_minibatch_intervals(ntot: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let batch_size = batch_size.max(1);
    (0..ntot)
        .step_by(batch_size)
        .map(|lb| (lb, (lb + batch_size).min(ntot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_minibatches() {
        let intervals = generate_minibatch_intervals(55, 20);
        assert_eq!(intervals, vec![(0, 20), (20, 40), (40, 55)]);
        assert!(generate_minibatch_intervals(0, 20).is_empty());
        assert_eq!(generate_minibatch_intervals(5, 20), vec![(0, 5)]);
    }
}
